//! Validation saga.
//!
//! A checkout is only allowed to proceed once both the catalog (stock) and identity (user) services have replied for
//! the same payment id. The replies arrive independently and in any order over the bus; the
//! [`ValidationCoordinator`] correlates them and dispatches exactly once per payment.
mod consumer;
mod coordinator;

pub use consumer::ValidationConsumer;
pub use coordinator::{
    PendingValidation,
    ReplyOutcome,
    SideReply,
    ValidationCoordinator,
    Verdict,
    DEFAULT_VALIDATION_TIMEOUT,
};
