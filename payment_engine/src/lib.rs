//! Payment Engine
//!
//! The core of the checkout payment service. It is provider- and transport-agnostic: the payment gateway, the identity
//! and catalog services, the cache and the message bus are all reached through traits.
//!
//! The library is divided into these sections:
//! 1. Storage (`db` and [`db_types`]). The payment row is the only durable state. SQLite is the supported backend;
//!    other backends implement [`PaymentStore`].
//! 2. The reconciliation engine ([`PaymentFlowApi`]). Creates payments at the gateway and keeps the stored status in
//!    step with it, whether the news arrives by webhook, manual poll or local expiry.
//! 3. The validation saga ([`saga`]). Correlates the stock and user validation replies for a checkout and dispatches
//!    exactly one outcome.
//! 4. Messaging ([`events`]) and the read-through [`cache`].
//! 5. A bounded [`worker_pool`] for the read paths.
mod db;

pub mod cache;
pub mod db_types;
pub mod events;
pub mod flow_api;
pub mod saga;
pub mod status_mapper;
pub mod traits;
pub mod worker_pool;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{PaymentStore, PaymentStoreError};
pub use flow_api::{errors::PaymentFlowError, flow_objects, PaymentFlowApi};
pub use status_mapper::map_status;
