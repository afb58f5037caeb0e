//! # Payment storage
//!
//! [`traits::PaymentStore`] is the contract a backend implements to persist payments. Only the reconciliation engine
//! writes through it, and every status change goes through the conditional
//! [`traits::PaymentStore::transition_status`] so that concurrent webhooks and polls cannot both win.
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;
