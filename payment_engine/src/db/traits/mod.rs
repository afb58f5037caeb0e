//! The interface contracts of the payment store *backends*.
//!
//! * [`PaymentStore`] defines every read and write the payment engine performs against a backend.
mod payment_store;

pub use payment_store::{PaymentStore, PaymentStoreError};
