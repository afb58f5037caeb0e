use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{GatewayFields, NewPayment, Payment, PaymentPage, PaymentStats, PaymentStatus};

/// This trait defines the behaviour of backends that persist payments for the payment engine.
///
/// The store never decides whether a status change is legal. Callers consult
/// [`PaymentStatus::can_transition_to`] and then ask for a *conditional* update via [`Self::transition_status`], which
/// only succeeds if nobody else changed the row in the meantime.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a brand-new payment with status `PENDING`.
    ///
    /// Inserting a second payment with the same `order_id` fails with [`PaymentStoreError::DuplicateOrder`].
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;

    async fn fetch_payment(&self, id: &str) -> Result<Option<Payment>, PaymentStoreError>;

    async fn fetch_payment_by_order_id(&self, order_id: &str) -> Result<Option<Payment>, PaymentStoreError>;

    /// Newest first. `page` is 1-based.
    async fn fetch_payments_for_user(&self, user_id: &str, page: u32, limit: u32)
        -> Result<PaymentPage, PaymentStoreError>;

    /// Merges the gateway-derived fields into the payment without touching its status. Fields that are `None` keep
    /// their stored value. Returns the updated payment, or `None` if it does not exist.
    async fn merge_gateway_fields(&self, id: &str, fields: GatewayFields) -> Result<Option<Payment>, PaymentStoreError>;

    /// Moves the payment from `from` to `to` and merges `fields` in the same statement.
    ///
    /// Returns `None` if the payment's status is no longer `from`, i.e. another writer got there first.
    async fn transition_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        fields: GatewayFields,
    ) -> Result<Option<Payment>, PaymentStoreError>;

    /// Pending payments whose gateway `expiry_time` lies before `now`.
    async fn fetch_overdue_pending(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;

    /// Pending payments created before `older_than`, whatever their expiry time.
    async fn fetch_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;

    async fn payment_stats(&self) -> Result<PaymentStats, PaymentStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert payment, since order {0} already has one")]
    DuplicateOrder(String),
    #[error("Stored payment data is corrupt: {0}")]
    CorruptData(String),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
