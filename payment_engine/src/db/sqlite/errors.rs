use thiserror::Error;

use crate::db::traits::PaymentStoreError;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Cannot process duplicate order {0}")]
    DuplicateOrder(String),
}

impl From<SqliteDatabaseError> for PaymentStoreError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::DuplicateOrder(order_id) => PaymentStoreError::DuplicateOrder(order_id),
            e => PaymentStoreError::DatabaseError(e.to_string()),
        }
    }
}
