use gateway_tools::GatewayError;
use thiserror::Error;

use crate::db::traits::PaymentStoreError;

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("User {0} does not exist")]
    PayerNotFound(String),
    #[error("Product {0} does not exist")]
    ItemNotFound(String),
    #[error("Product {0} is not available for purchase")]
    ItemInactive(String),
    #[error("Product {0} is out of stock")]
    OutOfStock(String),
    #[error("A dependent service is unavailable. Please try again. {0}")]
    CollaboratorUnavailable(String),
    #[error("This payment method is temporarily unavailable. Please choose another method. {0}")]
    MethodUnavailable(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnreachable(String),
    #[error("The payment gateway rejected the request. {0}")]
    GatewayRejected(String),
    #[error("The notification signature is invalid")]
    InvalidSignature,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PaymentStoreError> for PaymentFlowError {
    fn from(e: PaymentStoreError) -> Self {
        PaymentFlowError::DatabaseError(e.to_string())
    }
}

impl PaymentFlowError {
    /// Classifies a failed charge. Known provider outages become "try another method".
    pub fn from_charge_error(e: GatewayError) -> Self {
        if e.is_transient_outage() {
            PaymentFlowError::MethodUnavailable(e.to_string())
        } else if e.is_unreachable() {
            PaymentFlowError::GatewayUnreachable(e.to_string())
        } else {
            PaymentFlowError::GatewayRejected(e.to_string())
        }
    }

    /// Classifies a failed status lookup.
    pub fn from_status_error(e: GatewayError) -> Self {
        if e.is_unreachable() || e.is_retryable() {
            PaymentFlowError::GatewayUnreachable(e.to_string())
        } else {
            PaymentFlowError::GatewayRejected(e.to_string())
        }
    }
}
