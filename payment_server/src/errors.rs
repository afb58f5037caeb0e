use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use payment_engine::{worker_pool::PoolError, PaymentFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("The requester could not be identified. {0}")]
    Unauthenticated(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The item cannot be purchased. {0}")]
    ItemUnavailable(String),
    #[error("The item is out of stock. {0}")]
    OutOfStock(String),
    #[error("A required service is unavailable. Please try again. {0}")]
    CollaboratorUnavailable(String),
    #[error("This payment method is temporarily unavailable. Please choose another method. {0}")]
    MethodUnavailable(String),
    #[error("The payment gateway could not be reached. Please try again. {0}")]
    GatewayUnreachable(String),
    #[error("The payment gateway rejected the request. {0}")]
    GatewayRejected(String),
    #[error("The notification signature is invalid.")]
    InvalidSignature,
    #[error("The server is busy. Please try again shortly.")]
    PoolFull,
    #[error("The server is shutting down.")]
    PoolShuttingDown,
    #[error("The request took too long to complete.")]
    Timeout,
}

impl ServerError {
    /// A stable, machine-readable code. Clients use it to tell "retry" apart from "do not retry".
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "INVALID_REQUEST",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::NoRecordFound(_) => "NOT_FOUND",
            Self::ItemUnavailable(_) => "ITEM_UNAVAILABLE",
            Self::OutOfStock(_) => "OUT_OF_STOCK",
            Self::CollaboratorUnavailable(_) => "COLLABORATOR_UNAVAILABLE",
            Self::MethodUnavailable(_) => "METHOD_UNAVAILABLE",
            Self::GatewayUnreachable(_) => "GATEWAY_UNREACHABLE",
            Self::GatewayRejected(_) => "GATEWAY_REJECTED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::PoolFull => "POOL_FULL",
            Self::PoolShuttingDown => "POOL_SHUTTING_DOWN",
            Self::Timeout => "TIMEOUT",
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::InitializeError(_) | Self::BackendError(_) | Self::IOError(_) => "BACKEND_ERROR",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::ItemUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OutOfStock(_) => StatusCode::CONFLICT,
            Self::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MethodUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayRejected(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::PoolFull => StatusCode::SERVICE_UNAVAILABLE,
            Self::PoolShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "success": false, "code": self.code(), "error": self.to_string() }).to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::InvalidRequest(s) => Self::InvalidRequestBody(s),
            PaymentFlowError::PaymentNotFound(id) => Self::NoRecordFound(format!("Payment {id} does not exist")),
            PaymentFlowError::PayerNotFound(id) => Self::NoRecordFound(format!("User {id} does not exist")),
            PaymentFlowError::ItemNotFound(id) => Self::NoRecordFound(format!("Product {id} does not exist")),
            PaymentFlowError::ItemInactive(id) => Self::ItemUnavailable(format!("Product {id} is not for sale")),
            PaymentFlowError::OutOfStock(id) => Self::OutOfStock(format!("Product {id} is sold out")),
            PaymentFlowError::CollaboratorUnavailable(s) => Self::CollaboratorUnavailable(s),
            PaymentFlowError::MethodUnavailable(s) => Self::MethodUnavailable(s),
            PaymentFlowError::GatewayUnreachable(s) => Self::GatewayUnreachable(s),
            PaymentFlowError::GatewayRejected(s) => Self::GatewayRejected(s),
            PaymentFlowError::InvalidSignature => Self::InvalidSignature,
            PaymentFlowError::DatabaseError(s) => {
                error!("💻️ Database error: {s}");
                Self::BackendError(format!("Database error: {s}"))
            },
        }
    }
}

impl From<PoolError> for ServerError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::PoolFull => Self::PoolFull,
            PoolError::ShuttingDown => Self::PoolShuttingDown,
            PoolError::Timeout | PoolError::Cancelled => Self::Timeout,
            PoolError::UnknownKind(_) | PoolError::HandlerFailed => Self::BackendError(e.to_string()),
        }
    }
}
