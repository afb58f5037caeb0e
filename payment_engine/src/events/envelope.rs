use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PAYMENT_EXCHANGE: &str = "payment.events";
pub const PRODUCT_EXCHANGE: &str = "product.events";
pub const USER_EXCHANGE: &str = "user.events";

pub const CHECKOUT_INIT: &str = "checkout.init";
pub const PRODUCT_VALIDATION_RESPONSE: &str = "product.validation.response";
pub const USER_VALIDATION_RESPONSE: &str = "user.validation.response";
pub const PAYMENT_CREATED: &str = "payment.created";
pub const PAYMENT_STATUS_UPDATED: &str = "payment.status.updated";
pub const PAYMENT_SUCCESS: &str = "payment.success";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const STOCK_REDUCED: &str = "product.stock.reduced";
pub const ORDER_COMPLETED: &str = "order.completed";
pub const ORDER_FAILED: &str = "order.failed";

/// The JSON message every service puts on the bus. The `type` doubles as the routing topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub data: Value,
    /// Unix seconds
    pub timestamp: i64,
}

impl Envelope {
    pub fn new(event_type: &str, user_id: Option<String>, data: Value) -> Self {
        Self { event_type: event_type.to_string(), user_id, data, timestamp: Utc::now().timestamp() }
    }
}
