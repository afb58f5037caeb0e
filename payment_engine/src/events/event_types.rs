use chrono::{DateTime, Utc};
use cpg_common::{PaymentMethod, Rupiah};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{Payment, PaymentStatus},
    events::envelope::*,
};

pub const PRODUCT_OK: &str = "PRODUCT_OK";
pub const OUT_OF_STOCK: &str = "OUT_OF_STOCK";
pub const USER_OK: &str = "USER_OK";
pub const USER_INVALID: &str = "USER_INVALID";

//--------------------------------------   Consumed payloads   ---------------------------------------------------------

/// Published by the checkout flow. Starts a validation correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutInit {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductValidationReply {
    pub payment_id: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub product_id: String,
    /// `PRODUCT_OK` or `OUT_OF_STOCK`
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stock: i64,
}

impl ProductValidationReply {
    pub fn is_ok(&self) -> bool {
        self.status == PRODUCT_OK
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserValidationReply {
    pub payment_id: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub user_id: String,
    /// `USER_OK` or `USER_INVALID`
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl UserValidationReply {
    pub fn is_ok(&self) -> bool {
        self.status == USER_OK
    }
}

//--------------------------------------   Produced payloads   ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCreated {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
}

impl From<&Payment> for PaymentCreated {
    fn from(p: &Payment) -> Self {
        Self {
            payment_id: p.id.clone(),
            order_id: p.order_id.clone(),
            user_id: p.user_id.clone(),
            product_id: p.product_id.clone(),
            amount: p.amount,
            total_amount: p.total_amount,
            payment_method: p.payment_method,
            status: p.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusUpdated {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub old_status: PaymentStatus,
    pub new_status: PaymentStatus,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentStatusUpdated {
    pub fn new(payment: &Payment, old_status: PaymentStatus) -> Self {
        Self {
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            user_id: payment.user_id.clone(),
            product_id: payment.product_id.clone(),
            old_status,
            new_status: payment.status,
            amount: payment.amount,
            total_amount: payment.total_amount,
            payment_method: payment.payment_method,
            paid_at: payment.paid_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentSucceeded {
    fn from(p: &Payment) -> Self {
        Self {
            payment_id: p.id.clone(),
            order_id: p.order_id.clone(),
            user_id: p.user_id.clone(),
            product_id: p.product_id.clone(),
            amount: p.amount,
            total_amount: p.total_amount,
            payment_method: p.payment_method,
            paid_at: p.paid_at.unwrap_or(p.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: PaymentMethod,
    pub failure_reason: String,
}

impl PaymentFailed {
    pub fn new(p: &Payment, failure_reason: String) -> Self {
        Self {
            payment_id: p.id.clone(),
            order_id: p.order_id.clone(),
            user_id: p.user_id.clone(),
            product_id: p.product_id.clone(),
            amount: p.amount,
            total_amount: p.total_amount,
            payment_method: p.payment_method,
            failure_reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReduced {
    pub product_id: String,
    pub quantity: i64,
    pub order_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFailed {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: String,
    pub failure_reason: String,
}

//--------------------------------------       BusEvent        ---------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum EventDecodeError {
    #[error("Unknown event type: {0}")]
    UnknownType(String),
    #[error("Invalid payload for {event_type}: {message}")]
    InvalidPayload { event_type: String, message: String },
}

/// Every message this service consumes or produces, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    CheckoutInit(CheckoutInit),
    ProductValidation(ProductValidationReply),
    UserValidation(UserValidationReply),
    PaymentCreated(PaymentCreated),
    PaymentStatusUpdated(PaymentStatusUpdated),
    PaymentSuccess(PaymentSucceeded),
    PaymentFailed(PaymentFailed),
    StockReduced(StockReduced),
    OrderCompleted(OrderCompleted),
    OrderFailed(OrderFailed),
}

fn payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, EventDecodeError> {
    serde_json::from_value(envelope.data.clone()).map_err(|e| EventDecodeError::InvalidPayload {
        event_type: envelope.event_type.clone(),
        message: e.to_string(),
    })
}

impl BusEvent {
    pub fn decode(envelope: &Envelope) -> Result<Self, EventDecodeError> {
        let event = match envelope.event_type.as_str() {
            CHECKOUT_INIT => Self::CheckoutInit(payload(envelope)?),
            PRODUCT_VALIDATION_RESPONSE => Self::ProductValidation(payload(envelope)?),
            USER_VALIDATION_RESPONSE => Self::UserValidation(payload(envelope)?),
            PAYMENT_CREATED => Self::PaymentCreated(payload(envelope)?),
            PAYMENT_STATUS_UPDATED => Self::PaymentStatusUpdated(payload(envelope)?),
            PAYMENT_SUCCESS => Self::PaymentSuccess(payload(envelope)?),
            PAYMENT_FAILED => Self::PaymentFailed(payload(envelope)?),
            STOCK_REDUCED => Self::StockReduced(payload(envelope)?),
            ORDER_COMPLETED => Self::OrderCompleted(payload(envelope)?),
            ORDER_FAILED => Self::OrderFailed(payload(envelope)?),
            other => return Err(EventDecodeError::UnknownType(other.to_string())),
        };
        Ok(event)
    }

    pub fn topic(&self) -> &'static str {
        match self {
            Self::CheckoutInit(_) => CHECKOUT_INIT,
            Self::ProductValidation(_) => PRODUCT_VALIDATION_RESPONSE,
            Self::UserValidation(_) => USER_VALIDATION_RESPONSE,
            Self::PaymentCreated(_) => PAYMENT_CREATED,
            Self::PaymentStatusUpdated(_) => PAYMENT_STATUS_UPDATED,
            Self::PaymentSuccess(_) => PAYMENT_SUCCESS,
            Self::PaymentFailed(_) => PAYMENT_FAILED,
            Self::StockReduced(_) => STOCK_REDUCED,
            Self::OrderCompleted(_) => ORDER_COMPLETED,
            Self::OrderFailed(_) => ORDER_FAILED,
        }
    }

    pub fn exchange(&self) -> &'static str {
        match self {
            Self::ProductValidation(_) | Self::StockReduced(_) => PRODUCT_EXCHANGE,
            Self::UserValidation(_) => USER_EXCHANGE,
            _ => PAYMENT_EXCHANGE,
        }
    }

    /// The user the event concerns, if the payload names one.
    pub fn user_id(&self) -> Option<&str> {
        let id = match self {
            Self::CheckoutInit(e) => e.user_id.as_str(),
            Self::ProductValidation(_) => return None,
            Self::UserValidation(e) => e.user_id.as_str(),
            Self::PaymentCreated(e) => e.user_id.as_str(),
            Self::PaymentStatusUpdated(e) => e.user_id.as_str(),
            Self::PaymentSuccess(e) => e.user_id.as_str(),
            Self::PaymentFailed(e) => e.user_id.as_str(),
            Self::StockReduced(e) => e.user_id.as_str(),
            Self::OrderCompleted(e) => e.user_id.as_str(),
            Self::OrderFailed(e) => e.user_id.as_str(),
        };
        Some(id).filter(|s| !s.is_empty())
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        let data = match self {
            Self::CheckoutInit(e) => serde_json::to_value(e),
            Self::ProductValidation(e) => serde_json::to_value(e),
            Self::UserValidation(e) => serde_json::to_value(e),
            Self::PaymentCreated(e) => serde_json::to_value(e),
            Self::PaymentStatusUpdated(e) => serde_json::to_value(e),
            Self::PaymentSuccess(e) => serde_json::to_value(e),
            Self::PaymentFailed(e) => serde_json::to_value(e),
            Self::StockReduced(e) => serde_json::to_value(e),
            Self::OrderCompleted(e) => serde_json::to_value(e),
            Self::OrderFailed(e) => serde_json::to_value(e),
        }?;
        Ok(Envelope::new(self.topic(), self.user_id().map(String::from), data))
    }
}

//--------------------------------------      Hook events      ---------------------------------------------------------

/// Delivered to in-process hooks when a payment settles.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSettledEvent {
    pub payment: Payment,
}

impl PaymentSettledEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

/// Delivered to in-process hooks when a payment fails, is cancelled or expires.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAnnulledEvent {
    pub payment: Payment,
    pub status: PaymentStatus,
}

impl PaymentAnnulledEvent {
    pub fn new(payment: Payment) -> Self {
        let status = payment.status;
        Self { payment, status }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_product_reply() {
        let envelope = Envelope::new(
            PRODUCT_VALIDATION_RESPONSE,
            None,
            json!({"payment_id": "p1", "order_id": "o1", "product_id": "x", "status": "OUT_OF_STOCK", "stock": 0}),
        );
        let BusEvent::ProductValidation(reply) = BusEvent::decode(&envelope).unwrap() else {
            panic!("Expected a product validation reply");
        };
        assert_eq!(reply.payment_id, "p1");
        assert!(!reply.is_ok());
        assert_eq!(reply.message, "");
    }

    #[test]
    fn decode_checkout_from_wire() {
        let raw = r#"{
            "type": "checkout.init",
            "user_id": "u1",
            "data": {
                "payment_id": "p1", "order_id": "o1", "user_id": "u1", "product_id": "x",
                "quantity": 2, "amount": 100000, "total_amount": 102500, "payment_method": "qris"
            },
            "timestamp": 1717200000
        }"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        let BusEvent::CheckoutInit(init) = BusEvent::decode(&envelope).unwrap() else {
            panic!("Expected checkout init");
        };
        assert_eq!(init.total_amount, Rupiah::from(102_500));
        assert_eq!(init.quantity, 2);
    }

    #[test]
    fn decode_errors() {
        let envelope = Envelope::new("something.else", None, json!({}));
        assert!(matches!(BusEvent::decode(&envelope), Err(EventDecodeError::UnknownType(t)) if t == "something.else"));
        let envelope = Envelope::new(USER_VALIDATION_RESPONSE, None, json!({"status": "USER_OK"}));
        assert!(matches!(BusEvent::decode(&envelope), Err(EventDecodeError::InvalidPayload { .. })));
    }

    #[test]
    fn envelopes_carry_type_and_user() {
        let event = BusEvent::StockReduced(StockReduced {
            product_id: "x".into(),
            quantity: 1,
            order_id: "o1".into(),
            user_id: "u1".into(),
        });
        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event_type, "product.stock.reduced");
        assert_eq!(envelope.user_id.as_deref(), Some("u1"));
        assert_eq!(event.exchange(), PRODUCT_EXCHANGE);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "product.stock.reduced");
        assert_eq!(BusEvent::decode(&envelope).unwrap(), event);
    }
}
