//! The payment engine public API.
//!
//! [`PaymentFlowApi`] owns every state change of a payment: creating it against the gateway, reconciling it with the
//! gateway's view (from a webhook, a manual check, or the local expiry sweep), and the read paths that sit in front of
//! the cache.
pub mod errors;
pub mod flow_objects;
mod payment_flow_api;

pub use payment_flow_api::PaymentFlowApi;
