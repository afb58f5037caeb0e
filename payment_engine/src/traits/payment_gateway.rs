use async_trait::async_trait;
use gateway_tools::{
    data_objects::{ChargeRequest, ChargeResponse},
    GatewayApi,
    GatewayError,
};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the payer. The gateway deduplicates on the request's order id, so repeating a charge for the same order
    /// never charges twice.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError>;

    /// Fetches the authoritative transaction state for `order_id`.
    async fn fetch_status(&self, order_id: &str) -> Result<ChargeResponse, GatewayError>;

    fn verify_signature(&self, order_id: &str, status_code: &str, gross_amount: &str, signature: &str) -> bool;

    /// Where the gateway should post notifications.
    fn callback_url(&self) -> String;
}

#[async_trait]
impl PaymentGateway for GatewayApi {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        GatewayApi::charge(self, request).await
    }

    async fn fetch_status(&self, order_id: &str) -> Result<ChargeResponse, GatewayError> {
        GatewayApi::fetch_status(self, order_id).await
    }

    fn verify_signature(&self, order_id: &str, status_code: &str, gross_amount: &str, signature: &str) -> bool {
        GatewayApi::verify_signature(self, order_id, status_code, gross_amount, signature)
    }

    fn callback_url(&self) -> String {
        GatewayApi::callback_url(self)
    }
}
