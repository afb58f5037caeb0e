use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};

use crate::{
    config::GatewayConfig,
    data_objects::{ChargeRequest, ChargeResponse},
    helpers::{basic_auth_header, constant_time_eq, notification_signature},
    GatewayError,
    RetryPolicy,
};

const USER_AGENT: &str = concat!("cpg-payment-service/", env!("CARGO_PKG_VERSION"));

/// Client for the payment gateway's core API.
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
    retry: RetryPolicy,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(4);
        let auth = HeaderValue::from_str(&basic_auth_header(config.server_key.reveal()))
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        headers.insert("Authorization", auth);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), retry: RetryPolicy::default() })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn callback_url(&self) -> String {
        self.config.callback_url()
    }

    /// Creates a charge. The order id doubles as the idempotency key, so a retried charge for the same order is never
    /// billed twice.
    pub async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        let order_id = request.order_id();
        info!("🏦️ Charging order {order_id} via {}", request.payment_type);
        let label = format!("Charge for {order_id}");
        let result = self
            .retry
            .run(&label, move || async move {
                let response = self.send_once(Method::POST, "/charge", Some(order_id), Some(request)).await?;
                reject_embedded_error(response)
            })
            .await;
        self.finish(result)
    }

    /// Fetches the authoritative transaction status for an order.
    ///
    /// Expired and denied transactions are reported with an HTTP 200 and an error `status_code` in the body. Those are
    /// still status reports, so only a body without a `transaction_status` (e.g. an unknown order's `404`) is treated
    /// as a rejection.
    pub async fn fetch_status(&self, order_id: &str) -> Result<ChargeResponse, GatewayError> {
        debug!("🏦️ Fetching gateway status for order {order_id}");
        let path = format!("/{order_id}/status");
        let path = path.as_str();
        let label = format!("Status check for {order_id}");
        let result = self
            .retry
            .run(&label, move || async move {
                let response = self.send_once(Method::GET, path, None, None).await?;
                if response.transaction_status.is_some() {
                    return Ok(response);
                }
                reject_embedded_error(response)
            })
            .await;
        self.finish(result)
    }

    /// Checks a webhook signature against the configured server key.
    pub fn verify_signature(&self, order_id: &str, status_code: &str, gross_amount: &str, signature: &str) -> bool {
        let expected = notification_signature(order_id, status_code, gross_amount, self.config.server_key.reveal());
        constant_time_eq(expected.as_bytes(), signature.trim().to_ascii_lowercase().as_bytes())
    }

    fn finish(&self, result: Result<ChargeResponse, GatewayError>) -> Result<ChargeResponse, GatewayError> {
        // Transport errors are always retried, so one reaching here means every attempt failed
        result.map_err(|e| match e {
            GatewayError::Transport(message) => GatewayError::Unreachable { attempts: self.retry.attempts(), message },
            e => e,
        })
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<&ChargeRequest>,
    ) -> Result<ChargeResponse, GatewayError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        trace!("🏦️ {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        if !status.is_success() {
            debug!("🏦️ Gateway responded with HTTP {status}: {text}");
            return Err(GatewayError::Http { status: status.as_u16(), message: text });
        }
        serde_json::from_str::<ChargeResponse>(&text).map_err(|e| {
            warn!("🏦️ Could not parse gateway response. {e}. {text}");
            GatewayError::InvalidResponse(e.to_string())
        })
    }
}

/// The gateway reports some failures with an HTTP 200 and an error code in the body.
fn reject_embedded_error(response: ChargeResponse) -> Result<ChargeResponse, GatewayError> {
    match response.error_status_code() {
        Some(code) => {
            let message = response.status_message.clone().unwrap_or_default();
            debug!("🏦️ Gateway rejected the request with status {code}. {message}");
            Err(GatewayError::Rejected { status_code: code.to_string(), message })
        },
        None => Ok(response),
    }
}
