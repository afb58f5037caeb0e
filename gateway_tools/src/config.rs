use std::{env, fmt::Display, str::FromStr, time::Duration};

use cpg_common::{helpers::join_url, Secret};
use log::*;

pub const SANDBOX_BASE_URL: &str = "https://api.sandbox.midtrans.com/v2";
pub const PRODUCTION_BASE_URL: &str = "https://api.midtrans.com/v2";
pub const CALLBACK_PATH: &str = "/api/v1/payments/gateway/callback";
const DEFAULT_PAYMENT_SERVICE_URL: &str = "http://localhost:8083";
const DEFAULT_USER_SERVICE_URL: &str = "http://localhost:8081";
const DEFAULT_PRODUCT_SERVICE_URL: &str = "http://localhost:8082";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GatewayEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl GatewayEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl Display for GatewayEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => f.write_str("sandbox"),
            Self::Production => f.write_str("production"),
        }
    }
}

impl FromStr for GatewayEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "development" | "dev" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("Unknown gateway environment: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: GatewayEnvironment,
    pub base_url: String,
    pub server_key: Secret<String>,
    pub client_key: String,
    /// The public base URL of this service. Webhook callback URLs are built from it.
    pub payment_service_url: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: GatewayEnvironment::Sandbox,
            base_url: SANDBOX_BASE_URL.to_string(),
            server_key: Secret::default(),
            client_key: String::default(),
            payment_service_url: DEFAULT_PAYMENT_SERVICE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = env::var("CPG_GATEWAY_ENVIRONMENT")
            .ok()
            .and_then(|s| {
                s.parse::<GatewayEnvironment>()
                    .map_err(|e| warn!("🪛️ {e}. Falling back to the sandbox environment."))
                    .ok()
            })
            .unwrap_or_default();
        let base_url = env::var("CPG_GATEWAY_BASE_URL").unwrap_or_else(|_| environment.base_url().to_string());
        let server_key = Secret::new(env::var("CPG_GATEWAY_SERVER_KEY").unwrap_or_else(|_| {
            error!("🪛️ CPG_GATEWAY_SERVER_KEY is not set. Gateway calls and webhook signature checks will fail.");
            String::default()
        }));
        let client_key = env::var("CPG_GATEWAY_CLIENT_KEY").unwrap_or_else(|_| {
            warn!("🪛️ CPG_GATEWAY_CLIENT_KEY is not set. The /config endpoint will return an empty client key.");
            String::default()
        });
        let payment_service_url = env::var("CPG_PAYMENT_SERVICE_URL").unwrap_or_else(|_| {
            info!("🪛️ CPG_PAYMENT_SERVICE_URL is not set. Using {DEFAULT_PAYMENT_SERVICE_URL} for callback URLs.");
            DEFAULT_PAYMENT_SERVICE_URL.to_string()
        });
        let timeout = http_timeout_from_env();
        Self { environment, base_url, server_key, client_key, payment_service_url, timeout }
    }

    pub fn callback_url(&self) -> String {
        join_url(&self.payment_service_url, CALLBACK_PATH)
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub user_service_url: String,
    pub product_service_url: String,
    pub timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            user_service_url: DEFAULT_USER_SERVICE_URL.to_string(),
            product_service_url: DEFAULT_PRODUCT_SERVICE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl DirectoryConfig {
    pub fn new_from_env_or_default() -> Self {
        let user_service_url = env::var("CPG_USER_SERVICE_URL").unwrap_or_else(|_| {
            warn!("🪛️ CPG_USER_SERVICE_URL is not set. Using {DEFAULT_USER_SERVICE_URL}");
            DEFAULT_USER_SERVICE_URL.to_string()
        });
        let product_service_url = env::var("CPG_PRODUCT_SERVICE_URL").unwrap_or_else(|_| {
            warn!("🪛️ CPG_PRODUCT_SERVICE_URL is not set. Using {DEFAULT_PRODUCT_SERVICE_URL}");
            DEFAULT_PRODUCT_SERVICE_URL.to_string()
        });
        Self { user_service_url, product_service_url, timeout: http_timeout_from_env() }
    }
}

fn http_timeout_from_env() -> Duration {
    env::var("CPG_HTTP_TIMEOUT")
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("🪛️ {s} is not a valid value for CPG_HTTP_TIMEOUT. {e}"))
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT)
}
