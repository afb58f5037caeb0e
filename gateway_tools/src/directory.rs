//! Read-only clients for the identity ("users") and catalog ("products") services.
use std::sync::Arc;

use cpg_common::{helpers::join_url, Rupiah};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{config::DirectoryConfig, CollaboratorError};

const USER_SERVICE: &str = "user service";
const PRODUCT_SERVICE: &str = "product service";
const NOT_FOUND_CODE: &str = "NOT_FOUND";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payer {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Rupiah,
    pub stock: i64,
    pub is_active: bool,
}

/// The `{success, data}` envelope every collaborator wraps its responses in.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Clone)]
pub struct DirectoryApi {
    config: DirectoryConfig,
    client: Arc<Client>,
}

impl DirectoryApi {
    pub fn new(config: DirectoryConfig) -> Result<Self, CollaboratorError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn fetch_payer(&self, user_id: &str) -> Result<Payer, CollaboratorError> {
        let url = join_url(&self.config.user_service_url, &format!("/api/v1/users/{user_id}"));
        debug!("🏦️ Fetching payer {user_id}");
        self.get_envelope(USER_SERVICE, user_id, &url).await
    }

    pub async fn fetch_item(&self, product_id: &str) -> Result<CatalogItem, CollaboratorError> {
        let url = join_url(&self.config.product_service_url, &format!("/api/v1/products/{product_id}"));
        debug!("🏦️ Fetching catalog item {product_id}");
        self.get_envelope(PRODUCT_SERVICE, product_id, &url).await
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        service: &'static str,
        id: &str,
        url: &str,
    ) -> Result<T, CollaboratorError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("🏦️ Could not reach the {service} at {url}. {e}");
            CollaboratorError::Unavailable { service, message: e.to_string() }
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::Unavailable { service, message: e.to_string() })?;
        let envelope = serde_json::from_str::<Envelope<T>>(&body);
        if !status.is_success() {
            // A non-2xx is only "not found" when the body says so explicitly
            return match envelope {
                Ok(env) if env.code.as_deref() == Some(NOT_FOUND_CODE) => {
                    Err(CollaboratorError::NotFound { service, id: id.to_string() })
                },
                _ => Err(CollaboratorError::Unavailable { service, message: format!("HTTP {status}") }),
            };
        }
        let envelope =
            envelope.map_err(|e| CollaboratorError::InvalidResponse { service, message: e.to_string() })?;
        match envelope {
            Envelope { success: true, data: Some(data), .. } => Ok(data),
            Envelope { code: Some(code), .. } if code == NOT_FOUND_CODE => {
                Err(CollaboratorError::NotFound { service, id: id.to_string() })
            },
            Envelope { error, .. } => Err(CollaboratorError::Unavailable {
                service,
                message: error.unwrap_or_else(|| "The response carried no data".to_string()),
            }),
        }
    }
}
