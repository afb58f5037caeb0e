use async_trait::async_trait;
use gateway_tools::{CatalogItem, CollaboratorError, DirectoryApi, Payer};

/// Read access to payer and catalog facts.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn fetch_payer(&self, user_id: &str) -> Result<Payer, CollaboratorError>;

    async fn fetch_item(&self, product_id: &str) -> Result<CatalogItem, CollaboratorError>;
}

#[async_trait]
impl Directory for DirectoryApi {
    async fn fetch_payer(&self, user_id: &str) -> Result<Payer, CollaboratorError> {
        DirectoryApi::fetch_payer(self, user_id).await
    }

    async fn fetch_item(&self, product_id: &str) -> Result<CatalogItem, CollaboratorError> {
        DirectoryApi::fetch_item(self, product_id).await
    }
}
