//! Read-through cache for payment lookups.
//!
//! The cache is an accelerator only. Every error is logged by the caller and treated as a miss, so the store remains
//! the single source of truth.
mod keys;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
pub use keys::{order_key, payment_key, user_payments_key, user_payments_pattern, PAYMENT_TTL, USER_PAYMENTS_TTL};
pub use memory::MemoryCache;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache backend is unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid cache key pattern: {0}")]
    InvalidPattern(String),
}

#[async_trait]
pub trait PaymentCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Deletes every key matching `pattern`. Only trailing-`*` prefix patterns are supported.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;
}
