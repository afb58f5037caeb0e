//! # Gateway tools
//!
//! Outbound HTTP clients used by the payment service:
//! * [`GatewayApi`] talks to the external payment gateway (charge, status, webhook signatures).
//! * [`DirectoryApi`] reads payer and catalog facts from the identity and catalog services.
//!
//! Both clients carry explicit timeouts. Gateway calls run under a single [`RetryPolicy`].
mod api;
mod config;
mod directory;
mod error;
mod retry;

pub mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::{DirectoryConfig, GatewayConfig, GatewayEnvironment};
pub use directory::{CatalogItem, DirectoryApi, Payer};
pub use error::{CollaboratorError, GatewayError};
pub use retry::RetryPolicy;
