//! # Checkout payment server
//! This crate hosts the HTTP face of the payment service. It is responsible for:
//! * Creating payments at the gateway on behalf of a requester.
//! * Receiving the gateway's webhook and reconciling the reported status.
//! * Serving payment lookups through a bounded worker pool.
//! * Running the background workers: the validation consumer and sweeper, and the local expiry sweep.
//!
//! ## Configuration
//! The server is configured via `CPG_*` environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/v1/payments/...`: The payment routes. See [routes](routes/index.html).
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
