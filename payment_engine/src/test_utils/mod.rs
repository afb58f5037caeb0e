//! Helpers for tests in this crate and in crates that embed the engine. Enabled by the `test_utils` feature.
pub mod fakes;
pub mod prepare_env;
