//! Seams to the outside world.
//!
//! The engine never talks HTTP itself. It reaches the payment gateway through [`PaymentGateway`] and the identity and
//! catalog services through [`Directory`]. The `gateway_tools` clients implement both; tests substitute fakes.
mod directory;
mod payment_gateway;

pub use directory::Directory;
pub use payment_gateway::PaymentGateway;
