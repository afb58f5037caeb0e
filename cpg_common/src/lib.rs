mod method;
mod rupiah;

pub mod helpers;
pub mod op;
mod secret;

pub use method::{DerivedField, PaymentMethod, PaymentMethodParseError};
pub use rupiah::{Rupiah, RupiahConversionError, CURRENCY_CODE};
pub use secret::Secret;
