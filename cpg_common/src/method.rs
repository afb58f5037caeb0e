use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The payment channels the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    Gopay,
    Qris,
    Shopeepay,
    Echannel,
    Permata,
    Cstore,
}

/// The gateway-derived field a payer needs before they can complete a payment with a given method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedField {
    VaNumber,
    PaymentCode,
    None,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 8] = [
        Self::CreditCard,
        Self::BankTransfer,
        Self::Gopay,
        Self::Qris,
        Self::Shopeepay,
        Self::Echannel,
        Self::Permata,
        Self::Cstore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::BankTransfer => "bank_transfer",
            Self::Gopay => "gopay",
            Self::Qris => "qris",
            Self::Shopeepay => "shopeepay",
            Self::Echannel => "echannel",
            Self::Permata => "permata",
            Self::Cstore => "cstore",
        }
    }

    /// Bank transfer and Permata payers need a virtual account number, over-the-counter payers need a payment code.
    /// Wallets, cards and QR payments redirect, so nothing extra is required.
    pub fn derived_field(&self) -> DerivedField {
        match self {
            Self::BankTransfer | Self::Permata => DerivedField::VaNumber,
            Self::Cstore => DerivedField::PaymentCode,
            _ => DerivedField::None,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unsupported payment method: {0}")]
pub struct PaymentMethodParseError(String);

impl FromStr for PaymentMethod {
    type Err = PaymentMethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|m| m.as_str() == s.trim())
            .copied()
            .ok_or_else(|| PaymentMethodParseError(s.to_string()))
    }
}
