use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "IDR";

//--------------------------------------       Rupiah        ---------------------------------------------------------
/// An amount of money in integral minor units. Gateway amounts are always whole rupiah, so no fractional part is ever
/// represented.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Rupiah(i64);

op!(binary Rupiah, Add, add);
op!(binary Rupiah, Sub, sub);
op!(inplace Rupiah, AddAssign, add_assign);
op!(unary Rupiah, Neg, neg);

impl Sum for Rupiah {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in rupiah: {0}")]
pub struct RupiahConversionError(String);

impl From<i64> for Rupiah {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Rupiah {
    type Error = RupiahConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| RupiahConversionError(format!("{value} is too large to convert to Rupiah")))
    }
}

impl Display for Rupiah {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rp{}", self.0)
    }
}

impl Rupiah {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The amount as the gateway expects it in `gross_amount` fields.
    pub fn to_gateway_string(&self) -> String {
        self.0.to_string()
    }

    /// Parses gateway `gross_amount` strings. The gateway formats these as decimals (e.g. `"102500.00"`), but the
    /// fractional part must be zero.
    pub fn from_gateway_string(s: &str) -> Result<Self, RupiahConversionError> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if !frac.chars().all(|c| c == '0') {
            return Err(RupiahConversionError(format!("{s} has a non-zero fractional part")));
        }
        whole.parse::<i64>().map(Self).map_err(|e| RupiahConversionError(format!("{s} is not a valid amount. {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let total = Rupiah::from(100_000) + Rupiah::from(2_500);
        assert_eq!(total.value(), 102_500);
        assert_eq!((total - Rupiah::from(2_500)).value(), 100_000);
        let mut acc = Rupiah::default();
        acc += Rupiah::from(5);
        assert_eq!(acc, Rupiah::from(5));
        assert_eq!(-acc, Rupiah::from(-5));
        let sum: Rupiah = [1, 2, 3].into_iter().map(Rupiah::from).sum();
        assert_eq!(sum.value(), 6);
    }

    #[test]
    fn gateway_strings() {
        assert_eq!(Rupiah::from_gateway_string("102500.00").unwrap(), Rupiah::from(102_500));
        assert_eq!(Rupiah::from_gateway_string("102500").unwrap(), Rupiah::from(102_500));
        assert!(Rupiah::from_gateway_string("10.50").is_err());
        assert!(Rupiah::from_gateway_string("abc").is_err());
        assert_eq!(Rupiah::from(102_500).to_gateway_string(), "102500");
    }

    #[test]
    fn conversions() {
        assert!(Rupiah::try_from(u64::MAX).is_err());
        assert_eq!(Rupiah::try_from(42u64).unwrap().value(), 42);
        assert_eq!(Rupiah::from(2500).to_string(), "Rp2500");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&Rupiah::from(102_500)).unwrap();
        assert_eq!(json, "102500");
        let r: Rupiah = serde_json::from_str("2500").unwrap();
        assert_eq!(r.value(), 2500);
    }
}
