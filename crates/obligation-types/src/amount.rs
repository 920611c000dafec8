//! Currency-tagged amounts.
//!
//! All arithmetic is checked against the currency tag: adding GBP to USD is
//! an error, never a silent conversion.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ObligationError, Result};

/// Type alias for currency codes (e.g., "GBP", "USD").
pub type Currency = String;

/// A quantity of a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub quantity: Decimal,
    pub currency: Currency,
}

impl Amount {
    #[must_use]
    pub fn new(quantity: Decimal, currency: impl Into<Currency>) -> Self {
        Self {
            quantity,
            currency: currency.into(),
        }
    }

    /// Zero of the given currency.
    #[must_use]
    pub fn zero(currency: impl Into<Currency>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Whole pounds sterling.
    #[must_use]
    pub fn pounds(units: i64) -> Self {
        Self::new(Decimal::new(units, 0), "GBP")
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.quantity.is_zero()
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Fail with `CurrencyMismatch` unless `other` has the same currency.
    pub fn ensure_same_currency(&self, other: &Self) -> Result<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(ObligationError::CurrencyMismatch {
                expected: self.currency.clone(),
                actual: other.currency.clone(),
            })
        }
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        self.ensure_same_currency(other)?;
        let quantity = self
            .quantity
            .checked_add(other.quantity)
            .ok_or_else(|| ObligationError::InvalidAmount {
                reason: format!("{self} + {other} overflows"),
            })?;
        Ok(Self::new(quantity, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        self.ensure_same_currency(other)?;
        let quantity = self
            .quantity
            .checked_sub(other.quantity)
            .ok_or_else(|| ObligationError::InvalidAmount {
                reason: format!("{self} - {other} overflows"),
            })?;
        Ok(Self::new(quantity, self.currency.clone()))
    }

    /// Canonical textual form of the quantity (trailing zeros stripped),
    /// so `5.0` and `5` encode to the same bytes.
    #[must_use]
    pub fn canonical_quantity(&self) -> String {
        self.quantity.normalize().to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.currency)
    }
}
