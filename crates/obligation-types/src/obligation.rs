//! # Obligation: a debt between a lender and a borrower
//!
//! Obligations are never edited in place. Every change consumes the current
//! version and produces a replacement:
//!
//! ```text
//!   issue ──▶ paid=0 ──settle──▶ 0<paid<amount ──settle──▶ (no output)
//!                │                     │
//!                └──── transfer ───────┘   (lender changes, paid kept)
//! ```
//!
//! Once `paid == amount` the obligation is fully settled and no output
//! version is produced, so it can never be referenced again.

use serde::{Deserialize, Serialize};

use crate::{Amount, ObligationError, ObligationId, PartyId, Result};

/// One version of an obligation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// Stable identity shared by every version.
    pub linear_id: ObligationId,
    /// Total owed.
    pub amount: Amount,
    /// Paid so far. Same currency as `amount`, never above it.
    pub paid: Amount,
    /// Party owed the money.
    pub lender: PartyId,
    /// Party that owes the money.
    pub borrower: PartyId,
}

impl Obligation {
    /// A freshly issued obligation with nothing paid.
    #[must_use]
    pub fn issue(amount: Amount, lender: PartyId, borrower: PartyId) -> Self {
        Self {
            linear_id: ObligationId::new(),
            paid: Amount::zero(amount.currency.clone()),
            amount,
            lender,
            borrower,
        }
    }

    /// Amount still owed.
    pub fn outstanding(&self) -> Result<Amount> {
        self.amount.checked_sub(&self.paid)
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.paid.quantity >= self.amount.quantity
    }

    /// Parties whose vaults track this obligation.
    #[must_use]
    pub fn participants(&self) -> [PartyId; 2] {
        [self.lender, self.borrower]
    }

    /// The next version after paying `amount`.
    ///
    /// # Errors
    /// - `CurrencyMismatch` if `amount` is not in the obligation's currency
    /// - `InvalidAmount` if `amount` is not positive
    /// - `Overpayment` if the payment would exceed what is outstanding
    pub fn pay(&self, amount: &Amount) -> Result<Self> {
        self.amount.ensure_same_currency(amount)?;
        if !amount.is_positive() {
            return Err(ObligationError::InvalidAmount {
                reason: format!("settlement amount must be positive, got {amount}"),
            });
        }
        let outstanding = self.outstanding()?;
        if amount.quantity > outstanding.quantity {
            return Err(ObligationError::Overpayment {
                outstanding: outstanding.quantity,
                requested: amount.quantity,
            });
        }
        Ok(Self {
            paid: self.paid.checked_add(amount)?,
            ..self.clone()
        })
    }

    /// The next version with a different lender. Everything else is kept.
    #[must_use]
    pub fn with_new_lender(&self, lender: PartyId) -> Self {
        Self {
            lender,
            ..self.clone()
        }
    }
}

/// Fixture for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Obligation {
    /// A GBP obligation with the given paid amount.
    pub fn dummy(lender: PartyId, borrower: PartyId, amount: i64, paid: i64) -> Self {
        Self {
            linear_id: ObligationId::new(),
            amount: Amount::pounds(amount),
            paid: Amount::pounds(paid),
            lender,
            borrower,
        }
    }
}
