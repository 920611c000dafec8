//! Token movement rules: cash issuance and settlement payments.
//!
//! Settlement invariant, per currency:
//! ```text
//! Σ consumed == Σ produced
//! Σ produced to lender == settle amount
//! ⇒ Σ consumed == Σ change to borrower + settle amount
//! ```

use obligation_types::{
    Amount, CommandWithSigners, ContractViolation, Obligation, ProposedTransition,
};
use rust_decimal::Decimal;

use crate::obligation_rules::{require_signers, same_currency};

/// `IssueTokens`: nothing consumed, only positive tokens produced, every
/// owner signs for what it receives.
pub fn verify_token_issuance(
    tx: &ProposedTransition,
    command: &CommandWithSigners,
) -> Result<(), ContractViolation> {
    if tx.consumed_obligation.is_some() || !tx.consumed_tokens.is_empty() {
        return Err(ContractViolation::UnexpectedInputs);
    }
    if tx.produced_obligation.is_some() {
        return Err(ContractViolation::ProducedObligations {
            expected: 0,
            actual: 1,
        });
    }
    if tx.produced_tokens.is_empty() {
        return Err(ContractViolation::NoTokensProduced);
    }
    if tx
        .produced_tokens
        .iter()
        .any(|token| !token.amount.is_positive())
    {
        return Err(ContractViolation::NonPositiveAmount);
    }
    let owners: Vec<_> = tx.produced_tokens.iter().map(|token| token.owner).collect();
    require_signers(command, &owners)
}

/// Token side of a `Settle`: the borrower spends its own tokens in the
/// obligation's currency, the lender receives exactly `amount`, and any
/// remainder returns to the borrower as change.
pub fn verify_settlement_tokens(
    tx: &ProposedTransition,
    obligation: &Obligation,
    amount: &Amount,
) -> Result<(), ContractViolation> {
    if tx.consumed_tokens.is_empty() {
        return Err(ContractViolation::NoTokensConsumed);
    }

    for input in &tx.consumed_tokens {
        same_currency(&obligation.amount, &input.state.amount)?;
        if input.state.owner != obligation.borrower {
            return Err(ContractViolation::ForeignTokenSpent {
                owner: input.state.owner,
            });
        }
        if !input.state.amount.is_positive() {
            return Err(ContractViolation::NonPositiveAmount);
        }
    }

    for output in &tx.produced_tokens {
        same_currency(&obligation.amount, &output.amount)?;
        if output.owner != obligation.lender && output.owner != obligation.borrower {
            return Err(ContractViolation::UnexpectedTokenOwner {
                owner: output.owner,
            });
        }
        if !output.amount.is_positive() {
            return Err(ContractViolation::NonPositiveAmount);
        }
    }

    let paid_to_lender = tx.produced_total_for(&obligation.lender);
    if paid_to_lender != amount.quantity {
        return Err(ContractViolation::PaymentMismatch {
            expected: amount.quantity,
            actual: paid_to_lender,
        });
    }

    let consumed = tx.consumed_token_total();
    let produced: Decimal = tx
        .produced_tokens
        .iter()
        .map(|output| output.amount.quantity)
        .sum();
    if consumed != produced {
        return Err(ContractViolation::TokensNotConserved { consumed, produced });
    }
    Ok(())
}
