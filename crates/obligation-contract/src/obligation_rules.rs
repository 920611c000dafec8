//! Rules for the obligation lifecycle commands: `Issue`, `Transfer`, `Settle`.

use obligation_types::{
    Amount, CommandWithSigners, ContractViolation, Obligation, PartyId, ProposedTransition,
};

use crate::token_rules;

/// `Issue`: nothing consumed, one fresh obligation produced, both parties sign.
pub fn verify_issue(
    tx: &ProposedTransition,
    command: &CommandWithSigners,
) -> Result<(), ContractViolation> {
    expect_consumed(tx, 0)?;
    let output = expect_produced(tx)?;
    expect_no_tokens(tx)?;

    if !output.amount.is_positive() {
        return Err(ContractViolation::NonPositiveAmount);
    }
    same_currency(&output.amount, &output.paid)?;
    if !output.paid.is_zero() {
        return Err(ContractViolation::IssuedWithPayment);
    }
    if output.lender == output.borrower {
        return Err(ContractViolation::SelfObligation);
    }
    require_signers(command, &[output.lender, output.borrower])
}

/// `Transfer`: one version in, one out, only the lender changes. Old lender,
/// new lender and borrower all sign.
pub fn verify_transfer(
    tx: &ProposedTransition,
    command: &CommandWithSigners,
) -> Result<(), ContractViolation> {
    let input = expect_consumed(tx, 1)?.ok_or(ContractViolation::ConsumedObligations {
        expected: 1,
        actual: 0,
    })?;
    let output = expect_produced(tx)?;
    expect_no_tokens(tx)?;

    if input.is_settled() {
        return Err(ContractViolation::AlreadySettled);
    }
    if output.linear_id != input.linear_id {
        return Err(ContractViolation::LinearIdChanged);
    }
    if output.amount != input.amount {
        return Err(ContractViolation::AmountChanged);
    }
    if output.paid != input.paid {
        return Err(ContractViolation::PaidChanged);
    }
    if output.borrower != input.borrower {
        return Err(ContractViolation::BorrowerChanged);
    }
    if output.lender == input.lender {
        return Err(ContractViolation::LenderUnchanged);
    }
    if output.lender == output.borrower {
        return Err(ContractViolation::SelfObligation);
    }
    require_signers(command, &[input.lender, output.lender, input.borrower])
}

/// `Settle { amount }`.
///
/// - exactly one obligation consumed, not already settled
/// - output (if any) keeps linear id, amount, lender and borrower, and its
///   `paid` grew by exactly `amount`; no output means `amount` paid it off
/// - token movements satisfy [`token_rules::verify_settlement_tokens`]
/// - borrower and lender sign
pub fn verify_settle(
    tx: &ProposedTransition,
    command: &CommandWithSigners,
    amount: &Amount,
) -> Result<(), ContractViolation> {
    let input = expect_consumed(tx, 1)?.ok_or(ContractViolation::ConsumedObligations {
        expected: 1,
        actual: 0,
    })?;

    if input.is_settled() {
        return Err(ContractViolation::AlreadySettled);
    }
    if !amount.is_positive() {
        return Err(ContractViolation::NonPositiveAmount);
    }
    same_currency(&input.amount, amount)?;

    let outstanding = input.amount.quantity - input.paid.quantity;
    if amount.quantity > outstanding {
        return Err(ContractViolation::Overpayment {
            outstanding,
            requested: amount.quantity,
        });
    }

    match &tx.produced_obligation {
        Some(output) => {
            if output.linear_id != input.linear_id {
                return Err(ContractViolation::LinearIdChanged);
            }
            if output.amount != input.amount {
                return Err(ContractViolation::AmountChanged);
            }
            if output.lender != input.lender {
                return Err(ContractViolation::LenderChanged);
            }
            if output.borrower != input.borrower {
                return Err(ContractViolation::BorrowerChanged);
            }
            same_currency(&input.amount, &output.paid)?;
            if output.paid.quantity > output.amount.quantity {
                return Err(ContractViolation::PaidExceedsAmount);
            }
            let increase = output.paid.quantity - input.paid.quantity;
            if increase != amount.quantity {
                return Err(ContractViolation::SettledAmountMismatch {
                    expected: amount.quantity,
                    actual: increase,
                });
            }
            if output.is_settled() {
                return Err(ContractViolation::SettledOutput);
            }
        }
        None => {
            // No output version: the payment must clear the debt.
            if outstanding != amount.quantity {
                return Err(ContractViolation::SettledAmountMismatch {
                    expected: amount.quantity,
                    actual: outstanding,
                });
            }
        }
    }

    token_rules::verify_settlement_tokens(tx, input, amount)?;
    require_signers(command, &[input.borrower, input.lender])
}

fn expect_consumed(
    tx: &ProposedTransition,
    expected: usize,
) -> Result<Option<&Obligation>, ContractViolation> {
    let actual = usize::from(tx.consumed_obligation.is_some());
    if actual != expected {
        return Err(ContractViolation::ConsumedObligations { expected, actual });
    }
    Ok(tx.consumed_obligation.as_ref().map(|input| &input.state))
}

fn expect_produced(tx: &ProposedTransition) -> Result<&Obligation, ContractViolation> {
    tx.produced_obligation
        .as_ref()
        .ok_or(ContractViolation::ProducedObligations {
            expected: 1,
            actual: 0,
        })
}

fn expect_no_tokens(tx: &ProposedTransition) -> Result<(), ContractViolation> {
    if tx.consumed_tokens.is_empty() && tx.produced_tokens.is_empty() {
        Ok(())
    } else {
        Err(ContractViolation::UnexpectedTokens)
    }
}

pub(crate) fn same_currency(expected: &Amount, actual: &Amount) -> Result<(), ContractViolation> {
    if expected.currency == actual.currency {
        Ok(())
    } else {
        Err(ContractViolation::CurrencyMismatch {
            expected: expected.currency.clone(),
            actual: actual.currency.clone(),
        })
    }
}

pub(crate) fn require_signers(
    command: &CommandWithSigners,
    parties: &[PartyId],
) -> Result<(), ContractViolation> {
    match parties.iter().find(|party| !command.requires(party)) {
        Some(party) => Err(ContractViolation::MissingSigner { party: *party }),
        None => Ok(()),
    }
}
