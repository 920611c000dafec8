//! Transaction builder: turns a request plus vault contents into an
//! unsigned [`ProposedTransition`].
//!
//! Building is a pure read of the vault. Soft-locking the selected tokens
//! is the calling flow's job.

use obligation_types::{
    Amount, Command, CommandWithSigners, Obligation, ObligationError, ObligationId, PartyId,
    ProposedTransition, Result, StateAndRef, ValueToken,
};
use obligation_vault::Vault;
use rust_decimal::Decimal;

/// Pay `amount` towards obligation `obligation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleRequest {
    pub obligation: ObligationId,
    pub amount: Amount,
}

impl SettleRequest {
    #[must_use]
    pub fn new(obligation: ObligationId, amount: Amount) -> Self {
        Self { obligation, amount }
    }
}

/// Build a settlement of `request` against the vault's current version.
///
/// 1. Fetch the obligation
/// 2. Derive the next version (`pay` checks currency, positivity and
///    overpayment), omitted when fully paid
/// 3. Select the borrower's spendable tokens, smallest first, until they
///    cover the amount
/// 4. Pay the lender exactly `amount` and return any change to the borrower
///
/// # Errors
/// - `ObligationNotFound` if the vault does not hold the obligation
/// - `CurrencyMismatch`, `InvalidAmount` or `Overpayment` from `pay`
/// - `InsufficientFunds` if the borrower's unlocked tokens fall short
pub fn build_settlement(
    vault: &Vault,
    request: &SettleRequest,
    notary: PartyId,
) -> Result<ProposedTransition> {
    let input = vault.lookup_obligation(request.obligation)?.clone();
    let output = input.state.pay(&request.amount)?;
    let lender = input.state.lender;
    let borrower = input.state.borrower;

    let (selected, selected_total) = select_tokens(vault, borrower, &request.amount)?;

    let mut tx = ProposedTransition::new(notary);
    tx.produced_obligation = (!output.is_settled()).then_some(output);
    tx.consumed_obligation = Some(input);
    tx.consumed_tokens = selected;
    tx.produced_tokens = vec![ValueToken::new(request.amount.clone(), lender)];
    let change = selected_total - request.amount.quantity;
    if change > Decimal::ZERO {
        tx.produced_tokens.push(ValueToken::new(
            Amount::new(change, request.amount.currency.clone()),
            borrower,
        ));
    }
    tx.commands = vec![CommandWithSigners::new(
        Command::Settle {
            amount: request.amount.clone(),
        },
        vec![borrower, lender],
    )];
    Ok(tx)
}

/// Smallest-first selection until the running total covers `amount`.
fn select_tokens(
    vault: &Vault,
    owner: PartyId,
    amount: &Amount,
) -> Result<(Vec<StateAndRef<ValueToken>>, Decimal)> {
    let mut selected = Vec::new();
    let mut total = Decimal::ZERO;
    let spendable = vault.spendable_tokens(owner, &amount.currency);
    let available: Decimal = spendable.iter().map(|t| t.state.amount.quantity).sum();

    for token in spendable {
        if total >= amount.quantity {
            break;
        }
        total += token.state.amount.quantity;
        selected.push(token);
    }

    if total < amount.quantity {
        return Err(ObligationError::InsufficientFunds {
            currency: amount.currency.clone(),
            needed: amount.quantity,
            available,
        });
    }
    Ok((selected, total))
}

/// A fresh obligation of `amount` from `borrower` to `lender`.
#[must_use]
pub fn build_issuance(
    amount: Amount,
    lender: PartyId,
    borrower: PartyId,
    notary: PartyId,
) -> ProposedTransition {
    let mut tx = ProposedTransition::new(notary);
    tx.produced_obligation = Some(Obligation::issue(amount, lender, borrower));
    tx.commands = vec![CommandWithSigners::new(
        Command::Issue,
        vec![lender, borrower],
    )];
    tx
}

/// Move obligation `obligation` to `new_lender`.
///
/// # Errors
/// Returns `ObligationNotFound` if the vault does not hold the obligation.
pub fn build_transfer(
    vault: &Vault,
    obligation: ObligationId,
    new_lender: PartyId,
    notary: PartyId,
) -> Result<ProposedTransition> {
    let input = vault.lookup_obligation(obligation)?.clone();
    let old_lender = input.state.lender;
    let borrower = input.state.borrower;

    let mut tx = ProposedTransition::new(notary);
    tx.produced_obligation = Some(input.state.with_new_lender(new_lender));
    tx.consumed_obligation = Some(input);
    tx.commands = vec![CommandWithSigners::new(
        Command::Transfer,
        vec![old_lender, new_lender, borrower],
    )];
    Ok(tx)
}

/// New tokens for `owner`, one per amount.
#[must_use]
pub fn build_token_issuance(owner: PartyId, amounts: &[Amount], notary: PartyId) -> ProposedTransition {
    let mut tx = ProposedTransition::new(notary);
    tx.produced_tokens = amounts
        .iter()
        .map(|amount| ValueToken::new(amount.clone(), owner))
        .collect();
    tx.commands = vec![CommandWithSigners::new(Command::IssueTokens, vec![owner])];
    tx
}
