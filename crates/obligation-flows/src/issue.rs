//! Issuance initiators: new obligations and new tokens.

use obligation_types::{Amount, FinalizedTransition, ObligationError, PartyId, Result};

use crate::builder::{build_issuance, build_token_issuance};
use crate::finality::FlowContext;

/// Create an obligation of `amount` owed by `borrower` to `lender`.
///
/// The initiator must be one of the two; the other countersigns.
pub async fn issue_obligation(
    ctx: &FlowContext,
    amount: Amount,
    lender: PartyId,
    borrower: PartyId,
) -> Result<FinalizedTransition> {
    let me = ctx.party();
    if me != lender && me != borrower {
        return Err(ObligationError::UnauthorizedInitiator {
            caller: me,
            reason: "only the lender or the borrower may issue an obligation".into(),
        });
    }

    let tx = build_issuance(amount, lender, borrower, ctx.notary.party());
    let linear_id = tx
        .produced_obligation
        .as_ref()
        .map(|obligation| obligation.linear_id);
    let signed = ctx.sign_locally(tx)?;
    let finalized = ctx.finalize(signed).await?;

    if let Some(id) = linear_id {
        tracing::info!(obligation = %id, %lender, %borrower, "Obligation issued");
    }
    Ok(finalized)
}

/// Create tokens owned by the initiator. Needs no counterparty.
pub async fn issue_tokens(ctx: &FlowContext, amounts: &[Amount]) -> Result<FinalizedTransition> {
    let me = ctx.party();
    let tx = build_token_issuance(me, amounts, ctx.notary.party());
    let signed = ctx.sign_locally(tx)?;
    let finalized = ctx.finalize(signed).await?;
    tracing::info!(owner = %me, tokens = amounts.len(), "Tokens issued");
    Ok(finalized)
}
