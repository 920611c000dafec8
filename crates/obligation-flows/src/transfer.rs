//! Transfer initiator: the current lender hands the obligation to a new
//! lender. Borrower and new lender both countersign.

use obligation_types::{FinalizedTransition, ObligationError, ObligationId, PartyId, Result};

use crate::builder::build_transfer;
use crate::finality::FlowContext;

pub async fn transfer_obligation(
    ctx: &FlowContext,
    obligation: ObligationId,
    new_lender: PartyId,
) -> Result<FinalizedTransition> {
    let me = ctx.party();
    let tx = {
        let vault = ctx.vault.lock().await;
        let lender = vault.lookup_obligation(obligation)?.state.lender;
        if lender != me {
            return Err(ObligationError::UnauthorizedInitiator {
                caller: me,
                reason: "only the current lender may transfer an obligation".into(),
            });
        }
        build_transfer(&vault, obligation, new_lender, ctx.notary.party())?
    };

    let signed = ctx.sign_locally(tx)?;
    let finalized = ctx.finalize(signed).await?;
    tracing::info!(%obligation, from = %me, to = %new_lender, "Obligation transferred");
    Ok(finalized)
}
