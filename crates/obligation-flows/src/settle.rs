//! Settlement initiator.
//!
//! ```text
//! Start ─▶ RoleCheck ─▶ Build ─▶ SelfSign ─▶ RequestCounterSignature ─▶ Notarize ─▶ Finalized
//! ```
//!
//! Only the borrower may start a settlement. Tokens selected in `Build` are
//! soft-locked for this run and released on any later failure. Nothing is
//! recorded before the notary certifies.

use std::fmt;

use obligation_types::{FinalizedTransition, FlowId, ObligationError, Result, StateRef};

use crate::builder::{SettleRequest, build_settlement};
use crate::finality::FlowContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStage {
    Start,
    RoleCheck,
    Build,
    SelfSign,
    RequestCounterSignature,
    Notarize,
    Finalized,
}

impl fmt::Display for SettleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::RoleCheck => "ROLE_CHECK",
            Self::Build => "BUILD",
            Self::SelfSign => "SELF_SIGN",
            Self::RequestCounterSignature => "REQUEST_COUNTER_SIGNATURE",
            Self::Notarize => "NOTARIZE",
            Self::Finalized => "FINALIZED",
        };
        f.write_str(name)
    }
}

/// One settlement run.
pub struct SettleFlow<'a> {
    ctx: &'a FlowContext,
    flow: FlowId,
    request: SettleRequest,
    stage: SettleStage,
}

impl<'a> SettleFlow<'a> {
    #[must_use]
    pub fn new(ctx: &'a FlowContext, request: SettleRequest) -> Self {
        Self {
            ctx,
            flow: FlowId::new(),
            request,
            stage: SettleStage::Start,
        }
    }

    #[must_use]
    pub fn id(&self) -> FlowId {
        self.flow
    }

    #[must_use]
    pub fn stage(&self) -> SettleStage {
        self.stage
    }

    /// Drive the run to `Finalized` or to the first error.
    pub async fn run(mut self) -> Result<FinalizedTransition> {
        tracing::info!(
            flow = %self.flow,
            obligation = %self.request.obligation,
            amount = %self.request.amount,
            "Settlement started"
        );
        let result = self.execute().await;
        match &result {
            Ok(finalized) => {
                tracing::info!(flow = %self.flow, tx = %finalized.id().short(), "Settlement finalized");
            }
            Err(e) => {
                let released = self.ctx.vault.lock().await.release_locks(self.flow);
                tracing::warn!(
                    flow = %self.flow,
                    stage = %self.stage,
                    error = %e,
                    released,
                    "Settlement failed"
                );
            }
        }
        result
    }

    async fn execute(&mut self) -> Result<FinalizedTransition> {
        let ctx = self.ctx;
        let me = ctx.party();

        let tx = {
            let mut vault = ctx.vault.lock().await;
            self.advance(SettleStage::RoleCheck);
            let borrower = vault.lookup_obligation(self.request.obligation)?.state.borrower;
            if borrower != me {
                return Err(ObligationError::UnauthorizedInitiator {
                    caller: me,
                    reason: "only the borrower may settle an obligation".into(),
                });
            }

            self.advance(SettleStage::Build);
            let tx = build_settlement(&vault, &self.request, ctx.notary.party())?;
            let spent: Vec<StateRef> = tx.consumed_tokens.iter().map(|t| t.state_ref).collect();
            vault.soft_lock(self.flow, &spent)?;
            tx
        };

        self.advance(SettleStage::SelfSign);
        let mut signed = ctx.sign_locally(tx)?;

        self.advance(SettleStage::RequestCounterSignature);
        ctx.collect_signatures(&mut signed).await?;

        self.advance(SettleStage::Notarize);
        let finalized = ctx.notarize(signed).await?;

        self.advance(SettleStage::Finalized);
        ctx.record_and_broadcast(&finalized).await?;
        Ok(finalized)
    }

    fn advance(&mut self, stage: SettleStage) {
        tracing::debug!(flow = %self.flow, from = %self.stage, to = %stage, "Settlement stage");
        self.stage = stage;
    }
}
