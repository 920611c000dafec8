//! Steps shared by every initiator: self-sign, collect countersignatures,
//! notarize, record and broadcast.
//!
//! Each suspend point is bounded by its [`FlowConfig`] timeout.

use std::sync::Arc;

use obligation_types::{
    FinalizedTransition, FlowConfig, ObligationError, PartyId, PartyIdentity, ProposedTransition,
    ProtocolStage, Result, SignedTransition,
};
use obligation_vault::Vault;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::network::{CounterpartyClient, SignatureReply};
use crate::notary::{NotaryClient, NotaryResponse};

/// Everything a protocol run needs from its node.
#[derive(Clone)]
pub struct FlowContext {
    pub identity: Arc<PartyIdentity>,
    pub vault: Arc<Mutex<Vault>>,
    pub counterparties: Arc<dyn CounterpartyClient>,
    pub notary: Arc<dyn NotaryClient>,
    pub config: FlowConfig,
}

impl FlowContext {
    #[must_use]
    pub fn party(&self) -> PartyId {
        self.identity.party()
    }

    /// Run the contract locally and attach our own signature.
    pub fn sign_locally(&self, tx: ProposedTransition) -> Result<SignedTransition> {
        obligation_contract::verify(&tx)?;
        let mut signed = SignedTransition::new(tx);
        let signature = self.identity.sign(&signed.id());
        signed.add_signature(signature)?;
        Ok(signed)
    }

    /// Ask every missing signer, in order, for a countersignature.
    pub async fn collect_signatures(&self, signed: &mut SignedTransition) -> Result<()> {
        let me = self.party();
        for party in signed.missing_signers() {
            tracing::debug!(%me, %party, tx = %signed.id().short(), "Requesting countersignature");
            let request = self.counterparties.request_signature(me, party, signed);
            let reply = timeout(self.config.counterparty_timeout(), request)
                .await
                .map_err(|_| ObligationError::Timeout {
                    stage: ProtocolStage::CounterSignature,
                })??;
            match reply {
                SignatureReply::Signed(signature) => {
                    if signature.signer != party {
                        return Err(ObligationError::InvalidSignature {
                            signer: signature.signer,
                        });
                    }
                    signed.add_signature(signature)?;
                }
                SignatureReply::Rejected { reason } => {
                    return Err(ObligationError::CounterpartyRejected { party, reason });
                }
                SignatureReply::Conflict { conflicting } => {
                    return Err(ObligationError::NotarizationConflict { conflicting });
                }
            }
        }
        Ok(())
    }

    /// Submit to the notary and assemble the finalized transition.
    pub async fn notarize(&self, signed: SignedTransition) -> Result<FinalizedTransition> {
        let response = timeout(self.config.notary_timeout(), self.notary.notarize(&signed))
            .await
            .map_err(|_| ObligationError::Timeout {
                stage: ProtocolStage::Notarization,
            })??;
        match response {
            NotaryResponse::Certified {
                signature,
                certified_at,
            } => {
                let finalized = FinalizedTransition {
                    signed,
                    notary_signature: signature,
                    certified_at,
                };
                finalized.verify()?;
                Ok(finalized)
            }
            NotaryResponse::Conflict { conflicting } => {
                Err(ObligationError::NotarizationConflict { conflicting })
            }
        }
    }

    /// Record locally, then hand the transition to every other participant.
    ///
    /// A participant that fails to ack is logged and skipped: the
    /// transition is already final.
    pub async fn record_and_broadcast(&self, finalized: &FinalizedTransition) -> Result<()> {
        let me = self.party();
        self.vault.lock().await.record_finalized(finalized)?;

        for party in finalized.tx().participants() {
            if party == me {
                continue;
            }
            let delivery = self.counterparties.broadcast_finalized(me, party, finalized);
            match timeout(self.config.finality_ack_timeout(), delivery).await {
                Ok(Ok(())) => {
                    tracing::debug!(%me, %party, tx = %finalized.id().short(), "Finality acked");
                }
                Ok(Err(e)) => {
                    tracing::warn!(%me, %party, error = %e, "Participant did not record");
                }
                Err(_) => {
                    tracing::warn!(
                        %me,
                        %party,
                        stage = %ProtocolStage::FinalityAck,
                        "Timed out waiting for finality ack"
                    );
                }
            }
        }
        Ok(())
    }

    /// Countersign, notarize, record, broadcast.
    pub async fn finalize(&self, mut signed: SignedTransition) -> Result<FinalizedTransition> {
        self.collect_signatures(&mut signed).await?;
        let finalized = self.notarize(signed).await?;
        self.record_and_broadcast(&finalized).await?;
        Ok(finalized)
    }
}
