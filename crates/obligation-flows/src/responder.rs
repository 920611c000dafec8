//! Responder: the counterparty side of every protocol.
//!
//! Runs as one task per node, draining the node's inbox:
//! - `SignatureRequest`: own role, contract check, attached signatures,
//!   freshness against the own vault, then countersign. Inputs the vault
//!   has already seen consumed are answered with `Conflict`.
//! - `Finalized`: full signature and notary check, then record and ack
//!
//! The responder never notarizes and never initiates.

use std::sync::Arc;

use obligation_types::{
    FinalizedTransition, ObligationError, PartyId, PartyIdentity, Result, SignedTransition,
    TransitionSignature,
};
use obligation_vault::{RecordOutcome, Vault};
use tokio::sync::{Mutex, mpsc};

use crate::codec::{self, FlowMessage, FlowReply};
use crate::network::Envelope;

pub struct Responder {
    identity: Arc<PartyIdentity>,
    vault: Arc<Mutex<Vault>>,
}

impl Responder {
    #[must_use]
    pub fn new(identity: Arc<PartyIdentity>, vault: Arc<Mutex<Vault>>) -> Self {
        Self { identity, vault }
    }

    /// Serve until every sender of the inbox is gone.
    pub async fn run(self, mut inbox: mpsc::Receiver<Envelope>) {
        let me = self.identity.party();
        while let Some(envelope) = inbox.recv().await {
            let reply = self.handle(envelope.from, &envelope.payload).await;
            match codec::encode(&reply) {
                Ok(bytes) => {
                    if envelope.reply.send(bytes).is_err() {
                        tracing::debug!(party = %me, from = %envelope.from, "Requester went away");
                    }
                }
                Err(e) => tracing::error!(party = %me, error = %e, "Failed to encode reply"),
            }
        }
        tracing::debug!(party = %me, "Inbox closed, responder stopping");
    }

    /// Decode and answer one message.
    pub async fn handle(&self, from: PartyId, payload: &[u8]) -> FlowReply {
        let outcome = match codec::decode::<FlowMessage>(payload) {
            Ok(FlowMessage::SignatureRequest(signed)) => {
                self.countersign(from, &signed).await.map(FlowReply::Signed)
            }
            Ok(FlowMessage::Finalized(finalized)) => {
                self.record(&finalized).await.map(|_| FlowReply::Ack)
            }
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| match e {
            ObligationError::NotarizationConflict { conflicting } => {
                tracing::warn!(
                    party = %self.identity.party(),
                    %from,
                    conflicts = conflicting.len(),
                    "Refused proposal over consumed records"
                );
                FlowReply::Conflict { conflicting }
            }
            e => {
                tracing::warn!(
                    party = %self.identity.party(),
                    %from,
                    error = %e,
                    "Rejected request"
                );
                FlowReply::Rejected {
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Check a proposal from `from` and sign it.
    pub async fn countersign(
        &self,
        from: PartyId,
        signed: &SignedTransition,
    ) -> Result<TransitionSignature> {
        let me = self.identity.party();
        let required = signed.tx.required_signers();
        if !required.contains(&from) {
            return Err(ObligationError::UnauthorizedInitiator {
                caller: from,
                reason: "initiator is not a required signer".into(),
            });
        }
        if !required.contains(&me) {
            return Err(ObligationError::UnauthorizedInitiator {
                caller: from,
                reason: format!("{me} is not a required signer"),
            });
        }

        obligation_contract::verify(&signed.tx)?;

        // Signers after the initiator may not have signed yet.
        let pending: Vec<PartyId> = signed
            .missing_signers()
            .into_iter()
            .filter(|party| *party != from)
            .collect();
        signed.verify_signatures_except(&pending)?;

        let vault = self.vault.lock().await;
        let conflicting: Vec<_> = signed
            .tx
            .consumed_refs()
            .into_iter()
            .filter(|state_ref| vault.is_spent(state_ref))
            .collect();
        if !conflicting.is_empty() {
            return Err(ObligationError::NotarizationConflict { conflicting });
        }
        if let Some(input) = &signed.tx.consumed_obligation {
            if let Ok(held) = vault.lookup_obligation(input.state.linear_id) {
                if held.state_ref != input.state_ref || held.state != input.state {
                    return Err(ObligationError::StaleObligation {
                        held: held.state_ref,
                        proposed: input.state_ref,
                    });
                }
            }
        }
        drop(vault);

        let txid = signed.id();
        tracing::info!(party = %me, %from, tx = %txid.short(), "Countersigned transition");
        Ok(self.identity.sign(&txid))
    }

    /// Verify a finalized transition and record it.
    pub async fn record(&self, finalized: &FinalizedTransition) -> Result<RecordOutcome> {
        finalized.verify()?;
        obligation_contract::verify(finalized.tx())?;
        self.vault.lock().await.record_finalized(finalized)
    }
}
