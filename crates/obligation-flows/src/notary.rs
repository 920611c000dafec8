//! Notary port and a single-node uniqueness service.
//!
//! The notary guarantees that every [`StateRef`] is consumed by at most one
//! transition. It does not check contract rules.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obligation_types::{
    ObligationError, PartyId, PartyIdentity, Result, SignedTransition, StateRef, TransitionId,
    TransitionSignature,
};
use tokio::sync::Mutex;

/// Outcome of a notarization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotaryResponse {
    /// Inputs were unconsumed; they are now committed to this transition.
    Certified {
        signature: TransitionSignature,
        certified_at: DateTime<Utc>,
    },
    /// Another transition already consumed these inputs.
    Conflict { conflicting: Vec<StateRef> },
}

/// Uniqueness service interface.
#[async_trait]
pub trait NotaryClient: Send + Sync {
    /// The notary's identity. Proposals name it in `notary`.
    fn party(&self) -> PartyId;

    /// Certify a fully signed transition, or report which inputs conflict.
    async fn notarize(&self, signed: &SignedTransition) -> Result<NotaryResponse>;
}

/// In-memory notary: one committed-refs map behind an async mutex.
pub struct SimpleNotary {
    identity: PartyIdentity,
    committed: Mutex<HashMap<StateRef, TransitionId>>,
}

impl SimpleNotary {
    #[must_use]
    pub fn new(identity: PartyIdentity) -> Self {
        Self {
            identity,
            committed: Mutex::new(HashMap::new()),
        }
    }

    /// Number of refs consumed so far.
    pub async fn committed_count(&self) -> usize {
        self.committed.lock().await.len()
    }

    /// The transition that consumed `state_ref`, if any.
    pub async fn consumed_by(&self, state_ref: &StateRef) -> Option<TransitionId> {
        self.committed.lock().await.get(state_ref).copied()
    }
}

#[async_trait]
impl NotaryClient for SimpleNotary {
    fn party(&self) -> PartyId {
        self.identity.party()
    }

    async fn notarize(&self, signed: &SignedTransition) -> Result<NotaryResponse> {
        let me = self.party();
        if signed.tx.notary != me {
            return Err(ObligationError::NotaryMismatch {
                expected: me,
                actual: signed.tx.notary,
            });
        }
        signed.verify_required_signatures()?;

        let txid = signed.id();
        let inputs = signed.tx.consumed_refs();
        let mut committed = self.committed.lock().await;

        let conflicting: Vec<StateRef> = inputs
            .iter()
            .filter(|r| committed.get(*r).is_some_and(|holder| *holder != txid))
            .copied()
            .collect();
        if !conflicting.is_empty() {
            tracing::warn!(
                tx = %txid.short(),
                conflicts = conflicting.len(),
                "Notarization refused: inputs already consumed"
            );
            return Ok(NotaryResponse::Conflict { conflicting });
        }

        for state_ref in inputs {
            committed.insert(state_ref, txid);
        }
        drop(committed);

        tracing::info!(tx = %txid.short(), "Transition notarized");
        Ok(NotaryResponse::Certified {
            signature: self.identity.sign(&txid),
            certified_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use obligation_types::*;

    use super::*;

    struct Fixture {
        notary: SimpleNotary,
        lender: PartyIdentity,
        borrower: PartyIdentity,
    }

    fn fixture() -> Fixture {
        Fixture {
            notary: SimpleNotary::new(PartyIdentity::from_seed("Notary", [9u8; 32])),
            lender: PartyIdentity::from_seed("Lender", [1u8; 32]),
            borrower: PartyIdentity::from_seed("Borrower", [2u8; 32]),
        }
    }

    /// A transfer spending `input`, signed by both parties.
    fn spend(f: &Fixture, input: StateRef) -> SignedTransition {
        let state = Obligation::dummy(f.lender.party(), f.borrower.party(), 10, 0);
        let mut tx = ProposedTransition::new(f.notary.party());
        tx.produced_obligation = Some(state.with_new_lender(f.borrower.party()));
        tx.consumed_obligation = Some(StateAndRef::new(state, input));
        tx.commands = vec![CommandWithSigners::new(
            Command::Transfer,
            vec![f.lender.party(), f.borrower.party()],
        )];
        let mut signed = SignedTransition::new(tx);
        let txid = signed.id();
        signed.add_signature(f.lender.sign(&txid)).unwrap();
        signed.add_signature(f.borrower.sign(&txid)).unwrap();
        signed
    }

    fn input() -> StateRef {
        StateRef::new(TransitionId([4u8; 32]), 0)
    }

    #[tokio::test]
    async fn certifies_fresh_inputs() {
        let f = fixture();
        let signed = spend(&f, input());
        let response = f.notary.notarize(&signed).await.unwrap();
        let NotaryResponse::Certified { signature, .. } = response else {
            panic!("expected certification, got {response:?}");
        };
        assert_eq!(signature.signer, f.notary.party());
        assert!(signature.verify(&signed.id()).is_ok());
        assert_eq!(f.notary.consumed_by(&input()).await, Some(signed.id()));
    }

    #[tokio::test]
    async fn second_spend_conflicts() {
        let f = fixture();
        f.notary.notarize(&spend(&f, input())).await.unwrap();
        let response = f.notary.notarize(&spend(&f, input())).await.unwrap();
        assert_eq!(
            response,
            NotaryResponse::Conflict {
                conflicting: vec![input()]
            }
        );
        assert_eq!(f.notary.committed_count().await, 1);
    }

    #[tokio::test]
    async fn same_transition_is_idempotent() {
        let f = fixture();
        let signed = spend(&f, input());
        f.notary.notarize(&signed).await.unwrap();
        let again = f.notary.notarize(&signed).await.unwrap();
        assert!(matches!(again, NotaryResponse::Certified { .. }));
    }

    #[tokio::test]
    async fn rejects_unsigned() {
        let f = fixture();
        let mut signed = spend(&f, input());
        signed.signatures.pop();
        let err = f.notary.notarize(&signed).await.unwrap_err();
        assert!(matches!(err, ObligationError::MissingSignatures { .. }));
        assert_eq!(f.notary.committed_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_other_notary() {
        let f = fixture();
        let other = SimpleNotary::new(PartyIdentity::from_seed("Other", [8u8; 32]));
        let err = other.notarize(&spend(&f, input())).await.unwrap_err();
        assert!(matches!(err, ObligationError::NotaryMismatch { .. }));
    }
}
