//! # State transitions and their lifecycle
//!
//! ```text
//!   ProposedTransition ──sign──▶ SignedTransition ──notary──▶ FinalizedTransition
//!        (unsigned)            (party signatures)        (+ notary signature)
//! ```
//!
//! A transition consumes at most one obligation version and any number of
//! tokens, and produces at most one obligation version and any number of
//! tokens. Its [`TransitionId`] is the SHA-256 of [`ProposedTransition::signing_payload`],
//! a canonical byte encoding, so all parties sign identical bytes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    Amount, CommandWithSigners, Obligation, ObligationError, PartyId, Result, StateAndRef,
    StateRef, TransitionId, ValueToken,
};

/// Domain separator for the canonical encoding.
const SIGNING_DOMAIN: &[u8] = b"obligation:tx:v1:";

// ---------------------------------------------------------------------------
// ProposedTransition
// ---------------------------------------------------------------------------

/// An unsigned proposal to change ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTransition {
    /// Uniqueness salt so two otherwise identical issuances get distinct ids.
    pub nonce: Uuid,
    /// The notary that must certify this transition.
    pub notary: PartyId,
    pub consumed_obligation: Option<StateAndRef<Obligation>>,
    pub consumed_tokens: Vec<StateAndRef<ValueToken>>,
    pub produced_obligation: Option<Obligation>,
    pub produced_tokens: Vec<ValueToken>,
    pub commands: Vec<CommandWithSigners>,
}

impl ProposedTransition {
    /// An empty proposal for the given notary.
    #[must_use]
    pub fn new(notary: PartyId) -> Self {
        Self {
            nonce: Uuid::now_v7(),
            notary,
            consumed_obligation: None,
            consumed_tokens: Vec::new(),
            produced_obligation: None,
            produced_tokens: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Canonical signing payload.
    ///
    /// Format: `"obligation:tx:v1:" || nonce || notary || consumed obligation ||
    /// consumed tokens || produced obligation || produced tokens || commands`,
    /// with every variable-length field length-prefixed (u32 LE) and every
    /// quantity normalized.
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(512);
        payload.extend_from_slice(SIGNING_DOMAIN);
        payload.extend_from_slice(self.nonce.as_bytes());
        payload.extend_from_slice(self.notary.as_bytes());

        match &self.consumed_obligation {
            Some(input) => {
                payload.push(1);
                put_ref(&mut payload, &input.state_ref);
                put_obligation(&mut payload, &input.state);
            }
            None => payload.push(0),
        }

        put_len(&mut payload, self.consumed_tokens.len());
        for input in &self.consumed_tokens {
            put_ref(&mut payload, &input.state_ref);
            put_token(&mut payload, &input.state);
        }

        match &self.produced_obligation {
            Some(output) => {
                payload.push(1);
                put_obligation(&mut payload, output);
            }
            None => payload.push(0),
        }

        put_len(&mut payload, self.produced_tokens.len());
        for output in &self.produced_tokens {
            put_token(&mut payload, output);
        }

        put_len(&mut payload, self.commands.len());
        for command in &self.commands {
            payload.push(command.command.tag());
            if let Some(amount) = command.command.settle_amount() {
                put_amount(&mut payload, amount);
            }
            put_len(&mut payload, command.signers.len());
            for signer in &command.signers {
                payload.extend_from_slice(signer.as_bytes());
            }
        }
        payload
    }

    #[must_use]
    pub fn id(&self) -> TransitionId {
        let hash = Sha256::digest(self.signing_payload());
        let mut id = [0u8; 32];
        id.copy_from_slice(&hash);
        TransitionId(id)
    }

    /// Every record version this transition consumes.
    #[must_use]
    pub fn consumed_refs(&self) -> Vec<StateRef> {
        self.consumed_obligation
            .iter()
            .map(|input| input.state_ref)
            .chain(self.consumed_tokens.iter().map(|input| input.state_ref))
            .collect()
    }

    /// Union of the signers of every command.
    #[must_use]
    pub fn required_signers(&self) -> BTreeSet<PartyId> {
        self.commands
            .iter()
            .flat_map(|command| command.signers.iter().copied())
            .collect()
    }

    /// Every party that holds an input or receives an output.
    #[must_use]
    pub fn participants(&self) -> BTreeSet<PartyId> {
        let mut parties = BTreeSet::new();
        if let Some(input) = &self.consumed_obligation {
            parties.extend(input.state.participants());
        }
        if let Some(output) = &self.produced_obligation {
            parties.extend(output.participants());
        }
        parties.extend(self.consumed_tokens.iter().map(|input| input.state.owner));
        parties.extend(self.produced_tokens.iter().map(|output| output.owner));
        parties
    }

    /// Outputs paired with the refs they will carry once finalized.
    ///
    /// The produced obligation (if any) is output 0; tokens follow in order.
    #[must_use]
    pub fn outputs(&self) -> (Option<StateAndRef<Obligation>>, Vec<StateAndRef<ValueToken>>) {
        let txid = self.id();
        let offset = u32::from(self.produced_obligation.is_some());
        let obligation = self
            .produced_obligation
            .clone()
            .map(|state| StateAndRef::new(state, StateRef::new(txid, 0)));
        let tokens = self
            .produced_tokens
            .iter()
            .zip(offset..)
            .map(|(token, index)| StateAndRef::new(token.clone(), StateRef::new(txid, index)))
            .collect();
        (obligation, tokens)
    }

    /// Sum of the token quantities consumed.
    #[must_use]
    pub fn consumed_token_total(&self) -> rust_decimal::Decimal {
        self.consumed_tokens
            .iter()
            .map(|input| input.state.amount.quantity)
            .sum()
    }

    /// Sum of the token quantities produced for `owner`.
    #[must_use]
    pub fn produced_total_for(&self, owner: &PartyId) -> rust_decimal::Decimal {
        self.produced_tokens
            .iter()
            .filter(|output| output.owner == *owner)
            .map(|output| output.amount.quantity)
            .sum()
    }
}

fn put_len(buf: &mut Vec<u8>, len: usize) {
    // Transitions are bounded far below u32::MAX entries.
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    put_len(buf, value.len());
    buf.extend_from_slice(value.as_bytes());
}

fn put_amount(buf: &mut Vec<u8>, amount: &Amount) {
    put_str(buf, &amount.currency);
    put_str(buf, &amount.canonical_quantity());
}

fn put_ref(buf: &mut Vec<u8>, state_ref: &StateRef) {
    buf.extend_from_slice(state_ref.txid.as_bytes());
    buf.extend_from_slice(&state_ref.index.to_le_bytes());
}

fn put_obligation(buf: &mut Vec<u8>, obligation: &Obligation) {
    buf.extend_from_slice(obligation.linear_id.0.as_bytes());
    put_amount(buf, &obligation.amount);
    put_amount(buf, &obligation.paid);
    buf.extend_from_slice(obligation.lender.as_bytes());
    buf.extend_from_slice(obligation.borrower.as_bytes());
}

fn put_token(buf: &mut Vec<u8>, token: &ValueToken) {
    put_amount(buf, &token.amount);
    buf.extend_from_slice(token.owner.as_bytes());
}

// ---------------------------------------------------------------------------
// TransitionSignature
// ---------------------------------------------------------------------------

/// An ed25519 signature by `signer` over a [`TransitionId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSignature {
    pub signer: PartyId,
    /// 64-byte ed25519 signature.
    pub signature: Vec<u8>,
}

impl TransitionSignature {
    /// Verify this signature over `txid`.
    ///
    /// # Errors
    /// Returns [`ObligationError::InvalidSignature`] if the key or signature
    /// is malformed or does not verify.
    pub fn verify(&self, txid: &TransitionId) -> Result<()> {
        crate::identity::verify_signature(&self.signer, txid.as_bytes(), &self.signature)
    }
}

// ---------------------------------------------------------------------------
// SignedTransition
// ---------------------------------------------------------------------------

/// A proposal plus the party signatures collected so far, in signing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransition {
    pub tx: ProposedTransition,
    pub signatures: Vec<TransitionSignature>,
}

impl SignedTransition {
    #[must_use]
    pub fn new(tx: ProposedTransition) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TransitionId {
        self.tx.id()
    }

    /// Append a signature after checking it.
    ///
    /// A second signature from the same signer is ignored.
    pub fn add_signature(&mut self, signature: TransitionSignature) -> Result<()> {
        signature.verify(&self.id())?;
        if !self.is_signed_by(&signature.signer) {
            self.signatures.push(signature);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_signed_by(&self, party: &PartyId) -> bool {
        self.signatures.iter().any(|sig| sig.signer == *party)
    }

    /// Required signers that have not signed yet.
    #[must_use]
    pub fn missing_signers(&self) -> Vec<PartyId> {
        self.tx
            .required_signers()
            .into_iter()
            .filter(|party| !self.is_signed_by(party))
            .collect()
    }

    /// Check every attached signature, and that every required signer other
    /// than those in `allowed_missing` has signed.
    pub fn verify_signatures_except(&self, allowed_missing: &[PartyId]) -> Result<()> {
        let txid = self.id();
        for signature in &self.signatures {
            signature.verify(&txid)?;
        }
        let missing: Vec<PartyId> = self
            .missing_signers()
            .into_iter()
            .filter(|party| !allowed_missing.contains(party))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ObligationError::MissingSignatures { missing })
        }
    }

    pub fn verify_required_signatures(&self) -> Result<()> {
        self.verify_signatures_except(&[])
    }
}

// ---------------------------------------------------------------------------
// FinalizedTransition
// ---------------------------------------------------------------------------

/// A fully signed transition certified by its notary. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransition {
    pub signed: SignedTransition,
    pub notary_signature: TransitionSignature,
    pub certified_at: DateTime<Utc>,
}

impl FinalizedTransition {
    #[must_use]
    pub fn id(&self) -> TransitionId {
        self.signed.id()
    }

    #[must_use]
    pub fn tx(&self) -> &ProposedTransition {
        &self.signed.tx
    }

    /// Check all party signatures and the notary's.
    pub fn verify(&self) -> Result<()> {
        self.signed.verify_required_signatures()?;
        if self.notary_signature.signer != self.signed.tx.notary {
            return Err(ObligationError::NotaryMismatch {
                expected: self.signed.tx.notary,
                actual: self.notary_signature.signer,
            });
        }
        self.notary_signature.verify(&self.id())
    }
}

/// Fixture for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl FinalizedTransition {
    /// Wrap `tx` as if it had been signed and notarized, with placeholder
    /// signatures that do **not** verify.
    pub fn dummy(tx: ProposedTransition) -> Self {
        let signatures = tx
            .required_signers()
            .into_iter()
            .map(|signer| TransitionSignature {
                signer,
                signature: vec![0u8; 64],
            })
            .collect();
        let notary = tx.notary;
        Self {
            signed: SignedTransition { tx, signatures },
            notary_signature: TransitionSignature {
                signer: notary,
                signature: vec![0u8; 64],
            },
            certified_at: Utc::now(),
        }
    }
}
