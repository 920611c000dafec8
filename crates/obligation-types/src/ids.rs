//! Identifiers used throughout the settlement engine.
//!
//! Obligation and flow IDs use UUIDv7 for time-ordered sorting.
//! `PartyId` is the raw ed25519 public key, and `TransitionId` is the
//! SHA-256 of a transition's canonical encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ObligationId
// ---------------------------------------------------------------------------

/// Stable identifier of an obligation across all of its versions.
///
/// Each settlement consumes one version and produces the next; the
/// `ObligationId` stays the same while the [`StateRef`] changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObligationId(pub Uuid);

impl ObligationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ObligationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObligationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PartyId
// ---------------------------------------------------------------------------

/// Identity of a ledger participant: the raw ed25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PartyId(pub [u8; 32]);

impl PartyId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// TransitionId
// ---------------------------------------------------------------------------

/// Content address of a state transition.
///
/// SHA-256 over [`crate::ProposedTransition::signing_payload`], so every
/// party derives the same id from the same proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransitionId(pub [u8; 32]);

impl TransitionId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// StateRef
// ---------------------------------------------------------------------------

/// Pointer to one output of a finalized transition.
///
/// This is the unit the notary guards: a `StateRef` can be consumed by at
/// most one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StateRef {
    /// Transition that produced the record.
    pub txid: TransitionId,
    /// Output position within that transition.
    pub index: u32,
}

impl StateRef {
    #[must_use]
    pub fn new(txid: TransitionId, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", hex::encode(&self.txid.0[..8]), self.index)
    }
}

// ---------------------------------------------------------------------------
// FlowId
// ---------------------------------------------------------------------------

/// Identifier of one protocol run. Owns the soft locks taken during it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct FlowId(pub Uuid);

impl FlowId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
