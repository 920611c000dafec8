//! Wire messages exchanged between parties, encoded as JSON bytes.

use obligation_types::{
    FinalizedTransition, Result, SignedTransition, StateRef, TransitionSignature,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A request from an initiator to a counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum FlowMessage {
    /// Verify and countersign this transition.
    SignatureRequest(SignedTransition),
    /// This transition is final; record it.
    Finalized(FinalizedTransition),
}

/// The counterparty's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum FlowReply {
    Signed(TransitionSignature),
    Rejected { reason: String },
    /// The proposal consumes records the counterparty has already seen
    /// consumed by a finalized transition.
    Conflict { conflicting: Vec<StateRef> },
    Ack,
}

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
