//! Counterparty port and an in-process transport.
//!
//! [`LocalNetwork`] gives every registered party an inbox (`mpsc`) of
//! [`Envelope`]s. Each envelope carries an encoded [`FlowMessage`] and a
//! `oneshot` sender for the encoded [`FlowReply`]. Timeouts are the
//! caller's concern; a silent party simply never replies.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use obligation_types::{
    FinalizedTransition, ObligationError, PartyId, Result, SignedTransition, StateRef,
    TransitionSignature,
};
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::codec::{self, FlowMessage, FlowReply};

/// A counterparty's answer to a signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureReply {
    Signed(TransitionSignature),
    Rejected { reason: String },
    Conflict { conflicting: Vec<StateRef> },
}

/// Messaging towards other parties.
#[async_trait]
pub trait CounterpartyClient: Send + Sync {
    /// Ask `to` to verify and countersign.
    async fn request_signature(
        &self,
        from: PartyId,
        to: PartyId,
        signed: &SignedTransition,
    ) -> Result<SignatureReply>;

    /// Hand `to` a finalized transition and wait for its ack.
    async fn broadcast_finalized(
        &self,
        from: PartyId,
        to: PartyId,
        finalized: &FinalizedTransition,
    ) -> Result<()>;
}

/// One inbound message.
#[derive(Debug)]
pub struct Envelope {
    pub from: PartyId,
    pub payload: Vec<u8>,
    pub reply: oneshot::Sender<Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    endpoints: RwLock<HashMap<PartyId, mpsc::Sender<Envelope>>>,
    sent: AtomicU64,
}

/// In-process network shared by all nodes of a test or simulation.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    inner: Arc<Inner>,
}

impl LocalNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `party`'s inbox. A second registration replaces the first.
    pub async fn register(&self, party: PartyId, capacity: usize) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(capacity);
        self.inner.endpoints.write().await.insert(party, tx);
        tracing::debug!(%party, capacity, "Registered endpoint");
        rx
    }

    pub async fn unregister(&self, party: &PartyId) {
        self.inner.endpoints.write().await.remove(party);
    }

    /// Messages delivered to an inbox so far.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.inner.sent.load(Ordering::Relaxed)
    }

    async fn send(&self, from: PartyId, to: PartyId, message: &FlowMessage) -> Result<FlowReply> {
        let endpoint = self
            .inner
            .endpoints
            .read()
            .await
            .get(&to)
            .cloned()
            .ok_or(ObligationError::UnknownCounterparty(to))?;

        let payload = codec::encode(message)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        endpoint
            .send(Envelope {
                from,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ObligationError::ChannelClosed {
                reason: format!("inbox of {to} is closed"),
            })?;
        self.inner.sent.fetch_add(1, Ordering::Relaxed);

        let bytes = reply_rx.await.map_err(|_| ObligationError::ChannelClosed {
            reason: format!("{to} dropped the reply"),
        })?;
        codec::decode(&bytes)
    }
}

#[async_trait]
impl CounterpartyClient for LocalNetwork {
    async fn request_signature(
        &self,
        from: PartyId,
        to: PartyId,
        signed: &SignedTransition,
    ) -> Result<SignatureReply> {
        let message = FlowMessage::SignatureRequest(signed.clone());
        match self.send(from, to, &message).await? {
            FlowReply::Signed(signature) => Ok(SignatureReply::Signed(signature)),
            FlowReply::Rejected { reason } => Ok(SignatureReply::Rejected { reason }),
            FlowReply::Conflict { conflicting } => Ok(SignatureReply::Conflict { conflicting }),
            FlowReply::Ack => Err(ObligationError::Internal(format!(
                "{to} acked a signature request"
            ))),
        }
    }

    async fn broadcast_finalized(
        &self,
        from: PartyId,
        to: PartyId,
        finalized: &FinalizedTransition,
    ) -> Result<()> {
        let message = FlowMessage::Finalized(finalized.clone());
        match self.send(from, to, &message).await? {
            FlowReply::Ack => Ok(()),
            FlowReply::Rejected { reason } => {
                Err(ObligationError::CounterpartyRejected { party: to, reason })
            }
            FlowReply::Conflict { conflicting } => {
                Err(ObligationError::NotarizationConflict { conflicting })
            }
            FlowReply::Signed(_) => Err(ObligationError::Internal(format!(
                "{to} signed a finalized transition"
            ))),
        }
    }
}
