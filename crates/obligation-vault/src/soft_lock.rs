//! Soft locks: per-record reservations held by in-flight protocol runs.
//!
//! Token selection reserves the chosen tokens for the selecting flow so a
//! concurrent run on the same node picks different ones. A lock ends when the
//! owning flow releases it or when a recorded transition consumes the record.
//! Locks are local to a vault and never travel over the network.

use std::collections::HashMap;

use obligation_types::{FlowId, ObligationError, Result, StateRef};

#[derive(Debug, Default)]
pub struct SoftLockTable {
    locks: HashMap<StateRef, FlowId>,
}

impl SoftLockTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every ref for `flow`, or none of them.
    ///
    /// Re-locking a ref already held by the same flow is a no-op.
    ///
    /// # Errors
    /// Returns [`ObligationError::RecordLocked`] for the first ref held by a
    /// different flow.
    pub fn lock(&mut self, flow: FlowId, refs: &[StateRef]) -> Result<()> {
        if let Some(taken) = refs
            .iter()
            .find(|r| self.locks.get(*r).is_some_and(|holder| *holder != flow))
        {
            return Err(ObligationError::RecordLocked(*taken));
        }
        for r in refs {
            self.locks.insert(*r, flow);
        }
        Ok(())
    }

    /// Drop every lock held by `flow`. Returns how many were released.
    pub fn release_flow(&mut self, flow: FlowId) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, holder| *holder != flow);
        before - self.locks.len()
    }

    /// Drop locks on the given refs regardless of holder.
    pub fn release_refs(&mut self, refs: &[StateRef]) {
        for r in refs {
            self.locks.remove(r);
        }
    }

    #[must_use]
    pub fn is_locked(&self, state_ref: &StateRef) -> bool {
        self.locks.contains_key(state_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
