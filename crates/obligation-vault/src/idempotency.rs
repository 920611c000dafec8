//! Bounded memory of recorded transition ids.
//!
//! A vault applies each finalized transition once. Ids are remembered in
//! arrival order; past `capacity` the earliest id is forgotten, which keeps
//! a long-running node's footprint flat.

use std::collections::{HashSet, VecDeque};

use obligation_types::{ObligationError, Result, TransitionId};

pub struct IdempotencyGuard {
    seen: HashSet<TransitionId>,
    /// Arrival order, earliest first.
    arrivals: VecDeque<TransitionId>,
    capacity: usize,
}

impl IdempotencyGuard {
    /// # Panics
    /// If `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "idempotency capacity must be positive");
        Self {
            seen: HashSet::with_capacity(capacity.min(1024)),
            arrivals: VecDeque::new(),
            capacity,
        }
    }

    /// Remember `txid`.
    ///
    /// # Errors
    /// [`ObligationError::AlreadyRecorded`] if it is already remembered.
    pub fn mark_recorded(&mut self, txid: TransitionId) -> Result<()> {
        if !self.seen.insert(txid) {
            return Err(ObligationError::AlreadyRecorded(txid));
        }
        self.arrivals.push_back(txid);
        while self.arrivals.len() > self.capacity {
            if let Some(forgotten) = self.arrivals.pop_front() {
                self.seen.remove(&forgotten);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_recorded(&self, txid: &TransitionId) -> bool {
        self.seen.contains(txid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u8) -> TransitionId {
        TransitionId([n; 32])
    }

    #[test]
    fn remembers_and_refuses_repeats() {
        let mut recorded = IdempotencyGuard::new(8);
        recorded.mark_recorded(tx(1)).unwrap();
        assert!(recorded.is_recorded(&tx(1)));

        let err = recorded.mark_recorded(tx(1)).unwrap_err();
        assert!(
            matches!(err, ObligationError::AlreadyRecorded(id) if id == tx(1)),
            "got {err:?}"
        );
        assert_eq!(recorded.len(), 1);
    }

    #[test]
    fn forgets_earliest_past_capacity() {
        let mut recorded = IdempotencyGuard::new(2);
        for n in [1, 2, 3] {
            recorded.mark_recorded(tx(n)).unwrap();
        }
        assert!(!recorded.is_recorded(&tx(1)));
        assert!(recorded.is_recorded(&tx(2)) && recorded.is_recorded(&tx(3)));
        // A forgotten id can be recorded again.
        recorded.mark_recorded(tx(1)).unwrap();
        assert!(!recorded.is_recorded(&tx(2)));
    }

    #[test]
    fn starts_empty() {
        assert!(IdempotencyGuard::new(1).is_empty());
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity() {
        let _ = IdempotencyGuard::new(0);
    }
}
