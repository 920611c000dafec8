//! Per-party state store.
//!
//! A `Vault` holds one party's current view of the ledger: the latest
//! version of every obligation it participates in, and the tokens it owns.
//! It changes only by recording finalized transitions, which is idempotent
//! and atomic: every consumed record is removed and every relevant produced
//! record added, or nothing changes.
//!
//! The transition-id cache is bounded. Past it, the set of consumed refs
//! keeps a replayed transition from restoring anything already spent.

use std::collections::{BTreeMap, HashMap, HashSet};

use obligation_types::{
    FinalizedTransition, FlowId, Obligation, ObligationError, ObligationId, PartyId, Result,
    StateAndRef, StateRef, TransitionId, ValueToken, VaultConfig,
};
use rust_decimal::Decimal;

use crate::idempotency::IdempotencyGuard;
use crate::soft_lock::SoftLockTable;

/// What `record_finalized` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The transition was applied.
    Recorded,
    /// The transition had been applied before; nothing changed.
    AlreadyRecorded,
}

/// One party's private ledger view.
pub struct Vault {
    /// The party this vault belongs to.
    owner: PartyId,
    /// Latest unconsumed version of each obligation, by linear id.
    obligations: HashMap<ObligationId, StateAndRef<Obligation>>,
    /// Unconsumed tokens owned by `owner`.
    tokens: BTreeMap<StateRef, ValueToken>,
    /// Reservations held by in-flight flows.
    locks: SoftLockTable,
    /// Transitions already applied, most recent only.
    recorded: IdempotencyGuard,
    /// Every ref this vault has seen consumed.
    spent: HashSet<StateRef>,
}

impl Vault {
    #[must_use]
    pub fn new(owner: PartyId, config: &VaultConfig) -> Self {
        Self {
            owner,
            obligations: HashMap::new(),
            tokens: BTreeMap::new(),
            locks: SoftLockTable::new(),
            recorded: IdempotencyGuard::new(config.idempotency_cache_size),
            spent: HashSet::new(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> PartyId {
        self.owner
    }

    /// Latest unconsumed version of an obligation.
    ///
    /// # Errors
    /// Returns [`ObligationError::ObligationNotFound`] if this vault holds no
    /// such obligation (unknown, fully settled, or transferred away).
    pub fn lookup_obligation(&self, id: ObligationId) -> Result<&StateAndRef<Obligation>> {
        self.obligations
            .get(&id)
            .ok_or(ObligationError::ObligationNotFound(id))
    }

    /// All obligations in this vault, ordered by linear id.
    #[must_use]
    pub fn obligations(&self) -> Vec<&StateAndRef<Obligation>> {
        let mut all: Vec<_> = self.obligations.values().collect();
        all.sort_by_key(|o| o.state.linear_id);
        all
    }

    /// Unlocked tokens of `owner` in `currency`, smallest first.
    ///
    /// Ties are broken by `StateRef` so selection is reproducible.
    #[must_use]
    pub fn spendable_tokens(&self, owner: PartyId, currency: &str) -> Vec<StateAndRef<ValueToken>> {
        let mut spendable: Vec<StateAndRef<ValueToken>> = self
            .tokens
            .iter()
            .filter(|(state_ref, token)| {
                token.owner == owner
                    && token.amount.currency == currency
                    && !self.locks.is_locked(state_ref)
            })
            .map(|(state_ref, token)| StateAndRef::new(token.clone(), *state_ref))
            .collect();
        spendable.sort_by(|a, b| {
            a.state
                .amount
                .quantity
                .cmp(&b.state.amount.quantity)
                .then(a.state_ref.cmp(&b.state_ref))
        });
        spendable
    }

    /// Total of the owner's tokens in `currency`, locked or not.
    #[must_use]
    pub fn balance(&self, currency: &str) -> Decimal {
        self.tokens
            .values()
            .filter(|token| token.owner == self.owner && token.amount.currency == currency)
            .map(|token| token.amount.quantity)
            .sum()
    }

    /// Reserve records for `flow`. All or nothing.
    pub fn soft_lock(&mut self, flow: FlowId, refs: &[StateRef]) -> Result<()> {
        self.locks.lock(flow, refs)?;
        tracing::debug!(owner = %self.owner, %flow, count = refs.len(), "Soft-locked records");
        Ok(())
    }

    /// Release every reservation held by `flow`.
    pub fn release_locks(&mut self, flow: FlowId) -> usize {
        let released = self.locks.release_flow(flow);
        if released > 0 {
            tracing::debug!(owner = %self.owner, %flow, released, "Released soft locks");
        }
        released
    }

    #[must_use]
    pub fn is_locked(&self, state_ref: &StateRef) -> bool {
        self.locks.is_locked(state_ref)
    }

    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.locks.len()
    }

    /// Apply a finalized transition.
    ///
    /// Consumed records are removed if present. Produced obligations are
    /// kept when the owner is lender or borrower and the vault holds no
    /// other version; produced tokens when the owner owns them. Nothing
    /// already consumed is ever restored. Signature checking is the
    /// caller's job.
    pub fn record_finalized(&mut self, finalized: &FinalizedTransition) -> Result<RecordOutcome> {
        let txid = finalized.id();
        if self.recorded.is_recorded(&txid) {
            tracing::debug!(owner = %self.owner, tx = %txid.short(), "Transition already recorded");
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        let tx = finalized.tx();
        let (produced_obligation, produced_tokens) = tx.outputs();

        // An output already held or already spent means this transition was
        // applied before and has since left the id cache.
        let applied_before = produced_obligation
            .iter()
            .map(|output| output.state_ref)
            .chain(produced_tokens.iter().map(|output| output.state_ref))
            .any(|state_ref| self.spent.contains(&state_ref) || self.holds(&state_ref));
        if applied_before {
            tracing::warn!(
                owner = %self.owner,
                tx = %txid.short(),
                "Replayed transition ignored: outputs already recorded"
            );
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        // Plan every change first, then apply.
        let consumed_refs = tx.consumed_refs();
        let consumed_obligation = tx.consumed_obligation.as_ref().and_then(|input| {
            self.obligations
                .get(&input.state.linear_id)
                .filter(|held| held.state_ref == input.state_ref)
                .map(|held| held.state.linear_id)
        });
        let produced_obligation = produced_obligation.filter(|output| {
            output.state.participants().contains(&self.owner)
                && (consumed_obligation == Some(output.state.linear_id)
                    || !self.obligations.contains_key(&output.state.linear_id))
        });
        let produced_tokens: Vec<_> = produced_tokens
            .into_iter()
            .filter(|output| output.state.owner == self.owner)
            .collect();

        self.recorded.mark_recorded(txid)?;

        if let Some(linear_id) = consumed_obligation {
            self.obligations.remove(&linear_id);
        }
        for state_ref in &consumed_refs {
            self.tokens.remove(state_ref);
        }
        self.locks.release_refs(&consumed_refs);
        self.spent.extend(consumed_refs.iter().copied());

        let obligation_added = produced_obligation.is_some();
        if let Some(output) = produced_obligation {
            self.obligations.insert(output.state.linear_id, output);
        }
        let tokens_added = produced_tokens.len();
        for output in produced_tokens {
            self.tokens.insert(output.state_ref, output.state);
        }

        tracing::info!(
            owner = %self.owner,
            tx = %txid.short(),
            consumed = consumed_refs.len(),
            obligation_added,
            tokens_added,
            "Recorded finalized transition"
        );
        Ok(RecordOutcome::Recorded)
    }

    fn holds(&self, state_ref: &StateRef) -> bool {
        self.tokens.contains_key(state_ref)
            || self
                .obligations
                .values()
                .any(|held| held.state_ref == *state_ref)
    }

    /// Whether a finalized transition recorded here consumed `state_ref`.
    #[must_use]
    pub fn is_spent(&self, state_ref: &StateRef) -> bool {
        self.spent.contains(state_ref)
    }

    #[must_use]
    pub fn is_recorded(&self, txid: &TransitionId) -> bool {
        self.recorded.is_recorded(txid)
    }

    #[must_use]
    pub fn recorded_count(&self) -> usize {
        self.recorded.len()
    }
}

#[cfg(test)]
mod tests {
    use obligation_types::*;

    use super::*;

    const ALICE: PartyId = PartyId([1u8; 32]);
    const BOB: PartyId = PartyId([2u8; 32]);
    const NOTARY: PartyId = PartyId([9u8; 32]);

    fn cash(owner: PartyId, amounts: &[i64]) -> FinalizedTransition {
        let mut tx = ProposedTransition::new(NOTARY);
        tx.produced_tokens = amounts
            .iter()
            .map(|a| ValueToken::new(Amount::pounds(*a), owner))
            .collect();
        tx.commands = vec![CommandWithSigners::new(Command::IssueTokens, vec![owner])];
        FinalizedTransition::dummy(tx)
    }

    #[test]
    fn spendable_tokens_sorted_ascending() {
        let mut vault = Vault::new(ALICE, &VaultConfig::default());
        vault.record_finalized(&cash(ALICE, &[7, 2, 5])).unwrap();
        let amounts: Vec<_> = vault
            .spendable_tokens(ALICE, "GBP")
            .iter()
            .map(|t| t.state.amount.clone())
            .collect();
        assert_eq!(
            amounts,
            vec![Amount::pounds(2), Amount::pounds(5), Amount::pounds(7)]
        );
        assert_eq!(vault.balance("GBP"), Decimal::new(14, 0));
    }

    #[test]
    fn spendable_tokens_filter_currency_and_locks() {
        let mut vault = Vault::new(ALICE, &VaultConfig::default());
        vault.record_finalized(&cash(ALICE, &[1, 2])).unwrap();
        assert!(vault.spendable_tokens(ALICE, "USD").is_empty());

        let smallest = vault.spendable_tokens(ALICE, "GBP")[0].state_ref;
        let flow = FlowId::new();
        vault.soft_lock(flow, &[smallest]).unwrap();
        assert_eq!(vault.spendable_tokens(ALICE, "GBP").len(), 1);
        assert_eq!(vault.balance("GBP"), Decimal::new(3, 0));

        assert_eq!(vault.release_locks(flow), 1);
        assert_eq!(vault.spendable_tokens(ALICE, "GBP").len(), 2);
    }

    #[test]
    fn foreign_tokens_not_stored() {
        let mut vault = Vault::new(ALICE, &VaultConfig::default());
        vault.record_finalized(&cash(BOB, &[10])).unwrap();
        assert!(vault.spendable_tokens(BOB, "GBP").is_empty());
        assert_eq!(vault.balance("GBP"), Decimal::ZERO);
    }

    #[test]
    fn lookup_unknown_obligation() {
        let vault = Vault::new(ALICE, &VaultConfig::default());
        let id = ObligationId::new();
        let err = vault.lookup_obligation(id).unwrap_err();
        assert!(matches!(err, ObligationError::ObligationNotFound(missing) if missing == id));
    }

    #[test]
    fn record_twice_is_noop() {
        let mut vault = Vault::new(ALICE, &VaultConfig::default());
        let issuance = cash(ALICE, &[4]);
        assert_eq!(
            vault.record_finalized(&issuance).unwrap(),
            RecordOutcome::Recorded
        );
        assert_eq!(
            vault.record_finalized(&issuance).unwrap(),
            RecordOutcome::AlreadyRecorded
        );
        assert_eq!(vault.balance("GBP"), Decimal::new(4, 0));
        assert_eq!(vault.recorded_count(), 1);
    }
}
