//! Value tokens and the `StateAndRef` wrapper shared by all ledger records.

use serde::{Deserialize, Serialize};

use crate::{Amount, PartyId, StateRef};

/// A spendable unit of currency held by one party.
///
/// Tokens are spent whole: a settlement consumes whole tokens and produces a
/// payment token for the lender plus, when needed, a change token back to the
/// spender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueToken {
    pub amount: Amount,
    pub owner: PartyId,
}

impl ValueToken {
    #[must_use]
    pub fn new(amount: Amount, owner: PartyId) -> Self {
        Self { amount, owner }
    }
}

/// A ledger record together with the ref that uniquely names its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef<T> {
    pub state: T,
    pub state_ref: StateRef,
}

impl<T> StateAndRef<T> {
    #[must_use]
    pub fn new(state: T, state_ref: StateRef) -> Self {
        Self { state, state_ref }
    }
}
