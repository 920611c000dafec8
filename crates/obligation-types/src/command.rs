//! The closed set of commands a transition can carry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Amount, PartyId};

/// What a transition does. Matched exhaustively by the contract checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Create a new obligation.
    Issue,
    /// Move an obligation to a new lender.
    Transfer,
    /// Pay down an obligation by `amount`, paid to the lender in tokens.
    Settle { amount: Amount },
    /// Create value tokens out of nothing (cash issuance).
    IssueTokens,
}

impl Command {
    /// Stable tag byte used in the canonical encoding.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Self::Issue => 1,
            Self::Transfer => 2,
            Self::Settle { .. } => 3,
            Self::IssueTokens => 4,
        }
    }

    /// The settlement amount, if this is a `Settle`.
    #[must_use]
    pub fn settle_amount(&self) -> Option<&Amount> {
        match self {
            Self::Settle { amount } => Some(amount),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue => write!(f, "ISSUE"),
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Settle { amount } => write!(f, "SETTLE({amount})"),
            Self::IssueTokens => write!(f, "ISSUE_TOKENS"),
        }
    }
}

/// A command plus the parties that must sign for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandWithSigners {
    pub command: Command,
    pub signers: Vec<PartyId>,
}

impl CommandWithSigners {
    #[must_use]
    pub fn new(command: Command, signers: Vec<PartyId>) -> Self {
        Self { command, signers }
    }

    #[must_use]
    pub fn requires(&self, party: &PartyId) -> bool {
        self.signers.contains(party)
    }
}
