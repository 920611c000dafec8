//! # obligation-types
//!
//! Shared types, errors, and configuration for the obligation settlement
//! engine.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`ObligationId`], [`PartyId`], [`TransitionId`], [`StateRef`], [`FlowId`]
//! - **Ledger records**: [`Obligation`], [`ValueToken`], [`StateAndRef`], [`Amount`]
//! - **Commands**: [`Command`], [`CommandWithSigners`]
//! - **Transitions**: [`ProposedTransition`], [`SignedTransition`], [`FinalizedTransition`]
//! - **Identities**: [`PartyIdentity`] (ed25519 signing keys)
//! - **Configuration**: [`NodeConfig`], [`FlowConfig`], [`VaultConfig`]
//! - **Errors**: [`ObligationError`] with `OB_ERR_` prefix codes, [`ContractViolation`]
//! - **Constants**: system-wide limits and defaults

pub mod amount;
pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod ids;
pub mod obligation;
pub mod token;
pub mod transition;

pub use amount::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use identity::*;
pub use ids::*;
pub use obligation::*;
pub use token::*;
pub use transition::*;

// Constants are accessed via `obligation_types::constants::FOO`
// (not re-exported to avoid name collisions).
