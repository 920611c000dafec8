//! # obligation-contract
//!
//! **Pure contract rules for obligation state transitions.**
//!
//! The contract is the single authority on what a valid transition looks
//! like. Initiators check their own proposals with it before signing, and
//! responders check incoming proposals with it before countersigning, so
//! every party applies identical rules. It has:
//!
//! - **Zero side effects**: no vault reads, no network, no clock
//! - **Closed dispatch**: one `match` over [`obligation_types::Command`]
//! - **Typed rejections**: every failure is a [`obligation_types::ContractViolation`]

pub mod obligation_rules;
pub mod token_rules;
pub mod verify;

pub use verify::verify;
