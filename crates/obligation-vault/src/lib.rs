//! # obligation-vault
//!
//! **State Plane**: each party's private view of the ledger.
//!
//! ## Architecture
//!
//! A [`Vault`] is mutated only by recording finalized transitions:
//! 1. Checks idempotency (a transition is applied at most once)
//! 2. Removes consumed obligations and tokens
//! 3. Keeps produced records the owner participates in
//! 4. Releases any soft locks on consumed records
//!
//! Token selection for a settlement reads [`Vault::spendable_tokens`] and
//! reserves its picks with [`Vault::soft_lock`] until the flow ends.

pub mod idempotency;
pub mod soft_lock;
pub mod vault;

pub use idempotency::IdempotencyGuard;
pub use soft_lock::SoftLockTable;
pub use vault::{RecordOutcome, Vault};
