//! System-wide constants for the settlement engine.

/// Default time to wait for a counterparty signature, in milliseconds.
pub const DEFAULT_COUNTERPARTY_TIMEOUT_MS: u64 = 5000;

/// Default time to wait for notary certification, in milliseconds.
pub const DEFAULT_NOTARY_TIMEOUT_MS: u64 = 5000;

/// Default time to wait for a participant to acknowledge a finalized
/// transition, in milliseconds.
pub const DEFAULT_FINALITY_ACK_TIMEOUT_MS: u64 = 2000;

/// Number of recorded transition ids each vault remembers for idempotency.
pub const DEFAULT_IDEMPOTENCY_CACHE_SIZE: usize = 100_000;

/// Capacity of each node's inbound message queue.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

