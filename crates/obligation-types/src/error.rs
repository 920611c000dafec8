//! Error types for the obligation settlement engine.
//!
//! All errors use the `OB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Obligation errors
//! - 2xx: Funds errors
//! - 3xx: Protocol / role errors
//! - 4xx: Contract errors
//! - 5xx: Notary errors
//! - 6xx: Signature errors
//! - 7xx: Network errors
//! - 9xx: General / internal errors

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Currency, ObligationId, PartyId, StateRef, TransitionId};

/// Suspend points of a protocol run, named in timeout errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolStage {
    /// Waiting for a counterparty to countersign.
    CounterSignature,
    /// Waiting for the notary to certify.
    Notarization,
    /// Waiting for a participant to acknowledge the finalized transition.
    FinalityAck,
}

impl fmt::Display for ProtocolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CounterSignature => write!(f, "COUNTER_SIGNATURE"),
            Self::Notarization => write!(f, "NOTARIZATION"),
            Self::FinalityAck => write!(f, "FINALITY_ACK"),
        }
    }
}

/// Why the contract rejected a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("transition carries no command")]
    NoCommand,

    #[error("transition carries {count} commands, exactly one is allowed")]
    MultipleCommands { count: usize },

    #[error("record {state_ref} is consumed more than once")]
    DuplicateInput { state_ref: StateRef },

    #[error("expected {expected} consumed obligation(s), found {actual}")]
    ConsumedObligations { expected: usize, actual: usize },

    #[error("expected {expected} produced obligation(s), found {actual}")]
    ProducedObligations { expected: usize, actual: usize },

    #[error("this command must not consume or produce tokens")]
    UnexpectedTokens,

    #[error("a token-issuance transition must not consume anything")]
    UnexpectedInputs,

    #[error("amounts must be positive")]
    NonPositiveAmount,

    #[error("currency mismatch: expected {expected}, found {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    #[error("a newly issued obligation must have nothing paid")]
    IssuedWithPayment,

    #[error("paid exceeds the obligation amount")]
    PaidExceedsAmount,

    #[error("lender and borrower must differ")]
    SelfObligation,

    #[error("the consumed obligation is already fully settled")]
    AlreadySettled,

    #[error("a fully settled obligation must not be produced")]
    SettledOutput,

    #[error("the obligation amount must not change")]
    AmountChanged,

    #[error("the obligation linear id must not change")]
    LinearIdChanged,

    #[error("the paid amount must not change on transfer")]
    PaidChanged,

    #[error("the lender must not change on settle")]
    LenderChanged,

    #[error("the borrower must not change")]
    BorrowerChanged,

    #[error("a transfer must move the obligation to a different lender")]
    LenderUnchanged,

    #[error("paid increased by {actual}, settle command says {expected}")]
    SettledAmountMismatch { expected: Decimal, actual: Decimal },

    #[error("settle of {requested} exceeds outstanding {outstanding}")]
    Overpayment {
        outstanding: Decimal,
        requested: Decimal,
    },

    #[error("a token issuance must produce at least one token")]
    NoTokensProduced,

    #[error("a settlement must consume at least one token")]
    NoTokensConsumed,

    #[error("consumed token owned by {owner}, not the borrower")]
    ForeignTokenSpent { owner: PartyId },

    #[error("produced token owned by {owner}, who is neither lender nor borrower")]
    UnexpectedTokenOwner { owner: PartyId },

    #[error("lender receives {actual}, settle command says {expected}")]
    PaymentMismatch { expected: Decimal, actual: Decimal },

    #[error("tokens not conserved: consumed {consumed}, produced {produced}")]
    TokensNotConserved { consumed: Decimal, produced: Decimal },

    #[error("required signer {party} is missing from the command")]
    MissingSigner { party: PartyId },
}

/// Central error enum for all settlement operations.
#[derive(Debug, Error)]
pub enum ObligationError {
    // =================================================================
    // Obligation Errors (1xx)
    // =================================================================
    /// No unconsumed obligation with this id in the vault.
    #[error("OB_ERR_100: Obligation not found: {0}")]
    ObligationNotFound(ObligationId),

    /// The amount is malformed (non-positive, overflow).
    #[error("OB_ERR_101: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Arithmetic or comparison across currencies.
    #[error("OB_ERR_102: Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// This vault has already recorded the transition (idempotency guard).
    #[error("OB_ERR_103: Transition already recorded: {0}")]
    AlreadyRecorded(TransitionId),

    /// A proposal consumes an obligation version other than the one held.
    #[error("OB_ERR_104: Stale obligation: holding {held}, proposal consumes {proposed}")]
    StaleObligation { held: StateRef, proposed: StateRef },

    // =================================================================
    // Funds Errors (2xx)
    // =================================================================
    /// The spender does not hold enough unlocked tokens.
    #[error("OB_ERR_200: Insufficient funds: need {needed} {currency}, have {available}")]
    InsufficientFunds {
        currency: Currency,
        needed: Decimal,
        available: Decimal,
    },

    /// The payment would take `paid` above `amount`.
    #[error("OB_ERR_201: Overpayment: outstanding {outstanding}, requested {requested}")]
    Overpayment {
        outstanding: Decimal,
        requested: Decimal,
    },

    /// A record is soft-locked by another protocol run.
    #[error("OB_ERR_202: Record {0} is locked by another flow")]
    RecordLocked(StateRef),

    // =================================================================
    // Protocol Errors (3xx)
    // =================================================================
    /// The caller is not allowed to start this protocol for this obligation.
    #[error("OB_ERR_300: Unauthorized initiator {caller}: {reason}")]
    UnauthorizedInitiator { caller: PartyId, reason: String },

    /// The counterparty refused to sign or record.
    #[error("OB_ERR_301: Counterparty {party} rejected: {reason}")]
    CounterpartyRejected { party: PartyId, reason: String },

    /// The counterparty is not reachable on the network.
    #[error("OB_ERR_302: Unknown counterparty: {0}")]
    UnknownCounterparty(PartyId),

    // =================================================================
    // Contract Errors (4xx)
    // =================================================================
    /// The transition breaks a contract rule.
    #[error("OB_ERR_400: Contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),

    // =================================================================
    // Notary Errors (5xx)
    // =================================================================
    /// Another transition already consumed one of the inputs.
    #[error("OB_ERR_500: Notarization conflict on {} record(s)", .conflicting.len())]
    NotarizationConflict { conflicting: Vec<StateRef> },

    /// The transition names a different notary, or the notary signature
    /// comes from the wrong key.
    #[error("OB_ERR_501: Notary mismatch: expected {expected}, got {actual}")]
    NotaryMismatch { expected: PartyId, actual: PartyId },

    // =================================================================
    // Signature Errors (6xx)
    // =================================================================
    /// A signature did not verify.
    #[error("OB_ERR_600: Invalid signature from {signer}")]
    InvalidSignature { signer: PartyId },

    /// Required signers have not signed.
    #[error("OB_ERR_601: Missing signatures from {} required signer(s)", .missing.len())]
    MissingSignatures { missing: Vec<PartyId> },

    // =================================================================
    // Network Errors (7xx)
    // =================================================================
    /// A suspend point exceeded its configured timeout.
    #[error("OB_ERR_700: Timeout during {stage}")]
    Timeout { stage: ProtocolStage },

    /// The peer's endpoint went away mid-exchange.
    #[error("OB_ERR_701: Channel closed: {reason}")]
    ChannelClosed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OB_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OB_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("OB_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ObligationError>;

impl From<serde_json::Error> for ObligationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
