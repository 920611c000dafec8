//! # obligation-flows
//!
//! **Protocol Plane**: building, signing, notarizing and distributing
//! state transitions between parties.
//!
//! ## Architecture
//!
//! A settlement run on the borrower's node:
//! 1. Checks the caller is the borrower
//! 2. Builds the transition and soft-locks the selected tokens
//! 3. Checks the contract and signs
//! 4. Collects the lender's countersignature
//! 5. Has the notary certify input uniqueness
//! 6. Records locally and broadcasts to the other participants
//!
//! Counterparties answer through the [`Responder`]; transport and notary
//! sit behind the [`CounterpartyClient`] and [`NotaryClient`] ports.

pub mod builder;
pub mod codec;
pub mod finality;
pub mod issue;
pub mod network;
pub mod node;
pub mod notary;
pub mod responder;
pub mod settle;
pub mod transfer;

pub use builder::{SettleRequest, build_settlement};
pub use finality::FlowContext;
pub use network::{CounterpartyClient, Envelope, LocalNetwork, SignatureReply};
pub use node::Node;
pub use notary::{NotaryClient, NotaryResponse, SimpleNotary};
pub use responder::Responder;
pub use settle::{SettleFlow, SettleStage};
