//! Entry point: dispatch a transition to the rules for its command.

use std::collections::HashSet;

use obligation_types::{Command, ContractViolation, ProposedTransition};

use crate::{obligation_rules, token_rules};

/// Check `tx` against the contract.
///
/// A transition carries exactly one command; its variant selects the rule
/// set. No record may be consumed twice.
///
/// # Errors
/// Returns the first [`ContractViolation`] found.
pub fn verify(tx: &ProposedTransition) -> Result<(), ContractViolation> {
    let command = match tx.commands.as_slice() {
        [] => return Err(ContractViolation::NoCommand),
        [single] => single,
        many => {
            return Err(ContractViolation::MultipleCommands { count: many.len() });
        }
    };

    let mut seen = HashSet::new();
    if let Some(state_ref) = tx.consumed_refs().into_iter().find(|r| !seen.insert(*r)) {
        tracing::debug!(%state_ref, "Contract rejected duplicate input");
        return Err(ContractViolation::DuplicateInput { state_ref });
    }

    let result = match &command.command {
        Command::Issue => obligation_rules::verify_issue(tx, command),
        Command::Transfer => obligation_rules::verify_transfer(tx, command),
        Command::Settle { amount } => obligation_rules::verify_settle(tx, command, amount),
        Command::IssueTokens => token_rules::verify_token_issuance(tx, command),
    };

    if let Err(violation) = &result {
        tracing::debug!(
            command = %command.command,
            %violation,
            "Contract rejected transition"
        );
    }
    result
}
