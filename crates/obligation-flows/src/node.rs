//! A party's runtime: identity, vault, network endpoint and notary client.
//!
//! Starting a node registers its inbox on the network and spawns the
//! responder task. Dropping the node stops the task.

use std::sync::Arc;

use obligation_types::{
    Amount, FinalizedTransition, NodeConfig, ObligationId, PartyId, PartyIdentity, Result,
};
use obligation_vault::Vault;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::builder::SettleRequest;
use crate::finality::FlowContext;
use crate::network::LocalNetwork;
use crate::notary::NotaryClient;
use crate::responder::Responder;
use crate::settle::SettleFlow;
use crate::{issue, transfer};

pub struct Node {
    name: String,
    ctx: FlowContext,
    responder: JoinHandle<()>,
}

impl Node {
    /// Validate `config`, join `network` and start serving requests.
    pub async fn start(
        config: NodeConfig,
        identity: PartyIdentity,
        network: &LocalNetwork,
        notary: Arc<dyn NotaryClient>,
    ) -> Result<Self> {
        config.validate()?;
        let identity = Arc::new(identity);
        let party = identity.party();
        let vault = Arc::new(Mutex::new(Vault::new(party, &config.vault)));

        let inbox = network.register(party, config.inbox_capacity).await;
        let responder = Responder::new(Arc::clone(&identity), Arc::clone(&vault));
        let responder = tokio::spawn(responder.run(inbox));

        tracing::info!(node = %config.name, %party, notary = %notary.party(), "Node started");
        Ok(Self {
            name: config.name,
            ctx: FlowContext {
                identity,
                vault,
                counterparties: Arc::new(network.clone()),
                notary,
                config: config.flow,
            },
            responder,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn party(&self) -> PartyId {
        self.ctx.party()
    }

    #[must_use]
    pub fn vault(&self) -> &Arc<Mutex<Vault>> {
        &self.ctx.vault
    }

    /// Issue an obligation this node is lender or borrower of.
    pub async fn issue_obligation(
        &self,
        amount: Amount,
        lender: PartyId,
        borrower: PartyId,
    ) -> Result<FinalizedTransition> {
        issue::issue_obligation(&self.ctx, amount, lender, borrower).await
    }

    /// Issue tokens to this node, one per amount.
    pub async fn issue_tokens(&self, amounts: &[Amount]) -> Result<FinalizedTransition> {
        issue::issue_tokens(&self.ctx, amounts).await
    }

    /// Pay `amount` towards `obligation`. This node must be the borrower.
    pub async fn settle(
        &self,
        obligation: ObligationId,
        amount: Amount,
    ) -> Result<FinalizedTransition> {
        SettleFlow::new(&self.ctx, SettleRequest::new(obligation, amount))
            .run()
            .await
    }

    /// Move `obligation` to `new_lender`. This node must be the lender.
    pub async fn transfer(
        &self,
        obligation: ObligationId,
        new_lender: PartyId,
    ) -> Result<FinalizedTransition> {
        transfer::transfer_obligation(&self.ctx, obligation, new_lender).await
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.responder.abort();
    }
}
