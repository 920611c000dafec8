//! End-to-end protocol tests across several nodes on one in-process network.
//!
//! Every node runs its own responder task; the notary is a shared
//! `SimpleNotary` unless a test swaps in a stalled one.

use std::sync::Arc;

use async_trait::async_trait;
use obligation_flows::{LocalNetwork, Node, NotaryClient, NotaryResponse, SimpleNotary};
use obligation_types::*;
use obligation_vault::RecordOutcome;
use rust_decimal::Decimal;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

struct Network {
    network: LocalNetwork,
    notary: Arc<SimpleNotary>,
}

impl Network {
    fn new() -> Self {
        Self {
            network: LocalNetwork::new(),
            notary: Arc::new(SimpleNotary::new(PartyIdentity::from_seed(
                "Notary",
                [9u8; 32],
            ))),
        }
    }

    async fn node(&self, name: &str, seed: u8) -> Node {
        Node::start(
            NodeConfig::named(name),
            PartyIdentity::from_seed(name, [seed; 32]),
            &self.network,
            self.notary.clone(),
        )
        .await
        .unwrap()
    }
}

fn obligation_id(finalized: &FinalizedTransition) -> ObligationId {
    finalized
        .tx()
        .produced_obligation
        .as_ref()
        .expect("issuance produces an obligation")
        .linear_id
}

/// Lender and borrower nodes sharing a 10 GBP obligation; the borrower
/// holds tokens of the given amounts.
async fn lender_and_borrower(net: &Network, cash: &[i64]) -> (Node, Node, ObligationId) {
    let lender = net.node("Lender", 1).await;
    let borrower = net.node("Borrower", 2).await;
    let issued = lender
        .issue_obligation(Amount::pounds(10), lender.party(), borrower.party())
        .await
        .unwrap();
    if !cash.is_empty() {
        let amounts: Vec<_> = cash.iter().map(|a| Amount::pounds(*a)).collect();
        borrower.issue_tokens(&amounts).await.unwrap();
    }
    (lender, borrower, obligation_id(&issued))
}

async fn paid(node: &Node, id: ObligationId) -> Option<Amount> {
    node.vault()
        .lock()
        .await
        .lookup_obligation(id)
        .ok()
        .map(|held| held.state.paid.clone())
}

async fn balance(node: &Node) -> Decimal {
    node.vault().lock().await.balance("GBP")
}

#[tokio::test]
async fn issuance_reaches_both_vaults() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[]).await;

    for node in [&lender, &borrower] {
        let vault = node.vault().lock().await;
        let held = vault.lookup_obligation(id).unwrap();
        assert_eq!(held.state.amount, Amount::pounds(10));
        assert_eq!(held.state.lender, lender.party());
        assert_eq!(held.state.borrower, borrower.party());
    }
}

#[tokio::test]
async fn partial_settlement_records_paid_amount() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[5]).await;

    let finalized = borrower.settle(id, Amount::pounds(5)).await.unwrap();

    let tx = finalized.tx();
    assert_eq!(
        tx.consumed_obligation.as_ref().unwrap().state.paid,
        Amount::pounds(0)
    );
    assert_eq!(
        tx.produced_obligation.as_ref().unwrap().paid,
        Amount::pounds(5)
    );
    assert!(finalized.verify().is_ok());

    assert_eq!(paid(&lender, id).await, Some(Amount::pounds(5)));
    assert_eq!(paid(&borrower, id).await, Some(Amount::pounds(5)));
    assert_eq!(balance(&lender).await, Decimal::new(5, 0));
    assert_eq!(balance(&borrower).await, Decimal::ZERO);
}

#[tokio::test]
async fn settlement_with_change_conserves_tokens() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[2, 6]).await;

    let finalized = borrower.settle(id, Amount::pounds(3)).await.unwrap();

    let tx = finalized.tx();
    assert_eq!(tx.consumed_token_total(), Decimal::new(8, 0));
    assert_eq!(tx.produced_total_for(&lender.party()), Decimal::new(3, 0));
    assert_eq!(tx.produced_total_for(&borrower.party()), Decimal::new(5, 0));
    assert_eq!(balance(&lender).await + balance(&borrower).await, Decimal::new(8, 0));
}

#[tokio::test]
async fn full_settlement_removes_obligation() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[4, 6]).await;

    borrower.settle(id, Amount::pounds(3)).await.unwrap();
    let finalized = borrower.settle(id, Amount::pounds(7)).await.unwrap();

    assert!(finalized.tx().produced_obligation.is_none());
    assert_eq!(paid(&lender, id).await, None);
    assert_eq!(paid(&borrower, id).await, None);
    assert_eq!(balance(&lender).await, Decimal::new(10, 0));

    let err = borrower.settle(id, Amount::pounds(1)).await.unwrap_err();
    assert!(matches!(err, ObligationError::ObligationNotFound(missing) if missing == id));
}

#[tokio::test]
async fn lender_cannot_initiate_settlement() {
    init_tracing();
    let net = Network::new();
    let (lender, _borrower, id) = lender_and_borrower(&net, &[5]).await;

    let sent_before = net.network.messages_sent();
    let err = lender.settle(id, Amount::pounds(5)).await.unwrap_err();

    assert!(
        matches!(err, ObligationError::UnauthorizedInitiator { caller, .. } if caller == lender.party()),
        "got {err:?}"
    );
    assert_eq!(net.network.messages_sent(), sent_before);
    assert_eq!(paid(&lender, id).await, Some(Amount::pounds(0)));
}

#[tokio::test]
async fn settlement_without_tokens_fails() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[]).await;

    let sent_before = net.network.messages_sent();
    let err = borrower.settle(id, Amount::pounds(5)).await.unwrap_err();

    assert!(
        matches!(&err, ObligationError::InsufficientFunds { currency, available, .. }
            if currency == "GBP" && *available == Decimal::ZERO),
        "got {err:?}"
    );
    assert_eq!(net.network.messages_sent(), sent_before);
    assert_eq!(paid(&lender, id).await, Some(Amount::pounds(0)));
}

#[tokio::test]
async fn overpayment_rejected() {
    init_tracing();
    let net = Network::new();
    let (_lender, borrower, id) = lender_and_borrower(&net, &[20]).await;

    let err = borrower.settle(id, Amount::pounds(11)).await.unwrap_err();
    assert!(matches!(err, ObligationError::Overpayment { .. }), "got {err:?}");
    assert_eq!(borrower.vault().lock().await.locked_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_settlements_one_wins() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[5, 5]).await;

    let (first, second) = tokio::join!(
        borrower.settle(id, Amount::pounds(5)),
        borrower.settle(id, Amount::pounds(5)),
    );

    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        (first, second) => panic!("expected one winner, got {first:?} and {second:?}"),
    };
    assert!(
        matches!(loser, ObligationError::NotarizationConflict { ref conflicting } if !conflicting.is_empty()),
        "got {loser:?}"
    );

    // Both vaults show the winner's version and nothing of the loser's.
    let winning_ref = StateRef::new(winner.id(), 0);
    for node in [&lender, &borrower] {
        let vault = node.vault().lock().await;
        let held = vault.lookup_obligation(id).unwrap();
        assert_eq!(held.state_ref, winning_ref);
        assert_eq!(held.state.paid, Amount::pounds(5));
    }
    let vault = borrower.vault().lock().await;
    assert_eq!(vault.locked_count(), 0);
    assert_eq!(vault.spendable_tokens(borrower.party(), "GBP").len(), 1);
    assert_eq!(vault.balance("GBP"), Decimal::new(5, 0));
}

#[tokio::test]
async fn rejected_countersignature_changes_nothing() {
    init_tracing();
    let net = Network::new();
    let lender = net.node("Lender", 1).await;
    let borrower = net.node("Borrower", 2).await;

    // Both hold the same obligation, but under different refs.
    let obligation = Obligation::issue(Amount::pounds(10), lender.party(), borrower.party());
    let id = obligation.linear_id;
    for node in [&lender, &borrower] {
        let mut issuance = ProposedTransition::new(net.notary.party());
        issuance.produced_obligation = Some(obligation.clone());
        issuance.commands = vec![CommandWithSigners::new(
            Command::Issue,
            vec![lender.party(), borrower.party()],
        )];
        let mut vault = node.vault().lock().await;
        vault
            .record_finalized(&FinalizedTransition::dummy(issuance))
            .unwrap();
    }
    borrower.issue_tokens(&[Amount::pounds(5)]).await.unwrap();
    let lender_ref = lender.vault().lock().await.lookup_obligation(id).unwrap().state_ref;
    let borrower_ref = borrower.vault().lock().await.lookup_obligation(id).unwrap().state_ref;
    let committed_before = net.notary.committed_count().await;

    let err = borrower.settle(id, Amount::pounds(5)).await.unwrap_err();
    assert!(
        matches!(&err, ObligationError::CounterpartyRejected { party, reason }
            if *party == lender.party() && reason.starts_with("OB_ERR_104")),
        "got {err:?}"
    );

    assert_eq!(net.notary.committed_count().await, committed_before);
    let vault = borrower.vault().lock().await;
    assert_eq!(vault.locked_count(), 0);
    assert_eq!(vault.balance("GBP"), Decimal::new(5, 0));
    assert_eq!(vault.spendable_tokens(borrower.party(), "GBP").len(), 1);
    let held = vault.lookup_obligation(id).unwrap();
    assert_eq!(held.state_ref, borrower_ref);
    assert_eq!(held.state.paid, Amount::pounds(0));
    drop(vault);
    let vault = lender.vault().lock().await;
    assert_eq!(vault.lookup_obligation(id).unwrap().state_ref, lender_ref);
    assert_eq!(vault.balance("GBP"), Decimal::ZERO);
}

#[tokio::test]
async fn recording_twice_changes_nothing() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[5]).await;
    let finalized = borrower.settle(id, Amount::pounds(5)).await.unwrap();

    for node in [&lender, &borrower] {
        let mut vault = node.vault().lock().await;
        let recorded = vault.recorded_count();
        assert_eq!(
            vault.record_finalized(&finalized).unwrap(),
            RecordOutcome::AlreadyRecorded
        );
        assert_eq!(vault.recorded_count(), recorded);
    }
    assert_eq!(paid(&lender, id).await, Some(Amount::pounds(5)));
    assert_eq!(balance(&lender).await, Decimal::new(5, 0));
}

#[tokio::test]
async fn transfer_moves_obligation_to_new_lender() {
    init_tracing();
    let net = Network::new();
    let (lender, borrower, id) = lender_and_borrower(&net, &[5]).await;
    let new_lender = net.node("NewLender", 3).await;

    borrower
        .transfer(id, new_lender.party())
        .await
        .expect_err("only the lender may transfer");
    lender.transfer(id, new_lender.party()).await.unwrap();

    assert_eq!(paid(&lender, id).await, None);
    for node in [&borrower, &new_lender] {
        let vault = node.vault().lock().await;
        assert_eq!(
            vault.lookup_obligation(id).unwrap().state.lender,
            new_lender.party()
        );
    }

    // Payments now go to the new lender.
    borrower.settle(id, Amount::pounds(5)).await.unwrap();
    assert_eq!(balance(&new_lender).await, Decimal::new(5, 0));
    assert_eq!(balance(&lender).await, Decimal::ZERO);
    assert_eq!(paid(&new_lender, id).await, Some(Amount::pounds(5)));
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// A notary that never answers.
struct StalledNotary {
    party: PartyId,
}

#[async_trait]
impl NotaryClient for StalledNotary {
    fn party(&self) -> PartyId {
        self.party
    }

    async fn notarize(&self, _signed: &SignedTransition) -> Result<NotaryResponse> {
        std::future::pending().await
    }
}

/// Put a 10 GBP obligation and 5 GBP of borrower tokens straight into the
/// given vaults.
async fn seed(notary: PartyId, lender: PartyId, borrower: PartyId, nodes: &[&Node]) -> ObligationId {
    let mut issuance = ProposedTransition::new(notary);
    issuance.produced_obligation = Some(Obligation::issue(Amount::pounds(10), lender, borrower));
    issuance.commands = vec![CommandWithSigners::new(Command::Issue, vec![lender, borrower])];
    let mut cash = ProposedTransition::new(notary);
    cash.produced_tokens = vec![ValueToken::new(Amount::pounds(5), borrower)];
    cash.commands = vec![CommandWithSigners::new(Command::IssueTokens, vec![borrower])];

    let issuance = FinalizedTransition::dummy(issuance);
    let cash = FinalizedTransition::dummy(cash);
    for node in nodes {
        let mut vault = node.vault().lock().await;
        vault.record_finalized(&issuance).unwrap();
        vault.record_finalized(&cash).unwrap();
    }
    obligation_id(&issuance)
}

#[tokio::test]
async fn silent_counterparty_times_out() {
    init_tracing();
    let net = Network::new();
    let lender = PartyIdentity::from_seed("Lender", [1u8; 32]).party();
    // Registered but never read.
    let _silent_inbox = net.network.register(lender, 8).await;

    let mut config = NodeConfig::named("Borrower");
    config.flow.counterparty_timeout_ms = 100;
    let borrower = Node::start(
        config,
        PartyIdentity::from_seed("Borrower", [2u8; 32]),
        &net.network,
        net.notary.clone(),
    )
    .await
    .unwrap();
    let id = seed(net.notary.party(), lender, borrower.party(), &[&borrower]).await;

    let err = borrower.settle(id, Amount::pounds(5)).await.unwrap_err();
    assert!(
        matches!(
            err,
            ObligationError::Timeout {
                stage: ProtocolStage::CounterSignature
            }
        ),
        "got {err:?}"
    );

    let vault = borrower.vault().lock().await;
    assert_eq!(vault.lookup_obligation(id).unwrap().state.paid, Amount::pounds(0));
    assert_eq!(vault.balance("GBP"), Decimal::new(5, 0));
    assert_eq!(vault.locked_count(), 0);
    assert_eq!(net.notary.committed_count().await, 0);
}

#[tokio::test]
async fn stalled_notary_times_out_and_releases_locks() {
    init_tracing();
    let network = LocalNetwork::new();
    let notary: Arc<dyn NotaryClient> = Arc::new(StalledNotary {
        party: PartyId([9u8; 32]),
    });

    let lender = Node::start(
        NodeConfig::named("Lender"),
        PartyIdentity::from_seed("Lender", [1u8; 32]),
        &network,
        notary.clone(),
    )
    .await
    .unwrap();
    let mut config = NodeConfig::named("Borrower");
    config.flow.notary_timeout_ms = 100;
    let borrower = Node::start(
        config,
        PartyIdentity::from_seed("Borrower", [2u8; 32]),
        &network,
        notary.clone(),
    )
    .await
    .unwrap();
    let id = seed(notary.party(), lender.party(), borrower.party(), &[&lender, &borrower]).await;

    let err = borrower.settle(id, Amount::pounds(5)).await.unwrap_err();
    assert!(
        matches!(
            err,
            ObligationError::Timeout {
                stage: ProtocolStage::Notarization
            }
        ),
        "got {err:?}"
    );

    for node in [&lender, &borrower] {
        let vault = node.vault().lock().await;
        assert_eq!(vault.lookup_obligation(id).unwrap().state.paid, Amount::pounds(0));
        assert_eq!(vault.locked_count(), 0);
    }
    assert_eq!(
        borrower
            .vault()
            .lock()
            .await
            .spendable_tokens(borrower.party(), "GBP")
            .len(),
        1
    );
}

#[tokio::test]
async fn node_rejects_invalid_config() {
    let net = Network::new();
    let mut config = NodeConfig::named("Broken");
    config.flow.notary_timeout_ms = 0;
    let err = Node::start(
        config,
        PartyIdentity::from_seed("Broken", [4u8; 32]),
        &net.network,
        net.notary.clone(),
    )
    .await
    .err()
    .expect("zero timeout must be rejected");
    assert!(matches!(err, ObligationError::Configuration(_)));
}
