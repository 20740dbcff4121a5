mod common;

use std::sync::Arc;
use std::time::Duration;

use house_wallet_core::registry::{BASE, OPTIMISM};
use house_wallet_core::{
    BalanceAggregator, PriceFeedOptions, PriceSource, RefreshOutcome, TransferIntent,
    WalletError,
};

use common::{
    contract, ether, other_wallet, owner, test_registry, usdc, FakePrices, FakeRpc,
    RecordingSigner, BASE_RPC, OPTIMISM_RPC, RECIPIENT,
};

type TestAggregator = BalanceAggregator<FakeRpc, FakePrices>;

fn aggregator(rpc: &Arc<FakeRpc>, prices: &Arc<FakePrices>) -> TestAggregator {
    BalanceAggregator::new(
        test_registry(),
        Arc::clone(rpc),
        Arc::clone(prices),
        PriceFeedOptions::default(),
    )
}

fn funded_rpc() -> Arc<FakeRpc> {
    let registry = test_registry();
    let rpc = FakeRpc::default();
    rpc.set_native(owner(), ether(2));
    rpc.set_token(contract(&registry, OPTIMISM, "USDC"), owner(), usdc(150));
    rpc.set_token(contract(&registry, OPTIMISM, "PAPAYOS"), owner(), ether(40));
    rpc.set_token(contract(&registry, BASE, "USDC"), owner(), usdc(5));
    Arc::new(rpc)
}

#[tokio::test]
async fn refresh_without_selection_is_an_error() {
    let agg = aggregator(&funded_rpc(), &Arc::new(FakePrices::default()));
    assert_eq!(
        agg.refresh().await.expect_err("nothing selected"),
        WalletError::NoActiveWallet
    );
}

#[tokio::test]
async fn unsupported_chain_is_rejected_at_selection() {
    let agg = aggregator(&funded_rpc(), &Arc::new(FakePrices::default()));
    agg.select(owner(), OPTIMISM).expect("optimism");

    let err = agg.select(owner(), 999_999).expect_err("unknown chain");

    assert_eq!(err, WalletError::UnsupportedChain(999_999));
    assert_eq!(
        agg.selection().map(|s| s.chain_id),
        Some(OPTIMISM),
        "invalid request must not replace the selection"
    );
}

#[tokio::test]
async fn valued_sheet_flags_tokens_without_quotes() {
    let rpc = funded_rpc();
    let prices = Arc::new(FakePrices::default());
    let agg = aggregator(&rpc, &prices);
    agg.select(owner(), OPTIMISM).expect("select");

    let outcome = agg.refresh().await.expect("refresh");
    let RefreshOutcome::Applied(sheet) = outcome else {
        panic!("refresh for the active pair must apply");
    };

    let eth = sheet.get("ETH").expect("eth");
    assert_eq!(eth.usd_value, 4000.0);
    assert!(!eth.price_unavailable);

    let papayos = sheet.get("PAPAYOS").expect("papayos");
    assert!(papayos.price_unavailable);
    assert_eq!(papayos.usd_value, 0.0);
    assert_eq!(papayos.usd_price, None);
    assert_eq!(papayos.balance, "40");

    assert_eq!(sheet.total_usd, 4150.0);
    assert_eq!(sheet.price_source, PriceSource::Live);
    assert!(!sheet.prices_stale);
    assert_eq!(agg.valued_balance_sheet(), Some(sheet));

    let view = agg.view();
    assert!(!view.loading);
    assert!(view.error.is_none());
}

#[tokio::test]
async fn price_outage_keeps_balances_and_marks_them_stale() {
    let rpc = funded_rpc();
    let prices = Arc::new(FakePrices::default());
    prices.set_failing(true);
    let agg = aggregator(&rpc, &prices);
    agg.select(owner(), OPTIMISM).expect("select");

    agg.refresh().await.expect("refresh");

    let view = agg.view();
    let sheet = view.sheet.expect("sheet");
    assert_eq!(sheet.price_source, PriceSource::Fallback);
    assert!(sheet.prices_stale);
    assert!(sheet.is_degraded());
    assert_eq!(sheet.get("USDC").expect("usdc").balance, "150");
    assert!(view.price_warning.is_some());
}

#[tokio::test]
async fn late_result_for_previous_chain_is_discarded() {
    let rpc = funded_rpc();
    let prices = Arc::new(FakePrices::default());
    let agg = aggregator(&rpc, &prices);
    rpc.hold(OPTIMISM_RPC);

    let generation_a = agg.select(owner(), OPTIMISM).expect("select A");
    let slow = tokio::spawn({
        let agg = agg.clone();
        async move { agg.refresh().await }
    });
    while rpc.calls_to(OPTIMISM_RPC) == 0 {
        tokio::task::yield_now().await;
    }

    let generation_b = agg.select(owner(), BASE).expect("select B");
    assert!(generation_b > generation_a);
    assert!(agg.view().sheet.is_none(), "switch clears the old sheet");

    let fast = agg.refresh().await.expect("refresh B");
    assert!(matches!(fast, RefreshOutcome::Applied(ref s) if s.chain_id == BASE));

    rpc.release(OPTIMISM_RPC);
    let late = slow.await.expect("join").expect("refresh A");
    assert_eq!(late, RefreshOutcome::Discarded);

    let view = agg.view();
    let sheet = view.sheet.expect("sheet");
    assert_eq!(sheet.chain_id, BASE);
    assert_eq!(sheet.generation, generation_b);
    assert_eq!(sheet.get("USDC").expect("usdc").balance, "5");
    assert!(sheet.get("PAPAYOS").is_none());
}

#[tokio::test]
async fn concurrent_refreshes_share_one_fetch_per_source() {
    let rpc = funded_rpc();
    let prices = Arc::new(FakePrices::held());
    let agg = aggregator(&rpc, &prices);
    agg.select(owner(), OPTIMISM).expect("select");
    rpc.hold(OPTIMISM_RPC);

    let (a, b, c, _) = tokio::join!(agg.refresh(), agg.refresh(), agg.refresh(), async {
        tokio::task::yield_now().await;
        rpc.release(OPTIMISM_RPC);
        prices.release();
    });

    let a = a.expect("a");
    assert_eq!(a, b.expect("b"));
    assert_eq!(a, c.expect("c"));
    assert_eq!(prices.calls(), 1);
    // One native read plus one balanceOf per token.
    assert_eq!(rpc.calls_to(OPTIMISM_RPC), 3);
}

#[tokio::test]
async fn disconnect_clears_the_view() {
    let rpc = funded_rpc();
    let agg = aggregator(&rpc, &Arc::new(FakePrices::default()));
    let before = agg.select(owner(), OPTIMISM).expect("select");
    agg.refresh().await.expect("refresh");

    agg.disconnect();

    let view = agg.view();
    assert!(view.selection.is_none());
    assert!(view.sheet.is_none());
    assert!(view.generation > before);
    assert_eq!(agg.refresh().await.expect_err("gone"), WalletError::NoActiveWallet);
}

#[tokio::test]
async fn reselecting_the_same_pair_keeps_the_sheet() {
    let rpc = funded_rpc();
    let agg = aggregator(&rpc, &Arc::new(FakePrices::default()));
    let generation = agg.select(owner(), OPTIMISM).expect("select");
    agg.refresh().await.expect("refresh");

    assert_eq!(agg.select(owner(), OPTIMISM).expect("again"), generation);
    assert!(agg.view().sheet.is_some());

    agg.select(other_wallet(), OPTIMISM).expect("other wallet");
    assert!(agg.view().sheet.is_none());
}

#[tokio::test]
async fn chain_wide_failure_is_recorded_in_the_view() {
    let registry = test_registry();
    let rpc = Arc::new(FakeRpc::default());
    rpc.fail_native();
    rpc.fail_contract(contract(&registry, BASE, "USDC"));
    let agg = aggregator(&rpc, &Arc::new(FakePrices::default()));
    agg.select(owner(), BASE).expect("select");

    let err = agg.refresh().await.expect_err("all reads failed");

    assert_eq!(err, WalletError::Rpc("Base".to_owned()));
    let view = agg.view();
    assert_eq!(
        view.error.as_deref(),
        Some("failed to fetch balances on Base network")
    );
    assert!(!view.loading);
    assert!(view.sheet.is_none());
    assert_eq!(rpc.calls_to(BASE_RPC), 2);
}

#[tokio::test]
async fn transfer_checks_the_held_balance_and_refreshes() {
    let rpc = funded_rpc();
    let prices = Arc::new(FakePrices::default());
    let agg = aggregator(&rpc, &prices);
    agg.select(owner(), OPTIMISM).expect("select");
    agg.refresh().await.expect("refresh");
    let reads_before = rpc.calls_to(OPTIMISM_RPC);
    let signer = RecordingSigner::on_chain(OPTIMISM);

    let too_much = TransferIntent {
        from: owner(),
        to: RECIPIENT.to_owned(),
        symbol: "USDC".to_owned(),
        amount: "150.000001".to_owned(),
        chain_id: OPTIMISM,
    };
    let err = agg.transfer(&too_much, &signer).await.expect_err("over");
    assert!(matches!(err, WalletError::InsufficientBalance { .. }));
    assert_eq!(rpc.calls_to(OPTIMISM_RPC), reads_before, "sheet balance reused");

    let ok = TransferIntent {
        amount: "150".to_owned(),
        ..too_much
    };
    let receipt = agg.transfer(&ok, &signer).await.expect("sent");
    assert_eq!(receipt.chain_id, OPTIMISM);
    assert_eq!(signer.sent().len(), 1);

    // joins the refresh the transfer started
    agg.refresh().await.expect("refresh");
    assert_eq!(rpc.calls_to(OPTIMISM_RPC), reads_before + 3, "refreshed after send");
}

#[tokio::test]
async fn transfer_receipt_does_not_wait_for_the_refresh() {
    let rpc = funded_rpc();
    let agg = aggregator(&rpc, &Arc::new(FakePrices::default()));
    agg.select(owner(), OPTIMISM).expect("select");
    agg.refresh().await.expect("refresh");
    rpc.hold(OPTIMISM_RPC);
    let signer = RecordingSigner::on_chain(OPTIMISM);

    let intent = TransferIntent {
        from: owner(),
        to: RECIPIENT.to_owned(),
        symbol: "ETH".to_owned(),
        amount: "1".to_owned(),
        chain_id: OPTIMISM,
    };
    let receipt = tokio::time::timeout(
        Duration::from_millis(500),
        agg.transfer(&intent, &signer),
    )
    .await
    .expect("receipt returned while the node is stalled")
    .expect("sent");

    assert_eq!(signer.sent().len(), 1);
    assert_eq!(receipt.chain_id, OPTIMISM);
    assert!(agg.view().loading, "refresh still running");

    rpc.release(OPTIMISM_RPC);
    let outcome = agg.refresh().await.expect("refresh");
    assert!(matches!(outcome, RefreshOutcome::Applied(_)));
    assert!(!agg.view().loading);
}

#[tokio::test]
async fn transfer_for_another_wallet_reads_its_balance() {
    let rpc = funded_rpc();
    let agg = aggregator(&rpc, &Arc::new(FakePrices::default()));
    let signer = RecordingSigner::on_chain(BASE);

    let intent = TransferIntent {
        from: owner(),
        to: RECIPIENT.to_owned(),
        symbol: "ETH".to_owned(),
        amount: "2".to_owned(),
        chain_id: BASE,
    };
    agg.transfer(&intent, &signer).await.expect("sent");

    assert_eq!(rpc.calls_to(BASE_RPC), 2);
    assert_eq!(signer.sent()[0].value, Some(ether(2)));
    assert!(agg.view().sheet.is_none(), "no active pair to refresh");
}
