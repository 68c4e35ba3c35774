//! Read-side integration: indexer over HTTP, registry, bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use ledger_sync::bus::DataBus;
use ledger_sync::config::IndexerConfig;
use ledger_sync::domain::{DomainType, StreamState, TokenBalance, TransferDirection};
use ledger_sync::error::{SyncError, SyncResult};
use ledger_sync::ledger::{BalanceSource, IndexerClient};
use ledger_sync::services::{DataServiceRegistry, DataSources, RegistrySettings};

mod common;

struct StaticBalances;

impl BalanceSource for StaticBalances {
    fn balances(&self) -> BoxFuture<'_, SyncResult<Vec<TokenBalance>>> {
        async {
            Ok(vec![TokenBalance {
                symbol: "ETH".into(),
                token: None,
                decimals: 18,
                balance: U256::from(42u64),
            }])
        }
        .boxed()
    }
}

#[derive(Default)]
struct Hits {
    transfers: AtomicUsize,
    streams: AtomicUsize,
}

async fn registry_against(streams_status: u16) -> (Arc<DataServiceRegistry>, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let counter = Arc::clone(&hits);
    let addr = common::start_json_backend(move |path| {
        if path.ends_with("/transfers") {
            counter.transfers.fetch_add(1, Ordering::SeqCst);
            (200, common::transfers_body())
        } else if path.ends_with("/streams") {
            counter.streams.fetch_add(1, Ordering::SeqCst);
            if streams_status == 200 {
                (200, common::streams_body())
            } else {
                (streams_status, "{\"error\":\"unavailable\"}".to_string())
            }
        } else {
            (404, "{}".to_string())
        }
    })
    .await;

    let owner: Address = common::OWNER.parse().unwrap();
    let indexer = Arc::new(
        IndexerClient::new(
            &IndexerConfig {
                base_url: format!("http://{addr}"),
                request_timeout_secs: 5,
            },
            owner,
        )
        .unwrap(),
    );

    let registry = DataServiceRegistry::new(
        DataSources {
            balances: Arc::new(StaticBalances),
            transfers: indexer.clone(),
            streams: indexer,
        },
        DataBus::new(),
        RegistrySettings::default(),
    );
    (Arc::new(registry), hits)
}

#[tokio::test]
async fn test_refresh_all_publishes_every_domain() {
    let (registry, _hits) = registry_against(200).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = registry.bus().subscribe(DomainType::Transfers, move |snapshot| {
        sink.lock().unwrap().push(snapshot.len());
    });

    let report = registry.refresh_all().await;
    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(*seen.lock().unwrap(), vec![2]);

    let transfers = registry.snapshot(DomainType::Transfers).unwrap();
    let transfers = transfers.as_transfers().unwrap();
    assert_eq!(transfers.items[0].id, "t-new");
    assert_eq!(transfers.items[0].direction, TransferDirection::Outgoing);
    assert_eq!(transfers.items[1].direction, TransferDirection::Incoming);

    let streams = registry.bus().latest(DomainType::Streams).unwrap();
    let stream = &streams.as_streams().unwrap().items[0];
    assert_eq!(stream.state, StreamState::Completed);
    assert_eq!(stream.claimable(), U256::from(900u64));

    let tokens = registry.snapshot(DomainType::Tokens).unwrap();
    assert_eq!(tokens.as_tokens().unwrap().items[0].balance, U256::from(42u64));
}

#[tokio::test]
async fn test_failing_domain_does_not_block_others() {
    let (registry, _hits) = registry_against(503).await;

    let report = registry.refresh_all().await;
    assert_eq!(report.succeeded(), vec![DomainType::Tokens, DomainType::Transfers]);
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, DomainType::Streams);
    assert!(matches!(failures[0].1, SyncError::Network(msg) if msg.contains("503")));

    assert!(registry.bus().latest(DomainType::Streams).is_none());
    assert!(registry.bus().latest(DomainType::Transfers).is_some());
}

#[tokio::test]
async fn test_missing_account_maps_to_not_found() {
    let (registry, _hits) = registry_against(404).await;
    let err = registry.refresh(DomainType::Streams).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn test_rate_limit_and_forced_refresh() {
    let (registry, hits) = registry_against(200).await;

    registry.refresh(DomainType::Transfers).await.unwrap();
    registry.refresh(DomainType::Transfers).await.unwrap();
    assert_eq!(hits.transfers.load(Ordering::SeqCst), 1);

    let report = registry.force_refresh_all().await;
    assert!(report.is_success());
    assert_eq!(hits.transfers.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reconnect_revalidates_observed_domains() {
    let (registry, hits) = registry_against(200).await;
    registry.refresh_all().await;
    assert_eq!(hits.streams.load(Ordering::SeqCst), 1);

    let _sub = registry.bus().subscribe(DomainType::Streams, |_| {});

    assert_eq!(registry.on_network_changed(true).await, None);
    assert_eq!(registry.on_network_changed(false).await, None);
    assert_eq!(registry.on_network_changed(true).await, Some(1));

    assert_eq!(hits.streams.load(Ordering::SeqCst), 2);
    assert_eq!(hits.transfers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_background_polling_lifecycle() {
    let (registry, hits) = registry_against(200).await;

    registry.initialize();
    registry.initialize();
    assert_eq!(registry.active_tasks(), 4);

    // First tick is immediate.
    for _ in 0..50 {
        if hits.transfers.load(Ordering::SeqCst) > 0 && hits.streams.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(hits.transfers.load(Ordering::SeqCst), 1);

    registry.shutdown().await;
    assert_eq!(registry.active_tasks(), 0);
    assert!(registry.is_shut_down());
}
