//! Endpoint failover behavior against unroutable endpoints.

use alloy::primitives::{address, Address, Bytes};
use crossway::{
    batch::{BatchAggregator, Call},
    config::{AccessConfig, ChainConfig, ResolverConfig, SessionConfig},
    error::{BatchError, ConfigError, SessionError},
    registry::SessionRegistry,
    session::ChainSession,
};
use std::sync::Arc;

const TARGET: Address = address!("00000000000000000000000000000000000000aa");

/// Endpoints on reserved localhost ports: connections are refused
/// immediately, which classifies as a transport failure.
fn unroutable_chain(endpoints: usize) -> ChainConfig {
    ChainConfig::new(
        (0..endpoints).map(|i| format!("http://127.0.0.1:{}", i + 1).parse().unwrap()).collect(),
        888,
        2153201998,
    )
}

fn fast_session() -> SessionConfig {
    SessionConfig { rotation_delay_ms: 1, ..SessionConfig::default() }
}

fn registry_with(chains: Vec<(&str, ChainConfig)>) -> Arc<SessionRegistry> {
    let config = AccessConfig {
        chains: chains.into_iter().map(|(name, chain)| (name.to_string(), chain)).collect(),
        resolver: ResolverConfig {
            hub_chain: "Wanchain".to_string(),
            fee_schedule: address!("00000000000000000000000000000000000000fe"),
        },
        session: fast_session(),
        quote_service: None,
    };
    Arc::new(SessionRegistry::new(config))
}

#[tokio::test]
async fn read_attempts_twice_per_endpoint_before_giving_up() {
    let chain = unroutable_chain(3);
    let session = ChainSession::new("Wanchain", &chain, fast_session()).unwrap();

    let err = session.read_call(TARGET, Bytes::new()).await.unwrap_err();
    match err {
        SessionError::AllEndpointsExhausted { attempts, last } => {
            assert_eq!(attempts, 6);
            assert!(!last.is_empty());
        }
        other => panic!("expected AllEndpointsExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn single_endpoint_still_attempts_twice() {
    let chain = unroutable_chain(1);
    let session = ChainSession::new("Wanchain", &chain, fast_session()).unwrap();

    let err = session.read_call(TARGET, Bytes::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::AllEndpointsExhausted { attempts: 2, .. }));
}

#[tokio::test]
async fn session_remains_usable_after_exhaustion() {
    let chain = unroutable_chain(2);
    let session = ChainSession::new("Wanchain", &chain, fast_session()).unwrap();

    let first = session.read_call(TARGET, Bytes::new()).await.unwrap_err();
    assert!(matches!(first, SessionError::AllEndpointsExhausted { .. }));

    // the session does not latch into a failed state; the next call runs the
    // same bounded retry loop
    let second = session.read_call(TARGET, Bytes::new()).await.unwrap_err();
    assert!(matches!(second, SessionError::AllEndpointsExhausted { attempts: 4, .. }));
}

#[tokio::test]
async fn empty_batch_short_circuits_without_configuration() {
    // no chains configured at all: an empty call list must not touch config
    // or the network
    let registry = registry_with(vec![]);
    let batch = BatchAggregator::new(registry);

    let outcome = batch.run_batch("Nowhere", &[], 100).await.unwrap();
    assert_eq!(outcome.block_number, 0);
    assert!(outcome.results.is_empty());

    let batch = BatchAggregator::new(registry_with(vec![]));
    let outcome = batch.run_batch_with_retry("Nowhere", &[], 3).await.unwrap();
    assert_eq!(outcome.block_number, 0);
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn missing_aggregator_fails_before_any_network_call() {
    let registry = registry_with(vec![("Wanchain", unroutable_chain(2))]);
    let batch = BatchAggregator::new(registry);

    let calls = vec![Call::scalar(TARGET, Bytes::new())];
    let err = batch.run_batch("Wanchain", &calls, 100).await.unwrap_err();
    assert!(matches!(err, BatchError::Config(ConfigError::MissingAggregator(_))));

    // configuration errors abort the retry loop immediately as well
    let registry = registry_with(vec![("Wanchain", unroutable_chain(2))]);
    let batch = BatchAggregator::new(registry);
    let err = batch.run_batch_with_retry("Wanchain", &calls, 3).await.unwrap_err();
    assert!(matches!(err, BatchError::Config(ConfigError::MissingAggregator(_))));
}

#[tokio::test]
async fn unknown_chain_is_fatal_for_non_empty_batches() {
    let registry = registry_with(vec![]);
    let batch = BatchAggregator::new(registry);

    let calls = vec![Call::raw(TARGET, Bytes::new())];
    let err = batch.run_batch("Atlantis", &calls, 100).await.unwrap_err();
    assert!(matches!(err, BatchError::Config(ConfigError::UnknownChain(_))));
}

#[tokio::test]
async fn batch_groups_are_retried_and_exhausted() {
    // aggregator configured but endpoints unroutable: every group fails with
    // a transport exhaustion, and the retry wrapper reports the attempt count
    let chain = unroutable_chain(1)
        .with_aggregator(address!("00000000000000000000000000000000000000cc"));
    let registry = registry_with(vec![("Wanchain", chain)]);
    let batch = BatchAggregator::new(registry);

    let calls = vec![Call::scalar(TARGET, Bytes::new())];
    let err = batch.run_batch_with_retry("Wanchain", &calls, 1).await.unwrap_err();
    match err {
        BatchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 1);
            assert!(last.contains("group 0"));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn write_requires_a_credential() {
    let registry = registry_with(vec![("Wanchain", unroutable_chain(1))]);
    let session = registry.get_or_create("Wanchain").await.unwrap();

    let err = session
        .write_call(TARGET, Bytes::new(), Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::MissingCredential(_)));
}

#[tokio::test]
async fn sessions_rotate_through_all_endpoints() {
    let chain = unroutable_chain(2);
    let session = ChainSession::new("Wanchain", &chain, fast_session()).unwrap();
    assert_eq!(session.current_endpoint().await.as_str(), "http://127.0.0.1:1/");

    let _ = session.read_call(TARGET, Bytes::new()).await;
    // 4 attempts with 3 rotations in between: 0 -> 1 -> 0 -> 1
    assert_eq!(session.current_endpoint().await.as_str(), "http://127.0.0.1:2/");
}
