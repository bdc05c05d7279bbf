//! Cascading fee resolution.
//!
//! Given a trading route, the resolver expands an ordered list of candidate
//! lookup keys (most specific to least specific), deduplicates them by request
//! id, drives batched lookups against the chains hosting the fee contracts,
//! and reports every candidate that decoded to a configured value. Precedence
//! is applied on top of that report: the engine resolves and reports, the
//! caller (or [`FeeResolver::resolve_fees`]) picks the first non-empty key in
//! declared order.

use crate::{
    batch::{BatchAggregator, Call},
    constants::DEFAULT_BATCH_RETRIES,
    error::{ConfigError, FeeError},
    metrics::FeeMetrics,
    registry::SessionRegistry,
    types::{AgentFee, IBridge, IFeeSchedule},
};
use alloy::{primitives::U256, sol_types::SolCall};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{instrument, warn};

/// A trading route: asset symbol plus source and destination chain ids (the
/// SLIP-44 derived ids used by the fee contracts), and the token-pair id when
/// one is known.
#[derive(Debug, Clone)]
pub struct Route {
    /// Asset symbol, e.g. `USDT`.
    pub symbol: String,
    /// Source chain id.
    pub from: u64,
    /// Destination chain id.
    pub to: u64,
    /// Token-pair id, enabling the most specific network-fee lookup.
    pub pair_id: Option<u64>,
}

impl Route {
    /// Creates a route without a known token-pair id.
    pub fn new(symbol: impl Into<String>, from: u64, to: u64) -> Self {
        Self { symbol: symbol.into(), from, to, pair_id: None }
    }

    /// Sets the token-pair id.
    pub fn with_pair_id(mut self, pair_id: u64) -> Self {
        self.pair_id = Some(pair_id);
        self
    }
}

/// Service-fee candidate keys for one direction, most to least specific. An
/// empty symbol or a zero chain id is a wildcard.
pub fn service_fee_keys(symbol: &str, from: u64, to: u64) -> [String; 6] {
    [
        format!("{symbol}/{from}/{to}"),
        format!("{symbol}/{from}/0"),
        format!("{symbol}/0/{to}"),
        format!("/{from}/{to}"),
        format!("/{from}/0"),
        format!("/0/{to}"),
    ]
}

/// Network-fee candidate keys, most to least specific. The pair-id lookup
/// leads when an id is known; the chain-pair lookups follow, first on the
/// origin chain, then mirrored on the destination chain.
pub fn network_fee_keys(pair_id: Option<u64>, from: u64, to: u64) -> Vec<String> {
    let mut keys = Vec::with_capacity(5);
    if let Some(id) = pair_id {
        keys.push(format!("{id}/{from}/{to}"));
    }
    keys.extend([
        format!("/{from}/{to}"),
        format!("/{from}/0"),
        format!("/{to}/{from}"),
        format!("/{to}/0"),
    ]);
    keys
}

/// One service-fee lookup: the schedule is keyed by symbol and chain pair.
#[derive(Debug, Clone)]
struct ServiceCandidate {
    symbol: String,
    from: u64,
    to: u64,
}

/// How a network-fee candidate is looked up on its host chain.
#[derive(Debug, Clone)]
enum NetworkLookup {
    /// `getTokenPairFee(id)`.
    ByPair(u64),
    /// `getFee((from, to))`.
    ByRoute { from: u64, to: u64 },
}

/// One network-fee lookup, hosted by the chain whose id leads the key.
#[derive(Debug, Clone)]
struct NetworkCandidate {
    host: u64,
    lookup: NetworkLookup,
}

/// Candidate keys deduplicated by request id.
///
/// Broader keys are expected to be shared across many specific routes, so a
/// collision is normal; the newer request's parameters win ties and the
/// collision is logged.
#[derive(Debug)]
struct CandidateSet<C> {
    entries: HashMap<String, (u64, C)>,
    overwrites: u64,
}

impl<C> Default for CandidateSet<C> {
    fn default() -> Self {
        Self { entries: HashMap::new(), overwrites: 0 }
    }
}

impl<C> CandidateSet<C> {
    /// Inserts a candidate. An existing entry is replaced only when the
    /// incoming request id is strictly greater.
    fn insert(&mut self, key: String, request_id: u64, candidate: C) {
        if let Some((existing, _)) = self.entries.get(&key) {
            let existing = *existing;
            if existing >= request_id {
                return;
            }
            warn!(%key, old_id = existing, new_id = request_id, "duplicate candidate key");
            self.overwrites += 1;
        }
        self.entries.insert(key, (request_id, candidate));
    }
}

fn add_service_candidates(
    set: &mut CandidateSet<ServiceCandidate>,
    request_id: u64,
    symbol: &str,
    from: u64,
    to: u64,
) {
    let levels = [
        (format!("{symbol}/{from}/{to}"), symbol, from, to),
        (format!("{symbol}/{from}/0"), symbol, from, 0),
        (format!("{symbol}/0/{to}"), symbol, 0, to),
        (format!("/{from}/{to}"), "", from, to),
        (format!("/{from}/0"), "", from, 0),
        (format!("/0/{to}"), "", 0, to),
    ];
    for (key, symbol, from, to) in levels {
        set.insert(key, request_id, ServiceCandidate { symbol: symbol.to_string(), from, to });
    }
}

fn add_network_candidates(
    set: &mut CandidateSet<NetworkCandidate>,
    request_id: u64,
    pair_id: Option<u64>,
    from: u64,
    to: u64,
) {
    if let Some(id) = pair_id {
        set.insert(
            format!("{id}/{from}/{to}"),
            request_id,
            NetworkCandidate { host: from, lookup: NetworkLookup::ByPair(id) },
        );
    }
    set.insert(
        format!("/{from}/{to}"),
        request_id,
        NetworkCandidate { host: from, lookup: NetworkLookup::ByRoute { from, to } },
    );
    set.insert(
        format!("/{from}/0"),
        request_id,
        NetworkCandidate { host: from, lookup: NetworkLookup::ByRoute { from, to: 0 } },
    );
    set.insert(
        format!("/{to}/{from}"),
        request_id,
        NetworkCandidate { host: to, lookup: NetworkLookup::ByRoute { from: to, to: from } },
    );
    set.insert(
        format!("/{to}/0"),
        request_id,
        NetworkCandidate { host: to, lookup: NetworkLookup::ByRoute { from: to, to: 0 } },
    );
}

/// Every candidate that decoded to a configured (non-zero) value, keyed by
/// its candidate string.
///
/// This is the engine's full report; precedence is applied by the caller via
/// [`service_fee_for`](Self::service_fee_for) and
/// [`network_fee_for`](Self::network_fee_for), or by walking the key order
/// directly.
#[derive(Debug, Clone, Default)]
pub struct FeeCandidates {
    /// Configured service-fee entries.
    pub service: HashMap<String, AgentFee>,
    /// Configured network-fee entries.
    pub network: HashMap<String, U256>,
}

impl FeeCandidates {
    /// The most specific configured service fee for the direction.
    pub fn service_fee_for(&self, symbol: &str, from: u64, to: u64) -> Option<&AgentFee> {
        service_fee_keys(symbol, from, to).iter().find_map(|key| self.service.get(key))
    }

    /// The most specific configured network fee for the route.
    pub fn network_fee_for(&self, pair_id: Option<u64>, from: u64, to: u64) -> Option<U256> {
        network_fee_keys(pair_id, from, to).iter().find_map(|key| self.network.get(key).copied())
    }
}

/// The effective fees of one route.
#[derive(Debug, Clone)]
pub struct ResolvedFees {
    /// Service fee for the route's direction.
    pub service_fee: Option<AgentFee>,
    /// Service fee for the mirrored direction.
    pub reverse_service_fee: Option<AgentFee>,
    /// Network fee for the route.
    pub network_fee: Option<U256>,
}

/// Resolves the fees that apply to trading routes, tolerating sparse
/// configuration where only a subset of (symbol, chain-pair) combinations
/// have an explicit entry.
#[derive(Debug)]
pub struct FeeResolver {
    registry: Arc<SessionRegistry>,
    batch: BatchAggregator,
    next_request_id: AtomicU64,
    metrics: FeeMetrics,
}

impl FeeResolver {
    /// Creates a resolver over the registry.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            batch: BatchAggregator::new(registry.clone()),
            registry,
            next_request_id: AtomicU64::new(1),
            metrics: FeeMetrics::default(),
        }
    }

    /// Expands, deduplicates and resolves the fee candidates of the routes.
    ///
    /// Service-fee candidates for both directions of every route are merged
    /// into one batched lookup against the hub chain; network-fee candidates
    /// are grouped by the chain hosting each lookup, one batched resolution
    /// per group. Routes resolved later in the slice win candidate-key ties.
    #[instrument(skip(self, routes), fields(routes = routes.len()))]
    pub async fn fetch_candidates(&self, routes: &[Route]) -> Result<FeeCandidates, FeeError> {
        let mut service = CandidateSet::default();
        let mut network = CandidateSet::default();

        for route in routes {
            let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            add_service_candidates(&mut service, request_id, &route.symbol, route.from, route.to);
            add_service_candidates(&mut service, request_id, &route.symbol, route.to, route.from);
            add_network_candidates(&mut network, request_id, route.pair_id, route.from, route.to);
        }
        self.metrics.stale_candidates.increment(service.overwrites + network.overwrites);

        let mut candidates = FeeCandidates::default();
        self.resolve_service(service, &mut candidates).await?;
        self.resolve_network(network, &mut candidates).await?;
        self.metrics.resolutions.increment(1);
        Ok(candidates)
    }

    /// Resolves the effective fees of one route by applying precedence to the
    /// candidate report.
    pub async fn resolve_fees(&self, route: &Route) -> Result<ResolvedFees, FeeError> {
        let candidates = self.fetch_candidates(std::slice::from_ref(route)).await?;
        Ok(ResolvedFees {
            service_fee: candidates.service_fee_for(&route.symbol, route.from, route.to).cloned(),
            reverse_service_fee: candidates
                .service_fee_for(&route.symbol, route.to, route.from)
                .cloned(),
            network_fee: candidates.network_fee_for(route.pair_id, route.from, route.to),
        })
    }

    async fn resolve_service(
        &self,
        set: CandidateSet<ServiceCandidate>,
        out: &mut FeeCandidates,
    ) -> Result<(), FeeError> {
        if set.entries.is_empty() {
            return Ok(());
        }

        let resolver = &self.registry.config().resolver;
        let schedule = resolver.fee_schedule;

        let mut keys = Vec::with_capacity(set.entries.len());
        let mut calls = Vec::with_capacity(set.entries.len());
        for (key, (_, candidate)) in set.entries {
            let data = IFeeSchedule::getCrossChainAgentFeeCall {
                symbol: candidate.symbol,
                fromChainID: U256::from(candidate.from),
                toChainID: U256::from(candidate.to),
            }
            .abi_encode();
            keys.push(key);
            calls.push(Call::agent_fee(schedule, data.into()));
        }

        let outcome = self
            .batch
            .run_batch_with_retry(&resolver.hub_chain, &calls, DEFAULT_BATCH_RETRIES)
            .await?;
        for (key, result) in keys.into_iter().zip(outcome.results) {
            if let Some(fee) = result.as_agent_fee() {
                if fee.is_configured() {
                    out.service.insert(key, fee.clone());
                }
            }
        }
        Ok(())
    }

    async fn resolve_network(
        &self,
        set: CandidateSet<NetworkCandidate>,
        out: &mut FeeCandidates,
    ) -> Result<(), FeeError> {
        // group candidates by the chain hosting their lookup
        let mut groups: HashMap<String, (Vec<String>, Vec<Call>)> = HashMap::new();
        for (key, (_, candidate)) in set.entries {
            let (chain, chain_config) = self.registry.chain_by_slip44(candidate.host)?;
            let bridge = chain_config
                .bridge
                .ok_or_else(|| ConfigError::MissingBridge(chain.to_string()))?;
            let data = match candidate.lookup {
                NetworkLookup::ByPair(id) => {
                    IBridge::getTokenPairFeeCall { tokenPairID: U256::from(id) }.abi_encode()
                }
                NetworkLookup::ByRoute { from, to } => IBridge::getFeeCall {
                    pair: IBridge::RoutePair {
                        srcChainID: U256::from(from),
                        destChainID: U256::from(to),
                    },
                }
                .abi_encode(),
            };
            let (keys, calls) = groups.entry(chain.to_string()).or_default();
            keys.push(key);
            calls.push(Call::scalar(bridge, data.into()));
        }

        for (chain, (keys, calls)) in groups {
            let outcome =
                self.batch.run_batch_with_retry(&chain, &calls, DEFAULT_BATCH_RETRIES).await?;
            for (key, result) in keys.into_iter().zip(outcome.results) {
                if let Some(value) = result.as_scalar() {
                    if !value.is_zero() {
                        out.network.insert(key, value);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_keys_in_specificity_order() {
        assert_eq!(
            service_fee_keys("USDT", 10, 20),
            [
                "USDT/10/20".to_string(),
                "USDT/10/0".to_string(),
                "USDT/0/20".to_string(),
                "/10/20".to_string(),
                "/10/0".to_string(),
                "/0/20".to_string(),
            ]
        );
        // mirrored direction swaps the chain components
        assert_eq!(
            service_fee_keys("USDT", 20, 10),
            [
                "USDT/20/10".to_string(),
                "USDT/20/0".to_string(),
                "USDT/0/10".to_string(),
                "/20/10".to_string(),
                "/20/0".to_string(),
                "/0/10".to_string(),
            ]
        );
    }

    #[test]
    fn network_keys_lead_with_pair_id_when_known() {
        assert_eq!(
            network_fee_keys(Some(77), 10, 20),
            vec!["77/10/20", "/10/20", "/10/0", "/20/10", "/20/0"]
        );
        assert_eq!(network_fee_keys(None, 10, 20), vec!["/10/20", "/10/0", "/20/10", "/20/0"]);
    }

    #[test]
    fn dedup_is_last_writer_wins_on_strictly_newer_requests() {
        let mut set = CandidateSet::default();
        set.insert("/10/0".to_string(), 5, ServiceCandidate { symbol: String::new(), from: 10, to: 0 });
        set.insert("/10/0".to_string(), 3, ServiceCandidate { symbol: "USDT".to_string(), from: 10, to: 0 });
        let (id, candidate) = &set.entries["/10/0"];
        assert_eq!(*id, 5);
        assert_eq!(candidate.symbol, "");
        assert_eq!(set.overwrites, 0);

        set.insert("/10/0".to_string(), 7, ServiceCandidate { symbol: "WAN".to_string(), from: 10, to: 0 });
        let (id, candidate) = &set.entries["/10/0"];
        assert_eq!(*id, 7);
        assert_eq!(candidate.symbol, "WAN");
        assert_eq!(set.overwrites, 1);
    }

    #[test]
    fn equal_request_ids_do_not_overwrite() {
        let mut set = CandidateSet::default();
        set.insert("/10/20".to_string(), 4, NetworkCandidate { host: 10, lookup: NetworkLookup::ByRoute { from: 10, to: 20 } });
        set.insert("/10/20".to_string(), 4, NetworkCandidate { host: 99, lookup: NetworkLookup::ByRoute { from: 99, to: 20 } });
        let (_, candidate) = &set.entries["/10/20"];
        assert_eq!(candidate.host, 10);
    }

    #[test]
    fn wildcard_candidates_carry_empty_symbol_and_zero_chain() {
        let mut set = CandidateSet::default();
        add_service_candidates(&mut set, 1, "USDT", 10, 20);
        assert_eq!(set.entries.len(), 6);
        let (_, wildcard) = &set.entries["/0/20"];
        assert_eq!(wildcard.symbol, "");
        assert_eq!(wildcard.from, 0);
        assert_eq!(wildcard.to, 20);
    }

    #[test]
    fn mirrored_direction_adds_six_more_keys() {
        let mut set = CandidateSet::default();
        add_service_candidates(&mut set, 1, "USDT", 10, 20);
        add_service_candidates(&mut set, 1, "USDT", 20, 10);
        assert_eq!(set.entries.len(), 12);
    }

    #[test]
    fn network_candidates_host_resolution() {
        let mut set = CandidateSet::default();
        add_network_candidates(&mut set, 1, Some(7), 10, 20);
        assert_eq!(set.entries.len(), 5);
        // pair-id and origin-side lookups live on the origin chain
        assert_eq!(set.entries["7/10/20"].1.host, 10);
        assert_eq!(set.entries["/10/20"].1.host, 10);
        assert_eq!(set.entries["/10/0"].1.host, 10);
        // mirrored lookups live on the destination chain
        assert_eq!(set.entries["/20/10"].1.host, 20);
        assert_eq!(set.entries["/20/0"].1.host, 20);
    }
}
