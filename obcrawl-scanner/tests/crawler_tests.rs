// Traversal tests against a call-recording stub gateway

use async_trait::async_trait;
use obcrawl_scanner::{
    CrawlOptions, CrawlPhase, Crawler, Gateway, GatewayError, NodeId, ScanError,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallEntry {
    method: &'static str,
    arg: String,
}

impl CallEntry {
    fn new(method: &'static str, arg: &str) -> Self {
        Self {
            method,
            arg: arg.to_string(),
        }
    }
}

/// Serves a fixed peer graph and records every call made against it.
#[derive(Default)]
struct FakeGateway {
    seed: Vec<NodeId>,
    seed_fails: bool,
    /// Closest peers by node; nodes not listed get `default_peers`
    closest_peers: HashMap<NodeId, Vec<NodeId>>,
    default_peers: Vec<NodeId>,
    listing_counts: HashMap<NodeId, u64>,
    failing_closest_peers: HashSet<NodeId>,
    failing_listing_counts: HashSet<NodeId>,
    /// Sleep applied to per-node calls, scaled by the node's position
    jitter: Option<Duration>,
    calls: Mutex<Vec<CallEntry>>,
}

impl FakeGateway {
    fn record(&self, method: &'static str, arg: &str) {
        self.calls.lock().unwrap().push(CallEntry::new(method, arg));
    }

    fn calls(&self) -> Vec<CallEntry> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .map(|c| c.arg)
            .collect()
    }

    async fn maybe_sleep(&self, target: &str) {
        if let Some(jitter) = self.jitter {
            let spread = target.bytes().map(u32::from).sum::<u32>() % 4;
            tokio::time::sleep(jitter * spread).await;
        }
    }

    fn failure(target: &str) -> GatewayError {
        GatewayError::Status {
            url: format!("http://fake.api.client:123/ob/{}", target),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_immediate_peers(&self) -> Result<Vec<NodeId>, GatewayError> {
        self.record("getpeers", "");
        if self.seed_fails {
            return Err(Self::failure("peers"));
        }
        Ok(self.seed.clone())
    }

    async fn list_closest_peers(&self, target: &str) -> Result<Vec<NodeId>, GatewayError> {
        self.record("getclosestpeers", target);
        self.maybe_sleep(target).await;
        if self.failing_closest_peers.contains(target) {
            return Err(Self::failure(target));
        }
        Ok(self
            .closest_peers
            .get(target)
            .cloned()
            .unwrap_or_else(|| self.default_peers.clone()))
    }

    async fn fetch_listing_count(&self, target: &str) -> Result<u64, GatewayError> {
        self.record("getlistingscount", target);
        self.maybe_sleep(target).await;
        if self.failing_listing_counts.contains(target) {
            return Err(Self::failure(target));
        }
        Ok(self.listing_counts.get(target).copied().unwrap_or(0))
    }

    fn endpoint_label(&self) -> String {
        "fake.api.client:123".to_string()
    }
}

fn ids(names: &[&str]) -> Vec<NodeId> {
    names.iter().map(|s| s.to_string()).collect()
}

fn counts(pairs: &[(&str, u64)]) -> HashMap<NodeId, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The shared three-seed graph: everyone's closest peers are p4, p5 and p3
fn shared_graph(listings: &[(&str, u64)]) -> FakeGateway {
    FakeGateway {
        seed: ids(&["peer1", "peer2", "peer3"]),
        default_peers: ids(&["peer4", "peer5", "peer3"]),
        listing_counts: counts(listings),
        ..Default::default()
    }
}

fn options(workers: usize, max_visits: usize) -> CrawlOptions {
    CrawlOptions {
        worker_pool_size: workers,
        max_visits,
        ..Default::default()
    }
}

async fn run(gateway: FakeGateway, opts: CrawlOptions) -> (Arc<FakeGateway>, Crawler) {
    let gateway = Arc::new(gateway);
    let crawler = Crawler::with_gateway(gateway.clone(), &opts).unwrap();
    crawler.execute().await.unwrap();
    (gateway, crawler)
}

/// Ring of `n` nodes where each node also points a few hops ahead
fn ring_graph(n: usize) -> FakeGateway {
    let name = |i: usize| format!("Qm{:04}", i % n);
    let closest_peers = (0..n)
        .map(|i| (name(i), vec![name(i + 1), name(i + 7), name(i * 3), name(i)]))
        .collect();
    let listing_counts = (0..n).map(|i| (name(i), (i % 5) as u64)).collect();

    FakeGateway {
        seed: vec![name(0), name(n / 2)],
        closest_peers,
        listing_counts,
        jitter: Some(Duration::from_millis(1)),
        ..Default::default()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_expected_calls_are_made_to_the_api() {
    let gateway = shared_graph(&[
        ("peer1", 1),
        ("peer2", 1),
        ("peer3", 1),
        ("peer4", 1),
        ("peer5", 1),
    ]);
    let (gateway, crawler) = run(gateway, options(1, 0)).await;

    let mut expected = vec![CallEntry::new("getpeers", "")];
    for peer in ["peer1", "peer2", "peer3", "peer4", "peer5"] {
        expected.push(CallEntry::new("getclosestpeers", peer));
        expected.push(CallEntry::new("getlistingscount", peer));
    }

    let actual = gateway.calls();
    for call in &expected {
        assert!(actual.contains(call), "Missing call {:?}", call);
    }
    assert_eq!(
        actual.len(),
        expected.len(),
        "Number of call entries do not match: {:?}",
        actual
    );
    assert_eq!(actual[0], CallEntry::new("getpeers", ""));

    assert_eq!(crawler.nodes_visited().await, 5);
    assert_eq!(crawler.listing_count().await, 5);
}

#[tokio::test]
async fn test_listing_count_is_accurate() {
    let gateway = shared_graph(&[
        ("peer1", 1),
        ("peer2", 2),
        ("peer3", 3),
        ("peer4", 4),
        ("peer5", 5),
    ]);
    let (_, crawler) = run(gateway, options(1, 0)).await;

    assert_eq!(crawler.listing_count().await, 15);
}

#[tokio::test]
async fn test_nodes_visited_respects_max_visits() {
    let gateway = shared_graph(&[("peer1", 1), ("peer2", 1), ("peer3", 1)]);
    let (gateway, crawler) = run(gateway, options(1, 2)).await;

    assert_eq!(crawler.nodes_visited().await, 2);
    assert_eq!(crawler.listing_count().await, 2);
    assert_eq!(gateway.calls_to("getclosestpeers").len(), 2);
}

#[tokio::test]
async fn test_huge_listing_counts_saturate_total() {
    let gateway = FakeGateway {
        seed: ids(&["peer1", "peer2"]),
        listing_counts: counts(&[("peer1", u64::MAX), ("peer2", u64::MAX)]),
        ..Default::default()
    };
    let (_, crawler) = run(gateway, options(1, 0)).await;

    assert_eq!(crawler.phase().await, CrawlPhase::Complete);
    assert_eq!(crawler.nodes_visited().await, 2);
    assert_eq!(crawler.listing_count().await, u64::MAX);
    assert_eq!(crawler.results().await["peer2"].listing_count, u64::MAX);
}

#[test]
fn test_zero_workers_rejected_by_with_gateway() {
    let result = Crawler::with_gateway(Arc::new(FakeGateway::default()), &options(0, 0));
    assert!(matches!(result, Err(ScanError::InvalidOptions(_))));
}

#[tokio::test]
async fn test_seed_failure_aborts_crawl() {
    let gateway = Arc::new(FakeGateway {
        seed_fails: true,
        ..shared_graph(&[("peer1", 1)])
    });
    let crawler = Crawler::with_gateway(gateway.clone(), &options(4, 0)).unwrap();

    let err = crawler.execute().await.unwrap_err();

    assert!(matches!(err, ScanError::Seed(_)), "got {:?}", err);
    assert_eq!(crawler.phase().await, CrawlPhase::Failed);
    assert_eq!(crawler.nodes_visited().await, 0);
    assert_eq!(crawler.listing_count().await, 0);
    assert_eq!(gateway.calls(), vec![CallEntry::new("getpeers", "")]);
}

#[tokio::test]
async fn test_closest_peers_failure_still_counts_listings() {
    let gateway = FakeGateway {
        seed: ids(&["peer1", "peer2"]),
        closest_peers: HashMap::from([
            ("peer1".to_string(), ids(&["peer9"])),
            ("peer2".to_string(), ids(&[])),
        ]),
        listing_counts: counts(&[("peer1", 4), ("peer2", 1), ("peer9", 100)]),
        failing_closest_peers: HashSet::from(["peer1".to_string()]),
        ..Default::default()
    };
    let (gateway, crawler) = run(gateway, options(2, 0)).await;

    assert_eq!(crawler.nodes_visited().await, 2);
    assert_eq!(crawler.listing_count().await, 5);
    assert!(!gateway.calls_to("getclosestpeers").contains(&"peer9".to_string()));

    let results = crawler.results().await;
    assert!(results["peer1"].peers.is_empty());
    assert_eq!(results["peer1"].listing_count, 4);
}

#[tokio::test]
async fn test_listing_count_failure_counts_as_zero() {
    let gateway = FakeGateway {
        failing_listing_counts: HashSet::from(["peer4".to_string()]),
        ..shared_graph(&[("peer1", 1), ("peer2", 1), ("peer3", 1), ("peer4", 50)])
    };
    let (_, crawler) = run(gateway, options(3, 0)).await;

    assert_eq!(crawler.nodes_visited().await, 5);
    assert_eq!(crawler.listing_count().await, 3);
}

#[tokio::test]
async fn test_empty_seed_completes_without_visits() {
    let (gateway, crawler) = run(FakeGateway::default(), options(4, 0)).await;

    assert_eq!(crawler.phase().await, CrawlPhase::Complete);
    assert_eq!(crawler.nodes_visited().await, 0);
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test]
async fn test_self_references_and_duplicate_seeds_visit_once() {
    let gateway = FakeGateway {
        seed: ids(&["peer1", "peer1", "peer1"]),
        default_peers: ids(&["peer1"]),
        listing_counts: counts(&[("peer1", 3)]),
        ..Default::default()
    };
    let (gateway, crawler) = run(gateway, options(4, 0)).await;

    assert_eq!(crawler.nodes_visited().await, 1);
    assert_eq!(crawler.listing_count().await, 3);
    assert_eq!(gateway.calls_to("getclosestpeers"), vec!["peer1".to_string()]);
}

// ============================================================================
// Invariants under concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_node_fetched_exactly_once_with_many_workers() {
    let n = 200;
    let gateway = ring_graph(n);
    let expected_total: u64 = gateway.listing_counts.values().sum();
    let (gateway, crawler) = run(gateway, options(16, 0)).await;

    let closest = gateway.calls_to("getclosestpeers");
    let listings = gateway.calls_to("getlistingscount");
    let distinct: HashSet<&String> = closest.iter().collect();

    assert_eq!(closest.len(), n, "a node was fetched more than once");
    assert_eq!(distinct.len(), n);
    assert_eq!(listings.len(), n);
    assert_eq!(crawler.nodes_visited().await, n);
    assert_eq!(crawler.listing_count().await, expected_total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cap_is_exact_with_many_workers() {
    let gateway = ring_graph(200);
    let listing_counts = gateway.listing_counts.clone();
    let (gateway, crawler) = run(gateway, options(16, 17)).await;

    let dispatched = gateway.calls_to("getlistingscount");
    let dispatched_total: u64 = dispatched.iter().map(|id| listing_counts[id]).sum();

    assert_eq!(crawler.nodes_visited().await, 17);
    assert_eq!(dispatched.len(), 17);
    assert_eq!(crawler.listing_count().await, dispatched_total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_aggregates_advance_monotonically_during_crawl() {
    let gateway: Arc<dyn Gateway> = Arc::new(ring_graph(120));
    let crawler = Arc::new(Crawler::with_gateway(gateway, &options(8, 0)).unwrap());

    let handle = {
        let crawler = crawler.clone();
        tokio::spawn(async move { crawler.execute().await })
    };

    let mut last_visited = 0;
    let mut last_listings = 0;
    while !crawler.phase().await.is_finished() {
        let visited = crawler.nodes_visited().await;
        let listings = crawler.listing_count().await;
        assert!(visited >= last_visited);
        assert!(listings >= last_listings);
        last_visited = visited;
        last_listings = listings;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    handle.await.unwrap().unwrap();
    assert_eq!(crawler.nodes_visited().await, 120);
    assert!(crawler.listing_count().await >= last_listings);
}

#[tokio::test]
async fn test_single_worker_matches_many_workers() {
    let (_, single) = run(ring_graph(60), options(1, 0)).await;
    let (_, many) = run(ring_graph(60), options(12, 0)).await;

    assert_eq!(single.nodes_visited().await, many.nodes_visited().await);
    assert_eq!(single.listing_count().await, many.listing_count().await);
}
