use crate::result::{CrawlPhase, NodeId, NodeResult};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Outcome of offering the frontier head to the dispatcher.
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// The node is now owned by the caller and must be handed to a worker.
    Claimed(NodeId),
    /// The visit cap is already reached; the node was dropped.
    CapReached(NodeId),
    /// The node was claimed earlier in this crawl; the node was dropped.
    AlreadyVisited(NodeId),
    /// Nothing is waiting in the frontier.
    Empty,
}

/// Everything workers and the dispatcher share during a crawl.
///
/// Lives behind a single lock. The frontier may hold duplicates and ids that
/// were already visited; only [`CrawlState::claim_next`] filters them.
#[derive(Debug)]
pub struct CrawlState {
    frontier: VecDeque<NodeId>,
    cache: HashMap<NodeId, NodeResult>,
    listing_count: u64,
    max_visits: Option<usize>,
    phase: CrawlPhase,
}

impl CrawlState {
    pub fn new(max_visits: Option<usize>) -> Self {
        Self {
            frontier: VecDeque::new(),
            cache: HashMap::new(),
            listing_count: 0,
            max_visits,
            phase: CrawlPhase::Idle,
        }
    }

    pub fn seed(&mut self, peers: impl IntoIterator<Item = NodeId>) {
        self.frontier.extend(peers);
    }

    /// Pops the frontier head and claims it if it is eligible for a visit.
    ///
    /// A claimed node gets a placeholder cache entry, so it is counted as
    /// visited from this point on and can never be claimed again.
    pub fn claim_next(&mut self) -> Claim {
        let Some(node) = self.frontier.pop_front() else {
            return Claim::Empty;
        };

        if let Some(cap) = self.max_visits
            && self.cache.len() >= cap
        {
            return Claim::CapReached(node);
        }
        if self.cache.contains_key(&node) {
            return Claim::AlreadyVisited(node);
        }

        self.cache.insert(node.clone(), NodeResult::default());
        Claim::Claimed(node)
    }

    /// Records a worker's result: queues the discovered peers, replaces the
    /// placeholder and adds to the running listing total.
    ///
    /// The total saturates at `u64::MAX` rather than wrapping.
    pub fn complete(&mut self, node: NodeId, result: NodeResult) {
        self.frontier.extend(result.peers.iter().cloned());
        self.listing_count = match self.listing_count.checked_add(result.listing_count) {
            Some(total) => total,
            None => {
                warn!(
                    "listing total overflowed adding {} from {}, clamping",
                    result.listing_count, node
                );
                u64::MAX
            }
        };
        self.cache.insert(node, result);
    }

    pub fn frontier_is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn nodes_visited(&self) -> usize {
        self.cache.len()
    }

    pub fn listing_count(&self) -> u64 {
        self.listing_count
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: CrawlPhase) {
        self.phase = phase;
    }

    pub fn results(&self) -> &HashMap<NodeId, NodeResult> {
        &self.cache
    }
}
