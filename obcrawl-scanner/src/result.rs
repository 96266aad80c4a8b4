use serde::{Deserialize, Serialize};

/// Opaque, content-addressed peer identifier.
pub type NodeId = String;

/// What a worker learned about one node.
///
/// The default value doubles as the placeholder written into the visit cache
/// when a node is claimed, before its lookups complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResult {
    pub peers: Vec<NodeId>,
    pub listing_count: u64,
}

impl NodeResult {
    pub fn new(peers: Vec<NodeId>, listing_count: u64) -> Self {
        Self {
            peers,
            listing_count,
        }
    }
}

/// Lifecycle of a single crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlPhase {
    Idle,
    Seeding,
    Running,
    Complete,
    Failed,
}

impl CrawlPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, CrawlPhase::Complete | CrawlPhase::Failed)
    }
}
