// Crawl summaries and report rendering

use chrono::{DateTime, Utc};
use obcrawl_scanner::{NodeId, NodeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub peer_id: NodeId,
    pub listing_count: u64,
    pub peers_reported: usize,
}

/// Final numbers of a finished crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub endpoint: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub listing_count: u64,
    pub nodes_visited: usize,
    /// Sorted by listing count, largest first
    pub nodes: Vec<NodeSummary>,
}

impl CrawlSummary {
    pub fn new(
        endpoint: String,
        started_at: DateTime<Utc>,
        duration: Duration,
        listing_count: u64,
        results: HashMap<NodeId, NodeResult>,
    ) -> Self {
        let mut nodes: Vec<NodeSummary> = results
            .into_iter()
            .map(|(peer_id, result)| NodeSummary {
                peer_id,
                listing_count: result.listing_count,
                peers_reported: result.peers.len(),
            })
            .collect();
        nodes.sort_by(|a, b| {
            b.listing_count
                .cmp(&a.listing_count)
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });

        Self {
            endpoint,
            started_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            listing_count,
            nodes_visited: nodes.len(),
            nodes,
        }
    }

    pub fn nodes_with_listings(&self) -> usize {
        self.nodes.iter().filter(|n| n.listing_count > 0).count()
    }
}

pub fn generate_report(summary: &CrawlSummary, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(summary)),
        ReportFormat::Json => generate_json_report(summary),
    }
}

pub fn generate_text_report(summary: &CrawlSummary) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          OBCRAWL NETWORK REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Endpoint:       {}\n", summary.endpoint));
    report.push_str(&format!(
        "Crawl Date:     {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "Duration:       {:.1} seconds\n",
        summary.duration_ms as f64 / 1000.0
    ));
    report.push_str(&format!("Nodes Visited:  {}\n", summary.nodes_visited));
    report.push_str(&format!("Listings Found: {}\n", summary.listing_count));
    report.push_str(&format!(
        "Stores:         {} node(s) with at least one listing\n",
        summary.nodes_with_listings()
    ));
    report.push('\n');

    let stores: Vec<&NodeSummary> = summary
        .nodes
        .iter()
        .filter(|n| n.listing_count > 0)
        .collect();

    if !stores.is_empty() {
        report.push_str(RULE);
        report.push_str("NODES WITH LISTINGS\n");
        report.push_str(RULE);
        report.push('\n');

        for node in stores {
            report.push_str(&format!(
                "  {:>8}  {}  ({} peers)\n",
                node.listing_count, node.peer_id, node.peers_reported
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str(&format!(
        "Found {} listings across {} nodes.\n",
        summary.listing_count, summary.nodes_visited
    ));

    report
}

pub fn generate_json_report(summary: &CrawlSummary) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "obcrawl",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
                "format": "json"
            },
            "crawl": {
                "endpoint": summary.endpoint,
                "started_at": summary.started_at.to_rfc3339(),
                "duration_ms": summary.duration_ms
            },
            "summary": {
                "nodes_visited": summary.nodes_visited,
                "listing_count": summary.listing_count,
                "nodes_with_listings": summary.nodes_with_listings()
            },
            "nodes": summary.nodes
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
