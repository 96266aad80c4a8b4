use crate::report::CrawlSummary;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use obcrawl_scanner::{CrawlOptions, Crawler, ProgressCallback, ScanError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Execute a crawl against the node API described by `options`
pub async fn execute_crawl(
    options: CrawlOptions,
    show_progress_bars: bool,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSummary, ScanError> {
    let crawler = Crawler::new(options)?;
    run_crawl(crawler, show_progress_bars, progress_callback).await
}

/// Runs an already configured crawler to completion and summarises it.
///
/// Any progress callback already set on `crawler` is replaced.
pub async fn run_crawl(
    crawler: Crawler,
    show_progress_bars: bool,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSummary, ScanError> {
    let endpoint = crawler.endpoint_label();

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Beginning crawl from {}...", endpoint));
        Some(Arc::new(pb))
    } else {
        None
    };

    // Counter for tracking nodes handed to workers
    let processed_count = Arc::new(AtomicUsize::new(0));

    let internal_progress_callback: ProgressCallback = {
        let pb_clone = progress_bar.clone();
        let count_clone = processed_count.clone();
        Arc::new(move |worker_id: usize, node: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb_clone {
                pb.set_message(format!(
                    "Crawling... {} nodes visited (worker {}: {})",
                    count, worker_id, node
                ));
            }
        })
    };

    let crawler = crawler.with_progress_callback(internal_progress_callback);
    let started_at = Utc::now();
    let start = Instant::now();

    let outcome = crawler.execute().await;

    if let Some(ref pb) = progress_bar {
        match &outcome {
            Ok(()) => pb.finish_with_message(format!(
                "Crawl complete! {} nodes visited",
                processed_count.load(Ordering::Relaxed)
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }
    outcome?;

    let summary = CrawlSummary::new(
        endpoint,
        started_at,
        start.elapsed(),
        crawler.listing_count().await,
        crawler.results().await,
    );

    debug!(
        "Crawl of {} took {} ms",
        summary.endpoint, summary.duration_ms
    );
    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Found {} listings across {} nodes.",
            summary.listing_count, summary.nodes_visited
        ));
    }

    Ok(summary)
}
