use crate::error::{Result, ScanError};
use crate::gateway::{Gateway, HttpGateway};
use crate::options::CrawlOptions;
use crate::result::{CrawlPhase, NodeId, NodeResult};
use crate::state::{Claim, CrawlState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

/// Called by a worker with `(worker_id, node_id)` as it starts a lookup.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Breadth-first walker over the node network.
///
/// A single dispatcher pulls node ids off the shared frontier, claims them in
/// the visit cache and hands them to a fixed pool of workers. Workers feed the
/// peers they discover back into the frontier. The crawl ends once the
/// frontier is empty and no worker has a job in flight.
pub struct Crawler {
    gateway: Arc<dyn Gateway>,
    state: Arc<Mutex<CrawlState>>,
    worker_pool_size: usize,
    worker_stagger: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    /// Builds a crawler talking to the node API described by `opts`.
    pub fn new(opts: CrawlOptions) -> Result<Self> {
        opts.validate()?;
        let gateway = HttpGateway::from_options(&opts)?;
        Ok(Self::from_parts(Arc::new(gateway), &opts))
    }

    /// Builds a crawler over any [`Gateway`]. `opts` is validated, but its
    /// connection fields are ignored.
    pub fn with_gateway(gateway: Arc<dyn Gateway>, opts: &CrawlOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self::from_parts(gateway, opts))
    }

    fn from_parts(gateway: Arc<dyn Gateway>, opts: &CrawlOptions) -> Self {
        Self {
            gateway,
            state: Arc::new(Mutex::new(CrawlState::new(opts.visit_cap()))),
            worker_pool_size: opts.worker_pool_size,
            worker_stagger: opts.worker_stagger,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Seeds the frontier from the gateway's own peers and crawls outward
    /// until the reachable network (or the visit cap) is exhausted.
    ///
    /// Fails only if the seed peers cannot be fetched; individual node
    /// failures reduce coverage but never abort the crawl.
    pub async fn execute(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.phase() != CrawlPhase::Idle {
                return Err(ScanError::Other(
                    "crawl has already been executed".to_string(),
                ));
            }
            state.set_phase(CrawlPhase::Seeding);
        }

        debug!("Beginning crawl from {}", self.gateway.endpoint_label());

        let seeds = match self.gateway.list_immediate_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                self.state.lock().await.set_phase(CrawlPhase::Failed);
                return Err(ScanError::Seed(e));
            }
        };

        info!("Found {} seed peers", seeds.len());

        {
            let mut state = self.state.lock().await;
            state.seed(seeds);
            state.set_phase(CrawlPhase::Running);
        }

        let (job_tx, job_rx) = mpsc::channel::<NodeId>(self.worker_pool_size);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (in_flight, _) = watch::channel(0usize);
        let in_flight = Arc::new(in_flight);

        let mut worker_handles = Vec::with_capacity(self.worker_pool_size);
        for worker_id in 0..self.worker_pool_size {
            let worker = Worker {
                id: worker_id,
                gateway: self.gateway.clone(),
                state: self.state.clone(),
                jobs: job_rx.clone(),
                in_flight: in_flight.clone(),
                progress_callback: self.progress_callback.clone(),
                start_delay: self.start_delay(worker_id),
            };
            worker_handles.push(tokio::spawn(worker.run()));
        }
        drop(job_rx);

        self.assign_jobs(job_tx, &in_flight).await;

        for handle in worker_handles {
            handle.await?;
        }

        let mut state = self.state.lock().await;
        state.set_phase(CrawlPhase::Complete);
        debug!(
            "Crawl complete. Found {} listings across {} nodes",
            state.listing_count(),
            state.nodes_visited()
        );
        Ok(())
    }

    /// Dispatcher loop. Returns once the frontier is drained with nothing in
    /// flight; dropping `jobs` on return stops the workers.
    async fn assign_jobs(&self, jobs: mpsc::Sender<NodeId>, in_flight: &watch::Sender<usize>) {
        let mut idle = in_flight.subscribe();

        loop {
            let claim = self.state.lock().await.claim_next();

            match claim {
                Claim::Empty => {
                    // In-flight workers may still append to the frontier.
                    if idle.wait_for(|count| *count == 0).await.is_err() {
                        break;
                    }
                    if self.state.lock().await.frontier_is_empty() {
                        break;
                    }
                }
                Claim::CapReached(node) => {
                    debug!("Visit cap reached, dropping {}", node);
                }
                Claim::AlreadyVisited(node) => {
                    debug!("Skipping {}, already visited", node);
                }
                Claim::Claimed(node) => {
                    // Counted before the hand-off so the emptiness check above
                    // can never miss a job that is sitting in the channel.
                    in_flight.send_modify(|count| *count += 1);
                    if jobs.send(node.clone()).await.is_err() {
                        in_flight.send_modify(|count| *count -= 1);
                        warn!("No workers left to take {}, stopping dispatch", node);
                        break;
                    }

                    let state = self.state.lock().await;
                    debug!(
                        "Assigning {}, {} visited, {} remaining, {} listings",
                        node,
                        state.nodes_visited(),
                        state.frontier_len(),
                        state.listing_count()
                    );
                }
            }
        }
    }

    fn start_delay(&self, worker_id: usize) -> Duration {
        if self.worker_stagger.is_zero() {
            return Duration::ZERO;
        }
        let pool = u32::try_from(self.worker_pool_size).unwrap_or(u32::MAX);
        let id = u32::try_from(worker_id).unwrap_or(u32::MAX);
        self.worker_stagger * id / pool
    }

    /// Running listing total. Safe to call while [`Crawler::execute`] runs.
    pub async fn listing_count(&self) -> u64 {
        self.state.lock().await.listing_count()
    }

    /// Number of nodes claimed so far. Safe to call while
    /// [`Crawler::execute`] runs.
    pub async fn nodes_visited(&self) -> usize {
        self.state.lock().await.nodes_visited()
    }

    pub async fn phase(&self) -> CrawlPhase {
        self.state.lock().await.phase()
    }

    /// Snapshot of the visit cache. Nodes still in flight show up with an
    /// empty result.
    pub async fn results(&self) -> HashMap<NodeId, NodeResult> {
        self.state.lock().await.results().clone()
    }

    pub fn endpoint_label(&self) -> String {
        self.gateway.endpoint_label()
    }
}

struct Worker {
    id: usize,
    gateway: Arc<dyn Gateway>,
    state: Arc<Mutex<CrawlState>>,
    jobs: Arc<Mutex<mpsc::Receiver<NodeId>>>,
    in_flight: Arc<watch::Sender<usize>>,
    progress_callback: Option<ProgressCallback>,
    start_delay: Duration,
}

/// Marks a job finished when dropped, including when the worker panics.
struct JobGuard<'a>(&'a watch::Sender<usize>);

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl Worker {
    async fn run(self) {
        debug!("Worker {} started", self.id);

        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }

        loop {
            let next = self.jobs.lock().await.recv().await;
            let Some(node) = next else {
                break;
            };

            let _job = JobGuard(self.in_flight.as_ref());
            self.visit(node).await;
        }

        debug!("Worker {} finished", self.id);
    }

    async fn visit(&self, node: NodeId) {
        if let Some(ref callback) = self.progress_callback {
            callback(self.id, node.clone());
        }

        let (peers, listing_count) = futures::join!(
            self.gateway.list_closest_peers(&node),
            self.gateway.fetch_listing_count(&node)
        );

        let peers = peers.unwrap_or_else(|e| {
            warn!("worker {}: error fetching closest peers ({}): {}", self.id, node, e);
            Vec::new()
        });
        let listing_count = listing_count.unwrap_or_else(|e| {
            warn!("worker {}: error fetching listing count ({}): {}", self.id, node, e);
            0
        });

        self.state
            .lock()
            .await
            .complete(node.clone(), NodeResult::new(peers, listing_count));

        debug!("worker {}: completed {}", self.id, node);
    }
}
