use crate::error::{Result, ScanError};
use std::time::Duration;

pub const DEFAULT_API_HOST: &str = "api";
pub const DEFAULT_API_PORT: u16 = 4002;
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Settings for a single crawl of the node network.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Contents of the node's `.cookie` file, sent with every request
    pub auth_cookie: String,
    pub api_host: String,
    pub api_port: u16,
    /// Per-request timeout applied by the HTTP gateway, zero for none
    pub api_timeout: Duration,
    pub worker_pool_size: usize,
    /// Cap on distinct nodes visited, 0 for no cap
    pub max_visits: usize,
    /// Upper bound on how long a worker waits before taking its first job
    pub worker_stagger: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            auth_cookie: String::new(),
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            max_visits: 0,
            worker_stagger: Duration::ZERO,
        }
    }
}

impl CrawlOptions {
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(ScanError::InvalidOptions(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        if self.api_host.trim().is_empty() {
            return Err(ScanError::InvalidOptions("API host is empty".to_string()));
        }
        Ok(())
    }

    pub fn visit_cap(&self) -> Option<usize> {
        (self.max_visits > 0).then_some(self.max_visits)
    }
}
