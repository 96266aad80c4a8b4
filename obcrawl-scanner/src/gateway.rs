use crate::error::GatewayError;
use crate::options::CrawlOptions;
use crate::result::NodeId;
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Per-node query interface of the network being crawled.
///
/// Every call is independent; an implementation owns its own timeouts and
/// reports them as ordinary errors.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Peers the gateway node itself is connected to. Used as the crawl seed.
    async fn list_immediate_peers(&self) -> Result<Vec<NodeId>, GatewayError>;

    /// Peers closest to `target` in the overlay's routing table.
    async fn list_closest_peers(&self, target: &str) -> Result<Vec<NodeId>, GatewayError>;

    /// Number of listings `target` advertises in its profile.
    async fn fetch_listing_count(&self, target: &str) -> Result<u64, GatewayError>;

    /// Human readable location, for progress output only.
    fn endpoint_label(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    stats: Option<ProfileStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileStats {
    #[serde(default)]
    listing_count: u64,
}

/// [`Gateway`] backed by an OpenBazaar node's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    auth_cookie: String,
}

impl HttpGateway {
    pub fn new(
        host: &str,
        port: u16,
        auth_cookie: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|e| GatewayError::InvalidEndpoint(format!("{}:{}: {}", host, port, e)))?;

        let mut builder = Client::builder()
            .user_agent(concat!("obcrawl/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));

        // Zero means wait indefinitely
        if !timeout.is_zero() {
            builder = builder.timeout(timeout).connect_timeout(timeout / 2);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            auth_cookie: auth_cookie.into(),
        })
    }

    pub fn from_options(opts: &CrawlOptions) -> Result<Self, GatewayError> {
        Self::new(
            &opts.api_host,
            opts.api_port,
            opts.auth_cookie.clone(),
            opts.api_timeout,
        )
    }

    /// Builds `/ob/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidEndpoint(self.base_url.to_string()))?
            .clear()
            .push("ob")
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        debug!("GET {}", url);

        let mut request = self.client.get(url.clone());
        if !self.auth_cookie.is_empty() {
            request = request.header(header::COOKIE, &self.auth_cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| GatewayError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_immediate_peers(&self) -> Result<Vec<NodeId>, GatewayError> {
        let url = self.endpoint(&["peers"])?;
        self.get_json(url).await
    }

    async fn list_closest_peers(&self, target: &str) -> Result<Vec<NodeId>, GatewayError> {
        let url = self.endpoint(&["closestpeers", target])?;
        self.get_json(url).await
    }

    async fn fetch_listing_count(&self, target: &str) -> Result<u64, GatewayError> {
        let url = self.endpoint(&["profile", target])?;
        let profile: Profile = self.get_json(url).await?;
        Ok(profile.stats.map(|s| s.listing_count).unwrap_or(0))
    }

    fn endpoint_label(&self) -> String {
        match (self.base_url.host_str(), self.base_url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            _ => self.base_url.to_string(),
        }
    }
}
