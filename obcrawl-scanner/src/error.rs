use thiserror::Error;

/// Failure of a single call against a node's HTTP API.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request error: status {status} from {url}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to fetch seed peers: {0}")]
    Seed(#[source] GatewayError),

    #[error("Invalid crawl options: {0}")]
    InvalidOptions(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
