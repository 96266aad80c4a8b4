pub mod crawler;
pub mod error;
pub mod gateway;
pub mod options;
pub mod result;
pub mod state;

pub use crawler::{Crawler, ProgressCallback};
pub use error::{GatewayError, ScanError};
pub use gateway::{Gateway, HttpGateway};
pub use options::CrawlOptions;
pub use result::{CrawlPhase, NodeId, NodeResult};
