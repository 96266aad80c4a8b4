pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    crawl_options_from_args, init_tracing, load_auth_cookie, load_auth_cookie_file,
};

// Re-export crawl functionality from obcrawl-core
pub use obcrawl_core::crawl::{CrawlProgressCallback, execute_crawl, run_crawl};
pub use obcrawl_core::report::{CrawlSummary, ReportFormat, generate_report};
