pub mod crawl;
pub mod report;

pub use obcrawl_scanner::{CrawlOptions, ScanError};

pub fn print_banner() {
    println!(
        r#"
       __                                 __
  ____/ /_  ______________ __      __   / /
 / __ \/ __ \/ ___/ ___/ __ `/ | /| / /  / /
/ /_/ / /_/ / /__/ /  / /_/ /| |/ |/ /  / /
\____/_.___/\___/_/   \__,_/ |__/|__/  /_/
                                   v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
