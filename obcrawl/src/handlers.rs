use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use obcrawl_core::crawl::execute_crawl;
use obcrawl_core::report::{ReportFormat, generate_report, save_report};
use obcrawl_scanner::{CrawlOptions, Gateway, HttpGateway};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// Installs the fmt subscriber. `quiet` wins over `verbose`.
pub fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        Level::WARN
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // A second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Read a `.cookie` file, expanding `~` and dropping trailing whitespace
pub fn load_auth_cookie_file(path: &str) -> anyhow::Result<String> {
    let expanded = shellexpand::tilde(path);
    let path = Path::new(expanded.as_ref());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read auth cookie file {}", path.display()))?;

    let cookie = content.trim_end().to_string();
    if cookie.is_empty() {
        bail!("Auth cookie file {} is empty", path.display());
    }
    Ok(cookie)
}

/// Resolve the auth token from either `--auth-cookie` or `--auth-cookie-file`
pub fn load_auth_cookie(inline: Option<&String>, file: Option<&String>) -> anyhow::Result<String> {
    match (inline, file) {
        (_, Some(file)) => load_auth_cookie_file(file),
        (Some(cookie), None) => Ok(cookie.clone()),
        (None, None) => Ok(String::new()),
    }
}

/// Build crawl options from the connection flags and, when present, the
/// crawl-only flags
pub fn crawl_options_from_args(args: &ArgMatches) -> anyhow::Result<CrawlOptions> {
    let defaults = CrawlOptions::default();

    let auth_cookie = load_auth_cookie(
        args.get_one::<String>("auth-cookie"),
        args.get_one::<String>("auth-cookie-file"),
    )?;

    let options = CrawlOptions {
        auth_cookie,
        api_host: args
            .get_one::<String>("api-host")
            .cloned()
            .unwrap_or(defaults.api_host),
        api_port: args
            .get_one::<u16>("api-port")
            .copied()
            .unwrap_or(defaults.api_port),
        api_timeout: args
            .get_one::<u64>("api-timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.api_timeout),
        worker_pool_size: optional_arg::<usize>(args, "workers")
            .unwrap_or(defaults.worker_pool_size),
        max_visits: optional_arg::<usize>(args, "max-visits").unwrap_or(defaults.max_visits),
        worker_stagger: optional_arg::<u64>(args, "stagger")
            .map(Duration::from_secs)
            .unwrap_or(defaults.worker_stagger),
    };

    options.validate()?;
    Ok(options)
}

/// `get_one` for args that only some subcommands define
fn optional_arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Option<T> {
    args.try_get_one::<T>(id).ok().flatten().cloned()
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) {
    let options = match crawl_options_from_args(sub_matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };
    let output = sub_matches.get_one::<PathBuf>("output");
    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    if !quiet {
        println!(
            "\n{} Crawling from {}:{}",
            "→".blue(),
            options.api_host.bright_white(),
            options.api_port
        );
        println!("Workers: {}", options.worker_pool_size);
        match options.max_visits {
            0 => println!("Max visits: unlimited\n"),
            n => println!("Max visits: {}\n", n),
        }
    }

    let progress_callback = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{}", msg);
        }) as obcrawl_core::crawl::CrawlProgressCallback)
    };

    let summary = match execute_crawl(options, !quiet, progress_callback).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        println!("\n{} Complete.\n", "✓".green().bold());
    }

    let report = match generate_report(&summary, format) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} Failed to render report: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = save_report(&report, path) {
                eprintln!(
                    "{} Failed to write report to {}: {}",
                    "✗".red().bold(),
                    path.display(),
                    e
                );
                std::process::exit(1);
            }
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }
}

pub async fn handle_peers(sub_matches: &ArgMatches) {
    let peers = match list_seed_peers(sub_matches).await {
        Ok(peers) => peers,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    for peer in &peers {
        println!("{}", peer);
    }
    eprintln!("{} {} peer(s)", "✓".green().bold(), peers.len());
}

async fn list_seed_peers(sub_matches: &ArgMatches) -> anyhow::Result<Vec<String>> {
    let options = crawl_options_from_args(sub_matches)?;
    let gateway = HttpGateway::from_options(&options)?;
    gateway
        .list_immediate_peers()
        .await
        .with_context(|| format!("Failed to list peers of {}", gateway.endpoint_label()))
}
