use obcrawl::commands::command_argument_builder;
use obcrawl::handlers::{handle_crawl, handle_peers, init_tracing};
use obcrawl_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_tracing(quiet, verbose);

    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("peers", primary_command)) => handle_peers(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
