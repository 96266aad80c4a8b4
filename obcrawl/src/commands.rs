use clap::builder::RangedU64ValueParser;
use clap::{Arg, arg, command};
use obcrawl_scanner::options::DEFAULT_API_HOST;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

/// Flags locating and authenticating against the node API, shared by every
/// subcommand that talks to a node.
fn connection_args() -> Vec<Arg> {
    vec![
        arg!(--"api-host" <HOST>)
            .required(false)
            .help("Host to use when connecting to the OpenBazaar API")
            .default_value(DEFAULT_API_HOST),
        arg!(--"api-port" <PORT>)
            .required(false)
            .help("Port to use when connecting to the OpenBazaar API")
            .value_parser(clap::value_parser!(u16))
            .default_value("4002"),
        arg!(--"api-timeout" <SECONDS>)
            .required(false)
            .help("Time in seconds to wait before abandoning a request. 0 waits indefinitely")
            .value_parser(clap::value_parser!(u64))
            .default_value("60"),
        arg!(--"auth-cookie" <CONTENT>)
            .required(false)
            .help(".cookie content generated in the OpenBazaar data path")
            .conflicts_with("auth-cookie-file"),
        arg!(--"auth-cookie-file" <PATH>)
            .required(false)
            .help("Path to the .cookie file generated in the OpenBazaar data path")
            .conflicts_with("auth-cookie"),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("obcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("obcrawl")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner, progress and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log every assignment and worker completion").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Walk the peer network outward from the API node, counting the listings \
                hosted by every node reached.",
                )
                .args(connection_args())
                .arg(
                    arg!(-n --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("Number of concurrent crawlers making API requests")
                        .value_parser(RangedU64ValueParser::<usize>::new().range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"max-visits" <NUM_NODES>)
                        .required(false)
                        .help(
                            "Maximum number of nodes the workers will visit. 0 lets the crawler \
                        traverse the entire network",
                        )
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"stagger" <SECONDS>)
                        .required(false)
                        .help("Spread worker start-up over this many seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("0"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("peers")
                .about("List the API node's immediate peers, the seed set of a crawl")
                .args(connection_args()),
        )
}
