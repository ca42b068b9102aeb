use crate::handlers::DEFAULT_DB_PATH;
use clap::{arg, command};
use cloudrank_scanner::client::DEFAULT_API_URL;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn db_arg() -> clap::Arg {
    arg!(-d --"db" <PATH>)
        .required(false)
        .help("Location of the cloudrank database")
        .default_value(DEFAULT_DB_PATH)
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("cloudrank")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("cloudrank")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl the follow and interaction graph outward from a seed user, storing \
                every crawled user and their interactions.",
                )
                .arg(
                    arg!([USER_ID])
                        .required(false)
                        .help("Id of the user to start from")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("16730"),
                )
                .arg(db_arg())
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async worker 'threads' in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"follower-pages" <PAGES>)
                        .required(false)
                        .help("Pages of followers read per user (0 reads all of them)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"limit" <USERS>)
                        .required(false)
                        .help("Stop after this many users were crawled (default: no limit)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"queue-capacity" <IDS>)
                        .required(false)
                        .help("Maximum pending users; further discoveries are dropped")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"inbox-capacity" <RESULTS>)
                        .required(false)
                        .help("Results buffered ahead of the database writer before workers wait")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"client-id" <ID>)
                        .required(false)
                        .help("API client id (default: $CLOUDRANK_CLIENT_ID)"),
                )
                .arg(
                    arg!(--"api-url" <URL>)
                        .required(false)
                        .help("Base URL of the API")
                        .default_value(DEFAULT_API_URL),
                )
                .arg(
                    arg!(--"page-size" <ITEMS>)
                        .required(false)
                        .help("Items requested per page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("200"),
                ),
        )
        .subcommand(
            command!("rank")
                .about("Rank every stored user by weighted PageRank and print the most influential.")
                .arg(db_arg())
                .arg(
                    arg!(-n --"top" <COUNT>)
                        .required(false)
                        .help("Number of users to print")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}
