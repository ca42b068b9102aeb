use clap::ArgMatches;
use cloudrank::commands::command_argument_builder;
use cloudrank::handlers::{handle_crawl, handle_rank, init_logging};
use colored::Colorize;

fn print_banner() {
    println!(
        "{} {}",
        "cloudrank".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "who moves the graph?".bright_black());
    println!();
}

async fn dispatch(chosen_command: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("rank", primary_command)) => handle_rank(primary_command, quiet),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

#[tokio::main]
async fn main() {
    let mut cmd = command_argument_builder();
    let chosen_command = cmd.get_matches_mut();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, show usage
        let _ = cmd.print_help();
        return;
    }

    init_logging(quiet);

    if let Err(e) = dispatch(&chosen_command, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
