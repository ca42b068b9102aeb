use anyhow::{Context, bail};
use clap::ArgMatches;
use cloudrank_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl};
use cloudrank_core::data::Database;
use cloudrank_core::report::{
    DEFAULT_TOP, ReportFormat, ReportOptions, gather_rank_data, generate_header, generate_json_report,
    generate_text_report,
};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DB_PATH: &str = "~/.config/cloudrank/cloudrank.db";
pub const CLIENT_ID_ENV: &str = "CLOUDRANK_CLIENT_ID";

/// Installs the stderr log subscriber. `RUST_LOG` wins over the default
/// level, which is `warn` when quiet and `info` otherwise.
pub fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Ignore a second install (tests call handlers repeatedly)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Expands `~` in a database path.
pub fn resolve_db_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Expands the path and creates its parent directories.
pub fn prepare_db_path(raw: &str) -> anyhow::Result<PathBuf> {
    let path = resolve_db_path(raw);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory {}", parent.display())
        })?;
    }
    Ok(path)
}

/// Picks the API client id from the flag, falling back to the environment.
pub fn resolve_client_id(flag: Option<&str>, env: Option<String>) -> anyhow::Result<String> {
    let client_id = flag
        .map(str::to_string)
        .or(env)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    match client_id {
        Some(id) => Ok(id),
        None => bail!(
            "No API client id given. Pass --client-id or set {}",
            CLIENT_ID_ENV
        ),
    }
}

/// `0` means every page.
pub fn follower_page_cap(pages: usize) -> Option<usize> {
    if pages == 0 { None } else { Some(pages) }
}

/// Turns the `crawl` arguments into crawl options.
pub fn crawl_options_from_matches(
    sub_matches: &ArgMatches,
    env_client_id: Option<String>,
) -> anyhow::Result<CrawlOptions> {
    let db = sub_matches
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or(DEFAULT_DB_PATH);
    let db_path = prepare_db_path(db)?;
    let client_id = resolve_client_id(
        sub_matches.get_one::<String>("client-id").map(String::as_str),
        env_client_id,
    )?;

    let mut options = CrawlOptions::new(db_path, client_id);
    if let Some(seed) = sub_matches.get_one::<u64>("USER_ID") {
        options.seed = *seed;
    }
    if let Some(threads) = sub_matches.get_one::<usize>("threads") {
        options.threads = *threads;
    }
    if let Some(pages) = sub_matches.get_one::<usize>("follower-pages") {
        options.follower_page_cap = follower_page_cap(*pages);
    }
    if let Some(api_url) = sub_matches.get_one::<String>("api-url") {
        options.api_url = api_url.clone();
    }
    if let Some(page_size) = sub_matches.get_one::<usize>("page-size") {
        options.page_size = *page_size;
    }
    options.max_users = sub_matches.get_one::<usize>("limit").copied();
    options.frontier_capacity = sub_matches.get_one::<usize>("queue-capacity").copied();
    options.inbox_capacity = sub_matches.get_one::<usize>("inbox-capacity").copied();

    Ok(options)
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let mut options = crawl_options_from_matches(sub_matches, std::env::var(CLIENT_ID_ENV).ok())?;
    options.show_progress_bars = !quiet;

    if !quiet {
        println!(
            "\n{} Crawling from user {}",
            "→".blue(),
            options.seed.to_string().bright_white()
        );
        println!("Workers: {}", options.threads);
        println!(
            "Follower pages per user: {}",
            options
                .follower_page_cap
                .map(|p| p.to_string())
                .unwrap_or_else(|| "all".to_string())
        );
        if let Some(limit) = options.max_users {
            println!("Limit: {} users", limit);
        }
        println!("Database: {}\n", options.db_path.display());
    }

    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{}", msg);
        }))
    };

    let summary = execute_crawl(options, progress_callback)
        .await
        .map_err(anyhow::Error::msg)?;

    if !quiet {
        println!("\n{} Crawl complete!", "✓".green().bold());
    }
    println!(
        "Crawled {} users ({} failed), saved {} ({} failed), {} discoveries dropped",
        summary.crawl.succeeded,
        summary.crawl.failed,
        summary.writer.saved,
        summary.writer.failed,
        summary.crawl.shed
    );

    Ok(())
}

/// Opens the database for ranking. It must already exist.
pub fn open_for_rank(path: &Path) -> anyhow::Result<Database> {
    if !Database::exists(path) {
        bail!(
            "No database at {}. Run `cloudrank crawl` first.",
            path.display()
        );
    }
    Database::open_existing(path)
        .with_context(|| format!("Failed to open database {}", path.display()))
}

/// Renders the rank report for `db` in the requested format.
pub fn render_rank_report(
    db: &Database,
    options: &ReportOptions,
    with_header: bool,
) -> anyhow::Result<String> {
    let data = gather_rank_data(db, options).context("Failed to read the stored graph")?;

    let mut out = String::new();
    match options.format {
        ReportFormat::Text => {
            if with_header {
                out.push_str(&generate_header(&data));
                out.push('\n');
            }
            out.push_str(&generate_text_report(&data));
        }
        ReportFormat::Json => {
            out.push_str(&generate_json_report(&data)?);
            out.push('\n');
        }
    }
    Ok(out)
}

pub fn handle_rank(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let db = sub_matches
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or(DEFAULT_DB_PATH);
    let db_path = resolve_db_path(db);
    let db = open_for_rank(&db_path)?;

    let options = ReportOptions {
        top: sub_matches.get_one::<usize>("top").copied().unwrap_or(DEFAULT_TOP),
        format: sub_matches
            .get_one::<String>("format")
            .and_then(|f| ReportFormat::from_str(f))
            .unwrap_or(ReportFormat::Text),
        ..ReportOptions::default()
    };

    if !quiet {
        eprintln!("{} Building graph...", "→".blue());
    }
    let report = render_rank_report(&db, &options, !quiet)?;
    print!("{}", report);

    Ok(())
}
