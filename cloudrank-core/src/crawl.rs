use crate::data::Database;
use cloudrank_scanner::client::{DEFAULT_API_URL, DEFAULT_PAGE_SIZE};
use cloudrank_scanner::crawler::{DEFAULT_FOLLOWER_PAGE_CAP, DEFAULT_WORKERS};
use cloudrank_scanner::{ApiClient, CrawlProgress, CrawlStats, Crawler, ResultStream, UserId};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Well-known account the crawl starts from when none is given.
pub const DEFAULT_SEED: UserId = 16730;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub db_path: PathBuf,
    pub seed: UserId,
    pub client_id: String,
    pub api_url: String,
    pub page_size: usize,
    pub threads: usize,
    /// Pages of followers read per user, `None` for all of them
    pub follower_page_cap: Option<usize>,
    /// Frontier size past which new discoveries are dropped
    pub frontier_capacity: Option<usize>,
    /// Results buffered ahead of the writer before workers wait
    pub inbox_capacity: Option<usize>,
    pub max_users: Option<usize>,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(db_path: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            seed: DEFAULT_SEED,
            client_id: client_id.into(),
            api_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            threads: DEFAULT_WORKERS,
            follower_page_cap: Some(DEFAULT_FOLLOWER_PAGE_CAP),
            frontier_capacity: None,
            inbox_capacity: None,
            max_users: None,
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub saved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub crawl: CrawlStats,
    pub writer: WriterStats,
}

/// Starts the single persistence writer on a blocking thread. It owns `db`
/// and saves every result from `stream` until all senders are gone.
///
/// A failed save is logged and skipped; the writer keeps draining.
pub fn spawn_writer(mut db: Database, mut stream: ResultStream) -> JoinHandle<WriterStats> {
    tokio::task::spawn_blocking(move || {
        let mut stats = WriterStats::default();

        while let Some(result) = stream.blocking_recv() {
            match db.save_crawl_result(&result) {
                Ok(()) => {
                    stats.saved += 1;
                    info!(
                        "Saved {} ({}) with {} edges",
                        result.user.username,
                        result.user.id,
                        result.edges().count()
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    error!("Failed to save {}: {}", result.user.username, e);
                }
            }
        }

        info!("Writer finished: {} saved, {} failed", stats.saved, stats.failed);
        stats
    })
}

/// Execute a crawl with the given options
///
/// Opens (or creates) the database, crawls from the seed and persists every
/// result. Returns once the frontier closes and the writer has drained.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSummary, String> {
    let CrawlOptions {
        db_path,
        seed,
        client_id,
        api_url,
        page_size,
        threads,
        follower_page_cap,
        frontier_capacity,
        inbox_capacity,
        max_users,
        show_progress_bars,
    } = options;

    let db = Database::new(&db_path)
        .map_err(|e| format!("Failed to open database {}: {}", db_path.display(), e))?;

    let client = ApiClient::new(client_id)
        .and_then(|client| client.with_base_url(&api_url))
        .map_err(|e| format!("Failed to configure API client: {}", e))?
        .with_page_size(page_size);

    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Crawling from user {} into {}",
            seed,
            db_path.display()
        ));
    }

    // Set up single spinner for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let mut crawler = Crawler::new(client)
        .with_workers(threads)
        .with_follower_page_cap(follower_page_cap)
        .with_frontier_capacity(frontier_capacity)
        .with_max_users(max_users);

    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        crawler = crawler.with_progress_callback(Arc::new(
            move |_worker_id: usize, progress: &CrawlProgress| {
                pb.set_message(format!(
                    "Crawling... {} users crawled, {} in frontier (last: {})",
                    progress.crawled, progress.pending, progress.username
                ));
                pb.tick();
            },
        ));
    }

    let (sink, stream) = cloudrank_scanner::result_channel(inbox_capacity);
    let writer = spawn_writer(db, stream);

    let crawled = crawler.crawl(seed, sink).await;

    // The crawler dropped every sink, so the writer drains and stops.
    let writer = writer
        .await
        .map_err(|e| format!("Writer task failed: {}", e))?;
    let crawl = crawled.map_err(|e| format!("Crawl failed: {}", e))?;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete! {} users crawled, {} saved",
            crawl.succeeded, writer.saved
        ));
    }

    Ok(CrawlSummary { crawl, writer })
}
