use crate::api::{ApiComment, ApiTrack, Collection, MediaItem, UserSummary, track_totals, tracks_only};
use crate::client::ApiClient;
use crate::error::{CrawlUnitError, Result};
use crate::frontier::Frontier;
use crate::inbox::ResultSink;
use crate::result::{CrawlResult, Edge, EdgeKind, UserId, UserRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

pub const DEFAULT_WORKERS: usize = 20;
pub const DEFAULT_FOLLOWER_PAGE_CAP: usize = 5;

/// Snapshot handed to the progress callback after each crawled user.
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    pub user_id: UserId,
    pub username: String,
    pub crawled: usize,
    pub pending: usize,
}

pub type ProgressCallback = Arc<dyn Fn(usize, &CrawlProgress) + Send + Sync>;

/// Totals for one crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub shed: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Clone)]
struct WorkerContext {
    client: ApiClient,
    frontier: Arc<Frontier>,
    sink: ResultSink,
    counters: Arc<Counters>,
    follower_page_cap: Option<usize>,
    max_users: Option<usize>,
    progress_callback: Option<ProgressCallback>,
}

pub struct Crawler {
    client: ApiClient,
    workers: usize,
    follower_page_cap: Option<usize>,
    frontier_capacity: Option<usize>,
    max_users: Option<usize>,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            workers: DEFAULT_WORKERS,
            follower_page_cap: Some(DEFAULT_FOLLOWER_PAGE_CAP),
            frontier_capacity: None,
            max_users: None,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Pages of followers read per user; `None` reads them all.
    pub fn with_follower_page_cap(mut self, pages: Option<usize>) -> Self {
        self.follower_page_cap = pages;
        self
    }

    pub fn with_frontier_capacity(mut self, capacity: Option<usize>) -> Self {
        self.frontier_capacity = capacity;
        self
    }

    /// Stops dispatching once this many users were taken from the frontier.
    pub fn with_max_users(mut self, max_users: Option<usize>) -> Self {
        self.max_users = max_users;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawls outward from `seed` until the frontier closes, sending one
    /// `CrawlResult` per successfully crawled user into `sink`.
    pub async fn crawl(&self, seed: UserId, sink: ResultSink) -> Result<CrawlStats> {
        info!("Starting crawl from user {} with {} workers", seed, self.workers);

        let frontier = Arc::new(match self.frontier_capacity {
            Some(capacity) => Frontier::with_capacity(capacity),
            None => Frontier::new(),
        });
        frontier.enqueue(seed).await;

        let context = WorkerContext {
            client: self.client.clone(),
            frontier: frontier.clone(),
            sink,
            counters: Arc::new(Counters::default()),
            follower_page_cap: self.follower_page_cap,
            max_users: self.max_users,
            progress_callback: self.progress_callback.clone(),
        };
        let counters = context.counters.clone();

        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| tokio::spawn(Self::run_worker(worker_id, context.clone())))
            .collect();
        drop(context);

        for joined in futures::future::join_all(handles).await {
            joined?;
        }

        let stats = CrawlStats {
            dispatched: counters.dispatched.load(Ordering::SeqCst),
            succeeded: counters.succeeded.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            shed: frontier.shed_count().await,
        };
        info!(
            "Crawl complete. {} users crawled, {} failed, {} visited",
            stats.succeeded,
            stats.failed,
            frontier.visited_count().await
        );
        Ok(stats)
    }

    async fn run_worker(worker_id: usize, ctx: WorkerContext) {
        debug!("Worker {} started", worker_id);

        while let Some(user_id) = ctx.frontier.dequeue().await {
            if !ctx.frontier.claim(user_id).await {
                debug!("[Worker {}] User {} already visited", worker_id, user_id);
                ctx.frontier.complete().await;
                continue;
            }

            let admitted = ctx
                .counters
                .dispatched
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match ctx.max_users {
                    Some(max) if n >= max => None,
                    _ => Some(n + 1),
                })
                .is_ok();
            if !admitted {
                info!("Traversal limit reached, closing frontier");
                ctx.frontier.close().await;
                ctx.frontier.complete().await;
                break;
            }

            match crawl_user(&ctx.client, user_id, ctx.follower_page_cap).await {
                Ok(result) => {
                    let discovered: Vec<UserId> = result.discovered().collect();
                    let username = result.user.username.clone();
                    info!(
                        "Crawled {} ({}): {} followings, {} comments, {} likes, {} reposts",
                        username,
                        user_id,
                        result.followings.len(),
                        result.comments.len(),
                        result.likes.len(),
                        result.reposts.len()
                    );

                    if let Err(result) = ctx.sink.send(result).await {
                        error!(
                            "Result inbox closed, dropping {} and stopping",
                            result.user.username
                        );
                        ctx.frontier.close().await;
                        ctx.frontier.complete().await;
                        break;
                    }
                    let crawled = ctx.counters.succeeded.fetch_add(1, Ordering::SeqCst) + 1;

                    let mut queued = 0;
                    for id in &discovered {
                        if ctx.frontier.offer(*id).await {
                            queued += 1;
                        }
                    }
                    debug!(
                        "[Worker {}] Queued {} of {} users discovered from {}",
                        worker_id,
                        queued,
                        discovered.len(),
                        user_id
                    );

                    if let Some(ref callback) = ctx.progress_callback {
                        let progress = CrawlProgress {
                            user_id,
                            username,
                            crawled,
                            pending: ctx.frontier.len().await,
                        };
                        callback(worker_id, &progress);
                    }
                }
                Err(e) => {
                    ctx.counters.failed.fetch_add(1, Ordering::SeqCst);
                    warn!("{}", e);
                }
            }

            ctx.frontier.complete().await;
        }

        debug!("Worker {} finished", worker_id);
    }
}

/// Fetches and derives everything about one user. Either the whole unit
/// succeeds or nothing is produced.
pub async fn crawl_user(
    client: &ApiClient,
    user_id: UserId,
    follower_page_cap: Option<usize>,
) -> std::result::Result<CrawlResult, CrawlUnitError> {
    let user = client
        .get_user(user_id)
        .await
        .map_err(|e| CrawlUnitError::new(user_id, None, e))?;
    let username = user.username.clone();

    collect_relations(client, user, follower_page_cap)
        .await
        .map_err(|e| CrawlUnitError::new(user_id, Some(username), e))
}

async fn collect_relations(
    client: &ApiClient,
    user: UserRecord,
    follower_page_cap: Option<usize>,
) -> Result<CrawlResult> {
    let id = user.id;

    let (followings, likes, comments, reposts) = tokio::try_join!(
        client.collect_all::<UserSummary>(Collection::Followings, id, None),
        client.collect_all::<MediaItem>(Collection::Likes, id, None),
        client.collect_all::<ApiComment>(Collection::Comments, id, None),
        client.collect_all::<MediaItem>(Collection::Reposts, id, None),
    )?;
    let likes = tracks_only(likes);
    let reposts = tracks_only(reposts);

    let mut unresolved: Vec<u64> = likes
        .iter()
        .chain(&reposts)
        .filter(|item| item.user_id.is_none())
        .map(|item| item.id)
        .chain(comments.iter().map(|comment| comment.track_id))
        .collect();
    unresolved.sort_unstable();
    unresolved.dedup();
    let owners = client.resolve_track_owners(&unresolved).await?;

    let tracks: Vec<ApiTrack> = client.collect_all(Collection::Tracks, id, None).await?;
    let (plays, track_likes, track_comments) = track_totals(&tracks);

    let followers: Vec<UserSummary> = client
        .collect_all(Collection::Followers, id, follower_page_cap)
        .await?;

    let mut result = CrawlResult::new(user.with_totals(plays, track_likes, track_comments));
    result.followings = followings
        .iter()
        .map(|followed| Edge::following(id, followed.id))
        .collect();
    result.likes = media_edges(EdgeKind::Like, id, &likes, &owners);
    result.reposts = media_edges(EdgeKind::Repost, id, &reposts, &owners);
    result.comments = comments
        .iter()
        .filter_map(|comment| match owners.get(&comment.track_id) {
            Some(&owner) => Some(Edge::via(EdgeKind::Comment, id, owner, comment.id)),
            None => {
                debug!(
                    "Dropping comment {} by user {}: owner of track {} unknown",
                    comment.id, id, comment.track_id
                );
                None
            }
        })
        .collect();
    result.followers = followers.into_iter().map(|follower| follower.id).collect();

    Ok(result)
}

fn media_edges(
    kind: EdgeKind,
    source: UserId,
    items: &[MediaItem],
    owners: &HashMap<u64, UserId>,
) -> Vec<Edge> {
    items
        .iter()
        .filter_map(|item| {
            let owner = item.user_id.or_else(|| owners.get(&item.id).copied());
            if owner.is_none() {
                debug!(
                    "Dropping {} of track {} by user {}: owner unknown",
                    kind.as_str(),
                    item.id,
                    source
                );
            }
            owner.map(|owner| Edge::via(kind, source, owner, item.id))
        })
        .collect()
}
