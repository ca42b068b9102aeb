use crate::result::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response from {url}: {source}")]
    MalformedResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// A crawl unit that had to be abandoned. Carries whatever is known about the
/// user so the failure can be logged with context.
#[derive(Error, Debug)]
#[error("Crawl of {} failed: {source}", display_user(.user_id, .username))]
pub struct CrawlUnitError {
    pub user_id: UserId,
    pub username: Option<String>,
    #[source]
    pub source: ScanError,
}

impl CrawlUnitError {
    pub fn new(user_id: UserId, username: Option<String>, source: ScanError) -> Self {
        Self {
            user_id,
            username,
            source,
        }
    }
}

fn display_user(user_id: &UserId, username: &Option<String>) -> String {
    match username {
        Some(name) => format!("{} ({})", name, user_id),
        None => format!("user {}", user_id),
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
