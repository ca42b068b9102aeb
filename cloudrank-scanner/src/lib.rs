pub mod api;
pub mod client;
pub mod crawler;
pub mod error;
pub mod frontier;
pub mod inbox;
pub mod result;

pub use client::ApiClient;
pub use crawler::{CrawlProgress, CrawlStats, Crawler, ProgressCallback};
pub use error::{CrawlUnitError, ScanError};
pub use frontier::Frontier;
pub use inbox::{ResultSink, ResultStream, result_channel};
pub use result::{CrawlResult, Edge, EdgeKind, UserId, UserRecord};
