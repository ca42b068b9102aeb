pub mod commands;

// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export crawl functionality from cloudrank-core
pub use cloudrank_core::crawl::{CrawlOptions, CrawlProgressCallback, CrawlSummary, execute_crawl};
pub use cloudrank_core::report::{ReportFormat, ReportOptions};
