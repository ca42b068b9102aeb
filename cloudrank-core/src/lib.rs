pub mod crawl;
pub mod data;
pub mod graph;
pub mod rank;
pub mod report;
