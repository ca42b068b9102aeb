// Ranking reports from the database

use crate::data::Database;
use crate::graph::build_graph;
use crate::rank::{PageRank, PageRankConfig};
use cloudrank_scanner::result::{EdgeKind, UserId};
use rusqlite::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub top: usize,
    pub format: ReportFormat,
    pub pagerank: PageRankConfig,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top: DEFAULT_TOP,
            format: ReportFormat::Text,
            pagerank: PageRankConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub rank: usize,
    pub user_id: UserId,
    pub url: Option<String>,
    pub score: f64,
}

impl RankedUser {
    /// Profile URL when the user was crawled, the bare id otherwise.
    pub fn display_name(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankReportData {
    pub stored_users: usize,
    pub stored_edges: usize,
    pub nodes: usize,
    pub edges: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Best ranked first
    pub ranked: Vec<RankedUser>,
}

/// Builds the graph from `db`, ranks it and keeps the `options.top` best.
pub fn gather_rank_data(db: &Database, options: &ReportOptions) -> Result<RankReportData> {
    let graph = build_graph(db)?;
    let ranking = PageRank::new(options.pagerank).compute(&graph);

    let ranked = ranking
        .top(options.top)
        .iter()
        .enumerate()
        .map(|(idx, (user_id, score))| RankedUser {
            rank: idx + 1,
            user_id: *user_id,
            url: graph.label(*user_id).map(str::to_string),
            score: *score,
        })
        .collect();

    let mut stored_edges = 0;
    for kind in EdgeKind::ALL {
        stored_edges += db.count_edges(kind)?;
    }

    Ok(RankReportData {
        stored_users: db.count_users()?,
        stored_edges,
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        iterations: ranking.iterations(),
        converged: ranking.converged(),
        ranked,
    })
}

/// Header describing the graph and the PageRank run.
pub fn generate_header(data: &RankReportData) -> String {
    let mut header = String::new();
    header.push_str(&format!(
        "Graph: {} users stored, {} interactions stored\n",
        data.stored_users, data.stored_edges
    ));
    header.push_str(&format!(
        "       {} nodes, {} weighted edges\n",
        data.nodes, data.edges
    ));
    header.push_str(&format!(
        "PageRank: {} iterations ({})\n",
        data.iterations,
        if data.converged {
            "converged"
        } else {
            "iteration limit reached"
        }
    ));
    header
}

/// One `url-or-id: score` line per user, best ranked last.
pub fn generate_text_report(data: &RankReportData) -> String {
    let mut report = String::new();
    for user in data.ranked.iter().rev() {
        report.push_str(&format!("{}: {}\n", user.display_name(), user.score));
    }
    report
}

/// The ranked users as a JSON array, best ranked first.
pub fn generate_json_report(data: &RankReportData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&data.ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> RankReportData {
        RankReportData {
            stored_users: 1,
            stored_edges: 1,
            nodes: 2,
            edges: 1,
            iterations: 12,
            converged: true,
            ranked: vec![
                RankedUser {
                    rank: 1,
                    user_id: 200,
                    url: None,
                    score: 0.6,
                },
                RankedUser {
                    rank: 2,
                    user_id: 100,
                    url: Some("https://soundcloud.com/hundred".to_string()),
                    score: 0.4,
                },
            ],
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
        assert_eq!(ReportFormat::from_str("csv"), None);
    }

    #[test]
    fn test_text_report_lists_best_last() {
        let report = generate_text_report(&data());
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec!["https://soundcloud.com/hundred: 0.4", "200: 0.6"]
        );
    }

    #[test]
    fn test_json_report_lists_best_first() {
        let json = generate_json_report(&data()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed[0]["rank"], 1);
        assert_eq!(parsed[0]["user_id"], 200);
        assert!(parsed[0]["url"].is_null());
        assert_eq!(parsed[1]["url"], "https://soundcloud.com/hundred");
    }

    #[test]
    fn test_header_mentions_convergence() {
        let header = generate_header(&data());
        assert!(header.contains("2 nodes, 1 weighted edges"));
        assert!(header.contains("12 iterations (converged)"));
    }
}
