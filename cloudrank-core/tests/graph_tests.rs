// Tests for graph building from stored crawl results

use cloudrank_core::data::Database;
use cloudrank_core::graph::build_graph;
use cloudrank_scanner::result::{CrawlResult, Edge, EdgeKind, UserRecord};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("graph.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn user(id: u64) -> CrawlResult {
    CrawlResult::new(UserRecord::new(
        id,
        format!("user{}", id),
        format!("https://soundcloud.com/user{}", id),
    ))
}

#[test]
fn test_interactions_aggregate_into_weight() {
    let (_temp_dir, mut db) = create_test_db();

    let mut one = user(1);
    one.followings = vec![Edge::following(1, 2)];
    one.likes = vec![
        Edge::via(EdgeKind::Like, 1, 2, 501),
        Edge::via(EdgeKind::Like, 1, 2, 502),
    ];
    db.save_crawl_result(&one).unwrap();

    let graph = build_graph(&db).unwrap();
    assert_eq!(graph.weight(1, 2), 3);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_every_edge_kind_counts() {
    let (_temp_dir, mut db) = create_test_db();

    let mut one = user(1);
    one.followings = vec![Edge::following(1, 2)];
    one.comments = vec![Edge::via(EdgeKind::Comment, 1, 2, 70)];
    one.likes = vec![Edge::via(EdgeKind::Like, 1, 3, 80)];
    one.reposts = vec![Edge::via(EdgeKind::Repost, 1, 3, 90)];
    db.save_crawl_result(&one).unwrap();

    let graph = build_graph(&db).unwrap();
    assert_eq!(graph.weight(1, 2), 2);
    assert_eq!(graph.weight(1, 3), 2);
    assert_eq!(graph.out_weight(1), 4);
}

#[test]
fn test_uncrawled_targets_are_dangling_nodes() {
    let (_temp_dir, mut db) = create_test_db();

    let mut one = user(1);
    one.followings = vec![Edge::following(1, 999)];
    db.save_crawl_result(&one).unwrap();

    let graph = build_graph(&db).unwrap();
    assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![1, 999]);
    assert_eq!(graph.out_weight(999), 0);
    assert_eq!(graph.label(1), Some("https://soundcloud.com/user1"));
    assert_eq!(graph.label(999), None);
}

#[test]
fn test_recrawl_does_not_double_weights() {
    let (_temp_dir, mut db) = create_test_db();

    let mut one = user(1);
    one.followings = vec![Edge::following(1, 2)];
    db.save_crawl_result(&one).unwrap();
    db.save_crawl_result(&one).unwrap();

    let graph = build_graph(&db).unwrap();
    assert_eq!(graph.weight(1, 2), 1);
}

#[test]
fn test_empty_database_gives_empty_graph() {
    let (_temp_dir, db) = create_test_db();

    let graph = build_graph(&db).unwrap();
    assert!(graph.is_empty());
    assert_eq!(graph.edge_count(), 0);
}
