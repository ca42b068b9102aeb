// End-to-end tests: crawl a mocked API into SQLite, then rank it

use cloudrank_core::crawl::{CrawlOptions, execute_crawl};
use cloudrank_core::data::Database;
use cloudrank_core::graph::build_graph;
use cloudrank_core::rank::PageRank;
use cloudrank_core::report::{ReportOptions, gather_rank_data, generate_text_report};
use cloudrank_scanner::result::EdgeKind;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, route: String, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn page(items: Vec<Value>) -> Value {
    json!({ "collection": items, "next_href": null })
}

/// Mounts a user following `followings`, with one liked track per entry of
/// `likes` given as `(track id, owner id)`.
async fn mount_user(server: &MockServer, id: u64, followings: &[u64], likes: &[(u64, u64)]) {
    mount_json(
        server,
        format!("/users/{}", id),
        json!({
            "id": id,
            "username": format!("user{}", id),
            "permalink_url": format!("https://soundcloud.com/user{}", id),
        }),
    )
    .await;

    let followings = followings.iter().map(|f| json!({ "id": f })).collect();
    let likes = likes
        .iter()
        .map(|(track, owner)| json!({ "kind": "track", "id": track, "user_id": owner }))
        .collect();

    mount_json(server, format!("/users/{}/followings", id), page(followings)).await;
    mount_json(server, format!("/users/{}/followers", id), page(vec![])).await;
    mount_json(server, format!("/users/{}/likes", id), page(likes)).await;
    mount_json(server, format!("/users/{}/comments", id), page(vec![])).await;
    mount_json(server, format!("/users/{}/reposts", id), page(vec![])).await;
    mount_json(server, format!("/users/{}/tracks", id), page(vec![])).await;
}

fn options(server: &MockServer, db_path: &Path, seed: u64) -> CrawlOptions {
    let mut options = CrawlOptions::new(db_path, "test-client");
    options.seed = seed;
    options.api_url = server.uri();
    options.threads = 4;
    options.inbox_capacity = Some(8);
    options
}

#[tokio::test]
async fn test_crawl_persists_and_ranks() {
    let server = MockServer::start().await;
    mount_user(&server, 100, &[200], &[]).await;
    mount_user(&server, 200, &[], &[]).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    let summary = execute_crawl(options(&server, &db_path, 100), None)
        .await
        .unwrap();
    assert_eq!(summary.crawl.succeeded, 2);
    assert_eq!(summary.crawl.failed, 0);
    assert_eq!(summary.writer.saved, 2);

    let db = Database::open_existing(&db_path).unwrap();
    assert_eq!(db.edge_keys(EdgeKind::Following).unwrap(), vec!["100-200"]);
    assert_eq!(db.count_users().unwrap(), 2);

    let graph = build_graph(&db).unwrap();
    let ranking = PageRank::default().compute(&graph);
    assert!(ranking.score(200).unwrap() > ranking.score(100).unwrap());
}

#[tokio::test]
async fn test_repeated_crawl_is_idempotent() {
    let server = MockServer::start().await;
    mount_user(&server, 1, &[2], &[(501, 2), (502, 2)]).await;
    mount_user(&server, 2, &[1], &[]).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    execute_crawl(options(&server, &db_path, 1), None).await.unwrap();
    execute_crawl(options(&server, &db_path, 1), None).await.unwrap();

    let db = Database::open_existing(&db_path).unwrap();
    assert_eq!(db.count_users().unwrap(), 2);
    assert_eq!(db.count_edges(EdgeKind::Following).unwrap(), 2);
    assert_eq!(db.count_edges(EdgeKind::Like).unwrap(), 2);

    let graph = build_graph(&db).unwrap();
    assert_eq!(graph.weight(1, 2), 3);
    assert_eq!(graph.weight(2, 1), 1);
}

#[tokio::test]
async fn test_limit_stops_crawl() {
    let server = MockServer::start().await;
    mount_user(&server, 1, &[2], &[]).await;
    mount_user(&server, 2, &[3], &[]).await;
    mount_user(&server, 3, &[], &[]).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    let mut options = options(&server, &db_path, 1);
    options.threads = 1;
    options.max_users = Some(2);
    let summary = execute_crawl(options, None).await.unwrap();

    assert_eq!(summary.crawl.dispatched, 2);
    let db = Database::open_existing(&db_path).unwrap();
    assert_eq!(db.count_users().unwrap(), 2);
    assert!(db.get_user(3).unwrap().is_none());
}

#[tokio::test]
async fn test_failed_user_is_skipped() {
    let server = MockServer::start().await;
    // User 2 is not mounted, so every request for it answers 404
    mount_user(&server, 1, &[2, 3], &[]).await;
    mount_user(&server, 3, &[], &[]).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    let summary = execute_crawl(options(&server, &db_path, 1), None)
        .await
        .unwrap();
    assert_eq!(summary.crawl.succeeded, 2);
    assert_eq!(summary.crawl.failed, 1);

    let db = Database::open_existing(&db_path).unwrap();
    assert!(db.get_user(2).unwrap().is_none());
    assert!(db.get_user(3).unwrap().is_some());
    // The edge towards the failed user is still recorded
    assert_eq!(db.edge_targets(1, EdgeKind::Following).unwrap(), vec![2, 3]);
}

#[tokio::test]
async fn test_progress_callback_receives_messages() {
    let server = MockServer::start().await;
    mount_user(&server, 7, &[], &[]).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let callback = Arc::new(move |msg: String| sink.lock().unwrap().push(msg));

    execute_crawl(options(&server, &db_path, 7), Some(callback))
        .await
        .unwrap();

    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("user 7")));
}

#[tokio::test]
async fn test_rank_report_after_crawl() {
    let server = MockServer::start().await;
    mount_user(&server, 100, &[200], &[]).await;
    mount_user(&server, 200, &[], &[]).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    execute_crawl(options(&server, &db_path, 100), None)
        .await
        .unwrap();

    let db = Database::open_existing(&db_path).unwrap();
    let data = gather_rank_data(&db, &ReportOptions::default()).unwrap();
    assert_eq!(data.stored_users, 2);
    assert_eq!(data.stored_edges, 1);
    assert_eq!(data.ranked[0].user_id, 200);
    assert_eq!(data.ranked[0].url.as_deref(), Some("https://soundcloud.com/user200"));

    let report = generate_text_report(&data);
    let last = report.lines().last().unwrap();
    assert!(last.starts_with("https://soundcloud.com/user200: "));
}

#[tokio::test]
async fn test_unwritable_database_path_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("missing-dir").join("crawl.db");

    let options = CrawlOptions::new(&db_path, "test-client");
    let result = execute_crawl(options, None).await;
    assert!(result.is_err());
}
