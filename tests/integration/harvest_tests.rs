//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the store API and run complete
//! harvests end-to-end, checking the JSONL output and the checkpoint.

use catalog_harvester::config::{parse_config, Config};
use catalog_harvester::crawler::run_harvest;
use catalog_harvester::state::read_checkpoint;
use catalog_harvester::{HarvestError, RunControl};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG_PATH: &str = "/ISteamApps/GetAppList/v2";

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer, dir: &Path, max_items: u64, parallel: bool) -> Config {
    parse_config(&format!(
        r#"
[harvest]
max-items = {max_items}
max-reviews = 2
parallel = {parallel}
workers = 4
batch-pause-ms = 0
review-page-pause-ms = 0

[api]
catalog-url = "{base}{catalog}"
store-url = "{base}"

[output]
details-path = "{details}"
reviews-path = "{reviews}"
checkpoint-path = "{checkpoint}"
"#,
        base = server.uri(),
        catalog = CATALOG_PATH,
        details = dir.join("details.jsonl").display(),
        reviews = dir.join("reviews.jsonl").display(),
        checkpoint = dir.join("harvest.progress").display(),
    ))
    .expect("Failed to parse test config")
}

async fn mount_catalog(server: &MockServer, apps: &[(u64, &str)]) {
    let apps: Vec<Value> = apps
        .iter()
        .map(|(id, name)| json!({"appid": id, "name": name}))
        .collect();

    Mock::given(method("GET"))
        .and(path(CATALOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"applist": {"apps": apps}})))
        .mount(server)
        .await;
}

/// Detail endpoint answering for one id
fn detail_mock(id: u64, data: Value) -> Mock {
    let mut body = serde_json::Map::new();
    body.insert(id.to_string(), json!({"success": true, "data": data}));

    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Object(body)))
}

async fn mount_detail(server: &MockServer, id: u64, data: Value, expected_calls: u64) {
    detail_mock(id, data).expect(expected_calls).mount(server).await;
}

async fn mount_reviews(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/appreviews/{}", id)))
        .and(query_param("cursor", "*"))
        .and(query_param("num_per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "cursor": "AoJ4",
            "reviews": [
                {
                    "recommendationid": format!("{}01", id),
                    "review": "Solid game with a great soundtrack",
                    "timestamp_created": 1_600_000_000,
                    "timestamp_updated": 1_600_100_000,
                    "voted_up": true
                },
                {
                    "recommendationid": format!("{}02", id),
                    "review": "Meh",
                    "timestamp_created": 1_600_000_000,
                    "timestamp_updated": 1_600_000_000,
                    "voted_up": false
                }
            ]
        })))
        .mount(server)
        .await;
}

fn game(name: &str) -> Value {
    json!({
        "type": "game",
        "name": name,
        "categories": [{"id": 2, "description": "Single-player"}]
    })
}

fn dlc(name: &str) -> Value {
    json!({
        "type": "dlc",
        "name": name,
        "categories": [{"id": 21, "description": "Downloadable Content"}]
    })
}

fn read_jsonl(path: &str) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Output line is not valid JSON"))
        .collect()
}

fn ids_in(records: &[Value]) -> Vec<u64> {
    let mut ids: Vec<u64> = records.iter().filter_map(|r| r["appid"].as_u64()).collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_full_harvest_writes_details_and_reviews() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, &[(10, "Alpha"), (20, "Beta"), (30, "Alpha Soundtrack")]).await;
    mount_detail(&server, 10, game("Alpha"), 1).await;
    mount_detail(&server, 20, game("Beta"), 1).await;
    detail_mock(30, dlc("Alpha Soundtrack")).mount(&server).await;
    mount_reviews(&server, 10).await;
    mount_reviews(&server, 20).await;

    let config = create_test_config(&server, dir.path(), 2, false);
    let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
        .await
        .expect("Harvest failed");

    assert_eq!(summary.accepted, 2);
    assert!(summary.goal_met());

    // Only the two games pass the filter
    let details = read_jsonl(&config.output.details_path);
    assert_eq!(ids_in(&details), vec![10, 20]);
    assert!(details.iter().all(|d| d["type"] == "game"));

    let reviews = read_jsonl(&config.output.reviews_path);
    assert_eq!(reviews.len(), 4);
    let updated = reviews
        .iter()
        .find(|r| r["recommendationid"] == "1001")
        .expect("Review 1001 missing");
    assert_eq!(updated["appid"], 10);
    assert_eq!(updated["review_word_count"], 6);
    assert_eq!(updated["created_date"], "2020-09-13");
    assert_eq!(updated["was_updated"], true);

    let untouched = reviews
        .iter()
        .find(|r| r["recommendationid"] == "2002")
        .expect("Review 2002 missing");
    assert_eq!(untouched["appid"], 20);
    assert_eq!(untouched["review_char_count"], 3);
    assert_eq!(untouched["was_updated"], false);

    let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
        .expect("Checkpoint missing");
    assert!(checkpoint.processed.contains(&10));
    assert!(checkpoint.processed.contains(&20));
    assert!(!checkpoint.processed.contains(&30));
    assert!(checkpoint.reserved.is_empty());
    assert_eq!(checkpoint.total_accepted, 2);
    assert!(checkpoint.timestamp.is_some());
}

#[tokio::test]
async fn test_parallel_harvest_stops_at_goal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let apps: Vec<(u64, String)> = (1..=12).map(|id| (id, format!("Game {}", id))).collect();
    let listing: Vec<(u64, &str)> = apps.iter().map(|(id, name)| (*id, name.as_str())).collect();
    mount_catalog(&server, &listing).await;
    for (id, name) in &apps {
        detail_mock(*id, game(name)).mount(&server).await;
        mount_reviews(&server, *id).await;
    }

    let config = create_test_config(&server, dir.path(), 5, true);
    let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
        .await
        .expect("Harvest failed");

    assert_eq!(summary.accepted, 5);

    // The goal is never overshot, whatever the interleaving
    let details = read_jsonl(&config.output.details_path);
    assert_eq!(details.len(), 5);
    let mut ids = ids_in(&details);
    ids.dedup();
    assert_eq!(ids.len(), 5);

    let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
        .expect("Checkpoint missing");
    assert_eq!(checkpoint.processed.len(), 5);
    assert!(checkpoint.reserved.is_empty());
}

#[tokio::test]
async fn test_resumed_harvest_skips_harvested_items() {
    let dir = TempDir::new().unwrap();

    // First run accepts both listed games
    {
        let server = MockServer::start().await;
        mount_catalog(&server, &[(10, "Alpha"), (20, "Beta")]).await;
        mount_detail(&server, 10, game("Alpha"), 1).await;
        mount_detail(&server, 20, game("Beta"), 1).await;
        mount_reviews(&server, 10).await;
        mount_reviews(&server, 20).await;

        let config = create_test_config(&server, dir.path(), 2, false);
        let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
            .await
            .expect("First harvest failed");
        assert_eq!(summary.accepted, 2);
    }

    // Second run raises the goal; only the new item is fetched
    let server = MockServer::start().await;
    mount_catalog(&server, &[(10, "Alpha"), (20, "Beta"), (40, "Gamma")]).await;
    mount_detail(&server, 10, game("Alpha"), 0).await;
    mount_detail(&server, 20, game("Beta"), 0).await;
    mount_detail(&server, 40, game("Gamma"), 1).await;
    mount_reviews(&server, 40).await;

    let config = create_test_config(&server, dir.path(), 3, false);
    let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
        .await
        .expect("Resumed harvest failed");

    assert_eq!(summary.accepted, 3);
    assert_eq!(ids_in(&read_jsonl(&config.output.details_path)), vec![10, 20, 40]);
    assert_eq!(read_jsonl(&config.output.reviews_path).len(), 6);

    let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
        .expect("Checkpoint missing");
    assert_eq!(checkpoint.total_accepted, 3);
}

#[tokio::test]
async fn test_goal_already_met_fetches_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, &[(10, "Alpha"), (20, "Beta")]).await;
    mount_detail(&server, 10, game("Alpha"), 0).await;
    mount_detail(&server, 20, game("Beta"), 0).await;

    let config = create_test_config(&server, dir.path(), 1, false);
    std::fs::write(
        &config.output.details_path,
        "{\"appid\":10,\"name\":\"Alpha\"}\n",
    )
    .unwrap();

    let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
        .await
        .expect("Harvest failed");

    assert_eq!(summary.accepted, 1);
    assert!(summary.goal_met());

    let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
        .expect("Checkpoint missing");
    assert!(checkpoint.processed.contains(&10));
}

#[tokio::test]
async fn test_reset_discards_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, &[(10, "Alpha")]).await;
    mount_detail(&server, 10, game("Alpha"), 1).await;
    mount_reviews(&server, 10).await;

    let config = create_test_config(&server, dir.path(), 1, false);

    // A stale checkpoint claims the only item was processed
    let stale = json!({"processed": [10], "total_accepted": 1});
    std::fs::write(&config.output.checkpoint_path, stale.to_string()).unwrap();

    let summary = run_harvest(&config, Arc::new(RunControl::new()), true)
        .await
        .expect("Harvest failed");

    assert_eq!(summary.accepted, 1);
    assert_eq!(ids_in(&read_jsonl(&config.output.details_path)), vec![10]);
}

#[tokio::test]
async fn test_empty_catalog_is_an_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, &[]).await;

    let config = create_test_config(&server, dir.path(), 1, false);
    let result = run_harvest(&config, Arc::new(RunControl::new()), false).await;

    assert!(matches!(result, Err(HarvestError::EmptyCatalog)));
    assert!(Path::new(&config.output.checkpoint_path).exists());
}

#[tokio::test]
async fn test_failed_item_is_retried_on_next_run() {
    let dir = TempDir::new().unwrap();

    // First run: item 20 is unavailable and ends failed
    {
        let server = MockServer::start().await;
        mount_catalog(&server, &[(10, "Alpha"), (20, "Beta")]).await;
        mount_detail(&server, 10, game("Alpha"), 1).await;
        Mock::given(method("GET"))
            .and(path("/api/appdetails"))
            .and(query_param("appids", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"20": {"success": false}})))
            .expect(1)
            .mount(&server)
            .await;
        mount_reviews(&server, 10).await;

        let config = create_test_config(&server, dir.path(), 2, false);
        let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
            .await
            .expect("First harvest failed");
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.failed, 1);

        let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
            .expect("Checkpoint missing");
        assert!(checkpoint.failed.contains(&20));
    }

    // Second run: item 20 is available now and gets fetched again
    let server = MockServer::start().await;
    mount_catalog(&server, &[(10, "Alpha"), (20, "Beta")]).await;
    mount_detail(&server, 10, game("Alpha"), 0).await;
    mount_detail(&server, 20, game("Beta"), 1).await;
    mount_reviews(&server, 20).await;

    let config = create_test_config(&server, dir.path(), 2, false);
    let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
        .await
        .expect("Retry harvest failed");

    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(ids_in(&read_jsonl(&config.output.details_path)), vec![10, 20]);

    let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
        .expect("Checkpoint missing");
    assert!(checkpoint.processed.contains(&20));
    assert!(checkpoint.failed.is_empty());
}

#[tokio::test]
async fn test_interrupted_reservation_is_harvested_on_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, &[(30, "Gamma")]).await;
    mount_detail(&server, 30, game("Gamma"), 1).await;
    mount_reviews(&server, 30).await;

    let config = create_test_config(&server, dir.path(), 1, false);

    // An interrupted run left item 30 claimed
    let interrupted = json!({"reserved": [30], "total_accepted": 0});
    std::fs::write(&config.output.checkpoint_path, interrupted.to_string()).unwrap();

    let summary = run_harvest(&config, Arc::new(RunControl::new()), false)
        .await
        .expect("Harvest failed");

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.reserved, 0);
    assert_eq!(ids_in(&read_jsonl(&config.output.details_path)), vec![30]);

    let checkpoint = read_checkpoint(Path::new(&config.output.checkpoint_path))
        .expect("Checkpoint missing");
    assert!(checkpoint.processed.contains(&30));
    assert!(checkpoint.reserved.is_empty());
}
