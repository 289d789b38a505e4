use listing_harvester::config::{parse_config, Config};
use listing_harvester::harvest::{
    Command, EngineConfig, HydrationPolicy, Response, RunOutcome, StabilizationPolicy,
};
use listing_harvester::session::Session;
use listing_harvester::sink::HttpSink;
use listing_harvester::state::{QuotaSnapshot, Tier};
use listing_harvester::storage::{KeyValueStore, SqliteStore};
use listing_harvester::{HarvestError, InvocationReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing the sink at `server`
fn create_test_config(server: &MockServer, db_path: &Path) -> Config {
    let toml = format!(
        r#"
[sink]
endpoint = "{}/save-listings"
api-key = "secret"

[store]
database-path = "{}"

[pagination]
navigation-settle-ms = 0
"#,
        server.uri(),
        db_path.display()
    );
    parse_config(&toml).expect("test config is valid")
}

/// Renders a listing page; `next` is `(href, enabled)`
fn listing_page(listings: &[(&str, &str)], next: Option<(&str, bool)>) -> String {
    let mut html = String::from("<html><body><main>");
    for (id, address) in listings {
        html.push_str(&format!(
            r#"<article id="{id}"><a href="/homedetails/{id}">View</a><address>{address}</address></article>"#
        ));
    }
    html.push_str("</main><nav>");
    if let Some((href, enabled)) = next {
        let disabled = if enabled { "" } else { r#" aria-disabled="true""# };
        html.push_str(&format!(r#"<a rel="next" href="{href}"{disabled}>Next</a>"#));
    }
    html.push_str("</nav></body></html>");
    html
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Engine timing with every settle delay removed
fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        stabilization: StabilizationPolicy {
            sample_interval: Duration::from_millis(1),
            ..StabilizationPolicy::default()
        },
        hydration: HydrationPolicy {
            settle_delay: Duration::ZERO,
            load_more_delay: Duration::ZERO,
            return_settle: Duration::ZERO,
            render_settle: Duration::ZERO,
            ..HydrationPolicy::default()
        },
        navigation_settle: Duration::ZERO,
        ..EngineConfig::default()
    }
}

fn session(config: Config, store: Arc<SqliteStore>) -> Session {
    let sink = HttpSink::from_config(&config.sink).expect("sink client");
    Session::new(config, store, Arc::new(sink))
        .expect("session")
        .with_engine_config(fast_engine_config())
}

fn report(response: &Response) -> &InvocationReport {
    match response {
        Response::Invocation(report) => report,
        other => panic!("expected an invocation report, got {:?}", other),
    }
}

/// Flushed batches received by the mock sink
async fn sink_batches(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/save-listings")
        .map(|r| serde_json::from_slice(&r.body).expect("batch is JSON"))
        .collect()
}

#[tokio::test]
async fn test_multi_page_run_follows_navigation_and_flushes_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    mount_page(
        &server,
        "/search/1",
        listing_page(&[("1", "1 Main St"), ("7", "7 Elm St")], Some(("/search/2", true))),
    )
    .await;
    mount_page(
        &server,
        "/search/2",
        listing_page(&[("7", "7 Elm St"), ("3", "3 Oak St")], Some(("/search/3", false))),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/save-listings"))
        .and(header("X-API-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"saved": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &db_path);
    let store = Arc::new(SqliteStore::new(&db_path).unwrap());
    let start = format!("{}/search/1", server.uri());

    let responses = session(config, store.clone())
        .execute(
            Some(&start),
            Command::StartRun {
                max_pages: 5,
                tier: Tier::Unrestricted,
                quota: QuotaSnapshot::default(),
            },
        )
        .await
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(
        report(&responses[0]).outcome,
        RunOutcome::Continuing {
            next_url: format!("{}/search/2", server.uri())
        }
    );
    let last = report(&responses[1]);
    assert_eq!(last.cumulative_count, 4);
    assert_eq!(last.outcome, RunOutcome::Finalized { accepted: 3 });

    let batches = sink_batches(&server).await;
    assert_eq!(batches.len(), 1);
    let ids: Vec<_> = batches[0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "7", "3"]);
    assert_eq!(
        batches[0]["sourceContext"],
        format!("{}/search/2", server.uri())
    );

    assert!(store.get("harvest.run_state").await.unwrap().is_none());
    assert!(store.get("harvest.results").await.unwrap().is_none());
}

#[tokio::test]
async fn test_restricted_quota_stops_run_early() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    mount_page(
        &server,
        "/search/1",
        listing_page(&[("1", "1 Main St"), ("2", "2 Main St")], Some(("/search/2", true))),
    )
    .await;
    mount_page(
        &server,
        "/search/2",
        listing_page(&[("3", "3 Main St"), ("4", "4 Main St")], Some(("/search/3", true))),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/save-listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"saved": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &db_path);
    let store = Arc::new(SqliteStore::new(&db_path).unwrap());
    let start = format!("{}/search/1", server.uri());

    let responses = session(config, store)
        .execute(
            Some(&start),
            Command::StartRun {
                max_pages: 5,
                tier: Tier::Restricted,
                quota: QuotaSnapshot::with_limit(3),
            },
        )
        .await
        .unwrap();

    assert_eq!(responses.len(), 2);
    let last = report(&responses[1]);
    assert_eq!(last.records_this_invocation, 1);
    assert!(last.limit_reached);
    assert_eq!(last.cumulative_count, 3);

    let batches = sink_batches(&server).await;
    assert_eq!(batches[0]["records"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_failed_flush_survives_restart_and_retries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    mount_page(
        &server,
        "/search/1",
        listing_page(&[("1", "1 Main St"), ("2", "2 Main St")], None),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/save-listings"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(serde_json::json!({"error": "maintenance"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/save-listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"saved": 2})))
        .mount(&server)
        .await;

    let start = format!("{}/search/1", server.uri());
    {
        let config = create_test_config(&server, &db_path);
        let store = Arc::new(SqliteStore::new(&db_path).unwrap());
        let responses = session(config, store)
            .execute(
                Some(&start),
                Command::StartRun {
                    max_pages: 1,
                    tier: Tier::Unrestricted,
                    quota: QuotaSnapshot::default(),
                },
            )
            .await
            .unwrap();

        match &report(&responses[0]).outcome {
            RunOutcome::FlushFailed { reason } => assert!(reason.contains("maintenance")),
            other => panic!("expected a failed flush, got {:?}", other),
        }
    }

    // A new process reopens the same database
    let config = create_test_config(&server, &db_path);
    let store = Arc::new(SqliteStore::new(&db_path).unwrap());
    let host = session(config, store);

    match &host.execute(None, Command::GetSummary).await.unwrap()[0] {
        Response::Summary(summary) => {
            assert_eq!(summary.record_count, 2);
            assert!(summary.run_state.is_some());
        }
        other => panic!("unexpected response: {:?}", other),
    }

    let responses = host
        .execute(Some(&start), Command::FlushPending)
        .await
        .unwrap();
    assert_eq!(
        report(&responses[0]).outcome,
        RunOutcome::Finalized { accepted: 2 }
    );

    match &host.execute(None, Command::GetSummary).await.unwrap()[0] {
        Response::Summary(summary) => {
            assert_eq!(summary.record_count, 0);
            assert!(summary.run_state.is_none());
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupted_run_resumes_at_persisted_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    mount_page(
        &server,
        "/search/1",
        listing_page(&[("1", "1 Main St")], Some(("/search/2", true))),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/search/2"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/search/2",
        listing_page(&[("2", "2 Main St")], None),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/save-listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"saved": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &db_path);
    let store = Arc::new(SqliteStore::new(&db_path).unwrap());
    let host = session(config, store);
    let start = format!("{}/search/1", server.uri());

    let interrupted = host
        .execute(
            Some(&start),
            Command::StartRun {
                max_pages: 3,
                tier: Tier::Unrestricted,
                quota: QuotaSnapshot::default(),
            },
        )
        .await;
    assert!(matches!(interrupted, Err(HarvestError::Http { .. })));

    let second = format!("{}/search/2", server.uri());
    let responses = host.execute(Some(&second), Command::Resume).await.unwrap();

    let last = report(&responses[0]);
    assert_eq!(last.records_this_invocation, 1);
    assert_eq!(last.cumulative_count, 2);
    assert_eq!(last.outcome, RunOutcome::Finalized { accepted: 2 });

    let batches = sink_batches(&server).await;
    let ids: Vec<_> = batches[0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn test_page_command_requires_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    let config = create_test_config(&server, &db_path);
    let store = Arc::new(SqliteStore::new(&db_path).unwrap());

    let result = session(config, store)
        .execute(
            None,
            Command::ScrapePage {
                tier: Tier::Unrestricted,
                quota: QuotaSnapshot::default(),
            },
        )
        .await;

    assert!(matches!(result, Err(HarvestError::MissingUrl(_))));
}
