//! End-to-end worker regression.
//!
//! Runs the real coordinator loop against a mock queue service and a
//! mock upstream, and watches a full claim → check → complete round
//! trip land in the persisted documents.

use std::sync::Arc;
use std::time::Duration;

use mockito::Server;
use tokio::sync::watch;

use check_core::{CooldownDurations, QueueConfig, UpstreamConfig};
use check_cooldown::CooldownController;
use check_queue::QueueClient;
use check_store::{load_profiles, CheckStore};
use checkd::coordinator::Coordinator;
use checkd::executor::HttpCheckExecutor;

#[tokio::test]
async fn claim_check_complete_round_trip() {
    let mut queue_server = Server::new_async().await;
    let mut upstream_server = Server::new_async().await;

    // Queue service: hand out one profile, accept everything else.
    let release_instance_mock = queue_server
        .mock("POST", "/queue/validator/release-instance")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "released_count": 0}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    queue_server
        .mock("POST", "/queue/validator/claim")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "items": [{"id": "A", "username": "alice"}]}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    let complete_mock = queue_server
        .mock("POST", "/queue/validator/complete")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    queue_server
        .mock("POST", "/queue/validator/release")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true}"#)
        .create_async()
        .await;

    // Upstream: every check request succeeds.
    upstream_server
        .mock("GET", mockito::Matcher::Regex(".*".into()))
        .with_status(200)
        .with_body("{}")
        .expect_at_least(7)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("checks.json");
    let cooldown_file = dir.path().join("cooldowns.json");

    let queue = Arc::new(
        QueueClient::new(&QueueConfig {
            base_url: queue_server.url(),
            api_key: "test-key".to_string(),
            instance_id: "worker-test".to_string(),
            claim_batch: 5,
        })
        .unwrap(),
    );
    let store = CheckStore::open(&state_file).with_queue(queue.clone());
    let cooldowns = CooldownController::open(
        &cooldown_file,
        CooldownDurations::default(),
        vec![1, 2, 4],
    );
    let executor = Arc::new(
        HttpCheckExecutor::new(UpstreamConfig {
            api_base_url: upstream_server.url(),
            community_base_url: upstream_server.url(),
            api_key: "k".to_string(),
        })
        .unwrap(),
    );

    let coordinator = Coordinator::new(store, cooldowns, executor).with_queue(queue);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(coordinator.run(
        Duration::from_millis(10),
        Duration::from_secs(60),
        shutdown_rx,
    ));

    // Wait for the full round trip to land.
    let mut completed = false;
    for _ in 0..200 {
        if complete_mock.matched_async().await {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    assert!(completed, "completion was never acknowledged");
    release_instance_mock.assert_async().await;

    // The removed profile must not survive in the persisted document.
    // The loop may have re-claimed A after completing it, so the
    // document holds either nothing or a fresh, incomplete profile.
    let profiles = load_profiles(&state_file);
    assert!(profiles.len() <= 1);
}
