use anyhow::Result;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use video_wall::testing::{offline, online, ScriptedTransport};
use video_wall::{api, AppState, StaticDirectory, WallConfig};

struct TestWall {
    server: TestServer,
    state: AppState,
    directory: Arc<StaticDirectory>,
}

async fn setup_test_server() -> Result<TestWall> {
    let config = WallConfig::from_lookup(|key| match key {
        "WALL_DEFAULT_LAYOUT" => Some("4".to_string()),
        _ => None,
    })?;

    let directory = Arc::new(StaticDirectory::new(vec![
        online("lobby"),
        online("dock"),
        offline("roof"),
    ]));
    let state = AppState::from_parts(config, directory.clone(), Arc::new(ScriptedTransport::new()));
    state.poller().refresh_once().await?;

    let server = TestServer::new(api::router(state.clone()))?;
    Ok(TestWall {
        server,
        state,
        directory,
    })
}

fn slot_ids(wall: &Value) -> Vec<Option<String>> {
    wall["slots"]
        .as_array()
        .map(|slots| {
            slots
                .iter()
                .map(|s| s["camera"]["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health_and_metrics() -> Result<()> {
    let t = setup_test_server().await?;

    let response = t.server.get("/healthz").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "video-wall");

    let response = t.server.get("/metrics").await;
    response.assert_status_ok();
    assert!(response.text().contains("video_wall_grid_size"));
    Ok(())
}

#[tokio::test]
async fn test_wall_snapshot_after_seeding() -> Result<()> {
    let t = setup_test_server().await?;

    let body: Value = t.server.get("/api/wall").await.json();
    assert_eq!(body["size"], 4);
    assert_eq!(body["rows"], 2);
    assert_eq!(body["cols"], 2);
    assert_eq!(body["quality"], "720p");
    assert_eq!(body["bitrate_kbps"], 2048);
    assert_eq!(
        slot_ids(&body),
        vec![Some("lobby".into()), Some("dock".into()), None, None]
    );
    assert_eq!(body["slots"][0]["state"], "loading");
    assert_eq!(body["slots"][2]["state"], "empty");
    Ok(())
}

#[tokio::test]
async fn test_layout_changes() -> Result<()> {
    let t = setup_test_server().await?;

    let response = t.server.put("/api/wall/layout").json(&json!({ "size": 9 })).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["size"], 9);
    assert_eq!(body["slots"].as_array().map(Vec::len), Some(9));

    let response = t.server.put("/api/wall/layout").json(&json!({ "size": 6 })).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["kind"], "invalid_configuration");

    let body: Value = t.server.get("/api/wall").await.json();
    assert_eq!(body["size"], 9);
    Ok(())
}

#[tokio::test]
async fn test_assign_and_clear_slot() -> Result<()> {
    let t = setup_test_server().await?;

    let response = t
        .server
        .put("/api/wall/slots/3")
        .json(&json!({ "camera_id": "roof" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(slot_ids(&body)[3].as_deref(), Some("roof"));

    // already on slot 0
    let response = t
        .server
        .put("/api/wall/slots/2")
        .json(&json!({ "camera_id": "lobby" }))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["kind"], "duplicate_assignment");
    assert_eq!(body["detail"]["slot"], 0);

    let response = t
        .server
        .put("/api/wall/slots/2")
        .json(&json!({ "camera_id": "garage" }))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = t
        .server
        .put("/api/wall/slots/7")
        .json(&json!({ "camera_id": "dock" }))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["kind"], "index_out_of_range");

    let response = t
        .server
        .put("/api/wall/slots/2")
        .json(&json!({ "camera_id": "../etc" }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = t.server.delete("/api/wall/slots/0").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        slot_ids(&body),
        vec![None, Some("dock".into()), None, Some("roof".into())]
    );
    Ok(())
}

#[tokio::test]
async fn test_quality_endpoints() -> Result<()> {
    let t = setup_test_server().await?;

    let body: Value = t
        .server
        .put("/api/wall/quality")
        .json(&json!({ "preset": "1080p" }))
        .await
        .json();
    assert_eq!(body["quality"], "1080p");
    assert_eq!(body["bitrate_kbps"], 4096);
    assert_eq!(body["bitrate_level"], "high");

    let body: Value = t
        .server
        .put("/api/wall/bitrate")
        .json(&json!({ "bitrate_kbps": 1000 }))
        .await
        .json();
    assert_eq!(body["quality"], "1080p");
    assert_eq!(body["bitrate_kbps"], 1000);
    assert_eq!(body["bitrate_level"], "low");

    let response = t
        .server
        .put("/api/wall/bitrate")
        .json(&json!({ "bitrate_kbps": 10000 }))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["kind"], "out_of_range");

    let response = t
        .server
        .put("/api/wall/quality")
        .json(&json!({ "preset": "4k" }))
        .await;
    assert_eq!(response.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn test_camera_picker() -> Result<()> {
    let t = setup_test_server().await?;

    let body: Value = t.server.get("/api/cameras").await.json();
    let entries = body.as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["id"], "lobby");
    assert_eq!(entries[0]["assigned"], true);
    assert_eq!(entries[2]["id"], "roof");
    assert_eq!(entries[2]["assigned"], false);
    assert_eq!(entries[2]["status"], "OFFLINE");

    let body: Value = t
        .server
        .get("/api/cameras")
        .add_query_param("search", "DOCK")
        .await
        .json();
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let body: Value = t
        .server
        .get("/api/wall/slots/2/candidates")
        .await
        .json();
    let ids: Vec<&str> = body
        .as_array()
        .map(|c| c.iter().filter_map(|c| c["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec!["roof"]);

    let response = t
        .server
        .get("/api/cameras")
        .add_query_param("search", "x".repeat(300))
        .await;
    assert_eq!(response.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn test_refresh_picks_up_directory_changes() -> Result<()> {
    let t = setup_test_server().await?;

    t.directory
        .replace(vec![online("dock"), online("gate")])
        .await;

    let response = t.server.post("/api/wall/refresh").await;
    response.assert_status_ok();
    let body: Value = response.json();

    // lobby is kept but flagged; empty slots are not refilled
    assert_eq!(
        slot_ids(&body),
        vec![Some("lobby".into()), Some("dock".into()), None, None]
    );
    assert_eq!(body["slots"][0]["stale"], true);
    assert_eq!(body["slots"][1]["stale"], false);

    let wall = t.state.wall.lock().await;
    assert_eq!(wall.directory().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_retry_on_loading_slot_is_a_no_op() -> Result<()> {
    let t = setup_test_server().await?;

    let response = t.server.post("/api/wall/slots/0/retry").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["retried"], false);
    assert_eq!(body["slot"]["state"], "loading");

    let response = t.server.post("/api/wall/slots/12/retry").await;
    assert_eq!(response.status_code(), 400);
    Ok(())
}
