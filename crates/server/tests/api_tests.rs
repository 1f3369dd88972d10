//! In-process API tests through the router.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use snaggle_core::downloader::DownloadFile;

use common::{fixtures, TestFixture};

const TITLE: &str = "Arrival.2016.1080p.BluRay.x264-GRP";

fn arrival() -> serde_json::Value {
    json!({ "media_type": "movie", "title": "Arrival", "year": 2016 })
}

// ============================================================================
// Health, config, classification
// ============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["downloaders"][0]["id"], "qbit");
    assert_eq!(response.body["downloaders"][0]["password_configured"], false);
    assert!(response.body["downloaders"][0].get("password").is_none());
}

#[tokio::test]
async fn test_parse_release() {
    let fixture = TestFixture::new();
    let response = fixture
        .post(
            "/api/v1/release/parse",
            json!({ "title": "The.Series.S08E05.720p.HDTV.X264-DIMENSION" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["quality"]["quality"], "hdtv720p");
    assert_eq!(response.body["release"]["release_group"], "DIMENSION");
}

#[tokio::test]
async fn test_parse_release_rejects_blank_title() {
    let fixture = TestFixture::new();
    let response = fixture
        .post("/api/v1/release/parse", json!({ "title": "  " }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "title is required");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let fixture = TestFixture::new();
    let response = fixture.post_raw("/api/v1/candidates", "{not json").await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_fields_lists_context_paths() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/fields").await;
    assert_eq!(response.status, StatusCode::OK);
    let paths: Vec<&str> = response
        .body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|f| f["path"].as_str())
        .collect();
    assert!(paths.contains(&"candidate.seeders"));
    assert!(paths.contains(&"media.clean_title"));
}

// ============================================================================
// Candidates
// ============================================================================

#[tokio::test]
async fn test_ingest_classifies_in_order() {
    let fixture = TestFixture::new();
    let results = vec![
        fixtures::search_result(1, "a", TITLE),
        fixtures::search_result(1, "b", "The.Series.S08E05.720p.HDTV.X264-DIMENSION"),
    ];
    let response = fixture
        .post("/api/v1/candidates", json!({ "results": results }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["items"][0]["guid"], "a");
    assert_eq!(response.body["items"][1]["guid"], "b");
    assert_eq!(response.body["items"][1]["parsed"]["quality"]["quality"], "hdtv720p");
}

#[tokio::test]
async fn test_preview_unknown_candidate_is_404() {
    let fixture = TestFixture::new();
    let response = fixture
        .post("/api/v1/candidates/1/missing/preview", arrival())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_preview_uses_defaults() {
    let fixture = TestFixture::new();
    fixture.ingest("guid-1", TITLE).await;

    let response = fixture
        .post("/api/v1/candidates/1/guid-1/preview", arrival())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let plan = &response.body["final_plan"];
    assert_eq!(plan["downloader_id"], "qbit");
    assert_eq!(plan["library_id"], "movies");
    assert_eq!(plan["name_template_id"], "movie-default");
    assert_eq!(response.body["defaulted"].as_array().map(Vec::len), Some(3));

    // Preview has no side effects.
    let jobs = fixture.get("/api/v1/jobs").await;
    assert_eq!(jobs.body["total"], 0);
}

#[tokio::test]
async fn test_enqueue_creates_job_once() {
    let fixture = TestFixture::new();
    fixture.ingest("guid-1", TITLE).await;

    let first = fixture
        .post("/api/v1/candidates/1/guid-1/enqueue", arrival())
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["created"], true);
    assert_eq!(first.body["job"]["status"], "pending");
    let job_id = first.body["job"]["id"].as_str().expect("job id").to_string();

    let second = fixture
        .post("/api/v1/candidates/1/guid-1/enqueue", arrival())
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["created"], false);
    assert_eq!(second.body["job"]["id"], job_id.as_str());

    let timeline = fixture
        .get(&format!("/api/v1/jobs/{}/timeline", job_id))
        .await;
    assert_eq!(timeline.status, StatusCode::OK);
    assert_eq!(timeline.body[0]["event_type"], "job_created");
}

#[tokio::test]
async fn test_enqueue_with_incomplete_plan_is_409() {
    let fixture = TestFixture::new();

    // Only a torrent downloader is configured.
    let mut result = fixtures::search_result(2, "nzb-1", TITLE);
    result.protocol = snaggle_core::candidate::Protocol::Usenet;
    fixture
        .post("/api/v1/candidates", json!({ "results": [result] }))
        .await;

    let response = fixture
        .post("/api/v1/candidates/2/nzb-1/enqueue", arrival())
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["error"]
        .as_str()
        .expect("error")
        .contains("downloader"));
}

// ============================================================================
// Policies
// ============================================================================

#[tokio::test]
async fn test_policy_crud_and_evaluation() {
    let fixture = TestFixture::new();

    let created = fixture
        .post(
            "/api/v1/policies",
            json!({
                "name": "well seeded to tv",
                "priority": 10,
                "rule": {
                    "type": "compare",
                    "left": "candidate.seeders",
                    "op": ">",
                    "right": "10"
                },
                "actions": [{ "type": "set_library", "value": "tv" }]
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_str().expect("policy id").to_string();

    let listed = fixture.get("/api/v1/policies").await;
    assert_eq!(listed.body["total"], 1);

    fixture.ingest("guid-1", TITLE).await;
    let preview = fixture
        .post("/api/v1/candidates/1/guid-1/preview", arrival())
        .await;
    assert_eq!(preview.body["final_plan"]["library_id"], "tv");
    assert_eq!(preview.body["policies"][0]["matched"], true);

    let updated = fixture
        .put(
            &format!("/api/v1/policies/{}", id),
            json!({
                "name": "well seeded to tv",
                "enabled": false,
                "rule": {
                    "type": "compare",
                    "left": "candidate.seeders",
                    "op": ">",
                    "right": "10"
                },
                "actions": [{ "type": "set_library", "value": "tv" }]
            }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["enabled"], false);

    let preview = fixture
        .post("/api/v1/candidates/1/guid-1/preview", arrival())
        .await;
    assert_eq!(preview.body["final_plan"]["library_id"], "movies");

    let deleted = fixture.delete(&format!("/api/v1/policies/{}", id)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    let missing = fixture.get(&format!("/api/v1/policies/{}", id)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_policy_is_400() {
    let fixture = TestFixture::new();
    let response = fixture
        .post(
            "/api/v1/policies",
            json!({
                "name": "empty and",
                "rule": { "type": "and", "rules": [] },
                "actions": [{ "type": "stop_processing" }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Jobs and import tasks
// ============================================================================

#[tokio::test]
async fn test_job_lifecycle_through_api() {
    let fixture = TestFixture::new();
    fixture.ingest("guid-1", TITLE).await;
    let enqueued = fixture
        .post("/api/v1/candidates/1/guid-1/enqueue", arrival())
        .await;
    let job_id = enqueued.body["job"]["id"].as_str().expect("job id").to_string();

    fixture.run_workers(1).await;
    let job = fixture.get(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_eq!(job.body["status"], "enqueued");

    let hash = fixtures::info_hash("guid-1");
    let payload = fixture.downloads().join("Arrival.2016");
    std::fs::create_dir_all(&payload).expect("payload dir");
    std::fs::write(payload.join("arrival.mkv"), b"feature").expect("payload");
    let downloads = fixture.downloads().to_string_lossy().into_owned();
    fixture
        .downloader
        .complete(&hash, &downloads, &payload.to_string_lossy())
        .await;
    fixture
        .downloader
        .set_files(&hash, vec![DownloadFile::new("Arrival.2016/arrival.mkv", 7)])
        .await;

    fixture.run_workers(3).await;

    let job = fixture.get(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_eq!(job.body["status"], "imported");

    let tasks = fixture.get(&format!("/api/v1/jobs/{}/tasks", job_id)).await;
    assert_eq!(tasks.status, StatusCode::OK);
    let task_id = tasks.body[0]["id"].as_str().expect("task id").to_string();
    assert_eq!(tasks.body[0]["status"], "completed");

    let listed = fixture.get("/api/v1/tasks?status=completed").await;
    assert_eq!(listed.body["total"], 1);

    let dest = fixture
        .library()
        .join("movies/Arrival (2016)/Arrival (2016).mkv");
    assert_eq!(std::fs::read(&dest).expect("imported file"), b"feature");

    // Reimport queues a linked task and the chain shows both.
    let reimport = fixture
        .post_empty(&format!("/api/v1/tasks/{}/reimport", task_id))
        .await;
    assert_eq!(reimport.status, StatusCode::CREATED);
    assert_eq!(reimport.body["status"], "pending");
    let new_id = reimport.body["id"].as_str().expect("task id").to_string();

    let history = fixture
        .get(&format!("/api/v1/tasks/{}/history", new_id))
        .await;
    assert_eq!(history.body.as_array().map(Vec::len), Some(2));
    assert_eq!(history.body[1]["id"], task_id.as_str());

    let timeline = fixture
        .get(&format!("/api/v1/tasks/{}/timeline", new_id))
        .await;
    assert_eq!(timeline.body[0]["event_type"], "reimport_requested");

    // Cancelled tasks cannot be reimported.
    let cancelled = fixture.delete(&format!("/api/v1/tasks/{}", new_id)).await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelled");

    let again = fixture
        .post_empty(&format!("/api/v1/tasks/{}/reimport", new_id))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_job() {
    let fixture = TestFixture::new();
    fixture.ingest("guid-1", TITLE).await;
    let enqueued = fixture
        .post("/api/v1/candidates/1/guid-1/enqueue", arrival())
        .await;
    let job_id = enqueued.body["job"]["id"].as_str().expect("job id").to_string();

    let cancelled = fixture.delete(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelled");

    let again = fixture.delete(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_job_list_filters_and_validation() {
    let fixture = TestFixture::new();
    let bad = fixture.get("/api/v1/jobs?status=sideways").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let missing = fixture.get("/api/v1/jobs/does-not-exist").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let missing = fixture.get("/api/v1/tasks/does-not-exist/timeline").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let listed = fixture.get("/api/v1/jobs?status=pending&limit=5000").await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["limit"], 1000);
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_settings_get_and_put() {
    let fixture = TestFixture::new();

    let all = fixture.get("/api/v1/settings").await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body.as_array().map(Vec::len), Some(4));

    let setting = fixture.get("/api/v1/settings/jobs.max_attempts").await;
    assert_eq!(setting.body["value"], 10);
    assert_eq!(setting.body["value_type"], "int");

    let updated = fixture
        .put("/api/v1/settings/jobs.max_attempts", json!({ "value": 3 }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["value"], 3);
    assert_eq!(updated.body["default"], 10);

    let wrong_type = fixture
        .put("/api/v1/settings/jobs.max_attempts", json!({ "value": "many" }))
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);

    let unknown = fixture
        .put("/api/v1/settings/nope", json!({ "value": 1 }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    // New jobs pick up the cap.
    fixture.ingest("guid-1", TITLE).await;
    let enqueued = fixture
        .post("/api/v1/candidates/1/guid-1/enqueue", arrival())
        .await;
    assert_eq!(enqueued.body["job"]["max_attempts"], 3);
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("snaggle_http_requests_total"));
    assert!(body.contains("snaggle_jobs_by_status"));
}
