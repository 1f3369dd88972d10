//! Common test utilities for in-process API testing with mocks.
//!
//! The fixture wires the real stores (on a temp database file), services and
//! workers around a `MockDownloader`, and exposes the router for `oneshot`
//! requests. Tests drive the workers by hand with `run_workers`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use snaggle_core::candidate::CandidateCache;
use snaggle_core::import::{ImportTaskStore, SqliteMediaCatalog};
use snaggle_core::job::JobStore;
use snaggle_core::placer::FsPlacer;
use snaggle_core::testing::MockDownloader;
use snaggle_core::{
    AuditLog, CandidateService, DownloaderRegistry, EventPublisher, ImportService, ImportWorker,
    JobService, JobWorker, PolicyEngine, SettingsService, SqliteAuditStore,
    SqliteImportTaskStore, SqliteJobStore, SqlitePolicyStore, SqliteSettingsStore,
};
use snaggle_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use snaggle_core::testing::fixtures;

/// In-process server with a controllable downloader.
pub struct TestFixture {
    pub router: Router,
    pub downloader: Arc<MockDownloader>,
    pub events: EventPublisher,
    pub job_worker: JobWorker,
    pub import_worker: ImportWorker,
    /// Holds the database, downloads and library directories
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        std::fs::create_dir_all(temp_dir.path().join("downloads")).expect("downloads dir");

        let mut config = fixtures::config(&temp_dir.path().join("library"));
        config.database.path = db_path.clone();
        let config = Arc::new(config);

        let audit = AuditLog::new(Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        ));
        let job_store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let task_store: Arc<dyn ImportTaskStore> = Arc::new(
            SqliteImportTaskStore::new(&db_path).expect("Failed to create task store"),
        );
        let settings = Arc::new(SettingsService::new(Arc::new(
            SqliteSettingsStore::new(&db_path).expect("Failed to create settings store"),
        )));
        let catalog =
            Arc::new(SqliteMediaCatalog::new(&db_path).expect("Failed to create catalog"));
        let events = EventPublisher::new(256);

        let downloader = Arc::new(MockDownloader::new("qbit"));
        let mut downloaders = DownloaderRegistry::new();
        downloaders.register(downloader.clone(), true);

        let engine = PolicyEngine::new(Arc::new(
            SqlitePolicyStore::new(&db_path).expect("Failed to create policy store"),
        ))
        .with_defaults(config.plan_defaults());
        let candidates = CandidateService::new(
            CandidateCache::new(config.candidates.ttl()),
            engine,
            Arc::clone(&job_store),
            Arc::clone(&settings),
            audit.clone(),
            events.clone(),
        );
        let jobs = JobService::new(
            Arc::clone(&job_store),
            Arc::clone(&task_store),
            audit.clone(),
            events.clone(),
        );
        let imports = ImportService::new(Arc::clone(&task_store), audit.clone(), events.clone());

        let job_worker = JobWorker::new(
            Arc::clone(&job_store),
            Arc::clone(&task_store),
            downloaders.clone(),
            Arc::clone(&settings),
            audit.clone(),
            events.clone(),
        )
        .with_claim(10, Duration::from_secs(60));
        let import_worker = ImportWorker::new(
            task_store,
            job_store,
            downloaders,
            Arc::new(FsPlacer::new(config.placer.clone())),
            catalog,
            Arc::clone(&config),
            Arc::clone(&settings),
            audit,
            events.clone(),
        );

        let state = Arc::new(AppState::new(
            (*config).clone(),
            candidates,
            jobs,
            imports,
            settings,
            events.clone(),
        ));

        Self {
            router: create_router(state),
            downloader,
            events,
            job_worker,
            import_worker,
            temp_dir,
        }
    }

    pub fn downloads(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    pub fn library(&self) -> PathBuf {
        self.temp_dir.path().join("library")
    }

    /// Run both workers for a few polling rounds.
    pub async fn run_workers(&self, rounds: usize) {
        for _ in 0..rounds {
            self.job_worker.run_once().await.expect("job worker");
            self.import_worker.run_once().await.expect("import worker");
        }
    }

    /// Ingest one search result through the API.
    pub async fn ingest(&self, guid: &str, title: &str) -> TestResponse {
        let result = fixtures::search_result(1, guid, title);
        self.post(
            "/api/v1/candidates",
            serde_json::json!({ "results": [result] }),
        )
        .await
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with no body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a path and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
