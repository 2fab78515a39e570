use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rollcall_core::{RecordId, RemoteRecord};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    records: Arc<RwLock<HashMap<RecordId, RemoteRecord>>>,
}

/// Result of applying one push batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub stale: usize,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store each record unless a strictly newer version is already held
    pub async fn apply(&self, batch: Vec<RemoteRecord>) -> ApplyStats {
        let mut records = self.records.write().await;
        let mut stats = ApplyStats::default();
        for incoming in batch {
            match records.get(&incoming.id) {
                Some(existing) if existing.timestamp > incoming.timestamp => stats.stale += 1,
                _ => {
                    records.insert(incoming.id, incoming);
                    stats.applied += 1;
                }
            }
        }
        stats
    }

    /// Every stored record, oldest first
    pub async fn snapshot(&self) -> Vec<RemoteRecord> {
        let mut snapshot: Vec<RemoteRecord> = self.records.read().await.values().cloned().collect();
        snapshot.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        snapshot
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sync", post(push_records))
        .route("/latest-data", get(latest_data))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    records: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        records: state.records.read().await.len(),
    })
}

#[derive(Debug, Serialize)]
struct PushResponse {
    success: bool,
    accepted: usize,
    message: String,
}

async fn push_records(
    State(state): State<AppState>,
    payload: Result<Json<Vec<RemoteRecord>>, JsonRejection>,
) -> Result<Json<PushResponse>, AppError> {
    let Json(batch) = payload?;
    if batch.len() > state.config.max_batch {
        return Err(AppError::PayloadTooLarge(format!(
            "{} records exceeds the limit of {}",
            batch.len(),
            state.config.max_batch
        )));
    }
    // All-or-nothing: one bad record rejects the whole batch.
    for record in &batch {
        record.validate().map_err(AppError::bad_request)?;
    }

    let received = batch.len();
    let stats = state.apply(batch).await;
    tracing::info!(
        endpoint = "sync",
        received,
        applied = stats.applied,
        stale = stats.stale,
        "Accepted push batch"
    );
    Ok(Json(PushResponse {
        success: true,
        accepted: received,
        message: format!(
            "{} applied, {} older than stored",
            stats.applied, stats.stale
        ),
    }))
}

async fn latest_data(State(state): State<AppState>) -> Json<Vec<RemoteRecord>> {
    let snapshot = state.snapshot().await;
    tracing::debug!(endpoint = "latest_data", count = snapshot.len(), "Served snapshot");
    Json(snapshot)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use rollcall_core::db::{RecordStore, SqliteRecordStore};
    use rollcall_core::sync::{HttpTransport, Reconciler, SyncOutcome, Transport};
    use rollcall_core::{CheckKind, Record, Subject, SyncStatus};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    fn test_state() -> AppState {
        AppState::from_config(Arc::new(AppConfig {
            max_batch: 3,
            ..AppConfig::default()
        }))
    }

    fn remote(timestamp: i64) -> RemoteRecord {
        RemoteRecord {
            id: RecordId::new(),
            subject_id: "S001".to_string(),
            kind: CheckKind::In,
            timestamp,
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (status, body) = send(
            app_router(test_state()),
            Request::get("/healthz").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["records"], 0);
    }

    #[tokio::test]
    async fn push_then_latest_data_round_trips() {
        let state = test_state();
        let record = remote(42);

        let (status, body) = send(
            app_router(state.clone()),
            post_json("/sync", &json!([record])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["accepted"], 1);

        let (status, body) = send(
            app_router(state),
            Request::get("/latest-data").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let records: Vec<RemoteRecord> = serde_json::from_value(body).unwrap();
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn push_keeps_newer_stored_version() {
        let state = test_state();
        let newer = remote(20);
        state.apply(vec![newer.clone()]).await;

        let older = RemoteRecord {
            timestamp: 10,
            kind: CheckKind::Out,
            ..newer.clone()
        };
        let stats = state.apply(vec![older]).await;

        assert_eq!(stats, ApplyStats { applied: 0, stale: 1 });
        assert_eq!(state.snapshot().await, vec![newer]);
    }

    #[tokio::test]
    async fn push_rejects_invalid_batch_entirely() {
        let state = test_state();
        let blank = RemoteRecord {
            subject_id: " ".to_string(),
            ..remote(5)
        };

        let (status, body) = send(
            app_router(state.clone()),
            post_json("/sync", &json!([remote(1), blank])),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(state.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn push_rejects_malformed_json_and_oversized_batches() {
        let (status, _) = send(
            app_router(test_state()),
            post_json("/sync", &json!({"not": "an array"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let batch: Vec<RemoteRecord> = (0..4).map(remote).collect();
        let (status, body) = send(app_router(test_state()), post_json("/sync", &json!(batch))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].as_str().unwrap().contains("limit of 3"));
    }

    async fn spawn_server(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn reconciler_syncs_against_running_server() {
        let state = test_state();
        let base_url = spawn_server(state.clone()).await;
        let transport = Arc::new(HttpTransport::new(base_url).unwrap());
        assert!(transport.probe().await);

        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .add_subject(&Subject::new("S001", "Ada Lovelace", "Class A"))
            .await
            .unwrap();
        let local = store.record_check("S001", CheckKind::In).await.unwrap();
        let newer_elsewhere = remote(local.timestamp + 1);
        state.apply(vec![newer_elsewhere.clone()]).await;

        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            transport.clone(),
            Arc::new(|| true),
        );
        let outcome = reconciler.sync_data().await;

        assert!(matches!(outcome, SyncOutcome::Completed(_)), "{outcome}");
        assert_eq!(outcome.counts().pushed, 1);
        assert_eq!(outcome.counts().inserted, 1);
        assert_eq!(outcome.counts().unchanged, 1);
        assert!(store
            .get_by_status(SyncStatus::Pending)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.get_by_id(&newer_elsewhere.id).await.unwrap(),
            Some(Record::from_remote(&newer_elsewhere))
        );
        assert_eq!(state.snapshot().await.len(), 2);

        let pulled = transport.pull().await.unwrap();
        assert_eq!(pulled.malformed, 0);
        assert_eq!(pulled.records.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_server_fails_probe() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(format!("http://{addr}")).unwrap();
        let probe = tokio::time::timeout(Duration::from_secs(10), transport.probe()).await;
        assert_eq!(probe, Ok(false));
    }
}
