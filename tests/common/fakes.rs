//! Fake upstream services
//!
//! Both fakes are real HTTP servers on random ports, so the production
//! reqwest clients are exercised end to end.
#![allow(dead_code)]

use super::constants::*;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

async fn serve(router: Router) -> (String, tokio::sync::oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake service");
    let port = listener.local_addr().expect("No local address").port();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Fake service failed");
    });
    (format!("http://127.0.0.1:{}", port), shutdown_tx)
}

// ============================================================================
// Media signing service
// ============================================================================

#[derive(Default)]
struct MediaState {
    segments: HashMap<String, Value>,
    calls: AtomicUsize,
    /// Non-zero forces every response to this status.
    fail_status: AtomicU16,
    requests: Mutex<Vec<HashMap<String, String>>>,
}

/// Stand-in for the media service's `GET /signed_url`.
pub struct FakeMediaService {
    pub base_url: String,
    state: Arc<MediaState>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

fn plain_segments(audio_id: &str, count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| json!(format!("https://cdn.test/{}/seg{:03}.ts", audio_id, i)))
            .collect(),
    )
}

fn timed_segments(audio_id: &str, count: usize, duration: f64) -> Value {
    Value::Array(
        (0..count)
            .map(|i| {
                json!({
                    "url": format!("https://cdn.test/{}/seg{:03}.ts", audio_id, i),
                    "duration": duration,
                })
            })
            .collect(),
    )
}

async fn signed_url(
    State(state): State<Arc<MediaState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    state
        .requests
        .lock()
        .expect("requests lock poisoned")
        .push(params.clone());

    let fail_status = state.fail_status.load(Ordering::SeqCst);
    if fail_status != 0 {
        let status = StatusCode::from_u16(fail_status).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        return (status, "media service failure").into_response();
    }

    let audio_id = params.get("audio_id").cloned().unwrap_or_default();
    let data = state
        .segments
        .get(&audio_id)
        .cloned()
        .unwrap_or_else(|| json!([]));
    Json(json!({ "data": data })).into_response()
}

impl FakeMediaService {
    /// Serves segments for the seeded catalog: 30 plain segments for
    /// `TRACK_1_ID`, 5 timed ones for `TRACK_2_ID`, 2 for the active ad and
    /// nothing for anything else.
    pub async fn spawn() -> Self {
        let mut segments = HashMap::new();
        segments.insert(
            TRACK_1_ID.to_string(),
            plain_segments(TRACK_1_ID, TRACK_1_SEGMENTS),
        );
        segments.insert(
            TRACK_2_ID.to_string(),
            timed_segments(TRACK_2_ID, TRACK_2_SEGMENTS, TRACK_2_SEGMENT_SECS),
        );
        segments.insert(
            AD_1_AUDIO_ID.to_string(),
            plain_segments(AD_1_AUDIO_ID, AD_SEGMENTS),
        );
        let state = Arc::new(MediaState {
            segments,
            ..MediaState::default()
        });

        let router = Router::new()
            .route("/signed_url", get(signed_url))
            .with_state(state.clone());
        let (base_url, shutdown_tx) = serve(router).await;

        Self {
            base_url,
            state,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Makes every following request fail with `status`.
    pub fn fail_with(&self, status: u16) {
        self.state.fail_status.store(status, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.state.fail_status.store(0, Ordering::SeqCst);
    }

    /// Query parameters of every request received so far.
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state
            .requests
            .lock()
            .expect("requests lock poisoned")
            .clone()
    }
}

// ============================================================================
// Text embedding service
// ============================================================================

#[derive(Deserialize)]
struct EmbedRequest {
    text: String,
}

async fn embed(
    State(calls): State<Arc<AtomicUsize>>,
    Json(request): Json<EmbedRequest>,
) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    let text = request.text.to_lowercase();
    let embedding = if text.contains("piano") {
        PIANO_AXIS
    } else if text.contains("jazz") {
        JAZZ_AXIS
    } else {
        OTHER_AXIS
    };
    Json(json!({ "embedding": embedding }))
}

/// Maps text onto a three-axis space by keyword.
pub struct FakeEmbedder {
    pub base_url: String,
    calls: Arc<AtomicUsize>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl FakeEmbedder {
    pub async fn spawn() -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/embed", post(embed))
            .with_state(calls.clone());
        let (base_url, shutdown_tx) = serve(router).await;
        Self {
            base_url,
            calls,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
