// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end scenario tests.
//!
//! Spawns an in-process `axum` server that stands in for the real
//! ingestion endpoint, so scenario tests exercise the whole pipeline
//! (worker, queue, controller tick, rate limiter, transport) without
//! reaching the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;

static CRYPTO_INIT: Once = Once::new();

/// Install the `ring` crypto provider for `reqwest`/`rustls`. Safe to call
/// repeatedly — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// One received request: the access token header and the parsed JSON body.
#[derive(Debug, Clone)]
pub struct ReceivedItem {
    pub access_token: Option<String>,
    pub body: Value,
}

/// How the mock endpoint should answer the Nth request it receives (0-indexed).
/// Requests past the end of `responses` repeat the last entry.
#[derive(Clone)]
pub enum MockResponse {
    Ok,
    ApiError { code: i64, message: String },
    ServerError(u16),
    ClientError(u16),
    RateLimited { retry_after_secs: Option<u64> },
}

struct MockState {
    received: Mutex<Vec<ReceivedItem>>,
    responses: Mutex<Vec<MockResponse>>,
    call_count: AtomicUsize,
}

/// An in-process mock of the `{endpoint}item/` ingestion route.
pub struct MockIngest {
    state: Arc<MockState>,
    addr: std::net::SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockIngest {
    /// Start the server with a scripted response sequence. An empty sequence
    /// means every request is answered with `Ok`.
    pub async fn start(responses: Vec<MockResponse>) -> anyhow::Result<Self> {
        ensure_crypto();
        let state = Arc::new(MockState {
            received: Mutex::new(Vec::new()),
            responses: Mutex::new(responses),
            call_count: AtomicUsize::new(0),
        });

        let app = Router::new().route("/api/1/item/", post(handle_item)).with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { state, addr, _handle: handle })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api/1/", self.addr)
    }

    pub fn received(&self) -> Vec<ReceivedItem> {
        self.state.received.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.call_count.load(Ordering::SeqCst)
    }
}

async fn handle_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> (StatusCode, axum::Json<Value>) {
    let access_token =
        headers.get("X-Rollbar-Access-Token").and_then(|v| v.to_str().ok()).map(str::to_owned);
    state.received.lock().push(ReceivedItem { access_token, body });
    let index = state.call_count.fetch_add(1, Ordering::SeqCst);

    let responses = state.responses.lock();
    let response = responses
        .get(index)
        .or_else(|| responses.last())
        .cloned()
        .unwrap_or(MockResponse::Ok);
    drop(responses);

    match response {
        MockResponse::Ok => {
            (StatusCode::OK, axum::Json(serde_json::json!({"err": 0, "result": {"id": index}})))
        }
        MockResponse::ApiError { code, message } => {
            (StatusCode::OK, axum::Json(serde_json::json!({"err": code, "message": message})))
        }
        MockResponse::ServerError(status) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            axum::Json(serde_json::json!({"err": 1, "message": "server error"})),
        ),
        MockResponse::ClientError(status) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
            axum::Json(serde_json::json!({"err": 1, "message": "client error"})),
        ),
        MockResponse::RateLimited { retry_after_secs: _ } => {
            (StatusCode::TOO_MANY_REQUESTS, axum::Json(serde_json::json!({"err": 1, "message": "rate limited"})))
        }
    }
}
