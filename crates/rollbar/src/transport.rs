// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: building pooled clients and POSTing one payload (spec §6).
//!
//! Grounded on the teacher's `upstream::client::UpstreamClient` — a thin
//! `reqwest::Client` wrapper with a fixed timeout and a single POST helper —
//! generalized to proxy support and response classification.

use std::sync::Once;
use std::time::Duration;

use crate::config::ProxyConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static CRYPTO_INIT: Once = Once::new();

/// Install the `ring` TLS crypto provider for `reqwest`/`rustls`. Safe to
/// call repeatedly — only the first call has effect. `reqwest` is built
/// with `rustls-no-provider` (spec-neutral about TLS stack) so this must
/// run before the first HTTPS request, exactly as the teacher's
/// `tests/specs::ensure_crypto` does for its own test binary.
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build a pooled client for one proxy configuration (spec §3: "shared HTTP
/// client pool keyed by `(proxyAddress, proxyUser, proxyPass)`").
pub fn build_client(proxy: &ProxyConfig) -> anyhow::Result<reqwest::Client> {
    ensure_crypto_provider();
    let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
    if let Some(address) = proxy.address.as_deref() {
        let mut p = reqwest::Proxy::all(address)?;
        if let (Some(user), Some(pass)) = (proxy.user.as_deref(), proxy.password.as_deref()) {
            p = p.basic_auth(user, pass);
        }
        builder = builder.proxy(p);
    }
    Ok(builder.build()?)
}

/// The outcome categories the queue controller's tick (spec §4.2 step 5)
/// switches on, derived from an HTTP response or transport failure.
pub enum IngestOutcome {
    /// 2xx with `err == 0`.
    Delivered { response: serde_json::Value },
    /// 2xx with `err != 0`.
    ApiError { code: i64, message: String },
    /// 429, with an optional `Retry-After` in seconds.
    RateLimited { retry_after: Option<Duration> },
    /// 5xx.
    ServerError { status: u16 },
    /// Any other 4xx: permanent failure.
    ClientError { status: u16, message: String },
    /// DNS/TCP/TLS/read/write failure, or a non-JSON 2xx body.
    Transport { message: String },
}

/// POST one already-serialized payload body to `{endpoint}item/`.
pub async fn post_item(
    client: &reqwest::Client,
    url: &str,
    access_token: &str,
    body: Vec<u8>,
) -> IngestOutcome {
    let send_result = client
        .post(url)
        .header("Content-Type", "application/json; charset=utf-8")
        .header("X-Rollbar-Access-Token", access_token)
        .body(body)
        .send()
        .await;

    let response = match send_result {
        Ok(r) => r,
        Err(e) => return IngestOutcome::Transport { message: e.to_string() },
    };

    let status = response.status();
    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return IngestOutcome::RateLimited { retry_after };
    }
    if status.is_server_error() {
        return IngestOutcome::ServerError { status: status.as_u16() };
    }

    let body_bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => return IngestOutcome::Transport { message: e.to_string() },
    };
    let parsed: serde_json::Value = match serde_json::from_slice(&body_bytes) {
        Ok(v) => v,
        Err(e) => {
            if status.is_client_error() {
                return IngestOutcome::ClientError {
                    status: status.as_u16(),
                    message: "non-JSON error response".to_owned(),
                };
            }
            return IngestOutcome::Transport { message: format!("invalid response body: {e}") };
        }
    };

    if status.is_client_error() {
        let message = parsed
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("request rejected")
            .to_owned();
        return IngestOutcome::ClientError { status: status.as_u16(), message };
    }

    let err_code = parsed.get("err").and_then(|v| v.as_i64()).unwrap_or(0);
    if err_code == 0 {
        IngestOutcome::Delivered { response: parsed }
    } else {
        let message =
            parsed.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error").to_owned();
        IngestOutcome::ApiError { code: err_code, message }
    }
}
