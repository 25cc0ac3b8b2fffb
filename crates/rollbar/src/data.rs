// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `data` envelope and wire `body` shapes.
//!
//! Building these from an arbitrary caller-supplied exception object via
//! runtime reflection is out of scope — that is a packager collaborator's
//! job. What lives here is the wire shape itself, expressed as a narrow
//! tagged variant, and constructors plain enough for a caller (or a
//! packager crate built on top of this one) to populate directly.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

/// Severity, ordered least to most severe for the `LogLevel` gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Numeric severity rank used by the `LogLevel` floor comparison.
    pub fn severity_rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type returned by user-supplied `CheckIgnore`/`Transform`/`Truncate`
/// callbacks, or synthesized when one of them panics.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Run a user callback, converting a panic into a `CallbackError` instead of
/// unwinding past this boundary.
pub fn invoke_callback<T>(
    f: impl FnOnce() -> Result<T, CallbackError>,
) -> Result<T, CallbackError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "user callback panicked".to_owned());
            Err(message.into())
        }
    }
}

/// A single exception stack frame.
#[derive(Debug, Clone, Serialize)]
pub struct TraceFrame {
    pub filename: String,
    pub lineno: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// A single exception's class, message, and frames.
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionInfo {
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceBody {
    pub frames: Vec<TraceFrame>,
    pub exception: ExceptionInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceChainBody {
    pub chain: Vec<TraceBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageBody {
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrashReportBody {
    pub raw: String,
}

/// The `data.body` wire shape: exactly one of `trace`, `trace_chain`,
/// `message`, or `crash_report` is present on the wire, modeled here as an
/// explicit tagged variant rather than a reflective packaging over
/// arbitrary caller objects.
#[derive(Debug, Clone)]
pub enum Body {
    Message(MessageBody),
    Trace(TraceBody),
    TraceChain(TraceChainBody),
    CrashReport(CrashReportBody),
    /// Escape hatch for a packager that already produced a JSON object.
    Arbitrary(serde_json::Map<String, serde_json::Value>),
}

impl Body {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(MessageBody { body: text.into() })
    }

    pub fn trace(exception_class: impl Into<String>, message: Option<String>) -> Self {
        Self::Trace(TraceBody {
            frames: Vec::new(),
            exception: ExceptionInfo { class: exception_class.into(), message },
        })
    }
}

impl Serialize for Body {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            Self::Message(m) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("message", m)?;
                map.end()
            }
            Self::Trace(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("trace", t)?;
                map.end()
            }
            Self::TraceChain(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("trace_chain", &t.chain)?;
                map.end()
            }
            Self::CrashReport(c) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("crash_report", c)?;
                map.end()
            }
            Self::Arbitrary(m) => m.serialize(serializer),
        }
    }
}

/// HTTP request context attached to a report.
///
/// Extraction from a live request object is the packager's job; this is
/// only the wire shape the core must be able to serialize.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ip: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub headers: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// The `data` envelope (spec §6). Immutable once built except for the
/// telemetry snapshot, which `Payload` attaches just before first send.
#[derive(Debug, Clone, Serialize)]
pub struct Data {
    pub environment: String,
    pub level: Level,
    /// Seconds since epoch, per spec §6 (`timestamp`).
    pub timestamp: u64,
    pub platform: String,
    pub language: String,
    pub notifier: Notifier,
    pub body: Body,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Vec<crate::telemetry::TelemetryItem>>,
}

/// Identifies this notifier on the wire (spec §6 `notifier`).
#[derive(Debug, Clone, Serialize)]
pub struct Notifier {
    pub name: String,
    pub version: String,
}

impl Default for Notifier {
    fn default() -> Self {
        Self { name: "rollbar-rust".to_owned(), version: env!("CARGO_PKG_VERSION").to_owned() }
    }
}

impl Data {
    /// Build a minimal envelope for a message-style report. `environment`,
    /// server/person defaults, code_version, and framework are filled in by
    /// `Logger::log` from `Config` before the payload is queued.
    pub fn new(level: Level, body: Body) -> Self {
        Self {
            environment: String::new(),
            level,
            timestamp: now_secs(),
            platform: std::env::consts::OS.to_owned(),
            language: "rust".to_owned(),
            notifier: Notifier::default(),
            body,
            server: None,
            person: None,
            client: None,
            custom: None,
            fingerprint: None,
            title: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            context: None,
            code_version: None,
            framework: None,
            request: None,
            telemetry: None,
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_matches_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn level_as_str_matches_wire_vocabulary() {
        assert_eq!(Level::Critical.as_str(), "critical");
        assert_eq!(Level::Debug.as_str(), "debug");
    }

    #[test]
    fn message_body_serializes_nested() {
        let body = Body::message("boom");
        let v = serde_json::to_value(&body).unwrap_or_default();
        assert_eq!(v["message"]["body"], "boom");
    }

    #[test]
    fn invoke_callback_converts_panic() {
        let result: Result<(), CallbackError> =
            invoke_callback(|| -> Result<(), CallbackError> { panic!("boom") });
        assert!(result.is_err());
    }

    #[test]
    fn invoke_callback_passes_through_ok() {
        let result = invoke_callback(|| -> Result<u32, CallbackError> { Ok(42) });
        assert_eq!(result.unwrap_or(0), 42);
    }

    #[test]
    fn data_new_generates_unique_uuid() {
        let a = Data::new(Level::Info, Body::message("a"));
        let b = Data::new(Level::Info, Body::message("b"));
        assert_ne!(a.uuid, b.uuid);
    }
}
