// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types returned directly to callers of the public API.
//!
//! Everything that happens once a payload has entered the delivery pipeline
//! (transport failures, rate limiting, API rejections) is never returned as
//! a `Result` — it surfaces only through [`crate::events::RollbarEvent`], per
//! the no-throw contract on [`crate::logger::Logger::log`]. `ConfigError` is
//! the one exception: it is fatal at construction time, before any payload
//! exists to report failure through.

use std::fmt;

/// Fatal configuration problems, detected at `Logger::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `access_token` was empty or all-whitespace.
    MissingAccessToken,
    /// `endpoint` did not parse as an absolute HTTP(S) URL.
    InvalidEndpoint(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccessToken => write!(f, "access_token must not be empty"),
            Self::InvalidEndpoint(e) => write!(f, "invalid endpoint: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Kinds of internal failure reported via `RollbarEvent::InternalError`.
///
/// These never stop the pipeline; they are surfaced for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalErrorKind {
    /// A payload queue was at capacity and the oldest entry was dropped.
    QueueOverflow,
    /// A payload's deadline elapsed before it could be dispatched.
    PayloadTimeout,
    /// `CheckIgnore`, `Transform`, or `Truncate` returned an error or panicked.
    UserCallbackError,
    /// The per-process `MaxItems` cap was reached (emitted once per process).
    MaxItemsReached,
    /// Any other unexpected failure caught at the controller tick boundary.
    Internal,
}

impl fmt::Display for InternalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::QueueOverflow => "queue_overflow",
            Self::PayloadTimeout => "payload_timeout",
            Self::UserCallbackError => "user_callback_error",
            Self::MaxItemsReached => "max_items_reached",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Kinds of transport-level failure reported via `RollbarEvent::CommunicationError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommErrorKind {
    /// DNS, TCP, TLS, or read/write failure talking to the endpoint.
    Transport,
    /// The endpoint responded with a 5xx status.
    Server,
    /// The endpoint responded with 429.
    RateLimited,
}

impl fmt::Display for CommErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Server => "server",
            Self::RateLimited => "rate_limited",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        assert_eq!(ConfigError::MissingAccessToken.to_string(), "access_token must not be empty");
        assert!(ConfigError::InvalidEndpoint("bad".into()).to_string().contains("bad"));
    }

    #[test]
    fn internal_error_kind_display() {
        assert_eq!(InternalErrorKind::QueueOverflow.to_string(), "queue_overflow");
        assert_eq!(InternalErrorKind::MaxItemsReached.to_string(), "max_items_reached");
    }
}
