// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The synchronous-style wrapper around a payload's delivery outcome.
//!
//! `Logger::log` returns as soon as a report is handed to its worker; a
//! caller that needs to know the outcome before proceeding (a CLI's `main`
//! about to exit, a crash handler) awaits a one-shot [`Outcome`] instead,
//! bounded by [`Config::recommended_timeout`] or a caller-supplied timeout.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::payload::Outcome;

/// Await a single payload's outcome with a hard deadline. Returns
/// `Outcome::TimedOut` if neither a terminal outcome nor the deadline's
/// expiry signal arrives in time — which should not happen in practice,
/// since every payload is released no later than its own deadline, but a
/// wrapper around `tokio::time::timeout` costs nothing and protects against
/// a future bug in that invariant.
pub async fn await_outcome(rx: oneshot::Receiver<Outcome>, timeout: Duration) -> Outcome {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Outcome::Aborted,
        Err(_) => Outcome::TimedOut,
    }
}
