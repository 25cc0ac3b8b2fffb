// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The payload envelope (spec §3, §4.1 — component C1).
//!
//! A `Payload` is immutable after construction except for two fields that
//! are populated lazily, exactly once, on the controller's tick thread: the
//! serialized HTTP body (cached so a retry is byte-identical, spec §9) and
//! the telemetry snapshot (attached just before the first send attempt).

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::data::Data;

/// Terminal outcome of one payload's journey through the pipeline (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    ApiError,
    TimedOut,
    Aborted,
}

/// One report envelope — the unit of delivery (spec §3 `Payload`).
pub struct Payload {
    pub access_token: String,
    pub data: Data,
    /// Absolute deadline past which the controller drops this payload
    /// unsent (spec §4.2 step 2, "deadline sweep").
    pub deadline: Option<Instant>,
    /// Released exactly once, at the first of: terminal outcome, deadline.
    /// `None` for fire-and-forget submissions that nobody is waiting on.
    signal: Option<oneshot::Sender<Outcome>>,
    /// Lazily populated on first serialization attempt; reused verbatim on
    /// every retry so the wire bytes never change underneath a transient
    /// failure (spec §9 "cached serialized body").
    cached_body: Option<Vec<u8>>,
}

impl Payload {
    pub fn new(
        access_token: impl Into<String>,
        data: Data,
        deadline: Option<Instant>,
        signal: Option<oneshot::Sender<Outcome>>,
    ) -> Self {
        Self { access_token: access_token.into(), data, deadline, signal, cached_body: None }
    }

    /// Release the attached signal, if any, with the given outcome. Safe to
    /// call more than once; only the first call has effect. Must be called
    /// on every terminal transition so a blocking caller is never left
    /// waiting forever (spec §4.1 invariant: "never leaked").
    pub fn release(&mut self, outcome: Outcome) {
        if let Some(tx) = self.signal.take() {
            let _ = tx.send(outcome);
        }
    }

    /// Whether this payload has passed its deadline as of `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d < now)
    }

    /// Serialize and cache the HTTP body on first call; return the cached
    /// bytes on every subsequent call regardless of argument.
    pub fn serialized_body(&mut self) -> anyhow::Result<&[u8]> {
        if self.cached_body.is_none() {
            let envelope = serde_json::json!({
                "access_token": self.access_token,
                "data": self.data,
            });
            self.cached_body = Some(serde_json::to_vec(&envelope)?);
        }
        Ok(self.cached_body.as_deref().unwrap_or_default())
    }

    /// Attach a telemetry snapshot, but only once (spec §3: "set once, just
    /// before first transmission attempt").
    pub fn attach_telemetry_once(&mut self, items: Vec<crate::telemetry::TelemetryItem>) {
        if self.data.telemetry.is_none() {
            self.data.telemetry = Some(items);
            // Invalidate any cached body built before telemetry was attached.
            self.cached_body = None;
        }
    }
}

impl Drop for Payload {
    /// Defensive backstop: if a payload is dropped (e.g. the owning queue is
    /// torn down without an explicit `flush`) without ever being released,
    /// wake a blocking waiter with `Aborted` rather than leaving it hanging.
    fn drop(&mut self) {
        self.release(Outcome::Aborted);
    }
}
