// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event bus (spec §4.6 — component C7).
//!
//! Delivery outcomes and internal errors are fanned out over a
//! `tokio::sync::broadcast` channel exactly as the teacher's `Aggregator`
//! fans out `MuxEvent`s: synchronous from the emitting (controller tick)
//! thread, non-blocking for slow or absent subscribers.

use tokio::sync::broadcast;

use crate::data::Data;
use crate::error::{CommErrorKind, InternalErrorKind};

/// A delivery outcome or internal diagnostic, emitted by the queue
/// controller's tick thread (spec §4.6).
#[derive(Debug, Clone)]
pub enum RollbarEvent {
    /// A payload was accepted by the endpoint (`err == 0`).
    Communication {
        logger: String,
        access_token: String,
        response: serde_json::Value,
    },
    /// A transport or server-side failure occurred; the payload will retry.
    CommunicationError {
        logger: String,
        access_token: String,
        kind: CommErrorKind,
        message: String,
    },
    /// The endpoint accepted the request but reported an application error
    /// (`err != 0`, or a permanent 4xx).
    RollbarApiError {
        logger: String,
        access_token: String,
        code: i64,
        message: String,
    },
    /// A non-delivery-related pipeline event: overflow, timeout, callback
    /// failure, or the per-process item cap.
    InternalError {
        logger: Option<String>,
        kind: InternalErrorKind,
        message: String,
        /// The payload's `Data` envelope, when one exists (absent for
        /// controller-wide events like `MaxItemsReached`).
        data: Option<Data>,
    },
}

/// Shared subscriber-notification channel. One instance lives on the
/// process-wide [`crate::controller::QueueController`]; `Logger::subscribe`
/// hands out a filtered view over the same channel.
pub struct EventBus {
    tx: broadcast::Sender<RollbarEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RollbarEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Never blocks; a lagging subscriber simply misses
    /// events and learns about it via `RecvError::Lagged` on its next recv.
    pub fn emit(&self, event: RollbarEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
