// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-logger callback pipeline (spec §4.1 — component C6).
//!
//! `Logger::log` must never block the caller's thread, and `CheckIgnore` /
//! `Transform` / `Truncate` are arbitrary user code that might be slow or
//! panic. So the level-gated `Data` envelope is handed to a bounded buffer
//! (oldest-eviction, same policy as [`crate::queue::PayloadQueue`]) and a
//! small fixed pool of worker tasks drains it, the way the teacher's
//! `spawn_distributor` hands events from a channel off to background
//! tasks — generalized from one task to a small pool since running
//! `CheckIgnore`/`Transform` here, not network I/O, is the slow part.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::data::Data;
use crate::error::InternalErrorKind;
use crate::events::{EventBus, RollbarEvent};
use crate::payload::{Outcome, Payload};
use crate::queue::PayloadQueue;

/// Default size of a logger's worker pool (spec §4.1: "a small fixed pool").
pub const DEFAULT_POOL_SIZE: usize = 2;

/// A level-gated report still waiting to run `CheckIgnore`/`Transform`/`Truncate`.
struct PendingAction {
    data: Data,
    deadline: Option<Instant>,
    signal: Option<oneshot::Sender<Outcome>>,
}

/// Drains submitted reports through the user-callback pipeline and into the
/// logger's [`PayloadQueue`]. One instance per [`crate::logger::Logger`].
pub struct LoggerWorker {
    logger_name: String,
    config: Arc<Config>,
    queue: Arc<PayloadQueue>,
    events: Arc<EventBus>,
    pending: Mutex<VecDeque<PendingAction>>,
    capacity: usize,
    notify: Notify,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LoggerWorker {
    pub fn new(
        logger_name: impl Into<String>,
        config: Arc<Config>,
        queue: Arc<PayloadQueue>,
        events: Arc<EventBus>,
        capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            logger_name: logger_name.into(),
            config,
            queue,
            events,
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the worker pool. A second call is a no-op.
    pub fn start(self: &Arc<Self>, pool_size: usize) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        for _ in 0..pool_size.max(1) {
            let worker = Arc::clone(self);
            tasks.push(tokio::spawn(async move { worker.run().await }));
        }
    }

    /// Submit an already level-gated report. Never blocks on I/O: this only
    /// ever takes a `parking_lot::Mutex` and calls `Notify::notify_one`.
    /// Evicts and aborts the oldest pending action on overflow, matching
    /// `PayloadQueue::enqueue` (spec §4.1 "the same drop policy applies to
    /// the pending-action buffer").
    pub fn submit(&self, data: Data, deadline: Option<Instant>, signal: Option<oneshot::Sender<Outcome>>) {
        let evicted = {
            let mut pending = self.pending.lock();
            let evicted = if pending.len() >= self.capacity { pending.pop_front() } else { None };
            pending.push_back(PendingAction { data, deadline, signal });
            evicted
        };
        if let Some(mut evicted) = evicted {
            if let Some(tx) = evicted.signal.take() {
                let _ = tx.send(Outcome::Aborted);
            }
            self.events.emit(RollbarEvent::InternalError {
                logger: Some(self.logger_name.clone()),
                kind: InternalErrorKind::QueueOverflow,
                message: "pending-action buffer overflow; oldest report dropped".to_owned(),
                data: Some(evicted.data),
            });
        }
        self.notify.notify_one();
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            let action = loop {
                if let Some(action) = self.pending.lock().pop_front() {
                    break Some(action);
                }
                tokio::select! {
                    _ = self.cancel.cancelled() => break None,
                    _ = self.notify.notified() => continue,
                }
            };
            let Some(action) = action else { break };
            self.process(action);
        }
    }

    fn process(&self, action: PendingAction) {
        let PendingAction { mut data, deadline, signal } = action;
        let outcome = crate::config::run_user_pipeline(&self.config, &mut data);
        for error in &outcome.errors {
            self.events.emit(RollbarEvent::InternalError {
                logger: Some(self.logger_name.clone()),
                kind: InternalErrorKind::UserCallbackError,
                message: error.to_string(),
                data: None,
            });
        }
        if outcome.ignored {
            if let Some(tx) = signal {
                let _ = tx.send(Outcome::Aborted);
            }
            return;
        }

        let payload = Payload::new(self.config.access_token.clone(), data, deadline, signal);
        if let Some(mut evicted) = self.queue.enqueue(payload) {
            evicted.release(Outcome::Aborted);
            self.events.emit(RollbarEvent::InternalError {
                logger: Some(self.logger_name.clone()),
                kind: InternalErrorKind::QueueOverflow,
                message: "payload queue overflow; oldest report dropped".to_owned(),
                data: Some(evicted.data),
            });
        }
    }
}
