// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide queue controller.
//!
//! One instance is shared by every [`crate::logger::Logger`] in the
//! process. A single background task wakes on a fixed tick (default
//! 250ms) and round-robins every registered [`PayloadQueue`], dispatching
//! at most one payload per queue per tick, using a `tokio::time::interval`
//! loop raced against a `CancellationToken` inside `tokio::select!`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::error::{CommErrorKind, InternalErrorKind};
use crate::events::{EventBus, RollbarEvent};
use crate::payload::Outcome;
use crate::queue::PayloadQueue;
use crate::ratelimit::{Decision, RateLimiterState};
use crate::telemetry::TelemetryRing;
use crate::transport::{self, IngestOutcome};

/// Everything the controller needs about a registered queue beyond the FIFO
/// itself — the per-logger settings that can change via reconfiguration
/// without the queue's identity (and in-flight payloads) changing.
struct RegisteredQueue {
    queue: Arc<PayloadQueue>,
    item_url: String,
    max_reports_per_minute: u32,
}

/// Shared process-wide dispatcher. Construct one, `start()` it, `register()`
/// every [`PayloadQueue`] a [`crate::logger::Logger`] creates, `deregister()`
/// on logger drop, and `shutdown()` once at process exit.
pub struct QueueController {
    queues: Mutex<Vec<RegisteredQueue>>,
    /// One rate limiter per access token, so distinct tokens never contend
    /// with each other.
    rate_limits: Mutex<HashMap<String, RateLimiterState>>,
    /// Pooled HTTP clients keyed by proxy triple.
    http_pool: Mutex<HashMap<ProxyConfig, Arc<reqwest::Client>>>,
    telemetry: Arc<TelemetryRing>,
    events: Arc<EventBus>,
    tick_period: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Process-wide `MaxItems` cap (spec §3, §4.2 step 6: "exactly once per
    /// process", §9 resolves the ambiguity as per-process rather than
    /// per-logger). Set once, by whichever logger registers first with a
    /// nonzero value, mirroring the first-registrant-wins convention
    /// `locator.rs` uses for `tick_period_hint`/`capacity_hint`.
    max_items: Mutex<Option<u64>>,
    /// Cumulative count of payloads delivered across every queue this
    /// controller has ever dispatched, checked against `max_items`.
    delivered_total: AtomicU64,
    /// Flips exactly once via `compare_exchange` so `InternalError{MaxItemsReached}`
    /// fires a single time for the whole process, not once per queue.
    max_items_notified: AtomicBool,
}

impl QueueController {
    pub fn new(
        tick_period: Duration,
        telemetry: Arc<TelemetryRing>,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(Vec::new()),
            rate_limits: Mutex::new(HashMap::new()),
            http_pool: Mutex::new(HashMap::new()),
            telemetry,
            events,
            tick_period,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            max_items: Mutex::new(None),
            delivered_total: AtomicU64::new(0),
            max_items_notified: AtomicBool::new(false),
        })
    }

    /// Return the pooled client for `proxy`, building one if this is the
    /// first logger to use that triple.
    pub fn client_for(&self, proxy: &ProxyConfig) -> anyhow::Result<Arc<reqwest::Client>> {
        let mut pool = self.http_pool.lock();
        if let Some(client) = pool.get(proxy) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(transport::build_client(proxy)?);
        pool.insert(proxy.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// Register a queue for round-robin dispatch, along with the per-logger
    /// settings the tick needs (item URL, rate limit). Idempotent by queue id.
    /// `max_items`, if nonzero, sets the process-wide cap — only the first
    /// registrant to pass a nonzero value wins; later callers' values are
    /// ignored, same as `locator.rs`'s hint convention.
    pub fn register(
        &self,
        queue: Arc<PayloadQueue>,
        item_url: String,
        max_reports_per_minute: u32,
        max_items: u64,
    ) {
        let mut queues = self.queues.lock();
        if queues.iter().any(|r| r.queue.id() == queue.id()) {
            return;
        }
        if max_items > 0 {
            let mut cap = self.max_items.lock();
            if cap.is_none() {
                *cap = Some(max_items);
            }
        }
        queues.push(RegisteredQueue { queue, item_url, max_reports_per_minute });
    }

    /// Whether the process-wide delivered-payload count has reached the
    /// configured `max_items` cap, if any.
    fn max_items_cap_reached(&self) -> bool {
        match *self.max_items.lock() {
            Some(cap) => self.delivered_total.load(Ordering::Relaxed) >= cap,
            None => false,
        }
    }

    /// Flip the one-shot notification flag. Returns `true` only for the
    /// caller that makes the transition, so `InternalError{MaxItemsReached}`
    /// is emitted exactly once per process.
    fn mark_max_items_notified(&self) -> bool {
        self.max_items_notified.compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed).is_ok()
    }

    /// Update the settings of an already-registered queue. The queue's own
    /// client/backlog swap happens via [`PayloadQueue::reconfigure`]; this
    /// just updates the controller's view of its item URL and rate limit.
    pub fn update_runtime(&self, id: u64, item_url: String, max_reports_per_minute: u32) {
        let mut queues = self.queues.lock();
        if let Some(r) = queues.iter_mut().find(|r| r.queue.id() == id) {
            r.item_url = item_url;
            r.max_reports_per_minute = max_reports_per_minute;
        }
    }

    /// Remove a queue from the round-robin. Any payloads still resident are
    /// the caller's responsibility to flush first via [`PayloadQueue::flush`].
    pub fn deregister(&self, id: u64) {
        self.queues.lock().retain(|r| r.queue.id() != id);
    }

    /// Start the background tick loop. A second call is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        let controller = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(controller.tick_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = controller.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                controller.tick(Instant::now()).await;
            }
        }));
    }

    /// Stop accepting new ticks, attempt one last drain pass bounded by
    /// `budget`, then cancel. Queues with payloads still resident once
    /// `budget` elapses are left untouched — flush them explicitly via
    /// [`PayloadQueue::flush`] if an immediate abort is wanted instead.
    pub async fn shutdown(&self, budget: Duration) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let deadline = Instant::now() + budget;
        loop {
            let any_pending = self.queues.lock().iter().any(|r| !r.queue.is_empty());
            if !any_pending || Instant::now() >= deadline {
                break;
            }
            self.tick(Instant::now()).await;
            tokio::time::sleep(self.tick_period.min(Duration::from_millis(50))).await;
        }
    }

    /// Worst-case time to drain every registered queue at full rate (spec
    /// §4.2 `getRecommendedTimeout`): for each queue, `ceil(depth /
    /// max_reports_per_minute) * 60s`, summed across queues plus one tick
    /// period. Generalizes the spec's single-token formula to this
    /// controller's per-token rate limits; a test harness awaiting drain of
    /// everything it registered can use this as its timeout budget.
    pub fn recommended_timeout(&self) -> Duration {
        let queues = self.queues.lock();
        let mut total = Duration::ZERO;
        for r in queues.iter() {
            let depth = r.queue.len();
            if depth == 0 {
                continue;
            }
            let windows = (depth as f64 / r.max_reports_per_minute.max(1) as f64).ceil();
            total += Duration::from_secs_f64(windows * 60.0);
        }
        total + self.tick_period
    }

    /// Run exactly one round-robin pass over every registered queue. Exposed
    /// `pub(crate)` so tests can drive ticks deterministically instead of
    /// racing a real timer.
    pub(crate) async fn tick(&self, now: Instant) {
        let snapshot: Vec<(Arc<PayloadQueue>, String, u32)> = self
            .queues
            .lock()
            .iter()
            .map(|r| (Arc::clone(&r.queue), r.item_url.clone(), r.max_reports_per_minute))
            .collect();
        for (queue, item_url, max_reports_per_minute) in snapshot {
            self.tick_one(&queue, &item_url, max_reports_per_minute, now).await;
        }
    }

    async fn tick_one(
        &self,
        queue: &Arc<PayloadQueue>,
        item_url: &str,
        max_reports_per_minute: u32,
        now: Instant,
    ) {
        if queue.is_empty() {
            return;
        }
        if now < queue.next_dequeue_time() {
            return;
        }

        // Drop every expired payload at the head before considering dispatch.
        while queue.peek_front_expired(now) {
            if let Some(mut expired) = queue.pop_front() {
                expired.release(Outcome::TimedOut);
                self.events.emit(RollbarEvent::InternalError {
                    logger: Some(queue.logger_name.clone()),
                    kind: InternalErrorKind::PayloadTimeout,
                    message: "payload exceeded its deadline before it could be sent".to_owned(),
                    data: Some(expired.data),
                });
            } else {
                break;
            }
        }
        if queue.is_empty() {
            return;
        }

        // The item cap is evaluated before the rate limiter, since a cap hit
        // should not itself consume a rate-limit slot. It is process-wide
        // (spec §9), not per-queue, so both the counter and the one-shot
        // notification live on the controller, not on `queue`.
        if self.max_items_cap_reached() {
            if let Some(mut payload) = queue.pop_front() {
                payload.release(Outcome::Aborted);
                if self.mark_max_items_notified() {
                    self.events.emit(RollbarEvent::InternalError {
                        logger: Some(queue.logger_name.clone()),
                        kind: InternalErrorKind::MaxItemsReached,
                        message: "max_items reached; payload dropped without dispatch".to_owned(),
                        data: Some(payload.data),
                    });
                }
            }
            return;
        }

        let decision = {
            let mut limits = self.rate_limits.lock();
            let state = limits
                .entry(queue.access_token.clone())
                .or_insert_with(|| RateLimiterState::new(now));
            state.try_acquire(now, max_reports_per_minute)
        };
        if let Decision::Defer { retry_at } = decision {
            queue.set_next_dequeue_time(retry_at);
            return;
        }

        let Some(mut payload) = queue.pop_front() else { return };
        payload.attach_telemetry_once(self.telemetry.snapshot());
        let body = match payload.serialized_body() {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                payload.release(Outcome::Aborted);
                self.events.emit(RollbarEvent::InternalError {
                    logger: Some(queue.logger_name.clone()),
                    kind: InternalErrorKind::Internal,
                    message: format!("failed to serialize payload: {e}"),
                    data: Some(payload.data),
                });
                return;
            }
        };

        let outcome = transport::post_item(&queue.client(), item_url, &queue.access_token, body).await;
        self.handle_outcome(queue, payload, outcome, now).await;
    }

    async fn handle_outcome(
        &self,
        queue: &Arc<PayloadQueue>,
        mut payload: crate::payload::Payload,
        outcome: IngestOutcome,
        now: Instant,
    ) {
        match outcome {
            IngestOutcome::Delivered { response } => {
                queue.reset_backoff();
                self.delivered_total.fetch_add(1, Ordering::Relaxed);
                payload.release(Outcome::Delivered);
                self.events.emit(RollbarEvent::Communication {
                    logger: queue.logger_name.clone(),
                    access_token: queue.access_token.clone(),
                    response,
                });
            }
            IngestOutcome::ApiError { code, message } => {
                queue.reset_backoff();
                payload.release(Outcome::ApiError);
                self.events.emit(RollbarEvent::RollbarApiError {
                    logger: queue.logger_name.clone(),
                    access_token: queue.access_token.clone(),
                    code,
                    message,
                });
            }
            IngestOutcome::ClientError { status: _, message } => {
                // A non-429 4xx is a permanent rejection: the payload will
                // never succeed unmodified, so it is not retried.
                queue.reset_backoff();
                payload.release(Outcome::ApiError);
                self.events.emit(RollbarEvent::RollbarApiError {
                    logger: queue.logger_name.clone(),
                    access_token: queue.access_token.clone(),
                    code: -1,
                    message,
                });
            }
            IngestOutcome::RateLimited { retry_after } => {
                let retry_at = now + retry_after.unwrap_or(Duration::from_secs(60));
                queue.set_next_dequeue_time(retry_at);
                self.rate_limits
                    .lock()
                    .insert(queue.access_token.clone(), RateLimiterState::new(retry_at));
                self.events.emit(RollbarEvent::CommunicationError {
                    logger: queue.logger_name.clone(),
                    access_token: queue.access_token.clone(),
                    kind: CommErrorKind::RateLimited,
                    message: "endpoint returned 429".to_owned(),
                });
                queue.push_front(payload);
            }
            IngestOutcome::ServerError { status } => {
                queue.apply_backoff(now);
                self.events.emit(RollbarEvent::CommunicationError {
                    logger: queue.logger_name.clone(),
                    access_token: queue.access_token.clone(),
                    kind: CommErrorKind::Server,
                    message: format!("endpoint returned {status}"),
                });
                queue.push_front(payload);
            }
            IngestOutcome::Transport { message } => {
                queue.apply_backoff(now);
                self.events.emit(RollbarEvent::CommunicationError {
                    logger: queue.logger_name.clone(),
                    access_token: queue.access_token.clone(),
                    kind: CommErrorKind::Transport,
                    message,
                });
                queue.push_front(payload);
            }
        }
    }
}
