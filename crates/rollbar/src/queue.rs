// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-logger payload queue (spec §3, §4.1 — component C4).
//!
//! A bounded FIFO owned exclusively by one logger. The queue controller
//! (§4.2) is the only other party that touches it, and only through these
//! methods — never by reaching into the deque directly — so the
//! `logger -> payload_queue` lock ordering from spec §5 is self-contained
//! to this module.
//!
//! Dispatch temporarily removes the head payload (`pop_front`) so the
//! controller can hold it across an `.await`ed HTTP call without holding
//! any lock open (a `parking_lot::MutexGuard` is not `Send` and must never
//! cross an await point); on a retryable failure it goes back on with
//! `push_front`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use crate::payload::Payload;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Base delay for the first transient-failure retry (spec §4.2 step 5,
/// glossary "Backoff"); doubled on each consecutive failure and capped at
/// [`MAX_BACKOFF`], mirroring the teacher's `credential::refresh` backoff
/// loop (base 1s, doubling, capped at 60s).
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

struct QueueInner {
    items: VecDeque<Payload>,
    next_dequeue_time: Instant,
    client: Arc<reqwest::Client>,
}

/// Bounded FIFO of payloads for one logger (spec §3 `PayloadQueue`).
pub struct PayloadQueue {
    id: u64,
    pub logger_name: String,
    pub access_token: String,
    capacity: usize,
    inner: Mutex<QueueInner>,
    /// Count of consecutive transient (server/transport) failures since the
    /// last successful or permanently-failed dispatch, driving the
    /// exponential backoff applied to `NextDequeueTime`.
    consecutive_failures: AtomicU32,
}

impl PayloadQueue {
    pub fn new(
        logger_name: impl Into<String>,
        access_token: impl Into<String>,
        capacity: usize,
        client: Arc<reqwest::Client>,
    ) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            logger_name: logger_name.into(),
            access_token: access_token.into(),
            capacity,
            consecutive_failures: AtomicU32::new(0),
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                next_dequeue_time: Instant::now(),
                client,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Record one transient dispatch failure (server error or transport
    /// failure) and push `NextDequeueTime` out by an exponentially growing
    /// backoff capped at 60s (spec §4.2 step 5). Consecutive calls double
    /// the delay; [`Self::reset_backoff`] brings it back to the base delay.
    pub fn apply_backoff(&self, now: Instant) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        let shift = failures.min(6); // 1s << 6 == 64s, already past the 60s cap
        let backoff = (BASE_BACKOFF * (1u32 << shift)).min(MAX_BACKOFF);
        self.set_next_dequeue_time(now + backoff);
    }

    /// Reset the consecutive-failure count after a dispatch resolves
    /// (delivered, or permanently rejected) so the next transient failure
    /// starts backing off from the base delay again.
    pub fn reset_backoff(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Append a payload, evicting the oldest if already at capacity (spec
    /// §4.1: "if the queue already holds `ReportingQueueDepth` items, evict
    /// head ... then append p"). Returns the evicted payload, if any, so
    /// the caller can emit `InternalError{QueueOverflow}` and release its
    /// signal — the queue itself has no event bus access.
    pub fn enqueue(&self, payload: Payload) -> Option<Payload> {
        let mut inner = self.inner.lock();
        let evicted = if inner.items.len() >= self.capacity {
            inner.items.pop_front()
        } else {
            None
        };
        inner.items.push_back(payload);
        evicted
    }

    /// Remove and return the head payload, if any, for dispatch.
    pub fn pop_front(&self) -> Option<Payload> {
        self.inner.lock().items.pop_front()
    }

    /// Put a payload back at the head (a retryable dispatch failure).
    pub fn push_front(&self, payload: Payload) {
        self.inner.lock().items.push_front(payload);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the head payload, if any, is already past its deadline.
    pub fn peek_front_expired(&self, now: Instant) -> bool {
        self.inner.lock().items.front().is_some_and(|p| p.is_expired(now))
    }

    pub fn next_dequeue_time(&self) -> Instant {
        self.inner.lock().next_dequeue_time
    }

    pub fn set_next_dequeue_time(&self, t: Instant) {
        self.inner.lock().next_dequeue_time = t;
    }

    pub fn client(&self) -> Arc<reqwest::Client> {
        Arc::clone(&self.inner.lock().client)
    }

    /// Atomic clear: drain every resident payload (spec §4.1 `flush`). The
    /// caller releases each with `Outcome::Aborted`.
    pub fn flush(&self) -> Vec<Payload> {
        self.inner.lock().items.drain(..).collect()
    }

    /// Reconfigure atomically: swap the HTTP client, flush resident
    /// payloads, and reset `NextDequeueTime` (spec §3 "Reconfiguration is
    /// atomic with respect to in-flight payloads"). Returns the drained
    /// payloads for the caller to release as `Aborted`.
    pub fn reconfigure(&self, client: Arc<reqwest::Client>, now: Instant) -> Vec<Payload> {
        let mut inner = self.inner.lock();
        let drained: Vec<Payload> = inner.items.drain(..).collect();
        inner.client = client;
        inner.next_dequeue_time = now;
        drained
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::data::{Body, Data, Level};

    fn queue(capacity: usize) -> PayloadQueue {
        PayloadQueue::new("test-logger", "token", capacity, Arc::new(reqwest::Client::new()))
    }

    fn payload() -> Payload {
        Payload::new("token", Data::new(Level::Error, Body::message("x")), None, None)
    }

    #[test]
    fn fifo_order_preserved() {
        let q = queue(10);
        for i in 0..3 {
            let mut p = payload();
            p.data.title = Some(i.to_string());
            q.enqueue(p);
        }
        let first = q.pop_front().expect("expected a payload");
        assert_eq!(first.data.title.as_deref(), Some("0"));
    }

    #[test]
    fn overflow_evicts_oldest_not_newest() {
        let q = queue(2);
        let mut p0 = payload();
        p0.data.title = Some("0".into());
        let mut p1 = payload();
        p1.data.title = Some("1".into());
        let mut p2 = payload();
        p2.data.title = Some("2".into());

        assert!(q.enqueue(p0).is_none());
        assert!(q.enqueue(p1).is_none());
        let evicted = q.enqueue(p2).expect("third insert should evict the head");
        assert_eq!(evicted.data.title.as_deref(), Some("0"));
        assert_eq!(q.len(), 2);

        let remaining_first = q.pop_front().expect("expected a payload");
        assert_eq!(remaining_first.data.title.as_deref(), Some("1"));
    }

    #[test]
    fn push_front_puts_payload_back_at_head() {
        let q = queue(10);
        q.enqueue(payload());
        let taken = q.pop_front().expect("expected a payload");
        assert!(q.is_empty());
        q.push_front(taken);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn flush_drains_and_releases_aborted() {
        use crate::payload::Outcome;
        use tokio::sync::oneshot;

        let q = queue(10);
        let (tx, rx) = oneshot::channel();
        q.enqueue(Payload::new(
            "token",
            Data::new(Level::Error, Body::message("x")),
            None,
            Some(tx),
        ));
        let mut drained = q.flush();
        assert!(q.is_empty());
        for p in drained.iter_mut() {
            p.release(Outcome::Aborted);
        }
        assert_eq!(rx.await, Ok(Outcome::Aborted));
    }

    #[test]
    fn apply_backoff_doubles_each_consecutive_failure_capped_at_60s() {
        let q = queue(10);
        let now = Instant::now();
        q.apply_backoff(now);
        assert_eq!(q.next_dequeue_time(), now + Duration::from_secs(1));
        q.apply_backoff(now);
        assert_eq!(q.next_dequeue_time(), now + Duration::from_secs(2));
        q.apply_backoff(now);
        assert_eq!(q.next_dequeue_time(), now + Duration::from_secs(4));
        for _ in 0..10 {
            q.apply_backoff(now);
        }
        assert_eq!(q.next_dequeue_time(), now + Duration::from_secs(60));
    }

    #[test]
    fn reset_backoff_restarts_at_the_base_delay() {
        let q = queue(10);
        let now = Instant::now();
        q.apply_backoff(now);
        q.apply_backoff(now);
        assert_eq!(q.next_dequeue_time(), now + Duration::from_secs(2));
        q.reset_backoff();
        q.apply_backoff(now);
        assert_eq!(q.next_dequeue_time(), now + Duration::from_secs(1));
    }

    #[test]
    fn reconfigure_swaps_client_and_resets_schedule() {
        let q = queue(10);
        q.enqueue(payload());
        let now = Instant::now() + tokio::time::Duration::from_secs(5);
        let drained = q.reconfigure(Arc::new(reqwest::Client::new()), now);
        assert_eq!(drained.len(), 1);
        assert!(q.is_empty());
        assert_eq!(q.next_dequeue_time(), now);
    }
}
