// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The telemetry ring (spec §3, §4.5 — component C2): a process-wide,
//! bounded FIFO of recent breadcrumbs snapshotted onto each outgoing
//! payload. Modeled on the teacher's `ring.rs` circular buffer, but over
//! structured items rather than raw bytes, since `capture`/`snapshot` need
//! whole-item granularity rather than byte-offset replay.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;

/// Where a telemetry breadcrumb originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetrySource {
    Client,
    Server,
    Log,
    Manual,
    Network,
    Navigation,
}

/// One breadcrumb (spec §3 `TelemetryItem`).
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryItem {
    /// Milliseconds since epoch, UTC.
    pub timestamp_ms: u64,
    pub source: TelemetrySource,
    pub level: crate::data::Level,
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl TelemetryItem {
    pub fn now(
        source: TelemetrySource,
        level: crate::data::Level,
        body: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { timestamp_ms, source, level, body }
    }
}

/// Bounded FIFO of recent telemetry items, shared process-wide (spec §4.5).
///
/// `capture` and `snapshot` are both O(1) and safe to call from any thread;
/// the critical section is short enough that a `parking_lot::Mutex` (no
/// poisoning, no `.await` ever held across it) is the right tool, matching
/// the lock-ordering note in spec §5 that puts the telemetry ring last.
pub struct TelemetryRing {
    items: Mutex<VecDeque<TelemetryItem>>,
    capacity: usize,
}

impl TelemetryRing {
    pub fn new(capacity: usize) -> Self {
        Self { items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))), capacity }
    }

    /// Append a breadcrumb, evicting the oldest if the ring is full.
    pub fn capture(&self, item: TelemetryItem) {
        if self.capacity == 0 {
            return;
        }
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            items.pop_front();
        }
        items.push_back(item);
    }

    /// A consistent copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<TelemetryItem> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: u8) -> TelemetryItem {
        let mut body = serde_json::Map::new();
        body.insert("n".to_owned(), n.into());
        TelemetryItem::now(TelemetrySource::Manual, crate::data::Level::Info, body)
    }

    #[test]
    fn capture_and_snapshot_preserve_order() {
        let ring = TelemetryRing::new(3);
        ring.capture(item(1));
        ring.capture(item(2));
        ring.capture(item(3));
        let snap = ring.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].body["n"], 1);
        assert_eq!(snap[2].body["n"], 3);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let ring = TelemetryRing::new(2);
        ring.capture(item(1));
        ring.capture(item(2));
        ring.capture(item(3));
        let snap = ring.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].body["n"], 2);
        assert_eq!(snap[1].body["n"], 3);
    }

    #[test]
    fn zero_capacity_never_retains() {
        let ring = TelemetryRing::new(0);
        ring.capture(item(1));
        assert!(ring.is_empty());
    }
}
