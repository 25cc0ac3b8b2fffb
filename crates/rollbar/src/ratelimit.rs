// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sliding-window rate limiter (spec §3, §4.2 — component C3).
//!
//! One [`RateLimiterState`] exists per access token; the map owning them
//! lives on [`crate::controller::QueueController`] (spec §3 `QueueController`
//! fields), keyed by access token so distinct tokens never contend (spec §5).

use tokio::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Whether a dispatch attempt may proceed right now, and if not, when to
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Defer { retry_at: Instant },
}

/// Sliding (really: tumbling) 60-second window counter for one access token.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterState {
    window_start: Instant,
    count_in_window: u32,
}

impl RateLimiterState {
    pub fn new(now: Instant) -> Self {
        Self { window_start: now, count_in_window: 0 }
    }

    /// Attempt a dispatch. Resets the window if it has elapsed, then either
    /// allows (incrementing the count) or defers until the window resets
    /// (spec §3 `RateLimiterState` transition, §4.2 step 3).
    pub fn try_acquire(&mut self, now: Instant, max_per_minute: u32) -> Decision {
        if now.saturating_duration_since(self.window_start) >= WINDOW {
            self.window_start = now;
            self.count_in_window = 0;
        }
        if self.count_in_window < max_per_minute {
            self.count_in_window += 1;
            Decision::Allow
        } else {
            Decision::Defer { retry_at: self.window_start + WINDOW }
        }
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_then_defers() {
        let now = Instant::now();
        let mut rl = RateLimiterState::new(now);
        assert_eq!(rl.try_acquire(now, 2), Decision::Allow);
        assert_eq!(rl.try_acquire(now, 2), Decision::Allow);
        match rl.try_acquire(now, 2) {
            Decision::Defer { retry_at } => assert!(retry_at >= now + WINDOW),
            Decision::Allow => panic!("expected defer at the third attempt"),
        }
    }

    #[test]
    fn window_resets_after_60_seconds() {
        let now = Instant::now();
        let mut rl = RateLimiterState::new(now);
        assert_eq!(rl.try_acquire(now, 1), Decision::Allow);
        assert!(matches!(rl.try_acquire(now, 1), Decision::Defer { .. }));

        let later = now + WINDOW;
        assert_eq!(rl.try_acquire(later, 1), Decision::Allow);
    }
}
