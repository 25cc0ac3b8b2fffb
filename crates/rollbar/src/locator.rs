// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide singleton façade (spec §3, §9 design notes).
//!
//! The queue controller, telemetry ring, and event bus are conceptually
//! process-wide: every [`crate::logger::Logger`] in the process shares one
//! of each so that payloads round-robin fairly, telemetry breadcrumbs are
//! visible across loggers, and a single subscription sees every logger's
//! events. Per design notes §9, these are passed around as ordinary
//! `Arc`s rather than reached for through a global — this module is only a
//! thin, lazily-initialized façade so `Logger::new` doesn't need the caller
//! to construct and thread them through by hand. Tests that need isolation
//! construct their own `QueueController`/`TelemetryRing`/`EventBus` instead
//! of going through here.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::controller::QueueController;
use crate::events::EventBus;
use crate::telemetry::TelemetryRing;

static CONTROLLER: OnceLock<Arc<QueueController>> = OnceLock::new();
static TELEMETRY: OnceLock<Arc<TelemetryRing>> = OnceLock::new();
static EVENTS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// The shared telemetry ring. `capacity_hint` only takes effect on the very
/// first call in the process; later hints from other loggers are ignored.
pub fn telemetry_ring(capacity_hint: usize) -> Arc<TelemetryRing> {
    Arc::clone(TELEMETRY.get_or_init(|| Arc::new(TelemetryRing::new(capacity_hint))))
}

/// The shared event bus.
pub fn event_bus() -> Arc<EventBus> {
    Arc::clone(EVENTS.get_or_init(|| Arc::new(EventBus::new())))
}

/// The shared queue controller, started on first access. `tick_period_hint`
/// only takes effect on the very first call in the process.
pub fn controller(tick_period_hint: Duration) -> Arc<QueueController> {
    Arc::clone(CONTROLLER.get_or_init(|| {
        let controller =
            QueueController::new(tick_period_hint, telemetry_ring(50), event_bus());
        controller.start();
        controller
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_ring_is_a_process_wide_singleton() {
        let a = telemetry_ring(50);
        let b = telemetry_ring(999);
        a.capture(crate::telemetry::TelemetryItem::now(
            crate::telemetry::TelemetrySource::Manual,
            crate::data::Level::Info,
            Default::default(),
        ));
        assert_eq!(b.len(), a.len());
    }
}
