// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An async, non-blocking error and telemetry reporting client.
//!
//! A [`Logger`] queues reports onto a bounded per-logger buffer and a
//! process-wide background task drains every logger's queue on a fixed
//! tick, rate-limiting per access token and retrying transient failures,
//! so `Logger::log` and its convenience wrappers never block the caller's
//! thread on network I/O. Delivery outcomes and internal diagnostics are
//! available either by subscribing to [`RollbarEvent`]s or, for callers
//! that need to know before proceeding, by awaiting [`Logger::log_and_wait`].

pub mod blocking;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod events;
pub mod locator;
pub mod logger;
pub mod payload;
pub mod queue;
pub mod ratelimit;
pub mod telemetry;
pub mod transport;
pub mod worker;

pub use config::{Config, IpAddressCollectionPolicy, PersonDataCollectionPolicies, ProxyConfig};
pub use data::{Body, Data, Level};
pub use error::ConfigError;
pub use events::RollbarEvent;
pub use logger::{shutdown, Logger};
pub use payload::Outcome;
pub use telemetry::{TelemetryItem, TelemetrySource};
