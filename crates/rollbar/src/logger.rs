// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public `Logger` façade (spec §1, §4).
//!
//! Construction validates configuration and wires one [`PayloadQueue`] and
//! one [`LoggerWorker`] into the process-wide [`QueueController`],
//! [`TelemetryRing`], and [`EventBus`] obtained from [`crate::locator`].
//! `log`/`debug`/`info`/... never block the caller's thread: they hand the
//! report to the worker's bounded buffer and return.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::blocking::await_outcome;
use crate::config::Config;
use crate::controller::QueueController;
use crate::data::{Body, Data, Level};
use crate::error::ConfigError;
use crate::events::RollbarEvent;
use crate::locator;
use crate::payload::Outcome;
use crate::queue::PayloadQueue;
use crate::telemetry::TelemetryRing;
use crate::worker::{LoggerWorker, DEFAULT_POOL_SIZE};

struct LoggerState {
    config: Arc<Config>,
    queue: Arc<PayloadQueue>,
    worker: Arc<LoggerWorker>,
}

/// A configured reporting client for one access token (spec §3 `Logger`).
///
/// Cheap to clone: internally reference-counted, and every clone shares the
/// same queue and worker pool. Dropping the last clone deregisters the
/// queue from the process-wide controller and stops the worker pool.
#[derive(Clone)]
pub struct Logger {
    name: String,
    controller: Arc<QueueController>,
    telemetry: Arc<TelemetryRing>,
    state: Arc<SyncMutex<LoggerState>>,
    /// Never read directly; its sole purpose is to run `Teardown::drop`
    /// exactly once, when the last `Logger` clone's `Arc` goes away.
    #[allow(dead_code)]
    teardown: Arc<Teardown>,
}

/// Drop glue, split out so it runs exactly once no matter how many `Logger`
/// clones exist (spec §4.1: a logger's queue must be deregistered exactly
/// once, when the last handle goes away).
struct Teardown {
    controller: Arc<QueueController>,
    state: Arc<SyncMutex<LoggerState>>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        let state = self.state.lock();
        self.controller.deregister(state.queue.id());
        for mut payload in state.queue.flush() {
            payload.release(Outcome::Aborted);
        }
    }
}

impl Logger {
    /// Build a logger, registering it with the process-wide controller
    /// (spec §4.1 `new`). Fails only on malformed configuration — everything
    /// past this point is reported through events, never a `Result`.
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let name = name.into();
        let config = Arc::new(config);
        let telemetry = locator::telemetry_ring(config.telemetry_capacity);
        let controller = locator::controller(config.tick_period);
        let events = locator::event_bus();

        let client = controller
            .client_for(&config.proxy)
            .map_err(|_| ConfigError::InvalidEndpoint(config.endpoint.clone()))?;
        let queue = Arc::new(PayloadQueue::new(
            name.clone(),
            config.access_token.clone(),
            config.reporting_queue_depth,
            client,
        ));
        controller.register(
            Arc::clone(&queue),
            config.item_url(),
            config.max_reports_per_minute,
            config.max_items,
        );

        let worker =
            LoggerWorker::new(name.clone(), Arc::clone(&config), Arc::clone(&queue), events, config.reporting_queue_depth);
        worker.start(DEFAULT_POOL_SIZE);

        let state = Arc::new(SyncMutex::new(LoggerState { config, queue, worker }));
        let teardown = Arc::new(Teardown { controller: Arc::clone(&controller), state: Arc::clone(&state) });

        Ok(Self { name, controller, telemetry, state, teardown })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace this logger's configuration in place (spec §3 "Reconfiguration
    /// is atomic with respect to in-flight payloads"). Resident payloads are
    /// flushed and released `Aborted`; new payloads use the new settings.
    pub fn reconfigure(&self, new_config: Config) -> Result<(), ConfigError> {
        new_config.validate()?;
        let new_config = Arc::new(new_config);
        let client = self
            .controller
            .client_for(&new_config.proxy)
            .map_err(|_| ConfigError::InvalidEndpoint(new_config.endpoint.clone()))?;

        let mut state = self.state.lock();
        for mut payload in state.queue.reconfigure(client, Instant::now()) {
            payload.release(Outcome::Aborted);
        }
        self.controller.update_runtime(
            state.queue.id(),
            new_config.item_url(),
            new_config.max_reports_per_minute,
        );
        let worker = LoggerWorker::new(
            self.name.clone(),
            Arc::clone(&new_config),
            Arc::clone(&state.queue),
            locator::event_bus(),
            new_config.reporting_queue_depth,
        );
        worker.start(DEFAULT_POOL_SIZE);
        state.config = new_config;
        state.worker = worker;
        Ok(())
    }

    /// Subscribe to every delivery outcome and internal error in the process
    /// (spec §4.6). A filtered-to-this-logger view is the subscriber's job.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RollbarEvent> {
        locator::event_bus().subscribe()
    }

    /// Worst-case time for the process-wide controller to drain every
    /// registered queue at full rate (spec §4.2 `getRecommendedTimeout`).
    /// Intended for test harnesses synchronizing on drain completion rather
    /// than polling.
    pub fn recommended_timeout(&self) -> Duration {
        self.controller.recommended_timeout()
    }

    /// Record a breadcrumb onto the shared telemetry ring (spec §4.5).
    pub fn record_telemetry(&self, item: crate::telemetry::TelemetryItem) {
        self.telemetry.capture(item);
    }

    /// Submit a report. Returns immediately; never blocks on network I/O.
    pub fn log(&self, level: Level, body: Body) {
        self.submit(level, body, None, None);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, Body::message(message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, Body::message(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, Body::message(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, Body::message(message));
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, Body::message(message));
    }

    /// Submit a report and asynchronously await its terminal outcome (spec
    /// §4.8 component C8, the blocking-style wrapper). Still non-blocking in
    /// the OS thread sense — it is an `await`, bounded by `timeout`.
    pub async fn log_and_wait(&self, level: Level, body: Body, timeout: Duration) -> Outcome {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;
        let submitted = self.submit(level, body, Some(deadline), Some(tx));
        if !submitted {
            return Outcome::Aborted;
        }
        await_outcome(rx, timeout).await
    }

    /// Level-gate, stamp ambient fields, and hand off to the worker.
    /// Returns `false` if the report was dropped before even reaching the
    /// worker (disabled logger or below the configured floor).
    fn submit(
        &self,
        level: Level,
        body: Body,
        deadline: Option<Instant>,
        signal: Option<oneshot::Sender<Outcome>>,
    ) -> bool {
        let state = self.state.lock();
        if !state.config.enabled || !state.config.level_enabled(level) {
            return false;
        }
        let mut data = Data::new(level, body);
        data.environment = state.config.environment.clone();
        data.server = state.config.server.clone();
        data.person = state.config.person.clone();
        data.code_version = state.config.code_version.clone();
        data.framework = state.config.framework.clone();
        state.worker.submit(data, deadline, signal);
        true
    }
}

/// Stop the process-wide controller's tick loop, after attempting one last
/// drain pass bounded by `budget` (spec §4.7 `shutdown`). Call once, near
/// process exit, after every `Logger` the caller cares about draining has
/// had a chance to enqueue its final reports.
pub async fn shutdown(budget: Duration) {
    locator::controller(Duration::from_millis(250)).shutdown(budget).await;
}
