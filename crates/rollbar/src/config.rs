// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logger configuration.
//!
//! Loading these values from a file or environment is an external
//! collaborator's job (see `demos/` for the integration point via `clap`);
//! this module only defines the recognized options and their defaults.

use std::sync::Arc;
use std::time::Duration;

use crate::data::{CallbackError, Data};
use crate::error::ConfigError;

/// A user-supplied predicate deciding whether a payload should be dropped
/// before it ever reaches a queue. Returning `Ok(true)` ignores the payload.
pub type CheckIgnoreFn = Arc<dyn Fn(&Data) -> Result<bool, CallbackError> + Send + Sync>;

/// A user-supplied mutator applied to the `Data` envelope before send.
pub type TransformFn = Arc<dyn Fn(&mut Data) -> Result<(), CallbackError> + Send + Sync>;

/// Policy for collecting the submitter's IP address onto `Data.person`/`request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpAddressCollectionPolicy {
    #[default]
    Full,
    AnonymizeLast,
    None,
}

/// Policy for attaching person data, mirroring the Rollbar notifier family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonDataCollectionPolicies {
    #[default]
    Default,
    None,
}

/// Proxy connection settings. Three loggers with the same triple share one
/// pooled HTTP client (see [`crate::controller::QueueController`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProxyConfig {
    pub address: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Per-logger configuration.
#[derive(Clone)]
pub struct Config {
    pub access_token: String,
    pub environment: String,
    pub enabled: bool,
    pub log_level: crate::data::Level,
    pub max_reports_per_minute: u32,
    pub reporting_queue_depth: usize,
    /// Total successful deliveries allowed for the whole process; `0` = unlimited.
    pub max_items: u64,
    pub capture_uncaught_exceptions: bool,
    pub scrub_fields: Vec<String>,
    pub scrub_whitelist_fields: Vec<String>,
    pub endpoint: String,
    pub proxy: ProxyConfig,
    pub check_ignore: Option<CheckIgnoreFn>,
    pub transform: Option<TransformFn>,
    pub truncate: Option<TransformFn>,
    pub server: Option<serde_json::Value>,
    pub person: Option<serde_json::Value>,
    pub person_data_collection_policy: PersonDataCollectionPolicies,
    pub ip_address_collection_policy: IpAddressCollectionPolicy,
    pub code_version: Option<String>,
    pub framework: Option<String>,
    /// Controller tick period. Defaults to 250ms; exposed for tests.
    pub tick_period: Duration,
    /// Telemetry ring capacity, shared process-wide.
    pub telemetry_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            environment: "production".to_owned(),
            enabled: true,
            log_level: crate::data::Level::Debug,
            max_reports_per_minute: 60,
            reporting_queue_depth: 20,
            max_items: 0,
            capture_uncaught_exceptions: false,
            scrub_fields: Vec::new(),
            scrub_whitelist_fields: Vec::new(),
            endpoint: "https://api.rollbar.com/api/1/".to_owned(),
            proxy: ProxyConfig::default(),
            check_ignore: None,
            transform: None,
            truncate: None,
            server: None,
            person: None,
            person_data_collection_policy: PersonDataCollectionPolicies::default(),
            ip_address_collection_policy: IpAddressCollectionPolicy::default(),
            code_version: None,
            framework: None,
            tick_period: Duration::from_millis(250),
            telemetry_capacity: 50,
        }
    }
}

impl Config {
    /// Validate the configuration, returning the specific fatal problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::MissingAccessToken);
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }

    /// The full `item/` ingestion URL for this endpoint.
    pub fn item_url(&self) -> String {
        if self.endpoint.ends_with('/') {
            format!("{}item/", self.endpoint)
        } else {
            format!("{}/item/", self.endpoint)
        }
    }

    /// Whether `level` passes the configured floor.
    pub fn level_enabled(&self, level: crate::data::Level) -> bool {
        level.severity_rank() >= self.log_level.severity_rank()
    }

    /// Run `CheckIgnore`, isolating both typed errors and panics.
    ///
    /// A failing callback is treated as a no-op: the payload is considered
    /// not-ignored and an `InternalError` is reported by the caller.
    pub fn run_check_ignore(&self, data: &Data) -> (bool, Option<CallbackError>) {
        let Some(f) = self.check_ignore.as_ref() else {
            return (false, None);
        };
        match crate::data::invoke_callback(|| f(data)) {
            Ok(ignore) => (ignore, None),
            Err(e) => (false, Some(e)),
        }
    }

    /// Run `Transform` then `Truncate` in sequence, isolating failures the
    /// same way as `run_check_ignore`. A failing stage is treated as identity.
    pub fn run_transform_and_truncate(&self, data: &mut Data) -> Vec<CallbackError> {
        let mut errors = Vec::new();
        if let Some(f) = self.transform.as_ref() {
            if let Err(e) = crate::data::invoke_callback(|| f(data)) {
                errors.push(e);
            }
        }
        if let Some(f) = self.truncate.as_ref() {
            if let Err(e) = crate::data::invoke_callback(|| f(data)) {
                errors.push(e);
            }
        }
        errors
    }

    /// Worst-case time to drain every currently queued payload at full rate.
    pub fn recommended_timeout(&self, total_queue_depth: usize) -> Duration {
        let windows = (total_queue_depth as f64 / self.max_reports_per_minute.max(1) as f64).ceil();
        Duration::from_secs_f64(windows * 60.0) + self.tick_period
    }
}

/// A payload-targeted ignore/transform hook invocation outcome used only to
/// thread callback errors back up to the worker, which owns the event bus.
pub(crate) struct CallbackOutcome {
    pub ignored: bool,
    pub errors: Vec<CallbackError>,
}

pub(crate) fn run_user_pipeline(config: &Config, data: &mut Data) -> CallbackOutcome {
    let (ignored, ignore_err) = config.run_check_ignore(data);
    let mut errors: Vec<CallbackError> = ignore_err.into_iter().collect();
    if !ignored {
        errors.extend(config.run_transform_and_truncate(data));
    }
    CallbackOutcome { ignored, errors }
}
