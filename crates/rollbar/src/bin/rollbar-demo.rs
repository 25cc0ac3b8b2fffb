// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A small CLI that sends one report and prints the delivery events that
//! follow, to exercise the pipeline end to end against a real endpoint.

use clap::Parser;
use tracing::{error, info};

use rollbar::{Body, Config, Level, Logger, RollbarEvent};

/// Command-line configuration, mirroring the options in [`rollbar::Config`]
/// most useful for a one-shot CLI run.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "rollbar-demo")]
struct Cli {
    /// Project access token.
    #[arg(long, env = "ROLLBAR_ACCESS_TOKEN")]
    access_token: String,

    /// Deploy environment name.
    #[arg(long, default_value = "production", env = "ROLLBAR_ENVIRONMENT")]
    environment: String,

    /// Minimum severity to report.
    #[arg(long, default_value = "debug", env = "ROLLBAR_LOG_LEVEL")]
    log_level: String,

    /// Ingestion endpoint.
    #[arg(long, default_value = "https://api.rollbar.com/api/1/", env = "ROLLBAR_ENDPOINT")]
    endpoint: String,

    /// Message to report.
    #[arg(long, default_value = "hello from rollbar-demo")]
    message: String,

    /// Seconds to wait for a terminal outcome before giving up.
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,
}

fn parse_level(s: &str) -> Level {
    match s.to_ascii_lowercase().as_str() {
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warning" | "warn" => Level::Warning,
        "error" => Level::Error,
        "critical" => Level::Critical,
        _ => Level::Debug,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config {
        access_token: cli.access_token,
        environment: cli.environment,
        log_level: parse_level(&cli.log_level),
        endpoint: cli.endpoint,
        ..Config::default()
    };

    let logger = match Logger::new("rollbar-demo", config) {
        Ok(logger) => logger,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let mut events = logger.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RollbarEvent::Communication { logger, .. } => info!(logger, "delivered"),
                RollbarEvent::CommunicationError { logger, kind, message, .. } => {
                    info!(logger, %kind, message, "communication error")
                }
                RollbarEvent::RollbarApiError { logger, code, message, .. } => {
                    info!(logger, code, message, "endpoint rejected the report")
                }
                RollbarEvent::InternalError { logger, kind, message, .. } => {
                    info!(logger = logger.unwrap_or_default(), %kind, message, "internal error")
                }
            }
        }
    });

    let outcome = logger
        .log_and_wait(
            Level::Error,
            Body::message(cli.message),
            std::time::Duration::from_secs(cli.timeout_secs),
        )
        .await;
    info!(?outcome, "final outcome");
}
