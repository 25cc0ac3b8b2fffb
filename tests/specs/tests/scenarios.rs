// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios driving a real [`rollbar::Logger`] against an
//! in-process mock ingestion server.

use std::time::Duration;

use rollbar::{Body, Config, Level, Outcome, RollbarEvent};
use rollbar_specs::{MockIngest, MockResponse};

const TIMEOUT: Duration = Duration::from_secs(10);

fn base_config(token: &str, endpoint: &str) -> Config {
    Config {
        access_token: token.into(),
        endpoint: endpoint.into(),
        tick_period: Duration::from_millis(20),
        ..Config::default()
    }
}

#[tokio::test]
async fn successful_report_is_delivered_and_emits_communication() -> anyhow::Result<()> {
    let mock = MockIngest::start(vec![]).await?;
    let logger = rollbar::Logger::new("s1", base_config("tok-s1", &mock.endpoint()))
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut events = logger.subscribe();

    let outcome = logger.log_and_wait(Level::Error, Body::message("boom"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Delivered);

    let received = mock.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].access_token.as_deref(), Some("tok-s1"));
    assert_eq!(received[0].body["data"]["body"]["message"]["body"], "boom");

    let event = tokio::time::timeout(TIMEOUT, events.recv()).await??;
    assert!(matches!(event, RollbarEvent::Communication { .. }));
    Ok(())
}

#[tokio::test]
async fn transient_server_error_is_retried_until_it_succeeds() -> anyhow::Result<()> {
    let mock = MockIngest::start(vec![
        MockResponse::ServerError(503),
        MockResponse::ServerError(503),
        MockResponse::Ok,
    ])
    .await?;
    let logger = rollbar::Logger::new("s2", base_config("tok-s2", &mock.endpoint()))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = logger.log_and_wait(Level::Error, Body::message("retry me"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(mock.call_count(), 3);
    Ok(())
}

#[tokio::test]
async fn permanent_client_error_is_not_retried() -> anyhow::Result<()> {
    let mock = MockIngest::start(vec![MockResponse::ClientError(422)]).await?;
    let logger = rollbar::Logger::new("s3", base_config("tok-s3", &mock.endpoint()))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = logger.log_and_wait(Level::Error, Body::message("rejected"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::ApiError);

    // Give the controller a few more ticks; a permanent failure must not
    // cause further requests against the same payload.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn api_level_error_is_reported_without_retry() -> anyhow::Result<()> {
    let mock =
        MockIngest::start(vec![MockResponse::ApiError { code: 1, message: "bad token".into() }])
            .await?;
    let logger = rollbar::Logger::new("s4", base_config("tok-s4", &mock.endpoint()))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = logger.log_and_wait(Level::Error, Body::message("x"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::ApiError);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn check_ignore_prevents_any_http_call() -> anyhow::Result<()> {
    let mock = MockIngest::start(vec![]).await?;
    let mut config = base_config("tok-s5", &mock.endpoint());
    config.check_ignore = Some(std::sync::Arc::new(|_data| Ok(true)));
    let logger = rollbar::Logger::new("s5", config).map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = logger.log_and_wait(Level::Error, Body::message("ignored"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Aborted);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn below_log_level_floor_never_reaches_the_endpoint() -> anyhow::Result<()> {
    let mock = MockIngest::start(vec![]).await?;
    let config =
        Config { log_level: Level::Error, ..base_config("tok-s6", &mock.endpoint()) };
    let logger = rollbar::Logger::new("s6", config).map_err(|e| anyhow::anyhow!("{e}"))?;

    logger.info("should never be sent");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn transform_mutates_the_outgoing_payload() -> anyhow::Result<()> {
    let mock = MockIngest::start(vec![]).await?;
    let mut config = base_config("tok-s7", &mock.endpoint());
    config.transform = Some(std::sync::Arc::new(|data| {
        data.fingerprint = Some("custom-fingerprint".into());
        Ok(())
    }));
    let logger = rollbar::Logger::new("s7", config).map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = logger.log_and_wait(Level::Error, Body::message("x"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Delivered);
    let received = mock.received();
    assert_eq!(received[0].body["data"]["fingerprint"], "custom-fingerprint");
    Ok(())
}
