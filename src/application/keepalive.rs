//! Cron-triggered self-ping that keeps an idling host awake.

use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use apalis::prelude::*;
use apalis_cron::Schedule;
use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use tracing::{error, info, warn};
use url::Url;

use crate::infra::telemetry::millis;

/// Marker job emitted by the cron stream on every tick.
#[derive(Default, Debug, Clone)]
pub struct KeepAlivePing;

impl From<DateTime<Tz>> for KeepAlivePing {
    fn from(_: DateTime<Tz>) -> Self {
        Self
    }
}

/// Shared state for the keep-alive worker.
#[derive(Debug, Clone)]
pub struct KeepAliveContext {
    pub client: Client,
    pub target: Url,
}

impl KeepAliveContext {
    pub fn new(target: Url, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, target })
    }
}

#[derive(Debug)]
pub enum PingOutcome {
    Healthy,
    UnexpectedStatus(StatusCode),
    Unreachable(reqwest::Error),
}

/// Issue a single GET against `target`.
pub async fn ping(client: &Client, target: &Url) -> PingOutcome {
    match client.get(target.clone()).send().await {
        Ok(response) if response.status() == StatusCode::OK => PingOutcome::Healthy,
        Ok(response) => PingOutcome::UnexpectedStatus(response.status()),
        Err(err) => PingOutcome::Unreachable(err),
    }
}

/// Ping the configured target. Failures are logged and never fail the job.
pub async fn process_keep_alive_ping(
    _job: KeepAlivePing,
    ctx: Data<KeepAliveContext>,
) -> Result<(), apalis::prelude::Error> {
    let started_at = Instant::now();
    let outcome = ping(&ctx.client, &ctx.target).await;
    let elapsed_ms = millis(started_at.elapsed());

    match outcome {
        PingOutcome::Healthy => info!(
            target = "application::keepalive",
            op = "keepalive::ping",
            result = "ok",
            url = %ctx.target,
            elapsed_ms,
            "Keep-alive ping succeeded"
        ),
        PingOutcome::UnexpectedStatus(status) => warn!(
            target = "application::keepalive",
            op = "keepalive::ping",
            result = "unexpected_status",
            url = %ctx.target,
            status = status.as_u16(),
            elapsed_ms,
            "Keep-alive ping returned a non-200 status"
        ),
        PingOutcome::Unreachable(err) => error!(
            target = "application::keepalive",
            op = "keepalive::ping",
            result = "error",
            url = %ctx.target,
            elapsed_ms,
            error = %err,
            "Keep-alive ping failed"
        ),
    }

    Ok(())
}

/// Parse a six-field (seconds first) cron expression.
pub fn parse_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode as AxumStatus, routing::get};
    use chrono::Timelike;

    async fn spawn_server() -> Url {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/down", get(|| async { AxumStatus::SERVICE_UNAVAILABLE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}/")).expect("url")
    }

    #[test]
    fn default_schedule_fires_within_daytime_window() {
        let schedule = parse_schedule("0 */14 7-23 * * *").expect("schedule");
        let tz: Tz = "Asia/Ho_Chi_Minh".parse().expect("tz");

        let upcoming: Vec<_> = schedule.upcoming(tz).take(10).collect();
        assert_eq!(upcoming.len(), 10);
        for tick in upcoming {
            assert!((7..=23).contains(&tick.hour()), "{tick}");
            assert_eq!(tick.minute() % 14, 0, "{tick}");
            assert_eq!(tick.second(), 0, "{tick}");
        }
    }

    #[test]
    fn malformed_schedule_is_rejected() {
        assert!(parse_schedule("every fourteen minutes").is_err());
    }

    #[tokio::test]
    async fn ping_reports_health_and_status() {
        let base = spawn_server().await;
        let client = Client::new();

        assert!(matches!(ping(&client, &base).await, PingOutcome::Healthy));

        let down = base.join("down").expect("join");
        match ping(&client, &down).await {
            PingOutcome::UnexpectedStatus(status) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_target_does_not_fail_the_job() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let target = Url::parse(&format!("http://{addr}/")).expect("url");
        let ctx = KeepAliveContext::new(target, Duration::from_secs(2)).expect("client");

        assert!(matches!(
            ping(&ctx.client, &ctx.target).await,
            PingOutcome::Unreachable(_)
        ));
        process_keep_alive_ping(KeepAlivePing, Data::new(ctx))
            .await
            .expect("job never fails");
    }
}
