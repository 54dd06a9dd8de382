use super::{trimmed_base, ActivityOutcome, PlatformReport};
use crate::{
    config::HttpConfig,
    retry::{with_backoff, BackoffConfig},
};
use eyre::Context as _;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Thin Lighter DEX points-farming client.
///
/// The points and activity endpoints are read-only; unknown endpoints (404)
/// and transport failures fall back to mock data so a farming run never
/// stalls on this platform.
#[derive(Debug, Clone)]
pub struct LighterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    backoff: BackoffConfig,
}

impl LighterClient {
    pub fn new(cfg: &HttpConfig) -> eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()
            .context("build lighter http client")?;
        Ok(Self {
            http,
            base_url: trimmed_base(&cfg.lighter_api_url).to_owned(),
            api_key: cfg.lighter_api_key.clone(),
            backoff: BackoffConfig::default(),
        })
    }

    async fn get_json(&self, url: String, label: &'static str) -> eyre::Result<Option<serde_json::Value>> {
        with_backoff(
            &self.backoff,
            || {
                let mut req = self.http.get(&url);
                if let Some(key) = &self.api_key {
                    req = req.bearer_auth(key);
                }
                async move {
                    let resp = req.send().await.context("send request")?;
                    if resp.status() == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    let resp = resp.error_for_status().context("response status")?;
                    let v: serde_json::Value = resp.json().await.context("parse json")?;
                    Ok(Some(v))
                }
            },
            label,
        )
        .await
    }

    /// Points balance for a wallet, mock data when the endpoint is missing
    /// or unreachable.
    pub async fn points_balance(&self, wallet_address: &str) -> serde_json::Value {
        let url = format!("{}/points/{wallet_address}", self.base_url);
        match self.get_json(url, "lighter points").await {
            Ok(Some(v)) => v,
            Ok(None) => {
                info!(wallet_address, "lighter points endpoint not found; using mock data");
                Self::mock_points(wallet_address, None)
            }
            Err(e) => {
                warn!(wallet_address, error = %format!("{e:#}"), "failed to fetch lighter points");
                Self::mock_points(wallet_address, Some(format!("{e:#}")))
            }
        }
    }

    /// Trading activity for a wallet, with the same fallback discipline.
    pub async fn trading_activity(&self, wallet_address: &str) -> serde_json::Value {
        let url = format!("{}/activity/{wallet_address}", self.base_url);
        match self.get_json(url, "lighter activity").await {
            Ok(Some(v)) => v,
            Ok(None) => {
                info!(wallet_address, "lighter activity endpoint not found; using mock data");
                Self::mock_activity(wallet_address, None)
            }
            Err(e) => {
                warn!(wallet_address, error = %format!("{e:#}"), "failed to track lighter activity");
                Self::mock_activity(wallet_address, Some(format!("{e:#}")))
            }
        }
    }

    fn mock_points(wallet_address: &str, error: Option<String>) -> serde_json::Value {
        json!({
            "wallet": wallet_address,
            "points": 0,
            "last_updated": chrono::Utc::now().to_rfc3339(),
            "error": error,
            "mock": true,
        })
    }

    fn mock_activity(wallet_address: &str, error: Option<String>) -> serde_json::Value {
        json!({
            "wallet": wallet_address,
            "trades_count": 0,
            "volume": 0,
            "error": error,
            "mock": true,
        })
    }

    /// Run the points-farming activity set for one wallet.
    ///
    /// Degraded platform conditions land inside the report; an `Err` is
    /// isolated per wallet by the orchestrator.
    pub async fn farm_points(&self, wallet_address: &str) -> eyre::Result<PlatformReport> {
        info!(wallet_address, "starting lighter dex points farming");
        let mut report = PlatformReport::new(wallet_address);

        // Activity 1: current points.
        let points_data = self.points_balance(wallet_address).await;
        let points = points_data.get("points").and_then(serde_json::Value::as_f64);
        report.activities.push(ActivityOutcome::ok(
            "points_check",
            Some(json!({ "points": points.unwrap_or(0.0) })),
        ));

        // Activity 2: trading activity tracking.
        let activity_data = self.trading_activity(wallet_address).await;
        report.activities.push(ActivityOutcome::ok(
            "activity_tracking",
            Some(json!({
                "trades": activity_data.get("trades_count").and_then(serde_json::Value::as_u64).unwrap_or(0),
                "volume": activity_data.get("volume").and_then(serde_json::Value::as_f64).unwrap_or(0.0),
            })),
        ));

        // Activity 3: qualifying interaction. Real order flow is out of
        // scope; the interaction is recorded only.
        report.activities.push(ActivityOutcome::ok(
            "interaction_logged",
            Some(json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "simulated": true,
            })),
        ));

        report.current_points = points.or(Some(0.0));
        let report = report.finalize();
        info!(
            wallet_address,
            successful = report.successful_count,
            total = report.total_count,
            "lighter dex farming completed"
        );
        Ok(report)
    }
}
