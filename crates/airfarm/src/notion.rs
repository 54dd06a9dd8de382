use crate::config::HttpConfig;
use eyre::Context as _;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const NOTION_VERSION: &str = "2022-06-28";

/// Remote activity sink backed by a Notion database.
///
/// Disabled (with one warning) when the integration token or database id is
/// missing; every log call is then a no-op. Callers treat failures as
/// best-effort — a Notion outage must never affect a farming run.
#[derive(Debug)]
pub struct NotionLogger {
    client: Option<NotionClient>,
}

#[derive(Debug)]
struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    database_id: String,
}

/// One activity row as it appears in the Notion database.
#[derive(Debug, Clone, Copy)]
pub struct ActivityEntry<'a> {
    pub wallet_address: &'a str,
    pub platform: &'a str,
    pub activity_type: &'a str,
    pub status: &'a str,
    pub details: Option<&'a serde_json::Value>,
    pub tx_hash: Option<&'a str>,
}

impl NotionLogger {
    pub fn from_config(cfg: &HttpConfig) -> eyre::Result<Self> {
        let (Some(api_key), Some(database_id)) =
            (cfg.notion_api_key.clone(), cfg.notion_database_id.clone())
        else {
            warn!("notion credentials not configured; remote activity log disabled");
            return Ok(Self { client: None });
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()
            .context("build notion http client")?;
        Ok(Self {
            client: Some(NotionClient {
                http,
                base_url: cfg.notion_api_base_url.trim().trim_end_matches('/').to_owned(),
                api_key,
                database_id,
            }),
        })
    }

    pub const fn enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Create one page for a platform activity.
    pub async fn log_activity(&self, entry: &ActivityEntry<'_>) -> eyre::Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        let mut properties = json!({
            "Wallet": { "title": [{ "text": { "content": entry.wallet_address } }] },
            "Platform": { "select": { "name": entry.platform } },
            "Activity": { "rich_text": [{ "text": { "content": entry.activity_type } }] },
            "Status": { "select": { "name": entry.status } },
            "Timestamp": { "date": { "start": chrono::Utc::now().to_rfc3339() } },
        });
        if let Some(tx_hash) = entry.tx_hash {
            properties["TX Hash"] = json!({ "rich_text": [{ "text": { "content": tx_hash } }] });
        }
        if let Some(details) = entry.details {
            let rendered = serde_json::to_string(details).unwrap_or_default();
            properties["Details"] =
                json!({ "rich_text": [{ "text": { "content": rendered } }] });
        }

        client.create_page(properties).await
    }

    /// Create one summary page for a completed farming run.
    pub async fn log_scheduler_run(
        &self,
        status: &str,
        wallets_processed: u64,
        activities_completed: u64,
        errors: &[String],
        duration_seconds: f64,
    ) -> eyre::Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        let summary = format!(
            "Run: {status} | wallets: {wallets_processed} | activities: {activities_completed} | \
             errors: {} | duration: {duration_seconds:.2}s",
            errors.len()
        );
        let mut properties = json!({
            "Wallet": { "title": [{ "text": { "content": "scheduler_run" } }] },
            "Platform": { "select": { "name": "Scheduler" } },
            "Activity": { "rich_text": [{ "text": { "content": summary } }] },
            "Status": { "select": { "name": status } },
            "Timestamp": { "date": { "start": chrono::Utc::now().to_rfc3339() } },
        });
        if !errors.is_empty() {
            let rendered = errors.join("\n");
            properties["Details"] =
                json!({ "rich_text": [{ "text": { "content": rendered } }] });
        }

        client.create_page(properties).await
    }
}

impl NotionClient {
    async fn create_page(&self, properties: serde_json::Value) -> eyre::Result<()> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        });
        self.http
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .context("send notion page create")?
            .error_for_status()
            .context("notion page create status")?;
        Ok(())
    }
}
