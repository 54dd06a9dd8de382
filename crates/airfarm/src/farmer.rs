use crate::{
    config::FarmerConfig,
    db::Db,
    errors::VaultError,
    keystore::WalletVault,
    notion::{ActivityEntry, NotionLogger},
    paths::FarmerPaths,
    platforms::{
        lighter::LighterClient, megaeth::MegaEthClient, polymarket::PolymarketClient, Platform,
        PlatformReport,
    },
    wallet::WalletRecord,
};
use eyre::Context as _;
use fs2::FileExt as _;
use secrecy::SecretString;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    time::Instant,
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Aggregated outcome of one farming run across all wallets and platforms.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub wallets_processed: u64,
    pub activities_completed: u64,
    pub errors: Vec<String>,
    pub wallet_results: Vec<WalletRunResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletRunResult {
    pub address: String,
    pub platforms: BTreeMap<&'static str, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct FarmStats {
    pub total_wallets: usize,
    pub wallets: Vec<String>,
    pub platform_stats: Vec<crate::db::PlatformStatsRow>,
    pub recent_activities_count: usize,
    pub generated_at: String,
}

/// Orchestrates a farming run: wallets from the vault, one activity set per
/// wallet per platform, results fanned out to the local db and the Notion
/// log.
///
/// Fault isolation contract: a platform failure is recorded and never aborts
/// the remaining platforms or wallets; a sink failure is logged and affects
/// neither the other sink nor run completion.
pub struct Farmer {
    cfg: FarmerConfig,
    vault: WalletVault,
    db: Db,
    notion: NotionLogger,
    megaeth: MegaEthClient,
    lighter: LighterClient,
    polymarket: PolymarketClient,
    // Held for the lifetime of the farmer; released on drop.
    _run_lock: File,
}

impl std::fmt::Debug for Farmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Farmer")
            .field("wallets", &self.vault.wallets().len())
            .finish_non_exhaustive()
    }
}

/// Single-run discipline: concurrent mutation of the same storage from two
/// processes is undefined, so a second instance fails fast instead.
fn acquire_instance_lock(paths: &FarmerPaths) -> eyre::Result<File> {
    let p = paths.lock_path();
    if let Some(parent) = p.parent() {
        crate::fsutil::ensure_private_dir(parent)?;
    }
    let f = {
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .mode(crate::fsutil::MODE_FILE_PRIVATE)
                .open(&p)
                .context("open lock file")?
        }
        #[cfg(not(unix))]
        {
            OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&p)
                .context("open lock file")?
        }
    };
    match f.try_lock_exclusive() {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            return Err(VaultError::InstanceBusy.into());
        }
        Err(e) => return Err(eyre::Report::new(e).wrap_err("lock exclusive")),
    }
    Ok(f)
}

impl Farmer {
    /// Build the whole component stack from explicit configuration.
    ///
    /// Vault construction failures (wrong passphrase, corrupt storage) are
    /// fatal here; callers must not continue with a partially built farmer.
    pub async fn new(
        paths: &FarmerPaths,
        cfg: FarmerConfig,
        passphrase: &SecretString,
    ) -> eyre::Result<Self> {
        info!("initializing farmer");
        paths.ensure_private_dirs()?;
        let run_lock = acquire_instance_lock(paths)?;

        let vault = WalletVault::open(paths.wallet_storage_path(), passphrase)
            .context("open wallet vault")?;
        let db = Db::open(paths).await.context("open local db")?;
        let notion = NotionLogger::from_config(&cfg.http)?;
        let megaeth = MegaEthClient::new(&cfg.http)?;
        let lighter = LighterClient::new(&cfg.http)?;
        let polymarket = PolymarketClient::new(&cfg.http)?;

        info!(wallets = vault.wallets().len(), "farmer initialized");
        Ok(Self {
            cfg,
            vault,
            db,
            notion,
            megaeth,
            lighter,
            polymarket,
            _run_lock: run_lock,
        })
    }

    /// Ensure the farming wallet set exists.
    ///
    /// Reuses existing wallets when any are present; otherwise creates
    /// `count` (falling back to the configured `num_wallets`) and persists
    /// them once.
    pub fn setup_wallets(&mut self, count: Option<u32>) -> eyre::Result<Vec<String>> {
        let existing = self.vault.wallets();
        if !existing.is_empty() {
            info!(count = existing.len(), "found existing wallets");
            return Ok(self.vault.wallet_addresses());
        }

        let count = count.unwrap_or(self.cfg.num_wallets);
        info!(count, "creating new wallets");
        let created = self.vault.create_multiple_wallets(count)?;
        Ok(created.iter().map(|w| w.address().to_owned()).collect())
    }

    pub fn wallet_addresses(&self) -> Vec<String> {
        self.vault.wallet_addresses()
    }

    /// Run all farming activities for all wallets.
    pub async fn run_farming_activities(&mut self) -> eyre::Result<RunSummary> {
        let started = Instant::now();
        let start_time = chrono::Utc::now().to_rfc3339();
        info!("starting farming activities");

        let wallets: Vec<WalletRecord> = self.vault.wallets().to_vec();
        let mut summary = RunSummary {
            status: RunStatus::Failed,
            start_time,
            end_time: String::new(),
            duration_seconds: 0.0,
            wallets_processed: 0,
            activities_completed: 0,
            errors: vec![],
            wallet_results: vec![],
        };

        if wallets.is_empty() {
            warn!("no wallets found; run `airfarm setup` first");
            summary.errors.push("no wallets configured".to_owned());
            summary.end_time = chrono::Utc::now().to_rfc3339();
            return Ok(summary);
        }

        for wallet in &wallets {
            info!(address = %wallet.address(), "processing wallet");
            let mut wallet_result = WalletRunResult {
                address: wallet.address().to_owned(),
                platforms: BTreeMap::new(),
            };

            // One platform failing must never abort the remaining platforms
            // or wallets; errors are recorded and the loop moves on.
            match self.megaeth.interact_with_testnet(wallet).await {
                Ok(report) => {
                    self.record_megaeth(wallet.address(), &report, &mut summary).await;
                    Self::insert_platform_result(&mut wallet_result, Platform::MegaEth, &report);
                }
                Err(e) => Self::record_platform_failure(
                    &mut wallet_result,
                    &mut summary,
                    wallet.address(),
                    Platform::MegaEth,
                    &e,
                ),
            }

            match self.lighter.farm_points(wallet.address()).await {
                Ok(report) => {
                    self.record_lighter(wallet.address(), &report, &mut summary).await;
                    Self::insert_platform_result(&mut wallet_result, Platform::Lighter, &report);
                }
                Err(e) => Self::record_platform_failure(
                    &mut wallet_result,
                    &mut summary,
                    wallet.address(),
                    Platform::Lighter,
                    &e,
                ),
            }

            match self.polymarket.track_interactions(wallet.address()).await {
                Ok(report) => {
                    self.record_polymarket(wallet.address(), &report, &mut summary).await;
                    Self::insert_platform_result(&mut wallet_result, Platform::Polymarket, &report);
                }
                Err(e) => Self::record_platform_failure(
                    &mut wallet_result,
                    &mut summary,
                    wallet.address(),
                    Platform::Polymarket,
                    &e,
                ),
            }

            summary.wallet_results.push(wallet_result);
            summary.wallets_processed += 1;
            info!(address = %wallet.address(), "completed wallet");
        }

        summary.duration_seconds = started.elapsed().as_secs_f64();
        summary.end_time = chrono::Utc::now().to_rfc3339();
        summary.status = if summary.activities_completed > 0 {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };

        self.record_run_summary(&summary).await;

        info!(
            status = summary.status.as_str(),
            wallets = summary.wallets_processed,
            activities = summary.activities_completed,
            errors = summary.errors.len(),
            duration_seconds = summary.duration_seconds,
            "farming activities completed"
        );
        Ok(summary)
    }

    fn insert_platform_result(
        wallet_result: &mut WalletRunResult,
        platform: Platform,
        report: &PlatformReport,
    ) {
        wallet_result.platforms.insert(
            platform.key(),
            serde_json::to_value(report).unwrap_or_default(),
        );
    }

    /// Fan one platform report out to both sinks; every step is best-effort.
    async fn record_platform(
        &self,
        address: &str,
        platform: Platform,
        activity_type: &str,
        report: &PlatformReport,
        summary: &mut RunSummary,
    ) {
        let status = if report.success { "success" } else { "failed" };
        let details = serde_json::to_value(report).unwrap_or_default();
        let details_str = serde_json::to_string(&details).unwrap_or_default();

        if let Err(e) = self
            .db
            .log_activity(
                address,
                activity_type,
                platform.display_name(),
                status,
                &details_str,
                "",
            )
            .await
        {
            warn!(error = %format!("{e:#}"), "db activity log failed");
        }
        if let Err(e) = self.db.update_platform_stats(platform.display_name(), report.success).await
        {
            warn!(error = %format!("{e:#}"), "db platform stats update failed");
        }
        if let Err(e) = self
            .notion
            .log_activity(&ActivityEntry {
                wallet_address: address,
                platform: platform.display_name(),
                activity_type,
                status,
                details: Some(&details),
                tx_hash: None,
            })
            .await
        {
            warn!(error = %format!("{e:#}"), "notion activity log failed");
        }

        if report.success {
            summary.activities_completed += report.successful_count;
        }
    }

    fn record_platform_failure(
        wallet_result: &mut WalletRunResult,
        summary: &mut RunSummary,
        address: &str,
        platform: Platform,
        err: &eyre::Report,
    ) {
        warn!(
            address,
            platform = platform.display_name(),
            error = %format!("{err:#}"),
            "platform interaction failed"
        );
        summary
            .errors
            .push(format!("{} - {address}: {err:#}", platform.display_name()));
        wallet_result.platforms.insert(
            platform.key(),
            serde_json::json!({ "error": format!("{err:#}"), "success": false }),
        );
    }

    async fn record_megaeth(
        &self,
        address: &str,
        report: &PlatformReport,
        summary: &mut RunSummary,
    ) {
        self.record_platform(address, Platform::MegaEth, "testnet_interaction", report, summary)
            .await;
        let tx_count = i64::try_from(report.successful_count).unwrap_or(i64::MAX);
        if let Err(e) = self.db.touch_wallet_megaeth(address, tx_count).await {
            warn!(error = %format!("{e:#}"), "db wallet state update failed");
        }
    }

    async fn record_lighter(
        &self,
        address: &str,
        report: &PlatformReport,
        summary: &mut RunSummary,
    ) {
        self.record_platform(address, Platform::Lighter, "points_farming", report, summary)
            .await;
        let points = report.current_points.unwrap_or(0.0);
        if let Err(e) = self.db.touch_wallet_lighter(address, points).await {
            warn!(error = %format!("{e:#}"), "db wallet state update failed");
        }
    }

    async fn record_polymarket(
        &self,
        address: &str,
        report: &PlatformReport,
        summary: &mut RunSummary,
    ) {
        self.record_platform(
            address,
            Platform::Polymarket,
            "interaction_tracking",
            report,
            summary,
        )
        .await;
        let trades = report
            .trades_count
            .and_then(|t| i64::try_from(t).ok())
            .unwrap_or(0);
        if let Err(e) = self.db.touch_wallet_polymarket(address, trades).await {
            warn!(error = %format!("{e:#}"), "db wallet state update failed");
        }
    }

    async fn record_run_summary(&self, summary: &RunSummary) {
        let errors_json = serde_json::to_string(&summary.errors).unwrap_or_else(|_| "[]".to_owned());
        if let Err(e) = self
            .db
            .log_scheduler_run(
                summary.status.as_str(),
                i64::try_from(summary.wallets_processed).unwrap_or(i64::MAX),
                i64::try_from(summary.activities_completed).unwrap_or(i64::MAX),
                &errors_json,
                summary.duration_seconds,
            )
            .await
        {
            warn!(error = %format!("{e:#}"), "db run summary log failed");
        }
        if let Err(e) = self
            .notion
            .log_scheduler_run(
                summary.status.as_str(),
                summary.wallets_processed,
                summary.activities_completed,
                &summary.errors,
                summary.duration_seconds,
            )
            .await
        {
            warn!(error = %format!("{e:#}"), "notion run summary log failed");
        }
    }

    pub async fn stats(&self) -> eyre::Result<FarmStats> {
        let wallets = self.vault.wallet_addresses();
        let platform_stats = self.db.platform_stats().await?;
        let recent = self.db.recent_activities(50).await?;
        Ok(FarmStats {
            total_wallets: wallets.len(),
            wallets,
            platform_stats,
            recent_activities_count: recent.len(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::ContextCompat as _;

    fn paths_in(td: &tempfile::TempDir) -> FarmerPaths {
        FarmerPaths {
            config_dir: td.path().join("cfg"),
            data_dir: td.path().join("data"),
            log_file: td.path().join("data").join("airfarm.log.jsonl"),
        }
    }

    fn offline_config() -> FarmerConfig {
        let mut cfg = FarmerConfig::default();
        // Closed loopback port: requests fail fast and the clients degrade
        // to their mock/zero fallbacks.
        cfg.http.megaeth_rpc_url = "http://127.0.0.1:9".to_owned();
        cfg.http.lighter_api_url = "http://127.0.0.1:9".to_owned();
        cfg.http.polymarket_api_url = "http://127.0.0.1:9".to_owned();
        cfg.http.request_timeout_seconds = 1;
        cfg
    }

    #[tokio::test]
    async fn full_offline_run_isolates_failures_and_completes() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let paths = paths_in(&td);
        let pw = SecretString::from("test-passphrase".to_owned());

        let mut farmer = Farmer::new(&paths, offline_config(), &pw).await?;
        let addresses = farmer.setup_wallets(Some(2))?;
        assert_eq!(addresses.len(), 2);

        let summary = farmer.run_farming_activities().await?;
        assert_eq!(summary.wallets_processed, 2);
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.wallet_results.len(), 2);
        for result in &summary.wallet_results {
            assert_eq!(result.platforms.len(), 3);
        }
        // MegaETH: 2 of 3 activities succeed on an empty wallet; Lighter and
        // Polymarket: 3 each via fallbacks.
        assert_eq!(summary.activities_completed, 16);
        assert!(summary.duration_seconds >= 0.0);

        // Both sinks saw the run: db has activities and a run row.
        let stats = farmer.stats().await?;
        assert_eq!(stats.total_wallets, 2);
        assert_eq!(stats.recent_activities_count, 6);
        assert_eq!(stats.platform_stats.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn run_without_wallets_reports_failure_not_error() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let paths = paths_in(&td);
        let pw = SecretString::from("test-passphrase".to_owned());

        let mut farmer = Farmer::new(&paths, offline_config(), &pw).await?;
        let summary = farmer.run_farming_activities().await?;
        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.wallets_processed, 0);
        let first = summary.errors.first().context("one error recorded")?;
        assert!(first.contains("no wallets"));
        Ok(())
    }

    #[tokio::test]
    async fn setup_wallets_reuses_existing_set() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let paths = paths_in(&td);
        let pw = SecretString::from("test-passphrase".to_owned());

        let first = {
            let mut farmer = Farmer::new(&paths, offline_config(), &pw).await?;
            farmer.setup_wallets(Some(3))?
        };
        let second = {
            let mut farmer = Farmer::new(&paths, offline_config(), &pw).await?;
            farmer.setup_wallets(Some(7))?
        };
        assert_eq!(first, second, "existing wallets must be reused, not recreated");
        Ok(())
    }

    #[tokio::test]
    async fn second_instance_fails_fast_on_the_lock() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let paths = paths_in(&td);
        let pw = SecretString::from("test-passphrase".to_owned());

        let _first = Farmer::new(&paths, offline_config(), &pw).await?;
        let err = Farmer::new(&paths, offline_config(), &pw)
            .await
            .err()
            .context("second instance must fail")?;
        assert_eq!(
            err.downcast_ref::<VaultError>(),
            Some(&VaultError::InstanceBusy)
        );
        Ok(())
    }
}
