use crate::paths::FarmerPaths;
use eyre::Context as _;

// Local, embedded store (Turso, pure Rust) for run state and activity logs.
//
// This is a reporting sink, not the custody path: if it fails, the farming
// run keeps going and the failure is logged. The wallet set itself lives in
// the encrypted keystore only.

pub struct Db {
    // Keep the database handle alive for the lifetime of the connection.
    _db: turso::Database,
    conn: turso::Connection,
}

// `turso::Database` / `turso::Connection` may not implement `Debug`. We only
// need a debuggable handle for state struct derives, not to print internals.
impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub id: i64,
    pub timestamp: String,
    pub wallet_address: String,
    pub activity_type: String,
    pub platform: String,
    pub status: String,
    pub details_json: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PlatformStatsRow {
    pub platform: String,
    pub total_activities: i64,
    pub successful_activities: i64,
    pub failed_activities: i64,
    pub last_activity_time: String,
}

impl Db {
    pub async fn open(paths: &FarmerPaths) -> eyre::Result<Self> {
        crate::fsutil::ensure_private_dir(&paths.data_dir)?;

        let p = paths.db_path();
        let p_s = p.to_string_lossy();
        let db = turso::Builder::new_local(p_s.as_ref())
            .build()
            .await
            .context("open turso local db")?;
        let conn = db.connect().context("connect turso db")?;

        let this = Self { _db: db, conn };
        this.init().await?;
        Ok(this)
    }

    async fn init(&self) -> eyre::Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS activity_log (\
                  id INTEGER PRIMARY KEY AUTOINCREMENT,\
                  timestamp TEXT NOT NULL,\
                  wallet_address TEXT NOT NULL,\
                  activity_type TEXT NOT NULL,\
                  platform TEXT NOT NULL,\
                  status TEXT NOT NULL,\
                  details TEXT NOT NULL,\
                  tx_hash TEXT NOT NULL DEFAULT ''\
                )",
                (),
            )
            .await
            .context("create activity_log")?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS wallet_state (\
                  wallet_address TEXT PRIMARY KEY,\
                  last_megaeth_activity TEXT,\
                  last_lighter_activity TEXT,\
                  last_polymarket_activity TEXT,\
                  megaeth_tx_count INTEGER NOT NULL DEFAULT 0,\
                  lighter_points REAL NOT NULL DEFAULT 0,\
                  polymarket_trades INTEGER NOT NULL DEFAULT 0,\
                  updated_at TEXT NOT NULL DEFAULT ''\
                )",
                (),
            )
            .await
            .context("create wallet_state")?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS platform_stats (\
                  platform TEXT PRIMARY KEY,\
                  total_activities INTEGER NOT NULL DEFAULT 0,\
                  successful_activities INTEGER NOT NULL DEFAULT 0,\
                  failed_activities INTEGER NOT NULL DEFAULT 0,\
                  last_activity_time TEXT NOT NULL DEFAULT ''\
                )",
                (),
            )
            .await
            .context("create platform_stats")?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS scheduler_runs (\
                  id INTEGER PRIMARY KEY AUTOINCREMENT,\
                  run_time TEXT NOT NULL,\
                  status TEXT NOT NULL,\
                  wallets_processed INTEGER NOT NULL DEFAULT 0,\
                  activities_completed INTEGER NOT NULL DEFAULT 0,\
                  errors TEXT NOT NULL DEFAULT '[]',\
                  duration_seconds REAL NOT NULL DEFAULT 0\
                )",
                (),
            )
            .await
            .context("create scheduler_runs")?;

        Ok(())
    }

    pub async fn log_activity(
        &self,
        wallet_address: &str,
        activity_type: &str,
        platform: &str,
        status: &str,
        details_json: &str,
        tx_hash: &str,
    ) -> eyre::Result<i64> {
        let ts = now_iso();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO activity_log \
                   (timestamp, wallet_address, activity_type, platform, status, details, tx_hash) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
                (
                    ts.as_str(),
                    wallet_address,
                    activity_type,
                    platform,
                    status,
                    details_json,
                    tx_hash,
                ),
            )
            .await
            .context("insert activity_log")?;
        let Some(row) = rows.next().await.context("next row")? else {
            eyre::bail!("insert activity returned no id");
        };
        let id: i64 = row.get(0).context("row.id")?;
        Ok(id)
    }

    async fn ensure_wallet_row(&self, wallet_address: &str) -> eyre::Result<()> {
        self.conn
            .execute(
                "INSERT INTO wallet_state (wallet_address) VALUES (?) \
                 ON CONFLICT(wallet_address) DO NOTHING",
                (wallet_address,),
            )
            .await
            .context("ensure wallet_state row")?;
        Ok(())
    }

    pub async fn touch_wallet_megaeth(
        &self,
        wallet_address: &str,
        tx_count: i64,
    ) -> eyre::Result<()> {
        self.ensure_wallet_row(wallet_address).await?;
        let ts = now_iso();
        self.conn
            .execute(
                "UPDATE wallet_state SET \
                   last_megaeth_activity = ?, megaeth_tx_count = ?, updated_at = ? \
                 WHERE wallet_address = ?",
                (ts.as_str(), tx_count, ts.as_str(), wallet_address),
            )
            .await
            .context("update wallet_state megaeth")?;
        Ok(())
    }

    pub async fn touch_wallet_lighter(
        &self,
        wallet_address: &str,
        points: f64,
    ) -> eyre::Result<()> {
        self.ensure_wallet_row(wallet_address).await?;
        let ts = now_iso();
        self.conn
            .execute(
                "UPDATE wallet_state SET \
                   last_lighter_activity = ?, lighter_points = ?, updated_at = ? \
                 WHERE wallet_address = ?",
                (ts.as_str(), points, ts.as_str(), wallet_address),
            )
            .await
            .context("update wallet_state lighter")?;
        Ok(())
    }

    pub async fn touch_wallet_polymarket(
        &self,
        wallet_address: &str,
        trades: i64,
    ) -> eyre::Result<()> {
        self.ensure_wallet_row(wallet_address).await?;
        let ts = now_iso();
        self.conn
            .execute(
                "UPDATE wallet_state SET \
                   last_polymarket_activity = ?, polymarket_trades = ?, updated_at = ? \
                 WHERE wallet_address = ?",
                (ts.as_str(), trades, ts.as_str(), wallet_address),
            )
            .await
            .context("update wallet_state polymarket")?;
        Ok(())
    }

    pub async fn update_platform_stats(&self, platform: &str, success: bool) -> eyre::Result<()> {
        let ts = now_iso();
        let success_inc: i64 = i64::from(success);
        let failure_inc: i64 = i64::from(!success);
        self.conn
            .execute(
                "INSERT INTO platform_stats \
                   (platform, total_activities, successful_activities, failed_activities, last_activity_time) \
                 VALUES (?, 1, ?, ?, ?) \
                 ON CONFLICT(platform) DO UPDATE SET \
                   total_activities = total_activities + 1, \
                   successful_activities = successful_activities + excluded.successful_activities, \
                   failed_activities = failed_activities + excluded.failed_activities, \
                   last_activity_time = excluded.last_activity_time",
                (platform, success_inc, failure_inc, ts.as_str()),
            )
            .await
            .context("upsert platform_stats")?;
        Ok(())
    }

    pub async fn log_scheduler_run(
        &self,
        status: &str,
        wallets_processed: i64,
        activities_completed: i64,
        errors_json: &str,
        duration_seconds: f64,
    ) -> eyre::Result<i64> {
        let ts = now_iso();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO scheduler_runs \
                   (run_time, status, wallets_processed, activities_completed, errors, duration_seconds) \
                 VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
                (
                    ts.as_str(),
                    status,
                    wallets_processed,
                    activities_completed,
                    errors_json,
                    duration_seconds,
                ),
            )
            .await
            .context("insert scheduler_runs")?;
        let Some(row) = rows.next().await.context("next row")? else {
            eyre::bail!("insert scheduler run returned no id");
        };
        let id: i64 = row.get(0).context("row.id")?;
        Ok(id)
    }

    pub async fn recent_activities(&self, limit: usize) -> eyre::Result<Vec<ActivityRow>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(100);
        let mut rows = self
            .conn
            .query(
                "SELECT id, timestamp, wallet_address, activity_type, platform, status, details, tx_hash \
                 FROM activity_log ORDER BY id DESC LIMIT ?",
                (limit_i64,),
            )
            .await
            .context("query activity_log")?;

        let mut out: Vec<ActivityRow> = vec![];
        while let Some(row) = rows.next().await.context("next row")? {
            out.push(ActivityRow {
                id: row.get(0).context("row.id")?,
                timestamp: row.get(1).context("row.timestamp")?,
                wallet_address: row.get(2).context("row.wallet_address")?,
                activity_type: row.get(3).context("row.activity_type")?,
                platform: row.get(4).context("row.platform")?,
                status: row.get(5).context("row.status")?,
                details_json: row.get(6).context("row.details")?,
                tx_hash: row.get(7).context("row.tx_hash")?,
            });
        }
        Ok(out)
    }

    pub async fn platform_stats(&self) -> eyre::Result<Vec<PlatformStatsRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT platform, total_activities, successful_activities, failed_activities, last_activity_time \
                 FROM platform_stats ORDER BY platform",
                (),
            )
            .await
            .context("query platform_stats")?;

        let mut out: Vec<PlatformStatsRow> = vec![];
        while let Some(row) = rows.next().await.context("next row")? {
            out.push(PlatformStatsRow {
                platform: row.get(0).context("row.platform")?,
                total_activities: row.get(1).context("row.total_activities")?,
                successful_activities: row.get(2).context("row.successful_activities")?,
                failed_activities: row.get(3).context("row.failed_activities")?,
                last_activity_time: row.get(4).context("row.last_activity_time")?,
            });
        }
        Ok(out)
    }
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
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

    #[tokio::test]
    async fn activities_are_logged_and_listed_latest_first() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let db = Db::open(&paths_in(&td)).await.context("open db")?;

        db.log_activity("0xaaa", "balance_check", "MegaETH", "success", "{}", "")
            .await?;
        db.log_activity("0xbbb", "points_check", "Lighter", "failed", "{}", "")
            .await?;

        let rows = db.recent_activities(10).await?;
        assert_eq!(rows.len(), 2);
        let first = rows.first().context("first row")?;
        assert_eq!(first.wallet_address, "0xbbb");
        assert_eq!(first.platform, "Lighter");
        assert_eq!(first.tx_hash, "");
        Ok(())
    }

    #[tokio::test]
    async fn platform_stats_tally_successes_and_failures() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let db = Db::open(&paths_in(&td)).await.context("open db")?;

        db.update_platform_stats("Lighter", true).await?;
        db.update_platform_stats("Lighter", true).await?;
        db.update_platform_stats("Lighter", false).await?;

        let stats = db.platform_stats().await?;
        assert_eq!(stats.len(), 1);
        let row = stats.first().context("one row")?;
        assert_eq!(row.total_activities, 3);
        assert_eq!(row.successful_activities, 2);
        assert_eq!(row.failed_activities, 1);
        assert!(!row.last_activity_time.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn wallet_state_updates_are_per_platform() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let db = Db::open(&paths_in(&td)).await.context("open db")?;

        db.touch_wallet_megaeth("0xaaa", 2).await?;
        db.touch_wallet_lighter("0xaaa", 12.5).await?;

        let mut rows = db
            .conn
            .query(
                "SELECT megaeth_tx_count, lighter_points, polymarket_trades \
                 FROM wallet_state WHERE wallet_address = ?",
                ("0xaaa",),
            )
            .await
            .context("query wallet_state")?;
        let row = rows.next().await.context("next row")?.context("one row")?;
        let tx_count: i64 = row.get(0).context("row.megaeth_tx_count")?;
        let points: f64 = row.get(1).context("row.lighter_points")?;
        let trades: i64 = row.get(2).context("row.polymarket_trades")?;
        assert_eq!(tx_count, 2);
        assert!((points - 12.5).abs() < 1e-9, "points was {points}");
        assert_eq!(trades, 0);
        Ok(())
    }

    #[tokio::test]
    async fn scheduler_runs_round_trip() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let db = Db::open(&paths_in(&td)).await.context("open db")?;

        let id = db
            .log_scheduler_run("success", 3, 24, "[]", 1.5)
            .await
            .context("log run")?;
        assert!(id > 0);
        Ok(())
    }
}
