use crate::farmer::{Farmer, RunStatus, RunSummary};
use std::time::Duration;
use tracing::{error, info, warn};

/// Interval-driven farming loop.
///
/// Each job is contained: a failed run is logged and the schedule keeps
/// going. Ctrl-C stops the loop between jobs.
pub struct FarmingScheduler {
    farmer: Farmer,
    interval: Duration,
}

impl FarmingScheduler {
    pub fn new(farmer: Farmer, interval_hours: u64) -> Self {
        info!(interval_hours, "scheduler initialized");
        Self {
            farmer,
            interval: Duration::from_secs(interval_hours.saturating_mul(3600)),
        }
    }

    async fn run_job(&mut self) -> Option<RunSummary> {
        info!("scheduled farming job started");
        match self.farmer.run_farming_activities().await {
            Ok(summary) => {
                match summary.status {
                    RunStatus::Success => info!("scheduled farming job completed"),
                    RunStatus::Failed => warn!("scheduled farming job completed with errors"),
                }
                Some(summary)
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "scheduled farming job failed");
                None
            }
        }
    }

    /// Run a single farming cycle and return its summary.
    pub async fn run_once(&mut self) -> eyre::Result<RunSummary> {
        if let Err(e) = self.farmer.setup_wallets(None) {
            error!(error = %format!("{e:#}"), "failed to set up wallets");
            return Err(e);
        }
        self.farmer.run_farming_activities().await
    }

    /// Run on the configured interval until Ctrl-C.
    pub async fn start(&mut self, run_immediately: bool) -> eyre::Result<()> {
        info!("starting farming scheduler");
        if let Err(e) = self.farmer.setup_wallets(None) {
            error!(error = %format!("{e:#}"), "failed to set up wallets");
            return Err(e);
        }

        if run_immediately {
            info!("running initial farming cycle");
            drop(self.run_job().await);
        }

        info!(
            next_run_hours = self.interval.as_secs() / 3600,
            "scheduler started; press ctrl-c to stop"
        );
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {
                    drop(self.run_job().await);
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        error!(error = %e, "ctrl-c handler failed");
                    }
                    info!("scheduler stopped by user");
                    return Ok(());
                }
            }
        }
    }
}
