//! Centralised helpers for user-facing CLI output written to stderr.
//!
//! Machine-readable output (`--json`) goes to stdout from `main`; everything
//! here is for human operators and never contains secrets.

use crate::farmer::{FarmStats, RunSummary};
use std::io::Write as _;

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

pub fn print_setup_complete(addresses: &[String]) {
    stderr_writeln(&format!("Setup complete: {} wallet(s) ready.", addresses.len()));
    for (i, addr) in addresses.iter().enumerate() {
        stderr_writeln(&format!("  {}. {addr}", i + 1));
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    stderr_writeln(&format!(
        "Run {}: {} wallet(s), {} activities, {} error(s) in {:.2}s",
        summary.status.as_str(),
        summary.wallets_processed,
        summary.activities_completed,
        summary.errors.len(),
        summary.duration_seconds,
    ));
    for err in &summary.errors {
        stderr_writeln(&format!("  error: {err}"));
    }
}

pub fn print_stats(stats: &FarmStats) {
    stderr_writeln("Airfarm statistics");
    stderr_writeln("==================");
    stderr_writeln(&format!("Total wallets: {}", stats.total_wallets));
    for (i, addr) in stats.wallets.iter().enumerate() {
        stderr_writeln(&format!("  {}. {addr}", i + 1));
    }
    if stats.platform_stats.is_empty() {
        stderr_writeln("No platform activity recorded yet.");
    } else {
        stderr_writeln("Platform activity:");
        for row in &stats.platform_stats {
            stderr_writeln(&format!(
                "  {}: {} total, {} ok, {} failed (last: {})",
                row.platform,
                row.total_activities,
                row.successful_activities,
                row.failed_activities,
                if row.last_activity_time.is_empty() {
                    "never"
                } else {
                    &row.last_activity_time
                },
            ));
        }
    }
    stderr_writeln(&format!(
        "Recent activities: {}",
        stats.recent_activities_count
    ));
    stderr_writeln(&format!("Generated at: {}", stats.generated_at));
}
