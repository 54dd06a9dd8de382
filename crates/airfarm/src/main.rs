#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use airfarm::{cli_output, config::FarmerConfig, farmer, paths, scheduler, store};
use clap::{Parser, Subcommand};
use eyre::Context as _;
use secrecy::SecretString;
use std::io::IsTerminal as _;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "airfarm", version, about = "Airdrop farming automation bot")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the farming wallet set (reuses existing wallets if present).
    Setup {
        /// Number of wallets to create; defaults to the configured value.
        #[arg(long)]
        wallets: Option<u32>,
    },

    /// Run all farming activities once and exit.
    Run,

    /// Run farming activities on a recurring interval.
    Schedule {
        /// Hours between runs; defaults to the configured value.
        #[arg(long)]
        interval_hours: Option<u64>,

        /// Don't run immediately when starting the scheduler.
        #[arg(long, default_value_t = false)]
        no_immediate: bool,
    },

    /// Print farming statistics.
    Stats {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print resolved paths (useful for debugging).
    Paths,
}

fn init_logging(paths: &paths::FarmerPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("airfarm.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

/// Resolve the master passphrase: env first, interactive prompt second.
///
/// The passphrase is never persisted anywhere; it only feeds key derivation.
fn resolve_passphrase() -> eyre::Result<SecretString> {
    if let Ok(v) = std::env::var("AIRFARM_PASSPHRASE") {
        if !v.trim().is_empty() {
            return Ok(SecretString::from(v));
        }
    }

    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        let p = rpassword::prompt_password("Master passphrase: ").context("read passphrase")?;
        if p.trim().is_empty() {
            eyre::bail!("empty passphrase");
        }
        return Ok(SecretString::from(p));
    }

    eyre::bail!("AIRFARM_PASSPHRASE is not set and no terminal is available for a prompt")
}

async fn build_farmer(
    paths: &paths::FarmerPaths,
) -> eyre::Result<(farmer::Farmer, FarmerConfig)> {
    let cfg = store::ConfigStore::new(paths).load_or_init_default()?;
    let passphrase = resolve_passphrase()?;
    let farmer = farmer::Farmer::new(paths, cfg.clone(), &passphrase).await?;
    Ok((farmer, cfg))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::FarmerPaths::discover()?;
    std::fs::create_dir_all(&paths.data_dir).context("create data dir")?;
    let _log_guard = init_logging(&paths);

    match cli.cmd {
        Command::Setup { wallets } => {
            let (mut farmer, _cfg) = build_farmer(&paths).await?;
            let addresses = farmer.setup_wallets(wallets).context("set up wallets")?;
            cli_output::print_setup_complete(&addresses);
            Ok(())
        }
        Command::Run => {
            let (farmer, cfg) = build_farmer(&paths).await?;
            let mut sched =
                scheduler::FarmingScheduler::new(farmer, cfg.scheduler.run_interval_hours);
            let summary = sched.run_once().await.context("farming run failed")?;
            cli_output::print_run_summary(&summary);
            Ok(())
        }
        Command::Schedule {
            interval_hours,
            no_immediate,
        } => {
            let (farmer, cfg) = build_farmer(&paths).await?;
            let hours = interval_hours.unwrap_or(cfg.scheduler.run_interval_hours);
            let mut sched = scheduler::FarmingScheduler::new(farmer, hours);
            sched.start(!no_immediate).await.context("scheduler failed")
        }
        Command::Stats { json } => {
            let (farmer, _cfg) = build_farmer(&paths).await?;
            let stats = farmer.stats().await.context("fetch statistics")?;
            if json {
                use std::io::Write as _;
                let s = serde_json::to_string_pretty(&stats).context("serialize stats")?;
                writeln!(std::io::stdout().lock(), "{s}").context("write stats")?;
            } else {
                cli_output::print_stats(&stats);
            }
            Ok(())
        }
        Command::Paths => {
            use std::io::Write as _;
            let s = serde_json::to_string(&serde_json::json!({
              "config_dir": paths.config_dir,
              "data_dir": paths.data_dir,
              "log_file": paths.log_file,
              "wallet_storage": paths.wallet_storage_path(),
            }))
            .context("serialize paths")?;
            writeln!(std::io::stdout().lock(), "{s}").context("write paths")?;
            Ok(())
        }
    }
}
