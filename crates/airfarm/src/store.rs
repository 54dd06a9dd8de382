use crate::{config::FarmerConfig, paths::FarmerPaths};
use eyre::Context as _;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

/// Apply environment variable overrides to the config.
fn apply_env_overrides(cfg: &mut FarmerConfig) {
    /// Helper: if an env var is set and non-empty, apply `setter` with the trimmed value.
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(u) = std::env::var(var) {
            let t = u.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }

    apply_env("AIRFARM_MEGAETH_RPC_URL", |v| {
        v.clone_into(&mut cfg.http.megaeth_rpc_url);
    });
    apply_env("AIRFARM_MEGAETH_CHAIN_ID", |v| {
        if let Ok(n) = v.parse::<u64>() {
            cfg.http.megaeth_chain_id = n;
        }
    });
    apply_env("AIRFARM_LIGHTER_API_URL", |v| {
        v.clone_into(&mut cfg.http.lighter_api_url);
    });
    apply_env("AIRFARM_LIGHTER_API_KEY", |v| {
        cfg.http.lighter_api_key = Some(v.to_owned());
    });
    apply_env("AIRFARM_POLYMARKET_API_URL", |v| {
        v.clone_into(&mut cfg.http.polymarket_api_url);
    });
    apply_env("AIRFARM_POLYMARKET_API_KEY", |v| {
        cfg.http.polymarket_api_key = Some(v.to_owned());
    });
    apply_env("AIRFARM_NOTION_API_BASE_URL", |v| {
        v.clone_into(&mut cfg.http.notion_api_base_url);
    });
    apply_env("AIRFARM_NOTION_API_KEY", |v| {
        cfg.http.notion_api_key = Some(v.to_owned());
    });
    apply_env("AIRFARM_NOTION_DATABASE_ID", |v| {
        cfg.http.notion_database_id = Some(v.to_owned());
    });
    apply_env("AIRFARM_NUM_WALLETS", |v| {
        if let Ok(n) = v.parse::<u32>() {
            cfg.num_wallets = n;
        }
    });
    apply_env("AIRFARM_RUN_INTERVAL_HOURS", |v| {
        if let Ok(n) = v.parse::<u64>() {
            if n > 0 {
                cfg.scheduler.run_interval_hours = n;
            }
        }
    });
    apply_env("AIRFARM_REQUEST_TIMEOUT_SECONDS", |v| {
        if let Ok(n) = v.parse::<u64>() {
            if n > 0 {
                cfg.http.request_timeout_seconds = n;
            }
        }
    });
}

impl ConfigStore {
    pub fn new(paths: &FarmerPaths) -> Self {
        Self {
            path: paths.config_dir.join("config.toml"),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<FarmerConfig> {
        if !self.path.exists() {
            let mut cfg = FarmerConfig::default();
            apply_env_overrides(&mut cfg);
            self.save(&cfg)?;
            return Ok(cfg);
        }

        let s = fs::read_to_string(&self.path).context("read config.toml")?;
        let mut cfg: FarmerConfig = toml::from_str(&s).context("parse config.toml")?;
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &FarmerConfig) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent() {
            crate::fsutil::ensure_private_dir(parent)?;
        }
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_atomic(&self.path, s.as_bytes(), crate::fsutil::MODE_FILE_PRIVATE)
            .context("write config.toml")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Context as _;

    fn paths_in(td: &tempfile::TempDir) -> FarmerPaths {
        FarmerPaths {
            config_dir: td.path().join("cfg"),
            data_dir: td.path().join("data"),
            log_file: td.path().join("data").join("airfarm.log.jsonl"),
        }
    }

    #[test]
    fn first_load_writes_defaults_back() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let store = ConfigStore::new(&paths_in(&td));

        let cfg = store.load_or_init_default()?;
        assert_eq!(cfg.num_wallets, crate::config::DEFAULT_NUM_WALLETS);
        assert!(td.path().join("cfg").join("config.toml").exists());

        let again = store.load_or_init_default()?;
        assert_eq!(again.http.megaeth_rpc_url, cfg.http.megaeth_rpc_url);
        Ok(())
    }

    #[test]
    fn config_round_trips_through_toml() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let store = ConfigStore::new(&paths_in(&td));

        let mut cfg = FarmerConfig::default();
        cfg.num_wallets = 9;
        cfg.http.lighter_api_key = Some("k".to_owned());
        cfg.scheduler.run_interval_hours = 6;
        store.save(&cfg)?;

        let loaded = store.load_or_init_default()?;
        assert_eq!(loaded.num_wallets, 9);
        assert_eq!(loaded.http.lighter_api_key.as_deref(), Some("k"));
        assert_eq!(loaded.scheduler.run_interval_hours, 6);
        Ok(())
    }
}
