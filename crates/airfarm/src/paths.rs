use directories::ProjectDirs;
use eyre::ContextCompat as _;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FarmerPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl FarmerPaths {
    pub fn discover() -> eyre::Result<Self> {
        // Test/CI override knobs.
        if let (Ok(data_dir), Ok(config_dir)) = (
            std::env::var("AIRFARM_DATA_DIR"),
            std::env::var("AIRFARM_CONFIG_DIR"),
        ) {
            let data_dir = PathBuf::from(data_dir);
            let config_dir = PathBuf::from(config_dir);
            let log_file = data_dir.join("airfarm.log.jsonl");
            return Ok(Self {
                config_dir,
                data_dir,
                log_file,
            });
        }

        // Default locations:
        // macOS: ~/Library/Application Support/airfarm
        // Linux: ~/.config/airfarm
        // Windows: %APPDATA%\\airfarm
        let proj = ProjectDirs::from("", "", "airfarm").context("failed to resolve project dirs")?;
        let config_dir = proj.config_dir().to_path_buf();
        let data_dir = proj.data_dir().to_path_buf();
        let log_file = data_dir.join("airfarm.log.jsonl");

        Ok(Self {
            config_dir,
            data_dir,
            log_file,
        })
    }

    /// The single encrypted wallet storage file.
    pub fn wallet_storage_path(&self) -> PathBuf {
        self.config_dir.join("wallets.enc")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("airfarm.db")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("airfarm.lock")
    }

    pub fn ensure_private_dirs(&self) -> eyre::Result<()> {
        crate::fsutil::ensure_private_dir(&self.config_dir)?;
        crate::fsutil::ensure_private_dir(&self.data_dir)?;
        Ok(())
    }
}
