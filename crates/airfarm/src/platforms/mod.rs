pub mod lighter;
pub mod megaeth;
pub mod polymarket;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MegaEth,
    Lighter,
    Polymarket,
}

impl Platform {
    /// Display name used in sinks and error strings.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::MegaEth => "MegaETH",
            Self::Lighter => "Lighter",
            Self::Polymarket => "Polymarket",
        }
    }

    /// Stable key used in per-wallet result maps.
    pub const fn key(self) -> &'static str {
        match self {
            Self::MegaEth => "megaeth",
            Self::Lighter => "lighter",
            Self::Polymarket => "polymarket",
        }
    }
}

/// Outcome of one platform interaction for one wallet.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformReport {
    pub wallet: String,
    pub activities: Vec<ActivityOutcome>,
    pub success: bool,
    pub successful_count: u64,
    pub total_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trades_count: Option<u64>,
}

impl PlatformReport {
    /// Fill the success tallies from the recorded activities.
    pub fn finalize(mut self) -> Self {
        let succeeded = self.activities.iter().filter(|a| a.success).count();
        self.successful_count = u64::try_from(succeeded).unwrap_or(u64::MAX);
        self.total_count = u64::try_from(self.activities.len()).unwrap_or(u64::MAX);
        self.success = self.successful_count > 0;
        self
    }

    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            activities: vec![],
            success: false,
            successful_count: 0,
            total_count: 0,
            current_points: None,
            trades_count: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    pub kind: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivityOutcome {
    pub fn ok(kind: &'static str, detail: Option<serde_json::Value>) -> Self {
        Self {
            kind,
            success: true,
            detail,
            error: None,
        }
    }

    pub fn failed(kind: &'static str, error: String) -> Self {
        Self {
            kind,
            success: false,
            detail: None,
            error: Some(error),
        }
    }
}

pub(crate) fn trimmed_base(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
