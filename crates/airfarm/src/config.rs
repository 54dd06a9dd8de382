use serde::{Deserialize, Serialize};

pub const DEFAULT_NUM_WALLETS: u32 = 5;
pub const DEFAULT_RUN_INTERVAL_HOURS: u64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmerConfig {
    /// How many wallets `setup` creates on a fresh installation.
    pub num_wallets: u32,
    pub scheduler: SchedulerConfig,
    pub http: HttpConfig,
}

impl Default for FarmerConfig {
    fn default() -> Self {
        Self {
            num_wallets: DEFAULT_NUM_WALLETS,
            scheduler: SchedulerConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Hours between scheduled farming runs.
    pub run_interval_hours: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_interval_hours: DEFAULT_RUN_INTERVAL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// MegaETH testnet JSON-RPC endpoint.
    pub megaeth_rpc_url: String,
    pub megaeth_chain_id: u64,

    /// Lighter DEX API base URL.
    pub lighter_api_url: String,
    /// Optional Lighter API key (bearer auth). Keyless reads work with
    /// reduced data.
    pub lighter_api_key: Option<String>,

    /// Polymarket API base URL.
    pub polymarket_api_url: String,
    pub polymarket_api_key: Option<String>,

    /// Notion REST API base URL.
    pub notion_api_base_url: String,
    /// Notion integration token. The remote sink is disabled when this or
    /// `notion_database_id` is unset.
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,

    /// Per-request timeout for all platform/sink HTTP calls.
    pub request_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            megaeth_rpc_url: "https://rpc.megaeth.testnet".into(),
            megaeth_chain_id: 1234,

            lighter_api_url: "https://api.lighter.xyz".into(),
            lighter_api_key: None,

            polymarket_api_url: "https://api.polymarket.com".into(),
            polymarket_api_key: None,

            notion_api_base_url: "https://api.notion.com".into(),
            notion_api_key: None,
            notion_database_id: None,

            request_timeout_seconds: 30,
        }
    }
}
