//! Airdrop farming automation: encrypted local wallet custody plus
//! scheduled multi-platform activity runs.
//!
//! The custody core is [`keystore::WalletVault`] (wallet generation and
//! encrypted persistence) fed by [`keystore::crypto`] (PBKDF2 key derivation
//! + AES-256-GCM). [`farmer::Farmer`] consumes the vault and drives the
//! per-wallet platform activity, reporting to the local db and the Notion
//! log.

pub mod cli_output;
pub mod config;
pub mod db;
pub mod errors;
pub mod farmer;
pub mod fsutil;
pub mod keystore;
pub mod notion;
pub mod paths;
pub mod platforms;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod wallet;
