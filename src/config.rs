/// Runtime configuration loaded from configs.json
///
/// Secrets (bot tokens) can be overridden with environment variables so the
/// json file can be committed without credentials: MOONBOT_TELEGRAM_TOKEN,
/// MOONBOT_DISCORD_TOKEN.

use crate::logger::{self, LogTag};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One notification tier: Discord channel + Telegram forum thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChannels {
    pub discord_channel_id: String,
    pub telegram_thread_id: i32,
}

/// FDV-bracketed notification routing (thresholds in SOL)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_tier_low_max")]
    pub low_max_fdv_sol: f64,
    #[serde(default = "default_tier_mid_max")]
    pub mid_max_fdv_sol: f64,
    pub low: TierChannels,
    pub mid: TierChannels,
    pub high: TierChannels,
}

fn default_tier_low_max() -> f64 {
    1000.0
}

fn default_tier_mid_max() -> f64 {
    6300.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configs {
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_fallbacks: Vec<String>,

    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,

    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    #[serde(default)]
    pub discord_bot_token: String,

    #[serde(default = "default_min_buyers")]
    pub min_buyers_raydium: u32,
    #[serde(default = "default_min_buyers")]
    pub min_buyers_pumpfun: u32,
    #[serde(default = "default_min_buyers")]
    pub min_buyers_moonshot: u32,

    /// Purchases are skipped above this fully-diluted value
    #[serde(default = "default_fdv_ceiling")]
    pub fdv_ceiling_sol: f64,

    /// Notional size of every automated buy
    #[serde(default = "default_buy_amount")]
    pub buy_amount_sol: f64,

    #[serde(default = "default_jito_tip")]
    pub jito_tip_sol: f64,
    #[serde(default = "default_jito_url")]
    pub jito_block_engine_url: String,
    /// base58-encoded keypair funding bundle tips; empty disables bundling
    #[serde(default)]
    pub jito_payer_keypair: String,

    pub tiers: TierConfig,
}

fn default_webhook_port() -> u16 {
    45000
}

fn default_database_path() -> String {
    "moonbot.db".to_string()
}

fn default_min_buyers() -> u32 {
    1
}

fn default_fdv_ceiling() -> f64 {
    5000.0
}

fn default_buy_amount() -> f64 {
    0.03
}

fn default_jito_tip() -> f64 {
    0.000269858
}

fn default_jito_url() -> String {
    "https://mainnet.block-engine.jito.wtf/api/v1".to_string()
}

static CONFIGS: Lazy<RwLock<Option<Configs>>> = Lazy::new(|| RwLock::new(None));

/// Read configs.json and install it as the global configuration
pub fn init<P: AsRef<Path>>(path: P) -> Result<(), String> {
    let data = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read {}: {}", path.as_ref().display(), e))?;
    let mut configs: Configs =
        serde_json::from_str(&data).map_err(|e| format!("Invalid configs.json: {}", e))?;

    if let Ok(token) = std::env::var("MOONBOT_TELEGRAM_TOKEN") {
        configs.telegram_bot_token = token;
    }
    if let Ok(token) = std::env::var("MOONBOT_DISCORD_TOKEN") {
        configs.discord_bot_token = token;
    }

    *CONFIGS.write() = Some(configs);
    logger::info(LogTag::System, "Configuration loaded");
    Ok(())
}

/// Install a configuration directly (tests)
pub fn set_configs(configs: Configs) {
    *CONFIGS.write() = Some(configs);
}

/// Run a closure against the global configuration
///
/// Panics if called before `init` - configuration is a startup invariant.
pub fn with_config<T>(f: impl FnOnce(&Configs) -> T) -> T {
    let guard = CONFIGS.read();
    let configs = guard
        .as_ref()
        .expect("configuration accessed before config::init");
    f(configs)
}
