/// Program addresses and fixed trading parameters
///
/// All venue program ids are mainnet addresses. Decision thresholds that are
/// not operator-tunable live here; tunable ones live in configs.json.

/// Wrapped SOL mint
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Pump.fun bonding curve program
pub const PUMPFUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Pump.fun global state account
pub const PUMPFUN_GLOBAL_STATE: &str = "4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf";

/// Pump.fun protocol fee recipient
pub const PUMPFUN_FEE_RECIPIENT: &str = "CebN5WGQ4jvEPvsVU4EoHEpgzq1VV7AbicfhtW4xC9iM";

/// Pump.fun event authority PDA
pub const PUMPFUN_EVENT_AUTHORITY: &str = "Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1";

/// Raydium legacy AMM v4 program
pub const RAYDIUM_AMM_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// Raydium AMM authority (owns every v4 pool vault)
pub const RAYDIUM_AUTHORITY: &str = "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1";

/// Raydium concentrated liquidity program
pub const RAYDIUM_CLMM_PROGRAM_ID: &str = "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK";

/// Moonshot bonding curve program
pub const MOONSHOT_PROGRAM_ID: &str = "MoonCVVNZFSYkqNXP6bxHLPL6QQJiMagDL3qcqUQTrG";

/// Jupiter aggregator v6 program
pub const JUPITER_PROGRAM_ID: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";

/// Meteora pools program
pub const METEORA_PROGRAM_ID: &str = "Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB";

/// OpenBook (serum) market program
pub const OPENBOOK_PROGRAM_ID: &str = "srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX";

/// SPL memo program
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// Jito tip account used for bundle priority payments
pub const JITO_TIP_ACCOUNT: &str = "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49";

/// Rug filter: entries are rejected above this top-five holder concentration.
/// 32% passes, 33% rejects.
pub const MAX_TOP_FIVE_HOLDERS_PCT: f64 = 32.0;

/// Minimum operating SOL balance a sniper wallet must keep before it is
/// allowed to buy.
pub const WALLET_MIN_BALANCE_SOL: f64 = 0.05;

/// Max-cost escalation applied over the quoted price when building a buy,
/// tolerating movement between quote and inclusion.
pub const BUY_PRICE_ESCALATION: f64 = 1.15;

/// Jito relay rejects bundles above this many transactions.
pub const BUNDLE_BATCH_SIZE: usize = 4;

/// Top-level purchase attempts per wallet before giving up.
pub const MAX_SNIPE_ATTEMPTS: u32 = 3;

/// Wall-clock window for one balance-confirmation loop.
pub const SNIPE_CONFIRM_TIMEOUT_MS: u64 = 10_000;

/// Delay between balance polls / rebroadcasts while confirming.
pub const SNIPE_POLL_INTERVAL_MS: u64 = 3_500;

/// Raydium pool accounts can lag behind the first swap notification.
pub const POOL_FETCH_MAX_RETRIES: u32 = 30;
pub const POOL_FETCH_RETRY_DELAY_MS: u64 = 300;

/// Token-balance reads retried on fresh accounts.
pub const BALANCE_FETCH_MAX_RETRIES: u32 = 10;
pub const BALANCE_FETCH_RETRY_DELAY_MS: u64 = 200;

/// Digital-asset metadata lookups.
pub const ASSET_FETCH_MAX_RETRIES: u32 = 5;
pub const ASSET_FETCH_RETRY_DELAY_MS: u64 = 1_500;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
