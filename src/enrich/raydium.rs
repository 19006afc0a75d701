/// Raydium AMM v4 pool + OpenBook market account decoding
///
/// Produces the full key set needed to build a swap instruction. Pool
/// accounts can lag a few hundred milliseconds behind the first swap
/// notification for a new pair, hence the bounded retry loop.

use crate::constants::{
    POOL_FETCH_MAX_RETRIES, POOL_FETCH_RETRY_DELAY_MS, RAYDIUM_AMM_PROGRAM_ID, RAYDIUM_AUTHORITY,
    SOL_MINT,
};
use crate::errors::{DataError, EnrichmentError, MoonbotError, MoonbotResult};
use crate::logger::{self, LogTag};
use crate::rpc::{parse_pubkey, RpcManager};
use crate::utils::safe_truncate;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

/// Byte offsets into the AMM v4 pool state account
mod pool_offsets {
    pub const BASE_DECIMAL: usize = 32;
    pub const QUOTE_DECIMAL: usize = 40;
    pub const BASE_VAULT: usize = 336;
    pub const QUOTE_VAULT: usize = 368;
    pub const BASE_MINT: usize = 400;
    pub const QUOTE_MINT: usize = 432;
    pub const OPEN_ORDERS: usize = 496;
    pub const MARKET_ID: usize = 528;
    pub const MARKET_PROGRAM_ID: usize = 560;
    pub const TARGET_ORDERS: usize = 592;

    pub const MIN_LEN: usize = 624;
}

/// Byte offsets into the OpenBook market state account (5-byte header skipped
/// in the constants below).
mod market_offsets {
    pub const VAULT_SIGNER_NONCE: usize = 45;
    pub const BASE_VAULT: usize = 117;
    pub const QUOTE_VAULT: usize = 165;
    pub const EVENT_QUEUE: usize = 253;
    pub const BIDS: usize = 285;
    pub const ASKS: usize = 317;

    pub const MIN_LEN: usize = 349;
}

/// Everything a swap instruction against the pool needs
#[derive(Debug, Clone)]
pub struct RaydiumPoolKeys {
    pub id: Pubkey,
    pub authority: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_vault_signer: Pubkey,
}

impl RaydiumPoolKeys {
    pub fn sol_is_base(&self) -> bool {
        self.base_mint.to_string() == SOL_MINT
    }
}

#[derive(Debug, Clone)]
pub struct AmmPoolState {
    pub base_decimal: u64,
    pub quote_decimal: u64,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market_id: Pubkey,
    pub market_program_id: Pubkey,
    pub target_orders: Pubkey,
}

#[derive(Debug, Clone)]
pub struct MarketState {
    pub vault_signer_nonce: u64,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_pubkey(data: &[u8], offset: usize) -> Pubkey {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&data[offset..offset + 32]);
    Pubkey::new_from_array(bytes)
}

pub fn decode_pool_account(data: &[u8]) -> MoonbotResult<AmmPoolState> {
    if data.len() < pool_offsets::MIN_LEN {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "AMM pool account".to_string(),
            detail: format!("data too short: {} bytes", data.len()),
        }));
    }

    Ok(AmmPoolState {
        base_decimal: read_u64(data, pool_offsets::BASE_DECIMAL),
        quote_decimal: read_u64(data, pool_offsets::QUOTE_DECIMAL),
        base_vault: read_pubkey(data, pool_offsets::BASE_VAULT),
        quote_vault: read_pubkey(data, pool_offsets::QUOTE_VAULT),
        base_mint: read_pubkey(data, pool_offsets::BASE_MINT),
        quote_mint: read_pubkey(data, pool_offsets::QUOTE_MINT),
        open_orders: read_pubkey(data, pool_offsets::OPEN_ORDERS),
        market_id: read_pubkey(data, pool_offsets::MARKET_ID),
        market_program_id: read_pubkey(data, pool_offsets::MARKET_PROGRAM_ID),
        target_orders: read_pubkey(data, pool_offsets::TARGET_ORDERS),
    })
}

pub fn decode_market_account(data: &[u8]) -> MoonbotResult<MarketState> {
    if data.len() < market_offsets::MIN_LEN {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "market account".to_string(),
            detail: format!("data too short: {} bytes", data.len()),
        }));
    }

    Ok(MarketState {
        vault_signer_nonce: read_u64(data, market_offsets::VAULT_SIGNER_NONCE),
        base_vault: read_pubkey(data, market_offsets::BASE_VAULT),
        quote_vault: read_pubkey(data, market_offsets::QUOTE_VAULT),
        event_queue: read_pubkey(data, market_offsets::EVENT_QUEUE),
        bids: read_pubkey(data, market_offsets::BIDS),
        asks: read_pubkey(data, market_offsets::ASKS),
    })
}

/// The market vault signer is the PDA the market program settles through
fn derive_vault_signer(
    market_id: &Pubkey,
    market_program: &Pubkey,
    nonce: u64,
) -> MoonbotResult<Pubkey> {
    Pubkey::create_program_address(
        &[market_id.as_ref(), &nonce.to_le_bytes()],
        market_program,
    )
    .map_err(|e| {
        MoonbotError::Data(DataError::DecodeFailed {
            what: "market vault signer".to_string(),
            detail: e.to_string(),
        })
    })
}

/// Fetch and decode the pool and its market, retrying while the accounts
/// propagate.
pub async fn fetch_pool_keys(rpc: &RpcManager, pair_address: &str) -> MoonbotResult<RaydiumPoolKeys> {
    let pool_pubkey = parse_pubkey(pair_address)?;

    let mut last_error = String::new();
    for attempt in 0..POOL_FETCH_MAX_RETRIES {
        match fetch_pool_keys_once(rpc, &pool_pubkey).await {
            Ok(keys) => return Ok(keys),
            Err(e) => {
                last_error = e.to_string();
                if attempt + 1 < POOL_FETCH_MAX_RETRIES {
                    tokio::time::sleep(Duration::from_millis(POOL_FETCH_RETRY_DELAY_MS)).await;
                }
            }
        }
    }

    logger::warning(
        LogTag::Enrich,
        &format!(
            "Pool accounts for {} unavailable after {} attempts: {}",
            safe_truncate(pair_address, 8),
            POOL_FETCH_MAX_RETRIES,
            last_error
        ),
    );

    Err(MoonbotError::Enrichment(
        EnrichmentError::PoolAccountsUnavailable {
            pair_address: pair_address.to_string(),
            attempts: POOL_FETCH_MAX_RETRIES,
        },
    ))
}

async fn fetch_pool_keys_once(
    rpc: &RpcManager,
    pool_pubkey: &Pubkey,
) -> MoonbotResult<RaydiumPoolKeys> {
    let pool_data = rpc.get_account_data(pool_pubkey).await?;
    let pool = decode_pool_account(&pool_data)?;

    let market_data = rpc.get_account_data(&pool.market_id).await?;
    let market = decode_market_account(&market_data)?;

    let market_vault_signer = derive_vault_signer(
        &pool.market_id,
        &pool.market_program_id,
        market.vault_signer_nonce,
    )?;

    Ok(RaydiumPoolKeys {
        id: *pool_pubkey,
        authority: parse_pubkey(RAYDIUM_AUTHORITY)?,
        base_mint: pool.base_mint,
        quote_mint: pool.quote_mint,
        base_decimals: pool.base_decimal.min(u8::MAX as u64) as u8,
        quote_decimals: pool.quote_decimal.min(u8::MAX as u64) as u8,
        open_orders: pool.open_orders,
        target_orders: pool.target_orders,
        base_vault: pool.base_vault,
        quote_vault: pool.quote_vault,
        market_program_id: pool.market_program_id,
        market_id: pool.market_id,
        market_bids: market.bids,
        market_asks: market.asks,
        market_event_queue: market.event_queue,
        market_base_vault: market.base_vault,
        market_quote_vault: market.quote_vault,
        market_vault_signer,
    })
}

/// Current pool price in SOL per token, from vault reserves
pub async fn fetch_pool_price(rpc: &RpcManager, keys: &RaydiumPoolKeys) -> MoonbotResult<f64> {
    let (base_reserve, quote_reserve) = futures::try_join!(
        rpc.get_token_account_balance_ui(&keys.base_vault),
        rpc.get_token_account_balance_ui(&keys.quote_vault),
    )?;

    if base_reserve == 0.0 || quote_reserve == 0.0 {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "pool reserves".to_string(),
            detail: "zero reserve balance".to_string(),
        }));
    }

    let price = if keys.sol_is_base() {
        base_reserve / quote_reserve
    } else {
        quote_reserve / base_reserve
    };

    Ok(price)
}

/// The AMM program id parsed once where a `Pubkey` is needed
pub fn amm_program_id() -> Pubkey {
    // Constant is a valid base58 key
    parse_pubkey(RAYDIUM_AMM_PROGRAM_ID).expect("static program id")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_fixture() -> Vec<u8> {
        let mut data = vec![0u8; 752];
        data[pool_offsets::BASE_DECIMAL..pool_offsets::BASE_DECIMAL + 8]
            .copy_from_slice(&9u64.to_le_bytes());
        data[pool_offsets::QUOTE_DECIMAL..pool_offsets::QUOTE_DECIMAL + 8]
            .copy_from_slice(&6u64.to_le_bytes());

        let base_mint = Pubkey::new_unique();
        let market_id = Pubkey::new_unique();
        data[pool_offsets::BASE_MINT..pool_offsets::BASE_MINT + 32]
            .copy_from_slice(base_mint.as_ref());
        data[pool_offsets::MARKET_ID..pool_offsets::MARKET_ID + 32]
            .copy_from_slice(market_id.as_ref());
        data
    }

    #[test]
    fn decodes_pool_decimals_and_keys() {
        let data = pool_fixture();
        let pool = decode_pool_account(&data).unwrap();
        assert_eq!(pool.base_decimal, 9);
        assert_eq!(pool.quote_decimal, 6);
        assert_ne!(pool.base_mint, Pubkey::default());
        assert_ne!(pool.market_id, Pubkey::default());
        assert_eq!(pool.base_vault, Pubkey::default());
    }

    #[test]
    fn short_pool_data_is_an_error() {
        assert!(decode_pool_account(&[0u8; 100]).is_err());
    }

    #[test]
    fn decodes_market_nonce() {
        let mut data = vec![0u8; 400];
        data[market_offsets::VAULT_SIGNER_NONCE..market_offsets::VAULT_SIGNER_NONCE + 8]
            .copy_from_slice(&1u64.to_le_bytes());
        let bids = Pubkey::new_unique();
        data[market_offsets::BIDS..market_offsets::BIDS + 32].copy_from_slice(bids.as_ref());

        let market = decode_market_account(&data).unwrap();
        assert_eq!(market.vault_signer_nonce, 1);
        assert_eq!(market.bids, bids);
    }
}
