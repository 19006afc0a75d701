/// Raydium AMM v4 buy transaction construction
///
/// Builds a `swap_base_in` against the pool keys recovered at enrichment
/// time. Buys are funded from native SOL, so the transaction wraps the
/// notional into the wallet's WSOL account, swaps, and closes the wrapper to
/// recover rent and leftovers.

use crate::constants::SOL_MINT;
use crate::enrich::raydium::{amm_program_id, RaydiumPoolKeys};
use crate::errors::{DataError, MoonbotError, MoonbotResult};
use crate::rpc::parse_pubkey;
use crate::utils::sol_to_lamports;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

/// AMM v4 instruction tag for swap_base_in
const SWAP_BASE_IN_TAG: u8 = 9;

/// Tolerated shortfall on the received amount, matching the loose entry
/// slippage used for fresh pools.
const BUY_SLIPPAGE_PCT: f64 = 51.0;

/// Amounts for one pool buy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolBuyQuote {
    pub amount_in_lamports: u64,
    pub min_amount_out_raw: u64,
}

/// Size a buy against the current pool price (SOL per token)
pub fn quote_buy(
    pool_price_sol: f64,
    token_decimals: u8,
    amount_sol: f64,
) -> MoonbotResult<PoolBuyQuote> {
    if pool_price_sol <= 0.0 {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "pool quote".to_string(),
            detail: "zero pool price".to_string(),
        }));
    }

    let expected_tokens_ui = amount_sol / pool_price_sol;
    let min_tokens_ui = expected_tokens_ui * (1.0 - BUY_SLIPPAGE_PCT / 100.0);
    let min_amount_out_raw = (min_tokens_ui * 10f64.powi(token_decimals as i32)) as u64;

    if min_amount_out_raw == 0 {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "pool quote".to_string(),
            detail: "minimum amount out rounds to zero".to_string(),
        }));
    }

    Ok(PoolBuyQuote {
        amount_in_lamports: sol_to_lamports(amount_sol),
        min_amount_out_raw,
    })
}

impl RaydiumPoolKeys {
    /// The non-SOL side of the pool
    pub fn token_mint(&self) -> Pubkey {
        if self.sol_is_base() {
            self.quote_mint
        } else {
            self.base_mint
        }
    }

    pub fn token_decimals(&self) -> u8 {
        if self.sol_is_base() {
            self.quote_decimals
        } else {
            self.base_decimals
        }
    }
}

/// The swap_base_in instruction: tag byte plus two little-endian u64 amounts
pub fn build_swap_instruction(
    keys: &RaydiumPoolKeys,
    user: &Pubkey,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    quote: &PoolBuyQuote,
) -> Instruction {
    let mut data = Vec::with_capacity(17);
    data.push(SWAP_BASE_IN_TAG);
    data.extend_from_slice(&quote.amount_in_lamports.to_le_bytes());
    data.extend_from_slice(&quote.min_amount_out_raw.to_le_bytes());

    Instruction {
        program_id: amm_program_id(),
        accounts: vec![
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new(keys.id, false),
            AccountMeta::new_readonly(keys.authority, false),
            AccountMeta::new(keys.open_orders, false),
            AccountMeta::new(keys.target_orders, false),
            AccountMeta::new(keys.base_vault, false),
            AccountMeta::new(keys.quote_vault, false),
            AccountMeta::new_readonly(keys.market_program_id, false),
            AccountMeta::new(keys.market_id, false),
            AccountMeta::new(keys.market_bids, false),
            AccountMeta::new(keys.market_asks, false),
            AccountMeta::new(keys.market_event_queue, false),
            AccountMeta::new(keys.market_base_vault, false),
            AccountMeta::new(keys.market_quote_vault, false),
            AccountMeta::new_readonly(keys.market_vault_signer, false),
            AccountMeta::new(*user_source, false),
            AccountMeta::new(*user_destination, false),
            AccountMeta::new(*user, true),
        ],
        data,
    }
}

/// Full signed buy transaction: wrap SOL, swap, unwrap
pub fn build_buy_transaction(
    keys: &RaydiumPoolKeys,
    wallet: &Keypair,
    quote: &PoolBuyQuote,
    blockhash: Hash,
) -> MoonbotResult<VersionedTransaction> {
    let user = wallet.pubkey();
    let wsol_mint = parse_pubkey(SOL_MINT)?;
    let token_mint = keys.token_mint();

    let wsol_ata = get_associated_token_address(&user, &wsol_mint);
    let token_ata = get_associated_token_address(&user, &token_mint);

    let sync_native = spl_token::instruction::sync_native(&spl_token::id(), &wsol_ata)
        .map_err(|e| {
            MoonbotError::Data(DataError::DecodeFailed {
                what: "sync_native".to_string(),
                detail: e.to_string(),
            })
        })?;
    let close_wsol = spl_token::instruction::close_account(
        &spl_token::id(),
        &wsol_ata,
        &user,
        &user,
        &[],
    )
    .map_err(|e| {
        MoonbotError::Data(DataError::DecodeFailed {
            what: "close_account".to_string(),
            detail: e.to_string(),
        })
    })?;

    let instructions = vec![
        create_associated_token_account_idempotent(&user, &user, &wsol_mint, &spl_token::id()),
        create_associated_token_account_idempotent(&user, &user, &token_mint, &spl_token::id()),
        system_instruction::transfer(&user, &wsol_ata, quote.amount_in_lamports),
        sync_native,
        build_swap_instruction(keys, &user, &wsol_ata, &token_ata, quote),
        close_wsol,
    ];

    let message = v0::Message::try_compile(&user, &instructions, &[], blockhash).map_err(|e| {
        MoonbotError::Data(DataError::DecodeFailed {
            what: "swap message".to_string(),
            detail: e.to_string(),
        })
    })?;

    VersionedTransaction::try_new(VersionedMessage::V0(message), &[wallet]).map_err(|e| {
        MoonbotError::Data(DataError::DecodeFailed {
            what: "swap transaction".to_string(),
            detail: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RAYDIUM_AUTHORITY;

    fn pool_keys(sol_is_base: bool) -> RaydiumPoolKeys {
        let sol = parse_pubkey(SOL_MINT).unwrap();
        let token = Pubkey::new_unique();
        RaydiumPoolKeys {
            id: Pubkey::new_unique(),
            authority: parse_pubkey(RAYDIUM_AUTHORITY).unwrap(),
            base_mint: if sol_is_base { sol } else { token },
            quote_mint: if sol_is_base { token } else { sol },
            base_decimals: if sol_is_base { 9 } else { 6 },
            quote_decimals: if sol_is_base { 6 } else { 9 },
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            market_program_id: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
            market_base_vault: Pubkey::new_unique(),
            market_quote_vault: Pubkey::new_unique(),
            market_vault_signer: Pubkey::new_unique(),
        }
    }

    #[test]
    fn quote_applies_min_out_slippage() {
        // 0.03 SOL at 0.00003 SOL/token -> 1000 tokens expected
        let quote = quote_buy(0.00003, 6, 0.03).unwrap();
        assert_eq!(quote.amount_in_lamports, 30_000_000);
        // 49% of the expected amount survives the slippage floor
        assert_eq!(quote.min_amount_out_raw, 490_000_000);
    }

    #[test]
    fn zero_price_is_rejected() {
        assert!(quote_buy(0.0, 6, 0.03).is_err());
    }

    #[test]
    fn token_side_selection_follows_sol_position() {
        let keys = pool_keys(true);
        assert_eq!(keys.token_mint(), keys.quote_mint);
        assert_eq!(keys.token_decimals(), 6);

        let keys = pool_keys(false);
        assert_eq!(keys.token_mint(), keys.base_mint);
        assert_eq!(keys.token_decimals(), 6);
    }

    #[test]
    fn swap_instruction_layout() {
        let keys = pool_keys(true);
        let user = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let quote = PoolBuyQuote {
            amount_in_lamports: 30_000_000,
            min_amount_out_raw: 490_000_000,
        };

        let ix = build_swap_instruction(&keys, &user, &source, &destination, &quote);

        assert_eq!(ix.data[0], SWAP_BASE_IN_TAG);
        assert_eq!(&ix.data[1..9], &quote.amount_in_lamports.to_le_bytes());
        assert_eq!(&ix.data[9..17], &quote.min_amount_out_raw.to_le_bytes());
        assert_eq!(ix.accounts.len(), 18);
        // Owner is the sole signer, vaults are writable
        assert!(ix.accounts[17].is_signer);
        assert!(ix.accounts[5].is_writable);
        assert!(ix.accounts[6].is_writable);
        assert!(!ix.accounts[2].is_writable);
    }

    #[test]
    fn buy_transaction_signs_with_wallet() {
        let wallet = Keypair::new();
        let quote = quote_buy(0.00003, 6, 0.03).unwrap();
        let tx = build_buy_transaction(&pool_keys(true), &wallet, &quote, Hash::default()).unwrap();
        assert_eq!(tx.signatures.len(), 1);
    }
}
