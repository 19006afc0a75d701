/// Pump.fun buy transaction construction
///
/// Builds the curve `buy` instruction from a fresh reserve quote. The
/// max-cost argument carries the price-escalation tolerance so the buy still
/// lands if the curve moves between quote and inclusion.

use crate::constants::{
    BUY_PRICE_ESCALATION, PUMPFUN_EVENT_AUTHORITY, PUMPFUN_FEE_RECIPIENT, PUMPFUN_PROGRAM_ID,
};
use crate::enrich::pumpfun::BondingCurveState;
use crate::enrich::PumpfunKeys;
use crate::errors::{DataError, MoonbotError, MoonbotResult};
use crate::rpc::parse_pubkey;
use crate::utils::sol_to_lamports;
use borsh::BorshSerialize;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::sysvar;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

/// Anchor discriminator for the curve `buy` instruction
pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];

/// Priority fee attached to curve buys
const PRIORITY_FEE_MICRO_LAMPORTS: u64 = 150_000;

#[derive(BorshSerialize)]
struct BuyArgs {
    amount: u64,
    max_sol_cost: u64,
}

/// Amounts for one curve buy, derived from the quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuyQuote {
    /// Raw token amount expected for the notional
    pub token_amount_raw: u64,
    /// Lamport ceiling the buyer will pay, escalation included
    pub max_sol_cost_lamports: u64,
}

/// Size a buy against the current curve price
pub fn quote_buy(
    curve: &BondingCurveState,
    token_decimals: u8,
    amount_sol: f64,
) -> MoonbotResult<BuyQuote> {
    let price = curve.price_sol(token_decimals);
    if price <= 0.0 {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "curve quote".to_string(),
            detail: "zero virtual price".to_string(),
        }));
    }

    let token_amount_ui = amount_sol / price;
    let token_amount_raw = (token_amount_ui * 10f64.powi(token_decimals as i32)) as u64;
    let max_sol_cost_lamports = sol_to_lamports(amount_sol * BUY_PRICE_ESCALATION);

    Ok(BuyQuote {
        token_amount_raw,
        max_sol_cost_lamports,
    })
}

/// The curve `buy` instruction with the canonical account list
pub fn build_buy_instruction(
    keys: &PumpfunKeys,
    mint: &Pubkey,
    user: &Pubkey,
    quote: &BuyQuote,
) -> MoonbotResult<Instruction> {
    let program_id = parse_pubkey(PUMPFUN_PROGRAM_ID)?;
    let fee_recipient = parse_pubkey(PUMPFUN_FEE_RECIPIENT)?;
    let event_authority = parse_pubkey(PUMPFUN_EVENT_AUTHORITY)?;
    let user_ata = get_associated_token_address(user, mint);

    let args = BuyArgs {
        amount: quote.token_amount_raw,
        max_sol_cost: quote.max_sol_cost_lamports,
    };

    let mut data = Vec::with_capacity(8 + 16);
    data.extend_from_slice(&BUY_DISCRIMINATOR);
    data.extend(
        borsh::to_vec(&args).map_err(|e| {
            MoonbotError::Data(DataError::DecodeFailed {
                what: "buy args".to_string(),
                detail: e.to_string(),
            })
        })?,
    );

    Ok(Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new_readonly(keys.global_state, false),
            AccountMeta::new(fee_recipient, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(keys.bonding_curve, false),
            AccountMeta::new(keys.bonding_curve_ata, false),
            AccountMeta::new(user_ata, false),
            AccountMeta::new(*user, true),
            AccountMeta::new_readonly(solana_sdk::system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(event_authority, false),
            AccountMeta::new_readonly(program_id, false),
        ],
        data,
    })
}

/// Full signed buy transaction: ATA creation, curve buy, priority fee
pub fn build_buy_transaction(
    keys: &PumpfunKeys,
    mint: &Pubkey,
    wallet: &Keypair,
    quote: &BuyQuote,
    blockhash: Hash,
) -> MoonbotResult<VersionedTransaction> {
    let user = wallet.pubkey();

    let instructions = vec![
        create_associated_token_account_idempotent(&user, &user, mint, &spl_token::id()),
        build_buy_instruction(keys, mint, &user, quote)?,
        ComputeBudgetInstruction::set_compute_unit_price(PRIORITY_FEE_MICRO_LAMPORTS),
    ];

    let message = v0::Message::try_compile(&user, &instructions, &[], blockhash).map_err(|e| {
        MoonbotError::Data(DataError::DecodeFailed {
            what: "buy message".to_string(),
            detail: e.to_string(),
        })
    })?;

    VersionedTransaction::try_new(VersionedMessage::V0(message), &[wallet]).map_err(|e| {
        MoonbotError::Data(DataError::DecodeFailed {
            what: "buy transaction".to_string(),
            detail: e.to_string(),
        })
    })
}
