/// Webhook envelope and canonical swap event types

use crate::constants::{
    JUPITER_PROGRAM_ID, METEORA_PROGRAM_ID, MOONSHOT_PROGRAM_ID, PUMPFUN_PROGRAM_ID,
    RAYDIUM_AMM_PROGRAM_ID, RAYDIUM_CLMM_PROGRAM_ID,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// WEBHOOK ENVELOPE (enhanced-transaction format pushed by the RPC provider)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionEnvelope {
    pub signature: String,
    /// Unix seconds
    pub timestamp: i64,
    pub fee_payer: String,
    pub account_data: Vec<AccountData>,
    pub token_transfers: Vec<TokenTransfer>,
    pub native_transfers: Vec<NativeTransfer>,
    pub instructions: Vec<InstructionData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountData {
    pub account: String,
    pub native_balance_change: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub mint: String,
    /// UI amount of the transferred token
    pub token_amount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    /// Lamports
    pub amount: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstructionData {
    pub program_id: String,
    pub accounts: Vec<String>,
    pub data: String,
    pub inner_instructions: Vec<InnerInstructionData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InnerInstructionData {
    pub program_id: String,
    pub accounts: Vec<String>,
    pub data: String,
}

impl TransactionEnvelope {
    /// All program/account addresses the transaction touched
    pub fn touches_program(&self, program_id: &str) -> bool {
        self.account_data.iter().any(|d| d.account == program_id)
    }

    /// Find the first instruction for `program_id`, checking top-level
    /// instructions before inner ones.
    pub fn instruction_for_program(&self, program_id: &str) -> Option<(String, Vec<String>)> {
        if let Some(ix) = self.instructions.iter().find(|ix| ix.program_id == program_id) {
            return Some((ix.program_id.clone(), ix.accounts.clone()));
        }

        for ix in &self.instructions {
            if let Some(inner) = ix
                .inner_instructions
                .iter()
                .find(|inner| inner.program_id == program_id)
            {
                return Some((inner.program_id.clone(), inner.accounts.clone()));
            }
        }

        None
    }

    pub fn native_balance_change_of(&self, account: &str) -> Option<i64> {
        self.account_data
            .iter()
            .find(|d| d.account == account && d.native_balance_change != 0)
            .map(|d| d.native_balance_change)
    }
}

// =============================================================================
// CANONICAL SWAP EVENT
// =============================================================================

/// Trading venue a transaction originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    RaydiumAmm,
    RaydiumClmm,
    PumpfunBondingCurve,
    Moonshot,
    Jupiter,
    Meteora,
    Unknown,
}

impl Venue {
    pub fn program_id(&self) -> &'static str {
        match self {
            Venue::RaydiumAmm => RAYDIUM_AMM_PROGRAM_ID,
            Venue::RaydiumClmm => RAYDIUM_CLMM_PROGRAM_ID,
            Venue::PumpfunBondingCurve => PUMPFUN_PROGRAM_ID,
            Venue::Moonshot => MOONSHOT_PROGRAM_ID,
            Venue::Jupiter => JUPITER_PROGRAM_ID,
            Venue::Meteora => METEORA_PROGRAM_ID,
            Venue::Unknown => "",
        }
    }

    /// Short source name used in persistence rows and messages
    pub fn as_source_str(&self) -> &'static str {
        match self {
            Venue::RaydiumAmm => "Raydium",
            Venue::RaydiumClmm => "RaydiumClmm",
            Venue::PumpfunBondingCurve => "Pumpfun",
            Venue::Moonshot => "Moonshot",
            Venue::Jupiter => "Jupiter",
            Venue::Meteora => "Meteora",
            Venue::Unknown => "Unknown",
        }
    }

    /// Public trading page for the venue/token pair
    pub fn token_page_url(&self, mint: &str) -> String {
        match self {
            Venue::PumpfunBondingCurve => format!("https://pump.fun/{}", mint),
            _ => format!("https://dexscreener.com/solana/{}", mint),
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_source_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapSide {
    Buy,
    Sell,
}

/// One venue-agnostic swap, normalized from a webhook envelope.
/// `price` is always `sol_amount / token_amount`.
#[derive(Debug, Clone)]
pub struct SwapEvent {
    pub venue: Venue,
    pub mint: String,
    pub buyer: String,
    pub side: SwapSide,
    pub sol_amount: f64,
    pub token_amount: f64,
    pub price: f64,
    pub pair_address: String,
    pub vault_address: String,
    /// Unix milliseconds
    pub timestamp_ms: i64,
    pub signature: String,
}
