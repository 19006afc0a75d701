/// Pump.fun bonding curve account decoding and price quoting

use crate::errors::{DataError, MoonbotError, MoonbotResult};
use crate::rpc::RpcManager;
use solana_sdk::pubkey::Pubkey;

/// Accounts needed to build a curve buy, lifted from the observed swap
/// instruction.
#[derive(Debug, Clone)]
pub struct PumpfunKeys {
    pub global_state: Pubkey,
    pub bonding_curve: Pubkey,
    pub bonding_curve_ata: Pubkey,
}

/// Bonding curve state: 8-byte anchor discriminator, then five u64 reserve
/// fields and a completion flag.
#[derive(Debug, Clone)]
pub struct BondingCurveState {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
}

const CURVE_DATA_LEN: usize = 8 + 5 * 8 + 1;

pub fn decode_bonding_curve(data: &[u8]) -> MoonbotResult<BondingCurveState> {
    if data.len() < CURVE_DATA_LEN {
        return Err(MoonbotError::Data(DataError::DecodeFailed {
            what: "bonding curve account".to_string(),
            detail: format!("data too short: {} bytes", data.len()),
        }));
    }

    let read_u64 = |offset: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[offset..offset + 8]);
        u64::from_le_bytes(bytes)
    };

    Ok(BondingCurveState {
        virtual_token_reserves: read_u64(8),
        virtual_sol_reserves: read_u64(16),
        real_token_reserves: read_u64(24),
        real_sol_reserves: read_u64(32),
        token_total_supply: read_u64(40),
        complete: data[48] != 0,
    })
}

impl BondingCurveState {
    /// Spot price in SOL per UI token from the virtual reserves
    pub fn price_sol(&self, token_decimals: u8) -> f64 {
        let token_reserve = self.virtual_token_reserves as f64 / 10f64.powi(token_decimals as i32);
        let sol_reserve = self.virtual_sol_reserves as f64 / 1e9;
        if token_reserve == 0.0 {
            return 0.0;
        }
        sol_reserve / token_reserve
    }
}

/// Fetch the current curve state for a quote
pub async fn fetch_curve_state(
    rpc: &RpcManager,
    bonding_curve: &Pubkey,
) -> MoonbotResult<BondingCurveState> {
    let data = rpc.get_account_data(bonding_curve).await?;
    decode_bonding_curve(&data)
}
