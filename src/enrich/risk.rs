/// On-chain risk metrics for a mint
///
/// Computed fresh from current chain state on every event - two
/// near-simultaneous events may see slightly different snapshots, which is
/// accepted.

use crate::errors::{EnrichmentError, MoonbotError, MoonbotResult};
use crate::logger::{self, LogTag};
use crate::rpc::{parse_pubkey, RpcManager};
use crate::utils::safe_truncate;
use solana_sdk::pubkey::Pubkey;

/// Point-in-time risk view of a token
#[derive(Debug, Clone)]
pub struct TokenRiskSnapshot {
    /// Supply share of the five largest non-LP holders, in percent
    pub top_five_holders_pct: f64,
    /// Supply share sitting in the venue's liquidity account, in percent
    pub lp_pct: f64,
    pub is_renounced: bool,
    /// Fully-diluted value in SOL: price x total UI supply
    pub fdv_sol: f64,
    pub supply_ui: f64,
}

/// SPL mint layout: the mint authority COption tag sits at offset 0
fn mint_is_renounced(mint_data: &[u8]) -> MoonbotResult<bool> {
    if mint_data.len() < 82 {
        return Err(MoonbotError::Enrichment(
            EnrichmentError::MintDataUnavailable {
                mint: String::new(),
                detail: format!("mint account too short: {} bytes", mint_data.len()),
            },
        ));
    }
    let tag = u32::from_le_bytes([mint_data[0], mint_data[1], mint_data[2], mint_data[3]]);
    Ok(tag == 0)
}

/// SPL token account layout: owner pubkey at bytes 32..64
fn token_account_owner(data: &[u8]) -> Option<Pubkey> {
    if data.len() < 64 {
        return None;
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&data[32..64]);
    Some(Pubkey::new_from_array(bytes))
}

/// Compute the holder-concentration snapshot for a mint.
///
/// Walks the six largest holder accounts; the one owned by the venue vault is
/// the liquidity holding and is excluded from the concentration sum, leaving
/// the top five real holders.
pub async fn compute_risk_snapshot(
    rpc: &RpcManager,
    mint: &str,
    vault_owner: &str,
    price_sol: f64,
) -> MoonbotResult<TokenRiskSnapshot> {
    let mint_pubkey = parse_pubkey(mint)?;

    let mint_data = rpc.get_account_data(&mint_pubkey).await.map_err(|e| {
        MoonbotError::Enrichment(EnrichmentError::MintDataUnavailable {
            mint: mint.to_string(),
            detail: e.to_string(),
        })
    })?;
    let is_renounced = mint_is_renounced(&mint_data)?;

    let (supply_ui, largest) = futures::try_join!(
        rpc.get_token_supply_ui(&mint_pubkey),
        rpc.get_token_largest_accounts(&mint_pubkey),
    )?;

    if supply_ui == 0.0 {
        return Err(MoonbotError::Enrichment(
            EnrichmentError::MintDataUnavailable {
                mint: mint.to_string(),
                detail: "zero supply".to_string(),
            },
        ));
    }

    let top_six: Vec<_> = largest.into_iter().take(6).collect();
    let addresses: MoonbotResult<Vec<Pubkey>> =
        top_six.iter().map(|h| parse_pubkey(&h.address)).collect();
    let addresses = addresses?;

    let accounts = rpc.get_multiple_accounts(&addresses).await?;
    let vault = parse_pubkey(vault_owner)?;

    let mut lp_supply = 0.0f64;
    let mut top_holders_sum = 0.0f64;

    for (holder, account) in top_six.iter().zip(accounts.iter()) {
        let ui_amount = holder.amount.ui_amount.unwrap_or(0.0);
        let owner = account.as_ref().and_then(|a| token_account_owner(&a.data));

        if owner == Some(vault) {
            lp_supply = ui_amount;
        } else {
            top_holders_sum += ui_amount;
        }
    }

    let top_five_holders_pct = top_holders_sum * 100.0 / supply_ui;
    let lp_pct = lp_supply * 100.0 / supply_ui;
    let fdv_sol = price_sol * supply_ui;

    logger::debug(
        LogTag::Enrich,
        &format!(
            "Risk snapshot {}: top5 {:.1}%, lp {:.1}%, renounced {}, fdv {:.1} SOL",
            safe_truncate(mint, 8),
            top_five_holders_pct,
            lp_pct,
            is_renounced,
            fdv_sol
        ),
    );

    Ok(TokenRiskSnapshot {
        top_five_holders_pct,
        lp_pct,
        is_renounced,
        fdv_sol,
        supply_ui,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renounced_mint_has_no_authority_tag() {
        // COption tag 0 = no authority
        let mut data = vec![0u8; 82];
        assert!(mint_is_renounced(&data).unwrap());

        data[0] = 1;
        assert!(!mint_is_renounced(&data).unwrap());
    }

    #[test]
    fn token_account_owner_is_read_from_layout() {
        let owner = Pubkey::new_unique();
        let mut data = vec![0u8; 165];
        data[32..64].copy_from_slice(owner.as_ref());
        assert_eq!(token_account_owner(&data), Some(owner));
        assert_eq!(token_account_owner(&[0u8; 10]), None);
    }
}
