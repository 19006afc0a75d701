/// Canonical swap extraction
///
/// Pure function from a webhook envelope to a `SwapEvent`. `Ok(None)` means
/// the envelope was rejected (not a recognized clean one-sided swap) - this is
/// not an error and nothing is persisted. `Err` means a venue transaction was
/// recognized but a required field could not be resolved.

use crate::constants::{
    JUPITER_PROGRAM_ID, METEORA_PROGRAM_ID, MOONSHOT_PROGRAM_ID, PUMPFUN_PROGRAM_ID,
    RAYDIUM_AMM_PROGRAM_ID, RAYDIUM_AUTHORITY, RAYDIUM_CLMM_PROGRAM_ID, SOL_MINT,
};
use crate::errors::{DataError, EnrichmentError, MoonbotError, MoonbotResult};
use crate::logger::{self, LogTag};
use crate::swap::types::{SwapEvent, SwapSide, TransactionEnvelope, Venue};
use crate::utils::solscan_tx_url;

/// Resolve the venue instruction in priority order. A transaction can touch
/// several known programs (e.g. an aggregator route); only the first match
/// resolves pair/vault addresses.
fn resolve_venue_instruction(
    envelope: &TransactionEnvelope,
) -> Option<(Venue, Vec<String>)> {
    for (venue, program_id) in [
        (Venue::PumpfunBondingCurve, PUMPFUN_PROGRAM_ID),
        (Venue::RaydiumAmm, RAYDIUM_AMM_PROGRAM_ID),
        (Venue::Moonshot, MOONSHOT_PROGRAM_ID),
    ] {
        if let Some((_, accounts)) = envelope.instruction_for_program(program_id) {
            return Some((venue, accounts));
        }
    }
    None
}

/// True when any recognized venue program appears among the touched accounts
fn is_recognized_swap(envelope: &TransactionEnvelope) -> bool {
    [
        RAYDIUM_AMM_PROGRAM_ID,
        RAYDIUM_CLMM_PROGRAM_ID,
        PUMPFUN_PROGRAM_ID,
        MOONSHOT_PROGRAM_ID,
        JUPITER_PROGRAM_ID,
        METEORA_PROGRAM_ID,
    ]
    .iter()
    .any(|id| envelope.touches_program(id))
}

/// Extract a canonical swap event from a webhook envelope
pub fn extract_swap_event(
    envelope: &TransactionEnvelope,
) -> MoonbotResult<Option<SwapEvent>> {
    if !is_recognized_swap(envelope) {
        logger::debug(
            LogTag::Swap,
            &format!(
                "Transaction touches no recognized venue: {}",
                solscan_tx_url(&envelope.signature)
            ),
        );
        return Ok(None);
    }

    let (venue, ix_accounts) = match resolve_venue_instruction(envelope) {
        Some(found) => found,
        None => {
            // A recognized program was touched but none of the venues we can
            // resolve addresses for produced an instruction (pure aggregator
            // or CLMM route).
            return Err(MoonbotError::Enrichment(
                EnrichmentError::NoVenueInstruction {
                    venue: "venue".to_string(),
                    signature: envelope.signature.clone(),
                },
            ));
        }
    };

    // Pair/vault resolution per venue. Raydium transfers settle against the
    // shared AMM authority, not the pool account itself.
    let (pair_address, vault_address, match_vault) = match venue {
        Venue::PumpfunBondingCurve => {
            let curve = account_at(&ix_accounts, 3, &envelope.signature)?;
            (curve.clone(), curve.clone(), curve)
        }
        Venue::RaydiumAmm => {
            let pair = account_at(&ix_accounts, 1, &envelope.signature)?;
            (
                pair,
                RAYDIUM_AUTHORITY.to_string(),
                RAYDIUM_AUTHORITY.to_string(),
            )
        }
        Venue::Moonshot => {
            let vault = account_at(&ix_accounts, 3, &envelope.signature)?;
            (vault.clone(), vault.clone(), vault)
        }
        _ => unreachable!("resolve_venue_instruction only yields buildable venues"),
    };

    let payer = &envelope.fee_payer;

    let mut is_buy = false;
    let mut is_sell = false;
    let mut mint: Option<String> = None;
    let mut token_amount: Option<f64> = None;
    let mut sol_amount: Option<f64> = None;

    for transfer in &envelope.token_transfers {
        let is_sol = transfer.mint == SOL_MINT;
        let is_to_user = transfer.to_user_account == *payer;
        let is_from_user = transfer.from_user_account == *payer;
        let is_to_vault = transfer.to_user_account == match_vault;
        let is_from_vault = transfer.from_user_account == match_vault;

        // The target mint is the non-SOL asset moving between signer and vault
        if !is_sol
            && mint.is_none()
            && ((is_from_user && is_to_vault) || (is_from_vault && is_to_user))
        {
            mint = Some(transfer.mint.clone());
        }

        if token_amount.is_none()
            && !is_sol
            && is_to_user
            && Some(&transfer.mint) == mint.as_ref()
            && is_from_vault
        {
            is_buy = true;
            token_amount = Some(transfer.token_amount);
        } else if sol_amount.is_none() && is_sol && is_to_user && is_from_vault {
            is_sell = true;
            sol_amount = Some(transfer.token_amount);
        } else if sol_amount.is_none() && is_sol && is_from_user && is_to_vault {
            is_buy = true;
            sol_amount = Some(transfer.token_amount);
        } else if token_amount.is_none()
            && !is_sol
            && is_from_user
            && Some(&transfer.mint) == mint.as_ref()
            && is_to_vault
        {
            is_sell = true;
            token_amount = Some(transfer.token_amount);
        }
    }

    // Reject multi-hop swaps touching a third asset - the SOL leg would be
    // split across legs and the derived price wrong.
    if let Some(target) = &mint {
        let other_mint_touched = envelope
            .token_transfers
            .iter()
            .any(|t| t.mint != SOL_MINT && t.mint != *target);
        if other_mint_touched {
            logger::debug(
                LogTag::Swap,
                &format!(
                    "Multi-token swap rejected: {}",
                    solscan_tx_url(&envelope.signature)
                ),
            );
            return Ok(None);
        }
    }

    // Bonding-curve programs settle SOL without an SPL transfer instruction;
    // fall back to the curve account's native balance delta.
    if sol_amount.is_none() && venue == Venue::PumpfunBondingCurve {
        if let Some(change) = envelope.native_balance_change_of(&vault_address) {
            sol_amount = Some(change as f64 / 1e9);
        }
    }

    let (sol_amount, token_amount, mint) = match (sol_amount, token_amount, mint) {
        (Some(s), Some(t), Some(m)) if s != 0.0 && t != 0.0 => (s.abs(), t.abs(), m),
        _ => {
            logger::debug(
                LogTag::Swap,
                &format!(
                    "No clean transfer pattern: {}",
                    solscan_tx_url(&envelope.signature)
                ),
            );
            return Ok(None);
        }
    };

    // Exactly one direction must hold
    if is_buy == is_sell {
        logger::debug(
            LogTag::Swap,
            &format!(
                "Ambiguous swap direction: {}",
                solscan_tx_url(&envelope.signature)
            ),
        );
        return Ok(None);
    }

    let side = if is_buy { SwapSide::Buy } else { SwapSide::Sell };
    let price = sol_amount / token_amount;

    Ok(Some(SwapEvent {
        venue,
        mint,
        buyer: payer.clone(),
        side,
        sol_amount,
        token_amount,
        price,
        pair_address,
        vault_address,
        timestamp_ms: envelope.timestamp * 1000,
        signature: envelope.signature.clone(),
    }))
}

fn account_at(accounts: &[String], index: usize, signature: &str) -> MoonbotResult<String> {
    accounts.get(index).cloned().ok_or_else(|| {
        MoonbotError::Data(DataError::MissingField {
            what: format!("instruction account {}", index),
            signature: signature.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::types::{AccountData, InstructionData, TokenTransfer};

    const MINT: &str = "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const OTHER_MINT: &str = "MintBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
    const BUYER: &str = "BuyerWallet111111111111111111111111111111111";
    const CURVE: &str = "CurveAccount11111111111111111111111111111111";
    const POOL: &str = "PoolAccount111111111111111111111111111111111";

    fn base_envelope(program_id: &str) -> TransactionEnvelope {
        TransactionEnvelope {
            signature: "testsig".to_string(),
            timestamp: 1_700_000_000,
            fee_payer: BUYER.to_string(),
            account_data: vec![AccountData {
                account: program_id.to_string(),
                native_balance_change: 0,
            }],
            ..Default::default()
        }
    }

    fn pumpfun_buy_envelope() -> TransactionEnvelope {
        let mut envelope = base_envelope(PUMPFUN_PROGRAM_ID);
        envelope.instructions = vec![InstructionData {
            program_id: PUMPFUN_PROGRAM_ID.to_string(),
            accounts: vec![
                "Global".to_string(),
                "FeeRecipient".to_string(),
                MINT.to_string(),
                CURVE.to_string(),
                "CurveAta".to_string(),
                "UserAta".to_string(),
                BUYER.to_string(),
            ],
            ..Default::default()
        }];
        // Token leaves the curve; SOL settles through the curve's native
        // balance, not an SPL transfer.
        envelope.token_transfers = vec![TokenTransfer {
            from_user_account: CURVE.to_string(),
            to_user_account: BUYER.to_string(),
            mint: MINT.to_string(),
            token_amount: 50_000.0,
        }];
        envelope.account_data.push(AccountData {
            account: CURVE.to_string(),
            native_balance_change: 2_000_000_000,
        });
        envelope
    }

    fn raydium_buy_envelope() -> TransactionEnvelope {
        let mut envelope = base_envelope(RAYDIUM_AMM_PROGRAM_ID);
        envelope.instructions = vec![InstructionData {
            program_id: RAYDIUM_AMM_PROGRAM_ID.to_string(),
            accounts: vec!["TokenProgram".to_string(), POOL.to_string()],
            ..Default::default()
        }];
        envelope.token_transfers = vec![
            TokenTransfer {
                from_user_account: BUYER.to_string(),
                to_user_account: RAYDIUM_AUTHORITY.to_string(),
                mint: SOL_MINT.to_string(),
                token_amount: 1.5,
            },
            TokenTransfer {
                from_user_account: RAYDIUM_AUTHORITY.to_string(),
                to_user_account: BUYER.to_string(),
                mint: MINT.to_string(),
                token_amount: 30_000.0,
            },
        ];
        envelope
    }

    fn raydium_sell_envelope() -> TransactionEnvelope {
        let mut envelope = raydium_buy_envelope();
        envelope.token_transfers = vec![
            TokenTransfer {
                from_user_account: BUYER.to_string(),
                to_user_account: RAYDIUM_AUTHORITY.to_string(),
                mint: MINT.to_string(),
                token_amount: 30_000.0,
            },
            TokenTransfer {
                from_user_account: RAYDIUM_AUTHORITY.to_string(),
                to_user_account: BUYER.to_string(),
                mint: SOL_MINT.to_string(),
                token_amount: 1.2,
            },
        ];
        envelope
    }

    #[test]
    fn pumpfun_buy_uses_curve_balance_fallback() {
        let event = extract_swap_event(&pumpfun_buy_envelope())
            .unwrap()
            .expect("event");

        assert_eq!(event.venue, Venue::PumpfunBondingCurve);
        assert_eq!(event.side, SwapSide::Buy);
        assert_eq!(event.mint, MINT);
        assert_eq!(event.buyer, BUYER);
        assert_eq!(event.pair_address, CURVE);
        assert_eq!(event.sol_amount, 2.0);
        assert_eq!(event.price, event.sol_amount / event.token_amount);
    }

    #[test]
    fn raydium_buy_resolves_pool_and_price() {
        let event = extract_swap_event(&raydium_buy_envelope())
            .unwrap()
            .expect("event");

        assert_eq!(event.venue, Venue::RaydiumAmm);
        assert_eq!(event.side, SwapSide::Buy);
        assert_eq!(event.pair_address, POOL);
        assert_eq!(event.vault_address, RAYDIUM_AUTHORITY);
        assert_eq!(event.sol_amount, 1.5);
        assert_eq!(event.token_amount, 30_000.0);
        assert!((event.price - 1.5 / 30_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_is_classified_not_dropped() {
        let event = extract_swap_event(&raydium_sell_envelope())
            .unwrap()
            .expect("event");
        assert_eq!(event.side, SwapSide::Sell);
        assert!((event.price - 1.2 / 30_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrecognized_program_is_rejected() {
        let envelope = base_envelope("SomeRandomProgram1111111111111111111111111");
        assert!(extract_swap_event(&envelope).unwrap().is_none());
    }

    #[test]
    fn multi_token_swap_is_rejected() {
        let mut envelope = raydium_buy_envelope();
        envelope.token_transfers.push(TokenTransfer {
            from_user_account: RAYDIUM_AUTHORITY.to_string(),
            to_user_account: BUYER.to_string(),
            mint: OTHER_MINT.to_string(),
            token_amount: 10.0,
        });
        assert!(extract_swap_event(&envelope).unwrap().is_none());
    }

    #[test]
    fn plain_wallet_transfer_is_rejected() {
        let mut envelope = base_envelope(RAYDIUM_AMM_PROGRAM_ID);
        envelope.instructions = vec![InstructionData {
            program_id: RAYDIUM_AMM_PROGRAM_ID.to_string(),
            accounts: vec!["TokenProgram".to_string(), POOL.to_string()],
            ..Default::default()
        }];
        // Token moves wallet-to-wallet, never against the venue vault
        envelope.token_transfers = vec![TokenTransfer {
            from_user_account: BUYER.to_string(),
            to_user_account: "SomeOtherWallet11111111111111111111111111111".to_string(),
            mint: MINT.to_string(),
            token_amount: 100.0,
        }];
        assert!(extract_swap_event(&envelope).unwrap().is_none());
    }

    #[test]
    fn recognized_gate_without_buildable_instruction_errors() {
        // Jupiter route with no pumpfun/raydium/moonshot instruction
        let envelope = base_envelope(JUPITER_PROGRAM_ID);
        assert!(extract_swap_event(&envelope).is_err());
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let mut envelope = raydium_buy_envelope();
        envelope.token_transfers[0].token_amount = 0.0;
        assert!(extract_swap_event(&envelope).unwrap().is_none());
    }
}
