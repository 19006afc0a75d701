//! Venue classification enrichment
//!
//! Takes a canonical swap event plus its source envelope and resolves
//! everything the engine and purchase pipeline need: venue-specific
//! instruction-building keys, a fresh risk snapshot, and token metadata.
//! Any unresolved required field is terminal for the event - it is logged
//! and dropped, never retried (a webhook redelivery reprocesses from
//! scratch).

pub mod pumpfun;
pub mod raydium;
pub mod risk;

use crate::constants::PUMPFUN_PROGRAM_ID;
use crate::errors::{EnrichmentError, MoonbotError, MoonbotResult};
use crate::logger::{self, LogTag};
use crate::rpc::{parse_pubkey, AssetMetadata, RpcManager};
use crate::swap::types::{SwapEvent, TransactionEnvelope, Venue};
use crate::utils::{lamports_to_sol, safe_truncate};
use solana_sdk::pubkey::Pubkey;

pub use pumpfun::PumpfunKeys;
pub use raydium::RaydiumPoolKeys;
pub use risk::TokenRiskSnapshot;

/// Venue-specific transaction-building keys
#[derive(Debug, Clone)]
pub enum VenueKeys {
    Raydium(RaydiumPoolKeys),
    Pumpfun(PumpfunKeys),
    Moonshot {
        vault: Pubkey,
        liquidity_sol: f64,
    },
}

/// A swap event with everything resolved for decisions and purchases
#[derive(Debug, Clone)]
pub struct EnrichedEvent {
    pub event: SwapEvent,
    pub keys: VenueKeys,
    pub risk: TokenRiskSnapshot,
    pub metadata: AssetMetadata,
}

/// Resolve venue keys, risk metrics and metadata for an extracted event
pub async fn enrich_event(
    rpc: &RpcManager,
    envelope: &TransactionEnvelope,
    event: &SwapEvent,
) -> MoonbotResult<EnrichedEvent> {
    let keys = resolve_venue_keys(rpc, envelope, event).await?;

    if event.price == 0.0 {
        return Err(MoonbotError::Enrichment(EnrichmentError::PriceUnavailable {
            signature: event.signature.clone(),
        }));
    }

    // Risk metrics and metadata are independent lookups - fan out
    let (risk, metadata) = futures::try_join!(
        risk::compute_risk_snapshot(rpc, &event.mint, &event.vault_address, event.price),
        rpc.get_asset_metadata(&event.mint),
    )?;

    logger::info(
        LogTag::Enrich,
        &format!(
            "Enriched {} swap of {} ({}): {:.4} SOL at {:.9}",
            event.venue,
            safe_truncate(&event.mint, 8),
            metadata.symbol,
            event.sol_amount,
            event.price
        ),
    );

    Ok(EnrichedEvent {
        event: event.clone(),
        keys,
        risk,
        metadata,
    })
}

async fn resolve_venue_keys(
    rpc: &RpcManager,
    envelope: &TransactionEnvelope,
    event: &SwapEvent,
) -> MoonbotResult<VenueKeys> {
    match event.venue {
        Venue::PumpfunBondingCurve => {
            let (_, accounts) = envelope
                .instruction_for_program(PUMPFUN_PROGRAM_ID)
                .ok_or_else(|| {
                    MoonbotError::Enrichment(EnrichmentError::NoVenueInstruction {
                        venue: "Pumpfun".to_string(),
                        signature: event.signature.clone(),
                    })
                })?;

            if accounts.len() < 5 {
                return Err(MoonbotError::Enrichment(
                    EnrichmentError::NoVenueInstruction {
                        venue: "Pumpfun".to_string(),
                        signature: event.signature.clone(),
                    },
                ));
            }

            Ok(VenueKeys::Pumpfun(PumpfunKeys {
                global_state: parse_pubkey(&accounts[0])?,
                bonding_curve: parse_pubkey(&accounts[3])?,
                bonding_curve_ata: parse_pubkey(&accounts[4])?,
            }))
        }
        Venue::RaydiumAmm => {
            let keys = raydium::fetch_pool_keys(rpc, &event.pair_address).await?;
            Ok(VenueKeys::Raydium(keys))
        }
        Venue::Moonshot => {
            let vault = parse_pubkey(&event.vault_address)?;
            let liquidity_sol = lamports_to_sol(rpc.get_balance(&vault).await?);
            Ok(VenueKeys::Moonshot {
                vault,
                liquidity_sol,
            })
        }
        other => Err(MoonbotError::Enrichment(
            EnrichmentError::NoVenueInstruction {
                venue: other.as_source_str().to_string(),
                signature: event.signature.clone(),
            },
        )),
    }
}
