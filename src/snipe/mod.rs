//! Purchase submission pipeline
//!
//! Given an enriched event and the managed sniper wallets: verify each
//! wallet's eligibility, build one venue-specific buy per wallet, submit the
//! set as tip-prefixed bundles, then poll each wallet's token balance while
//! re-broadcasting until the buy lands or the validity window expires. An
//! expired window restarts the whole per-wallet flow with a fresh quote, up
//! to a fixed attempt ceiling. Nothing here propagates errors to the engine;
//! failures are logged for manual follow-up.

pub mod jito;
pub mod pumpfun;
pub mod raydium;

use crate::config::Configs;
use crate::constants::{
    MAX_SNIPE_ATTEMPTS, SNIPE_CONFIRM_TIMEOUT_MS, SNIPE_POLL_INTERVAL_MS, WALLET_MIN_BALANCE_SOL,
};
use crate::engine::guards::{purchase_key, GuardRegistry, GuardToken};
use crate::engine::Sniper;
use crate::enrich::{pumpfun as curve_data, raydium as pool_data, EnrichedEvent, VenueKeys};
use crate::errors::MoonbotResult;
use crate::logger::{self, LogTag};
use crate::rpc::{parse_pubkey, SharedRpc};
use crate::swap::types::Venue;
use crate::tasks::TaskPool;
use crate::utils::{lamports_to_sol, safe_truncate};
use crate::wallets::SniperWallet;
use async_trait::async_trait;
use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Why a wallet was included in or excluded from a purchase round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEligibility {
    Eligible,
    BalanceTooLow,
    AlreadyHolding,
}

/// Pure eligibility decision over a wallet's fetched balances. A wallet that
/// already holds any amount of the target asset never buys again.
pub fn classify_wallet(balance_sol: f64, token_balance_ui: f64) -> WalletEligibility {
    if token_balance_ui > 0.0 {
        WalletEligibility::AlreadyHolding
    } else if balance_sol < WALLET_MIN_BALANCE_SOL {
        WalletEligibility::BalanceTooLow
    } else {
        WalletEligibility::Eligible
    }
}

/// Keep only wallets that pass the eligibility checks
pub fn filter_eligible(states: Vec<(SniperWallet, f64, f64)>) -> Vec<SniperWallet> {
    states
        .into_iter()
        .filter_map(|(wallet, balance_sol, token_balance)| {
            match classify_wallet(balance_sol, token_balance) {
                WalletEligibility::Eligible => Some(wallet),
                WalletEligibility::AlreadyHolding => {
                    logger::info(
                        LogTag::Snipe,
                        &format!("{} already has balance, skipping", wallet.label),
                    );
                    None
                }
                WalletEligibility::BalanceTooLow => {
                    logger::warning(
                        LogTag::Snipe,
                        &format!("{} balance is too low, skipping", wallet.label),
                    );
                    None
                }
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct SnipeSettings {
    pub buy_amount_sol: f64,
    pub jito_tip_sol: f64,
    pub block_engine_url: String,
}

impl SnipeSettings {
    pub fn from_config(config: &Configs) -> Self {
        Self {
            buy_amount_sol: config.buy_amount_sol,
            jito_tip_sol: config.jito_tip_sol,
            block_engine_url: config.jito_block_engine_url.clone(),
        }
    }
}

pub struct SnipePipeline {
    rpc: SharedRpc,
    purchase_guards: Arc<GuardRegistry>,
    pool: Arc<TaskPool>,
    http: reqwest::Client,
    tip_payer: Option<Arc<Keypair>>,
    settings: SnipeSettings,
}

impl SnipePipeline {
    pub fn new(
        rpc: SharedRpc,
        purchase_guards: Arc<GuardRegistry>,
        pool: Arc<TaskPool>,
        tip_payer: Option<Keypair>,
        settings: SnipeSettings,
    ) -> Self {
        if tip_payer.is_none() {
            logger::warning(
                LogTag::Snipe,
                "No bundle tip payer configured - falling back to direct broadcasts",
            );
        }
        Self {
            rpc,
            purchase_guards,
            pool,
            http: reqwest::Client::new(),
            tip_payer: tip_payer.map(Arc::new),
            settings,
        }
    }

    /// Fetch balances and keep the wallets that may buy
    async fn eligible_wallets(
        &self,
        mint: &Pubkey,
        wallets: Vec<SniperWallet>,
    ) -> Vec<SniperWallet> {
        let checks = join_all(wallets.iter().map(|wallet| {
            let rpc = Arc::clone(&self.rpc);
            let pubkey = wallet.pubkey();
            let mint = *mint;
            async move {
                let balance = rpc.get_balance(&pubkey).await;
                let token_balance = rpc.get_wallet_token_balance(&pubkey, &mint).await;
                (balance, token_balance)
            }
        }))
        .await;

        let mut states = Vec::with_capacity(wallets.len());
        for (wallet, (balance, token_balance)) in wallets.into_iter().zip(checks) {
            match (balance, token_balance) {
                (Ok(lamports), Ok(token_balance)) => {
                    states.push((wallet, lamports_to_sol(lamports), token_balance));
                }
                (balance, token_balance) => {
                    let error = balance
                        .err()
                        .or(token_balance.err())
                        .map(|e| e.to_string())
                        .unwrap_or_default();
                    logger::warning(
                        LogTag::Snipe,
                        &format!("Balance check failed for {}: {}", wallet.label, error),
                    );
                }
            }
        }

        filter_eligible(states)
    }

    /// One build/bundle/confirm round for the given wallets. Returns which
    /// wallets were confirmed holding the token.
    async fn attempt_round(
        &self,
        event: &EnrichedEvent,
        mint: &Pubkey,
        wallets: &[(SniperWallet, GuardToken)],
    ) -> Vec<bool> {
        let (blockhash, last_valid_height) =
            match self.rpc.get_latest_blockhash_with_validity().await {
                Ok(result) => result,
                Err(e) => {
                    logger::error(LogTag::Snipe, &format!("No blockhash for round: {}", e));
                    return vec![false; wallets.len()];
                }
            };

        let transactions = match self.build_transactions(event, wallets, blockhash).await {
            Ok(transactions) => transactions,
            Err(e) => {
                logger::error(
                    LogTag::Snipe,
                    &format!(
                        "Building buys for {} failed: {}",
                        safe_truncate(&event.event.mint, 8),
                        e
                    ),
                );
                return vec![false; wallets.len()];
            }
        };

        self.submit_bundles(&transactions);

        // Confirm all wallets concurrently while re-broadcasting
        join_all(
            wallets
                .iter()
                .zip(transactions.into_iter())
                .map(|((wallet, _), tx)| self.confirm_wallet(mint, wallet, tx, last_valid_height)),
        )
        .await
    }

    /// Build one signed buy per wallet from a fresh venue quote
    async fn build_transactions(
        &self,
        event: &EnrichedEvent,
        wallets: &[(SniperWallet, GuardToken)],
        blockhash: solana_sdk::hash::Hash,
    ) -> MoonbotResult<Vec<VersionedTransaction>> {
        let amount_sol = self.settings.buy_amount_sol;
        let mint = parse_pubkey(&event.event.mint)?;

        match &event.keys {
            VenueKeys::Pumpfun(keys) => {
                let curve = curve_data::fetch_curve_state(&self.rpc, &keys.bonding_curve).await?;
                let quote = pumpfun::quote_buy(&curve, event.metadata.decimals, amount_sol)?;
                wallets
                    .iter()
                    .map(|(wallet, _)| {
                        pumpfun::build_buy_transaction(
                            keys,
                            &mint,
                            &wallet.keypair,
                            &quote,
                            blockhash,
                        )
                    })
                    .collect()
            }
            VenueKeys::Raydium(keys) => {
                let price = pool_data::fetch_pool_price(&self.rpc, keys).await?;
                let quote = raydium::quote_buy(price, keys.token_decimals(), amount_sol)?;
                wallets
                    .iter()
                    .map(|(wallet, _)| {
                        raydium::build_buy_transaction(keys, &wallet.keypair, &quote, blockhash)
                    })
                    .collect()
            }
            VenueKeys::Moonshot { .. } => unreachable!("moonshot events never reach the builder"),
        }
    }

    /// Bundle submission is fire-and-forget relative to the purchase flow
    fn submit_bundles(&self, transactions: &[VersionedTransaction]) {
        let Some(payer) = self.tip_payer.as_ref() else {
            return;
        };

        let serialized: Vec<Vec<u8>> = transactions
            .iter()
            .filter_map(|tx| match bincode::serialize(tx) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    logger::error(
                        LogTag::Snipe,
                        &format!("Transaction serialization failed: {}", e),
                    );
                    None
                }
            })
            .collect();

        if serialized.is_empty() {
            return;
        }

        let rpc = Arc::clone(&self.rpc);
        let http = self.http.clone();
        let url = self.settings.block_engine_url.clone();
        let payer = Arc::clone(payer);
        let tip_sol = self.settings.jito_tip_sol;

        self.pool.spawn(async move {
            jito::send_bundles(&rpc, &http, &url, &payer, tip_sol, &serialized).await;
        });
    }

    /// Poll the wallet's token balance until the buy lands, the wall-clock
    /// window closes, or the transaction's validity window expires. The
    /// already-built transaction is re-broadcast on every pass.
    async fn confirm_wallet(
        &self,
        mint: &Pubkey,
        wallet: &SniperWallet,
        tx: VersionedTransaction,
        last_valid_height: u64,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_millis(SNIPE_CONFIRM_TIMEOUT_MS);

        loop {
            if let Ok(balance) = self.rpc.get_wallet_token_balance(&wallet.pubkey(), mint).await {
                if balance > 0.0 {
                    logger::info(
                        LogTag::Snipe,
                        &format!(
                            "Bought {} for {}",
                            safe_truncate(&mint.to_string(), 8),
                            wallet.label
                        ),
                    );
                    return true;
                }
            }

            self.rpc.broadcast_everywhere(&tx).await;

            if Instant::now() >= deadline {
                logger::warning(
                    LogTag::Snipe,
                    &format!("Confirmation window closed for {}", wallet.label),
                );
                return false;
            }

            tokio::time::sleep(Duration::from_millis(SNIPE_POLL_INTERVAL_MS)).await;

            match self.rpc.get_block_height().await {
                Ok(height) if height > last_valid_height => {
                    logger::warning(
                        LogTag::Snipe,
                        &format!(
                            "Transaction expired for {} (height {} > {})",
                            wallet.label, height, last_valid_height
                        ),
                    );
                    return false;
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl Sniper for SnipePipeline {
    async fn snipe(&self, event: &EnrichedEvent, wallets: Vec<SniperWallet>) {
        let venue = event.event.venue;
        if !matches!(venue, Venue::PumpfunBondingCurve | Venue::RaydiumAmm) {
            logger::info(
                LogTag::Snipe,
                &format!("No purchase builder for {}, skipping", venue),
            );
            return;
        }

        let mint = match parse_pubkey(&event.event.mint) {
            Ok(mint) => mint,
            Err(e) => {
                logger::error(LogTag::Snipe, &format!("Bad mint in event: {}", e));
                return;
            }
        };

        let had_wallets = !wallets.is_empty();
        let eligible = self.eligible_wallets(&mint, wallets).await;
        if eligible.is_empty() {
            if had_wallets {
                logger::info(
                    LogTag::Snipe,
                    &format!(
                        "All snipers are ineligible for {}",
                        safe_truncate(&event.event.mint, 8)
                    ),
                );
            }
            return;
        }

        // Per-(wallet, mint) guard: a wallet never runs two simultaneous
        // buys of the same asset.
        let mut active: Vec<(SniperWallet, GuardToken)> = Vec::new();
        for wallet in eligible {
            let key = purchase_key(&wallet.pubkey().to_string(), &event.event.mint);
            match self.purchase_guards.try_begin(&key) {
                Some(token) => active.push((wallet, token)),
                None => {
                    logger::info(
                        LogTag::Snipe,
                        &format!("{} is already buying this mint, skipping", wallet.label),
                    );
                }
            }
        }

        if active.is_empty() {
            return;
        }

        logger::info(
            LogTag::Snipe,
            &format!(
                "Sniping {} with {} wallets",
                safe_truncate(&event.event.mint, 8),
                active.len()
            ),
        );

        for attempt in 1..=MAX_SNIPE_ATTEMPTS {
            if active.is_empty() {
                break;
            }

            let landed = self.attempt_round(event, &mint, &active).await;

            let mut remaining = Vec::new();
            for ((wallet, token), bought) in active.into_iter().zip(landed) {
                if bought {
                    token.complete();
                } else if attempt == MAX_SNIPE_ATTEMPTS {
                    logger::error(
                        LogTag::Snipe,
                        &format!(
                            "Giving up on {} for {} after {} attempts - manual follow-up required",
                            safe_truncate(&event.event.mint, 8),
                            wallet.label,
                            MAX_SNIPE_ATTEMPTS
                        ),
                    );
                    // Token drops back to Idle
                } else {
                    remaining.push((wallet, token));
                }
            }
            active = remaining;

            if !active.is_empty() && attempt < MAX_SNIPE_ATTEMPTS {
                logger::info(
                    LogTag::Snipe,
                    &format!(
                        "Restarting purchase flow for {} wallets (attempt {}/{})",
                        active.len(),
                        attempt + 1,
                        MAX_SNIPE_ATTEMPTS
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Keypair;

    fn wallet(label: &str) -> SniperWallet {
        SniperWallet {
            keypair: Keypair::new(),
            label: label.to_string(),
        }
    }

    #[test]
    fn preseeded_balance_is_never_bought_again() {
        assert_eq!(classify_wallet(1.0, 5.0), WalletEligibility::AlreadyHolding);
        assert_eq!(
            classify_wallet(1.0, 0.000001),
            WalletEligibility::AlreadyHolding
        );
    }

    #[test]
    fn balance_floor_is_enforced() {
        assert_eq!(classify_wallet(0.04, 0.0), WalletEligibility::BalanceTooLow);
        assert_eq!(classify_wallet(0.05, 0.0), WalletEligibility::Eligible);
    }

    #[test]
    fn holding_wallet_yields_zero_submissions() {
        let holding = wallet("holding");
        let fresh = wallet("fresh");
        let fresh_pubkey = fresh.pubkey();

        let eligible = filter_eligible(vec![
            (holding, 1.0, 42.0), // pre-seeded balance > 0
            (fresh, 1.0, 0.0),
        ]);

        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].pubkey(), fresh_pubkey);
    }

    #[test]
    fn broke_and_holding_wallets_all_filtered() {
        let eligible = filter_eligible(vec![
            (wallet("broke"), 0.01, 0.0),
            (wallet("holding"), 2.0, 1.0),
        ]);
        assert!(eligible.is_empty());
    }
}
