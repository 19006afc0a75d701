//! Event processing engine
//!
//! The dedup/decision core. Consumes an enriched buy event, writes the entry
//! record, recomputes the unique-buyer count and decides whether to trigger
//! an automated purchase and/or a signal. All coordination state lives in
//! injected guard registries so concurrent webhook deliveries for the same
//! (mint, buyer) or the same mint cannot double-act.

pub mod guards;

use crate::config::Configs;
use crate::constants::MAX_TOP_FIVE_HOLDERS_PCT;
use crate::db::{NewEntry, NewSignal, SignalRecord, Store, TokenRecord};
use crate::enrich::EnrichedEvent;
use crate::errors::MoonbotResult;
use crate::logger::{self, LogTag};
use crate::price::SolPriceSource;
use crate::swap::types::{SwapSide, Venue};
use crate::tasks::TaskPool;
use crate::utils::{format_usd_compact, safe_truncate, solscan_tx_url};
use crate::wallets::{decode_wallets, SniperWallet};
use async_trait::async_trait;
use guards::{entry_key, GuardRegistry};
use std::sync::Arc;

/// Purchase pipeline seam. The production implementation is
/// `snipe::SnipePipeline`.
#[async_trait]
pub trait Sniper: Send + Sync {
    async fn snipe(&self, event: &EnrichedEvent, wallets: Vec<SniperWallet>);
}

/// Notification dispatch seam. The production implementation is
/// `notify::SocialsNotifier`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch_signal(
        &self,
        event: &EnrichedEvent,
        signal: &SignalRecord,
        tier: NotificationTier,
    );
}

/// FDV-bracketed notification routing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTier {
    Low,
    Mid,
    High,
}

impl NotificationTier {
    pub fn for_fdv(fdv_sol: f64, settings: &EngineSettings) -> Self {
        if fdv_sol < settings.tier_low_max_fdv_sol {
            NotificationTier::Low
        } else if fdv_sol < settings.tier_mid_max_fdv_sol {
            NotificationTier::Mid
        } else {
            NotificationTier::High
        }
    }
}

/// Tunable decision thresholds, split out of the global config so tests can
/// construct engines directly.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub min_buyers_raydium: u32,
    pub min_buyers_pumpfun: u32,
    pub min_buyers_moonshot: u32,
    pub fdv_ceiling_sol: f64,
    pub tier_low_max_fdv_sol: f64,
    pub tier_mid_max_fdv_sol: f64,
}

impl EngineSettings {
    pub fn from_config(config: &Configs) -> Self {
        Self {
            min_buyers_raydium: config.min_buyers_raydium,
            min_buyers_pumpfun: config.min_buyers_pumpfun,
            min_buyers_moonshot: config.min_buyers_moonshot,
            fdv_ceiling_sol: config.fdv_ceiling_sol,
            tier_low_max_fdv_sol: config.tiers.low_max_fdv_sol,
            tier_mid_max_fdv_sol: config.tiers.mid_max_fdv_sol,
        }
    }

    /// Per-venue unique-buyer threshold
    pub fn min_buyers(&self, venue: Venue) -> u32 {
        match venue {
            Venue::RaydiumAmm | Venue::RaydiumClmm => self.min_buyers_raydium,
            Venue::PumpfunBondingCurve => self.min_buyers_pumpfun,
            Venue::Moonshot => self.min_buyers_moonshot,
            _ => self.min_buyers_raydium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Initial,
    Bump,
}

/// What the engine did with one event, for logs and tests
#[derive(Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not a buy - nothing to do
    Ignored,
    /// Top-holder concentration over the ceiling; no entry written
    RugFiltered,
    /// Another delivery for this (mint, buyer) is in flight
    DuplicateInFlight,
    Recorded {
        unique_buyers: usize,
        purchase_dispatched: bool,
        signal: Option<SignalKind>,
    },
}

pub struct Engine {
    store: Arc<dyn Store>,
    entry_guards: Arc<GuardRegistry>,
    signal_guards: Arc<GuardRegistry>,
    sniper: Arc<dyn Sniper>,
    notifier: Arc<dyn Notifier>,
    price: Arc<dyn SolPriceSource>,
    pool: Arc<TaskPool>,
    settings: EngineSettings,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        entry_guards: Arc<GuardRegistry>,
        signal_guards: Arc<GuardRegistry>,
        sniper: Arc<dyn Sniper>,
        notifier: Arc<dyn Notifier>,
        price: Arc<dyn SolPriceSource>,
        pool: Arc<TaskPool>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            entry_guards,
            signal_guards,
            sniper,
            notifier,
            price,
            pool,
            settings,
        }
    }

    pub fn entry_guards(&self) -> &Arc<GuardRegistry> {
        &self.entry_guards
    }

    pub fn signal_guards(&self) -> &Arc<GuardRegistry> {
        &self.signal_guards
    }

    pub fn task_pool(&self) -> &Arc<TaskPool> {
        &self.pool
    }

    /// Process one enriched event through the full decision sequence
    pub async fn process(&self, enriched: &EnrichedEvent) -> MoonbotResult<EventOutcome> {
        let event = &enriched.event;

        if event.side != SwapSide::Buy {
            return Ok(EventOutcome::Ignored);
        }

        // Rug filter runs on the fresh snapshot for this event, never a
        // cached one.
        if enriched.risk.top_five_holders_pct > MAX_TOP_FIVE_HOLDERS_PCT {
            logger::warning(
                LogTag::Engine,
                &format!(
                    "Potential rug detected ({:.0}% top five) for {} - {}",
                    enriched.risk.top_five_holders_pct,
                    safe_truncate(&event.mint, 8),
                    solscan_tx_url(&event.signature)
                ),
            );
            return Ok(EventOutcome::RugFiltered);
        }

        let key = entry_key(&event.mint, &event.buyer);
        let guard = match self.entry_guards.try_begin(&key) {
            Some(guard) => guard,
            None => {
                logger::info(
                    LogTag::Engine,
                    &format!(
                        "{}/{} is already being processed, skipping",
                        safe_truncate(&event.buyer, 8),
                        safe_truncate(&event.mint, 8)
                    ),
                );
                return Ok(EventOutcome::DuplicateInFlight);
            }
        };

        let result = self.record_and_decide(enriched).await;
        guard.complete();
        result
    }

    async fn record_and_decide(&self, enriched: &EnrichedEvent) -> MoonbotResult<EventOutcome> {
        let event = &enriched.event;
        let risk = &enriched.risk;

        self.store.insert_entry(&NewEntry {
            mint: &event.mint,
            buyer: &event.buyer,
            price: event.price,
            amount: Some(event.sol_amount),
            timestamp_ms: event.timestamp_ms,
            source: event.venue.as_source_str(),
            lp_pct: Some(risk.lp_pct),
            is_renounced: risk.is_renounced,
            fdv_sol: Some(risk.fdv_sol),
        })?;

        let unique_buyers = self.store.unique_buyers(&event.mint)?.len().max(1);
        let threshold = self.settings.min_buyers(event.venue) as usize;

        logger::info(
            LogTag::Engine,
            &format!(
                "Potential mooner detected ({} buyers) {} {}",
                unique_buyers,
                safe_truncate(&event.mint, 8),
                event.venue.token_page_url(&event.mint)
            ),
        );

        if unique_buyers < threshold {
            return Ok(EventOutcome::Recorded {
                unique_buyers,
                purchase_dispatched: false,
                signal: None,
            });
        }

        let purchase_dispatched = self.maybe_dispatch_purchase(enriched).await?;
        let signal = self.maybe_signal(enriched, unique_buyers, threshold).await?;

        Ok(EventOutcome::Recorded {
            unique_buyers,
            purchase_dispatched,
            signal,
        })
    }

    /// Step 3: automated purchase, gated on the FDV ceiling
    async fn maybe_dispatch_purchase(&self, enriched: &EnrichedEvent) -> MoonbotResult<bool> {
        let event = &enriched.event;

        if enriched.risk.fdv_sol >= self.settings.fdv_ceiling_sol {
            // Value too high - log in fiat for the operator and move on
            let usd_note = match self.price.sol_usd().await {
                Ok(rate) => format_usd_compact(enriched.risk.fdv_sol * rate),
                Err(_) => format!("{:.0} SOL", enriched.risk.fdv_sol),
            };
            logger::info(
                LogTag::Engine,
                &format!(
                    "Token FDV is too high ({}), not buying {}",
                    usd_note,
                    safe_truncate(&event.mint, 8)
                ),
            );
            return Ok(false);
        }

        let rows = self.store.enabled_wallets()?;
        let wallets = decode_wallets(&rows);
        if wallets.is_empty() {
            logger::debug(LogTag::Engine, "No enabled sniper wallets configured");
        }

        let sniper = Arc::clone(&self.sniper);
        let enriched = enriched.clone();
        self.pool.spawn(async move {
            sniper.snipe(&enriched, wallets).await;
        });

        Ok(true)
    }

    /// Step 4: signal decision and dispatch
    async fn maybe_signal(
        &self,
        enriched: &EnrichedEvent,
        unique_buyers: usize,
        threshold: usize,
    ) -> MoonbotResult<Option<SignalKind>> {
        let event = &enriched.event;

        self.store.upsert_token(&TokenRecord {
            mint: event.mint.clone(),
            name: enriched.metadata.name.clone(),
            symbol: enriched.metadata.symbol.clone(),
            decimals: enriched.metadata.decimals,
            pair_address: event.pair_address.clone(),
            pair_source: event.venue.as_source_str().to_string(),
        })?;

        let signals = self.store.signals_for_mint(&event.mint)?;

        let is_first_signal = signals.is_empty() && unique_buyers >= threshold;
        // Rows written before the buyers column existed fall back to the
        // threshold for the comparison.
        let buyers_last_signal = signals
            .last()
            .and_then(|s| s.buyers)
            .unwrap_or(threshold as i64);
        let is_bump_signal = (unique_buyers as i64) > buyers_last_signal;

        if !is_first_signal && !is_bump_signal {
            return Ok(None);
        }

        let guard = match self.signal_guards.try_begin(&event.mint) {
            Some(guard) => guard,
            None => {
                logger::info(
                    LogTag::Engine,
                    &format!(
                        "Signal for {} already in flight, skipping",
                        safe_truncate(&event.mint, 8)
                    ),
                );
                return Ok(None);
            }
        };

        let kind = if is_first_signal {
            SignalKind::Initial
        } else {
            SignalKind::Bump
        };

        let signal = self.store.insert_signal(&NewSignal {
            mint: &event.mint,
            price: event.price,
            pair_address: &event.pair_address,
            timestamp_ms: event.timestamp_ms,
            source: event.venue.as_source_str(),
            buyers: unique_buyers as i64,
            buyer: &event.buyer,
            amount: Some(event.sol_amount),
        })?;

        let tier = NotificationTier::for_fdv(enriched.risk.fdv_sol, &self.settings);

        logger::info(
            LogTag::Engine,
            &format!(
                "{:?} signal for {} ({} buyers, {:?} tier)",
                kind,
                safe_truncate(&event.mint, 8),
                unique_buyers,
                tier
            ),
        );

        // The guard stays held through dispatch so a near-simultaneous
        // qualifying event cannot emit a second signal for this mint.
        self.notifier.dispatch_signal(enriched, &signal, tier).await;
        guard.complete();

        Ok(Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, EntryRecord, WalletRow};
    use crate::enrich::{PumpfunKeys, TokenRiskSnapshot, VenueKeys};
    use crate::errors::MoonbotResult;
    use crate::price::FixedPriceSource;
    use crate::rpc::AssetMetadata;
    use crate::swap::types::{SwapEvent, SwapSide, Venue};
    use parking_lot::Mutex;
    use solana_sdk::pubkey::Pubkey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINT: &str = "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    struct MockSniper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Sniper for MockSniper {
        async fn snipe(&self, _event: &EnrichedEvent, _wallets: Vec<SniperWallet>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockNotifier {
        dispatched: Mutex<Vec<NotificationTier>>,
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn dispatch_signal(
            &self,
            _event: &EnrichedEvent,
            _signal: &SignalRecord,
            tier: NotificationTier,
        ) {
            self.dispatched.lock().push(tier);
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            min_buyers_raydium: 1,
            min_buyers_pumpfun: 1,
            min_buyers_moonshot: 1,
            fdv_ceiling_sol: 5000.0,
            tier_low_max_fdv_sol: 1000.0,
            tier_mid_max_fdv_sol: 6300.0,
        }
    }

    fn enriched(buyer: &str, top_five_pct: f64, fdv_sol: f64) -> EnrichedEvent {
        EnrichedEvent {
            event: SwapEvent {
                venue: Venue::PumpfunBondingCurve,
                mint: MINT.to_string(),
                buyer: buyer.to_string(),
                side: SwapSide::Buy,
                sol_amount: 1.0,
                token_amount: 10_000.0,
                price: 0.0001,
                pair_address: "CurveAccount11111111111111111111111111111111".to_string(),
                vault_address: "CurveAccount11111111111111111111111111111111".to_string(),
                timestamp_ms: 1_700_000_000_000,
                signature: "sig".to_string(),
            },
            keys: VenueKeys::Pumpfun(PumpfunKeys {
                global_state: Pubkey::new_unique(),
                bonding_curve: Pubkey::new_unique(),
                bonding_curve_ata: Pubkey::new_unique(),
            }),
            risk: TokenRiskSnapshot {
                top_five_holders_pct: top_five_pct,
                lp_pct: 20.0,
                is_renounced: true,
                fdv_sol,
                supply_ui: 1_000_000.0,
            },
            metadata: AssetMetadata {
                mint: MINT.to_string(),
                name: "Test Token".to_string(),
                symbol: "TST".to_string(),
                decimals: 6,
            },
        }
    }

    struct Harness {
        engine: Engine,
        db: Arc<Database>,
        sniper: Arc<MockSniper>,
        notifier: Arc<MockNotifier>,
    }

    fn harness_with_store(db: Arc<Database>, store: Arc<dyn Store>) -> Harness {
        let sniper = Arc::new(MockSniper {
            calls: AtomicUsize::new(0),
        });
        let notifier = Arc::new(MockNotifier {
            dispatched: Mutex::new(Vec::new()),
        });
        let engine = Engine::new(
            store,
            GuardRegistry::new(),
            GuardRegistry::new(),
            Arc::clone(&sniper) as Arc<dyn Sniper>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::new(FixedPriceSource(150.0)),
            TaskPool::new(4),
            settings(),
        );
        Harness {
            engine,
            db,
            sniper,
            notifier,
        }
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        harness_with_store(Arc::clone(&db), Arc::clone(&db) as Arc<dyn Store>)
    }

    #[tokio::test]
    async fn rug_filter_boundary_32_passes_33_rejects() {
        let h = harness();

        let outcome = h.engine.process(&enriched("alice", 33.0, 100.0)).await.unwrap();
        assert_eq!(outcome, EventOutcome::RugFiltered);
        assert_eq!(h.db.entry_count(MINT).unwrap(), 0);

        let outcome = h.engine.process(&enriched("alice", 32.0, 100.0)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Recorded { .. }));
        assert_eq!(h.db.entry_count(MINT).unwrap(), 1);
    }

    #[tokio::test]
    async fn sells_are_ignored() {
        let h = harness();
        let mut event = enriched("alice", 10.0, 100.0);
        event.event.side = SwapSide::Sell;
        assert_eq!(h.engine.process(&event).await.unwrap(), EventOutcome::Ignored);
        assert_eq!(h.db.entry_count(MINT).unwrap(), 0);
    }

    #[tokio::test]
    async fn in_flight_duplicate_writes_single_entry() {
        let h = harness();

        // Simulate a concurrent delivery holding the (mint, buyer) guard
        let held = h
            .engine
            .entry_guards()
            .try_begin(&entry_key(MINT, "alice"))
            .unwrap();

        let outcome = h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();
        assert_eq!(outcome, EventOutcome::DuplicateInFlight);
        assert_eq!(h.db.entry_count(MINT).unwrap(), 0);

        drop(held);
        h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();
        assert_eq!(h.db.entry_count(MINT).unwrap(), 1);
    }

    /// Store decorator that stalls inside insert_entry, holding the entry
    /// guard long enough for the second concurrent delivery to observe it.
    struct SlowStore {
        inner: Arc<Database>,
        delay: std::time::Duration,
    }

    impl Store for SlowStore {
        fn insert_entry(&self, entry: &NewEntry<'_>) -> MoonbotResult<EntryRecord> {
            std::thread::sleep(self.delay);
            self.inner.insert_entry(entry)
        }
        fn unique_buyers(&self, mint: &str) -> MoonbotResult<Vec<String>> {
            self.inner.unique_buyers(mint)
        }
        fn signals_for_mint(&self, mint: &str) -> MoonbotResult<Vec<SignalRecord>> {
            self.inner.signals_for_mint(mint)
        }
        fn insert_signal(&self, signal: &NewSignal<'_>) -> MoonbotResult<SignalRecord> {
            self.inner.insert_signal(signal)
        }
        fn upsert_token(&self, token: &TokenRecord) -> MoonbotResult<()> {
            self.inner.upsert_token(token)
        }
        fn enabled_wallets(&self) -> MoonbotResult<Vec<WalletRow>> {
            self.inner.enabled_wallets()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_identical_deliveries_persist_one_entry() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let slow = Arc::new(SlowStore {
            inner: Arc::clone(&db),
            delay: std::time::Duration::from_millis(200),
        });
        let h = Arc::new(harness_with_store(Arc::clone(&db), slow as Arc<dyn Store>));

        let first = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.engine.process(&enriched("alice", 10.0, 100.0)).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();

        assert_eq!(second, EventOutcome::DuplicateInFlight);
        assert!(matches!(
            first.await.unwrap().unwrap(),
            EventOutcome::Recorded { .. }
        ));
        assert_eq!(db.entry_count(MINT).unwrap(), 1);
    }

    #[tokio::test]
    async fn first_bump_equal_signal_sequence() {
        let h = harness();

        // First qualifying event emits the initial signal
        let outcome = h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded {
                signal: Some(SignalKind::Initial),
                ..
            }
        ));

        // Same buyer again: count unchanged, no bump
        let outcome = h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded { signal: None, .. }
        ));

        // New buyer: strictly greater count, bump signal
        let outcome = h.engine.process(&enriched("bob", 10.0, 100.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded {
                signal: Some(SignalKind::Bump),
                ..
            }
        ));

        let signals = h.db.signals_for_mint(MINT).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].buyers, Some(1));
        assert_eq!(signals[1].buyers, Some(2));
    }

    #[tokio::test]
    async fn legacy_signal_rows_fall_back_to_threshold() {
        let h = harness();
        h.db.insert_legacy_signal(MINT, 0.0001, 1_600_000_000_000).unwrap();

        // Count 1 vs fallback threshold 1: not strictly greater, no signal
        let outcome = h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded { signal: None, .. }
        ));

        // Second buyer exceeds the fallback, bump fires
        let outcome = h.engine.process(&enriched("bob", 10.0, 100.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded {
                signal: Some(SignalKind::Bump),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn signaling_guard_suppresses_duplicate_emission() {
        let h = harness();

        let held = h.engine.signal_guards().try_begin(MINT).unwrap();
        let outcome = h.engine.process(&enriched("alice", 10.0, 100.0)).await.unwrap();
        drop(held);

        // Entry recorded but no signal emitted while the guard was held
        assert!(matches!(
            outcome,
            EventOutcome::Recorded { signal: None, .. }
        ));
        assert!(h.db.signals_for_mint(MINT).unwrap().is_empty());
        assert_eq!(h.db.entry_count(MINT).unwrap(), 1);
    }

    #[tokio::test]
    async fn fdv_ceiling_gates_purchases_not_signals() {
        let h = harness();

        let outcome = h.engine.process(&enriched("alice", 10.0, 6000.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded {
                purchase_dispatched: false,
                signal: Some(SignalKind::Initial),
                ..
            }
        ));
        h.engine.task_pool().drain().await;
        assert_eq!(h.sniper.calls.load(Ordering::SeqCst), 0);

        let outcome = h.engine.process(&enriched("bob", 10.0, 100.0)).await.unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Recorded {
                purchase_dispatched: true,
                ..
            }
        ));
        h.engine.task_pool().drain().await;
        assert_eq!(h.sniper.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tier_routing_follows_fdv_brackets() {
        let s = settings();
        assert_eq!(NotificationTier::for_fdv(999.0, &s), NotificationTier::Low);
        assert_eq!(NotificationTier::for_fdv(1000.0, &s), NotificationTier::Mid);
        assert_eq!(NotificationTier::for_fdv(6299.0, &s), NotificationTier::Mid);
        assert_eq!(NotificationTier::for_fdv(6300.0, &s), NotificationTier::High);

        let h = harness();
        h.engine.process(&enriched("alice", 10.0, 999.0)).await.unwrap();
        h.engine.process(&enriched("bob", 10.0, 6300.0)).await.unwrap();

        let dispatched = h.notifier.dispatched.lock().clone();
        assert_eq!(dispatched, vec![NotificationTier::Low, NotificationTier::High]);
    }
}
