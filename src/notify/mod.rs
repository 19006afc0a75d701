//! Notification dispatch
//!
//! Formats the human-readable signal message and pushes it to the Telegram
//! thread and Discord channel mapped to the signal's FDV tier. Delivery
//! failures are logged per platform and never affect engine state.

pub mod discord;
pub mod telegram;

use crate::config::{TierChannels, TierConfig};
use crate::db::SignalRecord;
use crate::engine::{NotificationTier, Notifier};
use crate::enrich::EnrichedEvent;
use crate::logger::{self, LogTag};
use crate::price::SolPriceSource;
use crate::utils::{format_usd_compact, safe_truncate};
use async_trait::async_trait;
use discord::DiscordNotifier;
use std::sync::Arc;
use telegram::TelegramNotifier;

/// Threshold the holder-concentration verdict line turns on
const TOP_FIVE_GOOD_MAX_PCT: f64 = 32.0;
/// Minimum LP share considered healthy
const LP_GOOD_MIN_PCT: f64 = 10.0;

/// Everything the message template needs, precomputed
pub struct SignalMessage {
    pub symbol: String,
    pub name: String,
    pub mint: String,
    pub venue_name: String,
    pub venue_url: String,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub is_renounced: bool,
    pub top_five_pct: f64,
    pub lp_pct: f64,
}

impl SignalMessage {
    pub fn from_event(event: &EnrichedEvent, sol_usd: f64) -> Self {
        Self {
            symbol: event.metadata.symbol.clone(),
            name: event.metadata.name.clone(),
            mint: event.event.mint.clone(),
            venue_name: event.event.venue.as_source_str().to_string(),
            venue_url: event.event.venue.token_page_url(&event.event.mint),
            price_usd: event.event.price * sol_usd,
            market_cap_usd: event.risk.fdv_sol * sol_usd,
            is_renounced: event.risk.is_renounced,
            top_five_pct: event.risk.top_five_holders_pct,
            lp_pct: event.risk.lp_pct,
        }
    }

    fn top_five_is_good(&self) -> bool {
        self.top_five_pct <= TOP_FIVE_GOOD_MAX_PCT
    }

    fn lp_is_good(&self) -> bool {
        self.lp_pct >= LP_GOOD_MIN_PCT
    }

    /// Bounded link set: venue page plus trading-bot deep links
    pub fn links(&self) -> Vec<(String, String)> {
        vec![
            (self.venue_name.clone(), self.venue_url.clone()),
            (
                "BonkBot".to_string(),
                format!("https://t.me/bonkbot_bot?start=ref_ca_{}", self.mint),
            ),
            (
                "Trojan".to_string(),
                format!("https://t.me/paris_trojanbot?start=r-ca-{}", self.mint),
            ),
            (
                "Photon".to_string(),
                format!("https://photon-sol.tinyastro.io/en/lp/{}", self.mint),
            ),
            (
                "BullX".to_string(),
                format!(
                    "https://bullx.io/terminal?chainId=1399811149&address={}",
                    self.mint
                ),
            ),
        ]
    }

    /// Telegram body (HTML parse mode)
    pub fn to_telegram_html(&self) -> String {
        let links = self
            .links()
            .into_iter()
            .map(|(label, url)| format!("<a href=\"{}\">{}</a>", url, label))
            .collect::<Vec<_>>()
            .join(" | ");

        format!(
            "$<code>{}</code> (<code>{}</code>) bought by the cabal on {}\n\n\
             <code>{}</code>\n\n\
             📈 Price: $<code>{:.7}</code>\n\
             💰 MC: <code>{}</code>\n\
             ────────────\n\
             ℹ️ Renounced: {}\n\
             ℹ️ Top 5 holders: {} {:.0}% ({})\n\
             ℹ️ LP supply: {} {:.0}% ({})\n\n\
             🔗 {}",
            self.symbol,
            self.name,
            self.venue_name,
            self.mint,
            self.price_usd,
            format_usd_compact(self.market_cap_usd),
            if self.is_renounced {
                "☑️ Yes"
            } else {
                "⚠️ No"
            },
            if self.top_five_is_good() { "☑️" } else { "⚠️" },
            self.top_five_pct,
            if self.top_five_is_good() { "Good" } else { "High" },
            if self.lp_is_good() { "☑️" } else { "⚠️" },
            self.lp_pct,
            if self.lp_is_good() { "Good" } else { "Low" },
            links
        )
    }

    /// Discord embed description (markdown)
    pub fn to_discord_markdown(&self) -> String {
        let links = self
            .links()
            .into_iter()
            .map(|(label, url)| format!("[{}]({})", label, url))
            .collect::<Vec<_>>()
            .join(" | ");

        format!(
            "$`{}` (`{}`) bought by the cabal on {}\n\n\
             `{}`\n\n\
             📈 Price: $`{:.7}`\n\
             💰 MC: `{}`\n\
             ────────────\n\
             ℹ️ Renounced: {}\n\
             ℹ️ Top 5 holders: {} {:.0}% ({})\n\
             ℹ️ LP supply: {} {:.0}% ({})\n\n\
             🔗 {}",
            self.symbol,
            self.name,
            self.venue_name,
            self.mint,
            self.price_usd,
            format_usd_compact(self.market_cap_usd),
            if self.is_renounced {
                "☑️ Yes"
            } else {
                "⚠️ No"
            },
            if self.top_five_is_good() { "☑️" } else { "⚠️" },
            self.top_five_pct,
            if self.top_five_is_good() { "Good" } else { "High" },
            if self.lp_is_good() { "☑️" } else { "⚠️" },
            self.lp_pct,
            if self.lp_is_good() { "Good" } else { "Low" },
            links
        )
    }
}

/// Map a tier to its configured channel/thread pair
pub fn channels_for_tier(config: &TierConfig, tier: NotificationTier) -> &TierChannels {
    match tier {
        NotificationTier::Low => &config.low,
        NotificationTier::Mid => &config.mid,
        NotificationTier::High => &config.high,
    }
}

/// Production notifier pushing to Telegram and Discord
pub struct SocialsNotifier {
    telegram: Option<TelegramNotifier>,
    discord: Option<DiscordNotifier>,
    price: Arc<dyn SolPriceSource>,
    tiers: TierConfig,
}

impl SocialsNotifier {
    pub fn new(
        telegram_token: &str,
        telegram_chat_id: &str,
        discord_token: &str,
        price: Arc<dyn SolPriceSource>,
        tiers: TierConfig,
    ) -> Self {
        let telegram = match TelegramNotifier::new(telegram_token, telegram_chat_id) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                logger::warning(LogTag::Telegram, &format!("Telegram disabled: {}", e));
                None
            }
        };
        let discord = match DiscordNotifier::new(discord_token) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                logger::warning(LogTag::Discord, &format!("Discord disabled: {}", e));
                None
            }
        };

        Self {
            telegram,
            discord,
            price,
            tiers,
        }
    }
}

#[async_trait]
impl Notifier for SocialsNotifier {
    async fn dispatch_signal(
        &self,
        event: &EnrichedEvent,
        _signal: &SignalRecord,
        tier: NotificationTier,
    ) {
        let channels = channels_for_tier(&self.tiers, tier);

        let sol_usd = match self.price.sol_usd().await {
            Ok(rate) => rate,
            Err(e) => {
                logger::warning(LogTag::Price, &format!("SOL price unavailable: {}", e));
                0.0
            }
        };

        let message = SignalMessage::from_event(event, sol_usd);

        if let Some(telegram) = &self.telegram {
            if let Err(e) = telegram
                .send_signal(&message.to_telegram_html(), channels.telegram_thread_id)
                .await
            {
                logger::error(LogTag::Telegram, &format!("Couldn't send message: {}", e));
            }
        }

        if let Some(discord) = &self.discord {
            if let Err(e) = discord
                .send_signal(
                    &channels.discord_channel_id,
                    &message.to_discord_markdown(),
                    &message.mint,
                )
                .await
            {
                logger::error(LogTag::Discord, &format!("Couldn't send message: {}", e));
            }
        }

        logger::info(
            LogTag::Engine,
            &format!(
                "Signal dispatched for {} ({:?} tier)",
                safe_truncate(&message.mint, 8),
                tier
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{PumpfunKeys, TokenRiskSnapshot, VenueKeys};
    use crate::rpc::AssetMetadata;
    use crate::swap::types::{SwapEvent, SwapSide, Venue};
    use solana_sdk::pubkey::Pubkey;

    fn event(top_five: f64, lp: f64, renounced: bool) -> EnrichedEvent {
        EnrichedEvent {
            event: SwapEvent {
                venue: Venue::PumpfunBondingCurve,
                mint: "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
                buyer: "Buyer".to_string(),
                side: SwapSide::Buy,
                sol_amount: 1.0,
                token_amount: 10_000.0,
                price: 0.0001,
                pair_address: "Curve".to_string(),
                vault_address: "Curve".to_string(),
                timestamp_ms: 0,
                signature: "sig".to_string(),
            },
            keys: VenueKeys::Pumpfun(PumpfunKeys {
                global_state: Pubkey::new_unique(),
                bonding_curve: Pubkey::new_unique(),
                bonding_curve_ata: Pubkey::new_unique(),
            }),
            risk: TokenRiskSnapshot {
                top_five_holders_pct: top_five,
                lp_pct: lp,
                is_renounced: renounced,
                fdv_sol: 100.0,
                supply_ui: 1_000_000.0,
            },
            metadata: AssetMetadata {
                mint: "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
                name: "Test Token".to_string(),
                symbol: "TST".to_string(),
                decimals: 6,
            },
        }
    }

    #[test]
    fn message_carries_usd_conversions() {
        let message = SignalMessage::from_event(&event(14.0, 20.0, true), 150.0);
        // price 0.0001 SOL x $150 = $0.015; mc 100 SOL x $150 = $15K
        assert!((message.price_usd - 0.015).abs() < 1e-9);
        assert!((message.market_cap_usd - 15_000.0).abs() < 1e-6);

        let html = message.to_telegram_html();
        assert!(html.contains("$15.0K"));
        assert!(html.contains("TST"));
        assert!(html.contains(&message.mint));
    }

    #[test]
    fn verdict_marks_flip_on_thresholds() {
        let good = SignalMessage::from_event(&event(14.0, 20.0, true), 150.0);
        let html = good.to_telegram_html();
        assert!(html.contains("Top 5 holders: ☑️ 14% (Good)"));
        assert!(html.contains("LP supply: ☑️ 20% (Good)"));
        assert!(html.contains("Renounced: ☑️ Yes"));

        let bad = SignalMessage::from_event(&event(40.0, 5.0, false), 150.0);
        let html = bad.to_telegram_html();
        assert!(html.contains("Top 5 holders: ⚠️ 40% (High)"));
        assert!(html.contains("LP supply: ⚠️ 5% (Low)"));
        assert!(html.contains("Renounced: ⚠️ No"));
    }

    #[test]
    fn link_set_is_bounded() {
        let message = SignalMessage::from_event(&event(14.0, 20.0, true), 150.0);
        let links = message.links();
        assert_eq!(links.len(), 5);
        assert_eq!(links[0].0, "Pumpfun");
        assert!(links[0].1.contains("pump.fun"));
    }

    #[test]
    fn tier_mapping_is_exhaustive() {
        let tiers = TierConfig {
            low_max_fdv_sol: 1000.0,
            mid_max_fdv_sol: 6300.0,
            low: TierChannels {
                discord_channel_id: "low".to_string(),
                telegram_thread_id: 1,
            },
            mid: TierChannels {
                discord_channel_id: "mid".to_string(),
                telegram_thread_id: 2,
            },
            high: TierChannels {
                discord_channel_id: "high".to_string(),
                telegram_thread_id: 3,
            },
        };

        assert_eq!(
            channels_for_tier(&tiers, NotificationTier::Low).telegram_thread_id,
            1
        );
        assert_eq!(
            channels_for_tier(&tiers, NotificationTier::Mid).telegram_thread_id,
            2
        );
        assert_eq!(
            channels_for_tier(&tiers, NotificationTier::High).telegram_thread_id,
            3
        );
    }
}
