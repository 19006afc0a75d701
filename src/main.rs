use anyhow::anyhow;
use moonbot::config;
use moonbot::db::{Database, Store};
use moonbot::engine::guards::GuardRegistry;
use moonbot::engine::{Engine, EngineSettings, Notifier, Sniper};
use moonbot::logger::{self, LogTag};
use moonbot::notify::SocialsNotifier;
use moonbot::price::{PythPriceSource, SolPriceSource};
use moonbot::rpc::RpcManager;
use moonbot::snipe::{SnipePipeline, SnipeSettings};
use moonbot::tasks::TaskPool;
use moonbot::webhook::{self, AppContext};
use solana_sdk::signature::Keypair;
use std::sync::Arc;

/// Concurrent background purchases/notifications
const TASK_POOL_SIZE: usize = 32;

fn load_tip_payer(encoded: &str) -> Option<Keypair> {
    if encoded.is_empty() {
        return None;
    }
    let bytes = bs58::decode(encoded).into_vec().ok()?;
    Keypair::try_from(&bytes[..]).ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    config::init("configs.json").map_err(|e| anyhow!(e))?;

    let (rpc_url, rpc_fallbacks, database_path, webhook_port) = config::with_config(|c| {
        (
            c.rpc_url.clone(),
            c.rpc_fallbacks.clone(),
            c.database_path.clone(),
            c.webhook_port,
        )
    });

    let rpc = Arc::new(RpcManager::new(&rpc_url, &rpc_fallbacks));
    let db = Arc::new(Database::open(&database_path)?);
    let price: Arc<dyn SolPriceSource> = Arc::new(PythPriceSource::new());
    let pool = TaskPool::new(TASK_POOL_SIZE);

    let sniper: Arc<dyn Sniper> = config::with_config(|c| {
        Arc::new(SnipePipeline::new(
            Arc::clone(&rpc),
            GuardRegistry::new(),
            Arc::clone(&pool),
            load_tip_payer(&c.jito_payer_keypair),
            SnipeSettings::from_config(c),
        )) as Arc<dyn Sniper>
    });

    let notifier: Arc<dyn Notifier> = config::with_config(|c| {
        Arc::new(SocialsNotifier::new(
            &c.telegram_bot_token,
            &c.telegram_chat_id,
            &c.discord_bot_token,
            Arc::clone(&price),
            c.tiers.clone(),
        )) as Arc<dyn Notifier>
    });

    let engine = Engine::new(
        Arc::clone(&db) as Arc<dyn Store>,
        GuardRegistry::new(),
        GuardRegistry::new(),
        sniper,
        notifier,
        Arc::clone(&price),
        Arc::clone(&pool),
        config::with_config(EngineSettings::from_config),
    );

    let context = Arc::new(AppContext {
        engine,
        rpc,
    });

    logger::info(LogTag::System, "moonbot starting");

    tokio::select! {
        result = webhook::start_server(Arc::clone(&context), webhook_port) => {
            result.map_err(|e| anyhow!(e))?;
        }
        _ = tokio::signal::ctrl_c() => {
            logger::info(LogTag::System, "Shutdown requested, draining background work");
            pool.drain().await;
        }
    }

    Ok(())
}
