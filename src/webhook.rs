/// Inbound webhook listener
///
/// One POST endpoint accepting a JSON array of enhanced-transaction
/// envelopes. Only the first element is processed per call, and the handler
/// answers `200 ok` no matter what happened internally - the webhook sender
/// gets a fire-and-forget acknowledgement and never sees our errors.

use crate::engine::Engine;
use crate::enrich::enrich_event;
use crate::logger::{self, LogTag};
use crate::rpc::SharedRpc;
use crate::swap::extractor::extract_swap_event;
use crate::swap::types::{SwapSide, TransactionEnvelope};
use crate::utils::solscan_tx_url;
use axum::extract::State;
use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct AppContext {
    pub engine: Engine,
    pub rpc: SharedRpc,
}

/// Leniently parse the webhook body and take the first envelope
fn first_envelope(body: &str) -> Option<TransactionEnvelope> {
    match serde_json::from_str::<Vec<TransactionEnvelope>>(body) {
        Ok(batch) => batch.into_iter().next(),
        Err(e) => {
            logger::warning(LogTag::Webhook, &format!("Unparseable webhook body: {}", e));
            None
        }
    }
}

async fn handle_webhook(State(context): State<Arc<AppContext>>, body: String) -> &'static str {
    if let Some(envelope) = first_envelope(&body) {
        process_envelope(&context, envelope).await;
    }
    "ok"
}

/// Extract, enrich and run the engine for one envelope. Every failure mode
/// ends here - nothing escapes to the HTTP layer.
async fn process_envelope(context: &AppContext, envelope: TransactionEnvelope) {
    logger::info(
        LogTag::Webhook,
        &format!("Transaction {} received", solscan_tx_url(&envelope.signature)),
    );

    let event = match extract_swap_event(&envelope) {
        Ok(Some(event)) => event,
        Ok(None) => return,
        Err(e) => {
            logger::warning(
                LogTag::Webhook,
                &format!(
                    "Dropping {}: {}",
                    solscan_tx_url(&envelope.signature),
                    e
                ),
            );
            return;
        }
    };

    if event.side != SwapSide::Buy {
        logger::debug(
            LogTag::Webhook,
            &format!("Ignoring sell {}", solscan_tx_url(&event.signature)),
        );
        return;
    }

    let enriched = match enrich_event(&context.rpc, &envelope, &event).await {
        Ok(enriched) => enriched,
        Err(e) => {
            logger::error(
                LogTag::Enrich,
                &format!(
                    "Enrichment failed for {} ({}): {}",
                    event.mint,
                    solscan_tx_url(&event.signature),
                    e
                ),
            );
            return;
        }
    };

    match context.engine.process(&enriched).await {
        Ok(outcome) => {
            logger::debug(LogTag::Engine, &format!("Outcome: {:?}", outcome));
        }
        Err(e) => {
            logger::error(
                LogTag::Engine,
                &format!(
                    "Processing failed for {} ({}): {}",
                    event.mint,
                    solscan_tx_url(&event.signature),
                    e
                ),
            );
        }
    }
}

/// Start the listener; blocks until the server stops
pub async fn start_server(context: Arc<AppContext>, port: u16) -> Result<(), String> {
    let app = Router::new()
        .route("/", post(handle_webhook))
        .with_state(context);

    let addr: SocketAddr = format!("0.0.0.0:{}", port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    logger::info(
        LogTag::Webhook,
        &format!("Webhook listener on http://{}", addr),
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Webserver error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_envelope_is_taken() {
        let body = r#"[
            {"signature": "first", "timestamp": 1, "feePayer": "a"},
            {"signature": "second", "timestamp": 2, "feePayer": "b"}
        ]"#;
        let envelope = first_envelope(body).unwrap();
        assert_eq!(envelope.signature, "first");
    }

    #[test]
    fn malformed_bodies_are_swallowed() {
        assert!(first_envelope("not json at all").is_none());
        assert!(first_envelope("{}").is_none());
        assert!(first_envelope("[]").is_none());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let body = r#"[{"signature": "s", "timestamp": 1, "feePayer": "a", "somethingNew": 42}]"#;
        assert!(first_envelope(body).is_some());
    }
}
