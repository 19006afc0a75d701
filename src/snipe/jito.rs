/// Bundle relay submission
///
/// Signed transactions are base58-encoded, chunked to the relay's batch
/// limit, and each batch is prefixed with a tip transaction paying the fixed
/// priority tip. The relay gives no synchronous finality guarantee, so
/// submission errors are logged and swallowed - landing is verified by the
/// balance-confirmation loop in the pipeline.

use crate::constants::{BUNDLE_BATCH_SIZE, JITO_TIP_ACCOUNT, MEMO_PROGRAM_ID};
use crate::logger::{self, LogTag};
use crate::rpc::{parse_pubkey, RpcManager};
use crate::utils::sol_to_lamports;
use rand::Rng;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use std::time::Duration;

/// Delay between consecutive bundle submissions to the same relay
const BATCH_SUBMIT_DELAY_MS: u64 = 2_100;

/// Split items into relay-sized batches, preserving order
pub fn chunk_batches<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Build the tip transaction that fronts every bundle: a transfer to the tip
/// account plus a random memo so repeated bundles never collide.
fn build_tip_transaction(
    payer: &Keypair,
    tip_sol: f64,
    blockhash: solana_sdk::hash::Hash,
) -> Result<Vec<u8>, String> {
    let tip_account = parse_pubkey(JITO_TIP_ACCOUNT).map_err(|e| e.to_string())?;
    let memo_program = parse_pubkey(MEMO_PROGRAM_ID).map_err(|e| e.to_string())?;

    let tip_ix = system_instruction::transfer(
        &payer.pubkey(),
        &tip_account,
        sol_to_lamports(tip_sol),
    );
    let memo_ix = Instruction {
        program_id: memo_program,
        accounts: vec![],
        data: rand::thread_rng()
            .gen_range(1..=5000u32)
            .to_string()
            .into_bytes(),
    };

    let message = Message::new(&[tip_ix, memo_ix], Some(&payer.pubkey()));
    let tx = Transaction::new(&[payer], message, blockhash);

    bincode::serialize(&tx).map_err(|e| e.to_string())
}

/// Submit signed transactions as tip-prefixed atomic bundles.
///
/// Never returns an error to the caller; every failure is logged with
/// context instead.
pub async fn send_bundles(
    rpc: &RpcManager,
    http: &reqwest::Client,
    block_engine_url: &str,
    tip_payer: &Keypair,
    tip_sol: f64,
    signed_transactions: &[Vec<u8>],
) {
    if signed_transactions.is_empty() {
        return;
    }

    let encoded: Vec<String> = signed_transactions
        .iter()
        .map(|tx| bs58::encode(tx).into_string())
        .collect();

    let blockhash = match rpc.get_latest_blockhash_with_validity().await {
        Ok((hash, _)) => hash,
        Err(e) => {
            logger::error(
                LogTag::Snipe,
                &format!("Bundle submission aborted, no blockhash: {}", e),
            );
            return;
        }
    };

    let batches = chunk_batches(&encoded, BUNDLE_BATCH_SIZE);
    let batch_count = batches.len();

    for (index, batch) in batches.into_iter().enumerate() {
        let tip_tx = match build_tip_transaction(tip_payer, tip_sol, blockhash) {
            Ok(tx) => bs58::encode(tx).into_string(),
            Err(e) => {
                logger::error(LogTag::Snipe, &format!("Tip transaction build failed: {}", e));
                continue;
            }
        };

        let mut bundle = Vec::with_capacity(batch.len() + 1);
        bundle.push(tip_tx);
        bundle.extend(batch);

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [bundle],
        });

        let url = format!("{}/bundles", block_engine_url.trim_end_matches('/'));
        match http.post(&url).json(&body).send().await {
            Ok(response) => match response.json::<serde_json::Value>().await {
                Ok(payload) => {
                    if let Some(bundle_id) = payload.get("result").and_then(|v| v.as_str()) {
                        logger::info(
                            LogTag::Snipe,
                            &format!(
                                "Bundle {}/{} submitted: {}",
                                index + 1,
                                batch_count,
                                bundle_id
                            ),
                        );
                    } else {
                        logger::warning(
                            LogTag::Snipe,
                            &format!("Bundle {}/{} rejected: {}", index + 1, batch_count, payload),
                        );
                    }
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Snipe,
                        &format!("Bundle {}/{} response unreadable: {}", index + 1, batch_count, e),
                    );
                }
            },
            Err(e) => {
                logger::warning(
                    LogTag::Snipe,
                    &format!("Bundle {}/{} submission failed: {}", index + 1, batch_count, e),
                );
            }
        }

        if index + 1 < batch_count {
            tokio::time::sleep(Duration::from_millis(BATCH_SUBMIT_DELAY_MS)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_transactions_make_batches_of_4_4_1() {
        let items: Vec<u32> = (0..9).collect();
        let batches = chunk_batches(&items, BUNDLE_BATCH_SIZE);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        // Order preserved across batches
        assert_eq!(batches[2], vec![8]);
    }

    #[test]
    fn exact_multiple_has_no_remainder_batch() {
        let items: Vec<u32> = (0..8).collect();
        let sizes: Vec<usize> = chunk_batches(&items, 4).iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4]);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let items: Vec<u32> = vec![];
        assert!(chunk_batches(&items, 4).is_empty());
    }

    #[test]
    fn tip_transaction_signs_and_serializes() {
        let payer = Keypair::new();
        let tx = build_tip_transaction(&payer, 0.000269858, solana_sdk::hash::Hash::default());
        assert!(tx.unwrap().len() > 0);
    }
}
