/// Centralized Solana RPC access
///
/// One primary endpoint plus redundant fallbacks. Reads go to the primary;
/// raw-transaction broadcasts fan out to every endpoint, which is what makes
/// the resend loop in the snipe pipeline effective when the primary drops a
/// transaction.

use crate::constants::{
    ASSET_FETCH_MAX_RETRIES, ASSET_FETCH_RETRY_DELAY_MS, BALANCE_FETCH_MAX_RETRIES,
    BALANCE_FETCH_RETRY_DELAY_MS,
};
use crate::errors::{EnrichmentError, MoonbotError, MoonbotResult, RpcProviderError};
use crate::logger::{self, LogTag};
use crate::utils::safe_truncate;
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_response::RpcTokenAccountBalance;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Token name/symbol/decimals resolved through the DAS `getAsset` method
#[derive(Debug, Clone)]
pub struct AssetMetadata {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

pub struct RpcManager {
    primary_url: String,
    primary: RpcClient,
    fallbacks: Vec<(String, RpcClient)>,
    http: reqwest::Client,
}

impl RpcManager {
    pub fn new(primary_url: &str, fallback_urls: &[String]) -> Self {
        let commitment = CommitmentConfig::processed();
        let primary = RpcClient::new_with_commitment(primary_url.to_string(), commitment);
        let fallbacks = fallback_urls
            .iter()
            .map(|url| {
                (
                    url.clone(),
                    RpcClient::new_with_commitment(url.clone(), commitment),
                )
            })
            .collect();

        Self {
            primary_url: primary_url.to_string(),
            primary,
            fallbacks,
            http: reqwest::Client::new(),
        }
    }

    fn request_failed(&self, error: impl std::fmt::Display) -> MoonbotError {
        MoonbotError::RpcProvider(RpcProviderError::RequestFailed {
            endpoint: self.primary_url.clone(),
            error: error.to_string(),
        })
    }

    /// Native balance in lamports
    pub async fn get_balance(&self, pubkey: &Pubkey) -> MoonbotResult<u64> {
        self.primary
            .get_balance(pubkey)
            .await
            .map_err(|e| self.request_failed(e))
    }

    /// UI balance of `mint` held by `owner`'s associated token account.
    ///
    /// A missing account means the wallet simply never held the token and
    /// reads as zero; transient errors are retried since freshly created
    /// accounts can lag behind the notification that referenced them.
    pub async fn get_wallet_token_balance(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> MoonbotResult<f64> {
        let ata = spl_associated_token_account::get_associated_token_address(owner, mint);

        let mut last_error = String::new();
        for _ in 0..BALANCE_FETCH_MAX_RETRIES {
            match self.primary.get_token_account_balance(&ata).await {
                Ok(balance) => return Ok(balance.ui_amount.unwrap_or(0.0)),
                Err(e) => {
                    let msg = e.to_string();
                    if msg.contains("could not find account")
                        || msg.contains("Invalid param: could not find")
                    {
                        return Ok(0.0);
                    }
                    last_error = msg;
                    tokio::time::sleep(Duration::from_millis(BALANCE_FETCH_RETRY_DELAY_MS)).await;
                }
            }
        }

        Err(MoonbotError::RpcProvider(
            RpcProviderError::RetriesExhausted {
                operation: "get_wallet_token_balance".to_string(),
                attempts: BALANCE_FETCH_MAX_RETRIES,
                last_error,
            },
        ))
    }

    /// UI balance of an arbitrary token account (pool vaults, curve ATAs)
    pub async fn get_token_account_balance_ui(&self, account: &Pubkey) -> MoonbotResult<f64> {
        let balance = self
            .primary
            .get_token_account_balance(account)
            .await
            .map_err(|e| self.request_failed(e))?;
        Ok(balance.ui_amount.unwrap_or(0.0))
    }

    pub async fn get_token_largest_accounts(
        &self,
        mint: &Pubkey,
    ) -> MoonbotResult<Vec<RpcTokenAccountBalance>> {
        self.primary
            .get_token_largest_accounts(mint)
            .await
            .map_err(|e| self.request_failed(e))
    }

    /// Total UI supply of a mint
    pub async fn get_token_supply_ui(&self, mint: &Pubkey) -> MoonbotResult<f64> {
        let supply = self
            .primary
            .get_token_supply(mint)
            .await
            .map_err(|e| self.request_failed(e))?;
        Ok(supply.ui_amount.unwrap_or(0.0))
    }

    pub async fn get_account_data(&self, pubkey: &Pubkey) -> MoonbotResult<Vec<u8>> {
        self.primary.get_account_data(pubkey).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("AccountNotFound") || msg.contains("could not find account") {
                MoonbotError::RpcProvider(RpcProviderError::AccountNotFound {
                    address: pubkey.to_string(),
                })
            } else {
                self.request_failed(msg)
            }
        })
    }

    pub async fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
    ) -> MoonbotResult<Vec<Option<Account>>> {
        self.primary
            .get_multiple_accounts(pubkeys)
            .await
            .map_err(|e| self.request_failed(e))
    }

    /// Latest blockhash plus the last block height it is valid for
    pub async fn get_latest_blockhash_with_validity(&self) -> MoonbotResult<(Hash, u64)> {
        self.primary
            .get_latest_blockhash_with_commitment(CommitmentConfig::processed())
            .await
            .map_err(|e| self.request_failed(e))
    }

    pub async fn get_block_height(&self) -> MoonbotResult<u64> {
        self.primary
            .get_block_height()
            .await
            .map_err(|e| self.request_failed(e))
    }

    /// Broadcast a signed transaction through the primary endpoint with
    /// preflight skipped - the snipe path cannot afford simulation latency.
    pub async fn send_transaction(&self, tx: &VersionedTransaction) -> MoonbotResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(CommitmentConfig::processed().commitment),
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.primary
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| self.request_failed(e))
    }

    /// Re-broadcast to the primary and every fallback endpoint. Individual
    /// failures are logged and ignored; a stale transaction simply fails at
    /// the ledger.
    pub async fn broadcast_everywhere(&self, tx: &VersionedTransaction) {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(CommitmentConfig::processed().commitment),
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        if let Err(e) = self
            .primary
            .send_transaction_with_config(tx, config)
            .await
        {
            logger::debug(
                LogTag::Rpc,
                &format!("Rebroadcast via primary failed: {}", e),
            );
        }

        for (url, client) in &self.fallbacks {
            if let Err(e) = client.send_transaction_with_config(tx, config).await {
                logger::debug(
                    LogTag::Rpc,
                    &format!("Rebroadcast via {} failed: {}", safe_truncate(url, 32), e),
                );
            }
        }
    }

    /// Resolve token metadata through the DAS `getAsset` JSON-RPC method.
    /// Fresh mints can take a few seconds to index, hence the retry loop.
    pub async fn get_asset_metadata(&self, mint: &str) -> MoonbotResult<AssetMetadata> {
        for attempt in 0..ASSET_FETCH_MAX_RETRIES {
            match self.fetch_asset_once(mint).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => {
                    logger::debug(
                        LogTag::Rpc,
                        &format!(
                            "getAsset attempt {}/{} for {} failed: {}",
                            attempt + 1,
                            ASSET_FETCH_MAX_RETRIES,
                            safe_truncate(mint, 8),
                            e
                        ),
                    );
                    tokio::time::sleep(Duration::from_millis(ASSET_FETCH_RETRY_DELAY_MS)).await;
                }
            }
        }

        Err(MoonbotError::Enrichment(
            EnrichmentError::AssetMetadataUnavailable {
                mint: mint.to_string(),
            },
        ))
    }

    async fn fetch_asset_once(&self, mint: &str) -> Result<AssetMetadata, String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "moonbot",
            "method": "getAsset",
            "params": {
                "id": mint,
                "displayOptions": { "showFungible": true }
            }
        });

        let response = self
            .http
            .post(&self.primary_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let payload: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        let result = payload
            .get("result")
            .ok_or_else(|| "no result in getAsset response".to_string())?;

        let metadata = result
            .pointer("/content/metadata")
            .ok_or_else(|| "asset has no metadata".to_string())?;

        let name = metadata
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim_end_matches('\0')
            .to_string();
        let symbol = metadata
            .get("symbol")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim_end_matches('\0')
            .to_string();
        let decimals = result
            .pointer("/token_info/decimals")
            .and_then(|v| v.as_u64())
            .unwrap_or(6) as u8;

        if name.is_empty() && symbol.is_empty() {
            return Err("asset metadata empty".to_string());
        }

        Ok(AssetMetadata {
            mint: mint.to_string(),
            name,
            symbol,
            decimals,
        })
    }
}

/// Parse a pubkey carried in webhook/config data
pub fn parse_pubkey(value: &str) -> MoonbotResult<Pubkey> {
    Pubkey::from_str(value).map_err(|_| {
        MoonbotError::Data(crate::errors::DataError::InvalidPubkey {
            value: value.to_string(),
        })
    })
}

/// Shared handle used across the engine and snipe pipeline
pub type SharedRpc = Arc<RpcManager>;
