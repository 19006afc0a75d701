/// Managed sniper wallet credentials
///
/// Wallet keypairs are stored base58-encoded in the credential table and
/// decoded on demand; a row that fails to decode is skipped with a log line
/// rather than failing the whole purchase dispatch.

use crate::db::WalletRow;
use crate::errors::{DataError, MoonbotError, MoonbotResult};
use crate::logger::{self, LogTag};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

pub struct SniperWallet {
    pub keypair: Keypair,
    pub label: String,
}

impl SniperWallet {
    pub fn from_row(row: &WalletRow) -> MoonbotResult<Self> {
        let bytes = bs58::decode(&row.keypair).into_vec().map_err(|e| {
            MoonbotError::Data(DataError::InvalidKeypair {
                label: row.label.clone(),
                detail: e.to_string(),
            })
        })?;

        if bytes.len() != 64 {
            return Err(MoonbotError::Data(DataError::InvalidKeypair {
                label: row.label.clone(),
                detail: format!("expected 64 bytes, got {}", bytes.len()),
            }));
        }

        let keypair = Keypair::try_from(&bytes[..]).map_err(|e| {
            MoonbotError::Data(DataError::InvalidKeypair {
                label: row.label.clone(),
                detail: e.to_string(),
            })
        })?;

        Ok(Self {
            keypair,
            label: row.label.clone(),
        })
    }

    pub fn pubkey(&self) -> solana_sdk::pubkey::Pubkey {
        self.keypair.pubkey()
    }
}

/// Decode every enabled wallet row, dropping rows with bad credentials
pub fn decode_wallets(rows: &[WalletRow]) -> Vec<SniperWallet> {
    rows.iter()
        .filter_map(|row| match SniperWallet::from_row(row) {
            Ok(wallet) => Some(wallet),
            Err(e) => {
                logger::warning(
                    LogTag::Snipe,
                    &format!("Skipping wallet {}: {}", row.label, e),
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_a_generated_keypair() {
        let keypair = Keypair::new();
        let row = WalletRow {
            pubkey: keypair.pubkey().to_string(),
            keypair: bs58::encode(keypair.to_bytes()).into_string(),
            label: "test".to_string(),
            enabled: true,
        };

        let wallet = SniperWallet::from_row(&row).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn bad_rows_are_dropped_not_fatal() {
        let rows = vec![WalletRow {
            pubkey: "x".to_string(),
            keypair: "not-base58-!!!".to_string(),
            label: "broken".to_string(),
            enabled: true,
        }];
        assert!(decode_wallets(&rows).is_empty());
    }
}
