/// SOL/USD conversion via the Pyth Hermes price feed

use crate::errors::{MoonbotError, MoonbotResult, NetworkError};
use async_trait::async_trait;

const HERMES_SOL_USD_URL: &str = "https://hermes.pyth.network/v2/updates/price/latest?ids%5B%5D=0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";

/// Seam for the fiat conversion used in notifications and FDV logging,
/// so tests can pin a rate.
#[async_trait]
pub trait SolPriceSource: Send + Sync {
    async fn sol_usd(&self) -> MoonbotResult<f64>;
}

pub struct PythPriceSource {
    http: reqwest::Client,
}

impl PythPriceSource {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for PythPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SolPriceSource for PythPriceSource {
    async fn sol_usd(&self) -> MoonbotResult<f64> {
        let response = self
            .http
            .get(HERMES_SOL_USD_URL)
            .send()
            .await
            .map_err(|e| {
                MoonbotError::Network(NetworkError::Generic {
                    message: format!("Hermes request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoonbotError::Network(NetworkError::HttpStatusError {
                endpoint: "hermes.pyth.network".to_string(),
                status: status.as_u16(),
                body: None,
            }));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            MoonbotError::Network(NetworkError::Generic {
                message: format!("Hermes response decode failed: {}", e),
            })
        })?;

        // Hermes price integers carry an exponent of -8 for this feed
        let raw = payload
            .pointer("/parsed/0/price/price")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| {
                MoonbotError::Network(NetworkError::Generic {
                    message: "Hermes response missing parsed price".to_string(),
                })
            })?;

        Ok(raw / 1e8)
    }
}

/// Fixed-rate source for tests
#[cfg(test)]
pub struct FixedPriceSource(pub f64);

#[cfg(test)]
#[async_trait]
impl SolPriceSource for FixedPriceSource {
    async fn sol_usd(&self) -> MoonbotResult<f64> {
        Ok(self.0)
    }
}
