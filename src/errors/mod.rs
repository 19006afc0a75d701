/// Structured error types for moonbot
///
/// Every category carries enough context (mint, signature, endpoint) for
/// manual reconciliation; purchases move real funds and there is no
/// compensating transaction.

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone)]
pub enum MoonbotError {
    // Network connectivity errors
    Network(NetworkError),

    // RPC provider issues
    RpcProvider(RpcProviderError),

    // Data parsing & validation errors
    Data(DataError),

    // Required on-chain data could not be resolved for an event
    Enrichment(EnrichmentError),

    // Persistence errors
    Store(StoreError),
}

impl std::fmt::Display for MoonbotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoonbotError::Network(e) => write!(f, "Network Error: {}", e),
            MoonbotError::RpcProvider(e) => write!(f, "RPC Provider Error: {}", e),
            MoonbotError::Data(e) => write!(f, "Data Error: {}", e),
            MoonbotError::Enrichment(e) => write!(f, "Enrichment Error: {}", e),
            MoonbotError::Store(e) => write!(f, "Store Error: {}", e),
        }
    }
}

impl std::error::Error for MoonbotError {}

// =============================================================================
// NETWORK ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum NetworkError {
    ConnectionTimeout {
        endpoint: String,
        timeout_ms: u64,
    },
    HttpStatusError {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },
    Generic {
        message: String,
    },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::ConnectionTimeout {
                endpoint,
                timeout_ms,
            } => {
                write!(
                    f,
                    "Connection timeout to {} after {}ms",
                    endpoint, timeout_ms
                )
            }
            NetworkError::HttpStatusError {
                endpoint,
                status,
                body,
            } => {
                write!(
                    f,
                    "HTTP {} from {}: {}",
                    status,
                    endpoint,
                    body.as_deref().unwrap_or("No body")
                )
            }
            NetworkError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// RPC PROVIDER ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum RpcProviderError {
    RequestFailed {
        endpoint: String,
        error: String,
    },
    AccountNotFound {
        address: String,
    },
    MalformedResponse {
        endpoint: String,
        detail: String,
    },
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl std::fmt::Display for RpcProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcProviderError::RequestFailed { endpoint, error } => {
                write!(f, "RPC request to {} failed: {}", endpoint, error)
            }
            RpcProviderError::AccountNotFound { address } => {
                write!(f, "Account not found: {}", address)
            }
            RpcProviderError::MalformedResponse { endpoint, detail } => {
                write!(f, "Malformed response from {}: {}", endpoint, detail)
            }
            RpcProviderError::RetriesExhausted {
                operation,
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "{} failed after {} attempts: {}",
                    operation, attempts, last_error
                )
            }
        }
    }
}

// =============================================================================
// DATA ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum DataError {
    InvalidPubkey {
        value: String,
    },
    InvalidKeypair {
        label: String,
        detail: String,
    },
    DecodeFailed {
        what: String,
        detail: String,
    },
    MissingField {
        what: String,
        signature: String,
    },
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::InvalidPubkey { value } => write!(f, "Invalid pubkey: {}", value),
            DataError::InvalidKeypair { label, detail } => {
                write!(f, "Invalid keypair for {}: {}", label, detail)
            }
            DataError::DecodeFailed { what, detail } => {
                write!(f, "Failed to decode {}: {}", what, detail)
            }
            DataError::MissingField { what, signature } => {
                write!(f, "Missing {} in transaction {}", what, signature)
            }
        }
    }
}

// =============================================================================
// ENRICHMENT ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum EnrichmentError {
    NoVenueInstruction {
        venue: String,
        signature: String,
    },
    PoolAccountsUnavailable {
        pair_address: String,
        attempts: u32,
    },
    PriceUnavailable {
        signature: String,
    },
    MintDataUnavailable {
        mint: String,
        detail: String,
    },
    AssetMetadataUnavailable {
        mint: String,
    },
}

impl std::fmt::Display for EnrichmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentError::NoVenueInstruction { venue, signature } => {
                write!(
                    f,
                    "Transaction is {}, but no {} instruction found: {}",
                    venue, venue, signature
                )
            }
            EnrichmentError::PoolAccountsUnavailable {
                pair_address,
                attempts,
            } => {
                write!(
                    f,
                    "Pool/market accounts for {} not found after {} attempts",
                    pair_address, attempts
                )
            }
            EnrichmentError::PriceUnavailable { signature } => {
                write!(f, "Token price not found for {}", signature)
            }
            EnrichmentError::MintDataUnavailable { mint, detail } => {
                write!(f, "Mint data unavailable for {}: {}", mint, detail)
            }
            EnrichmentError::AssetMetadataUnavailable { mint } => {
                write!(f, "Digital asset not found for {}", mint)
            }
        }
    }
}

// =============================================================================
// STORE ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum StoreError {
    QueryFailed {
        operation: String,
        detail: String,
    },
    OpenFailed {
        path: String,
        detail: String,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::QueryFailed { operation, detail } => {
                write!(f, "{} failed: {}", operation, detail)
            }
            StoreError::OpenFailed { path, detail } => {
                write!(f, "Failed to open database {}: {}", path, detail)
            }
        }
    }
}

impl From<rusqlite::Error> for MoonbotError {
    fn from(e: rusqlite::Error) -> Self {
        MoonbotError::Store(StoreError::QueryFailed {
            operation: "sqlite".to_string(),
            detail: e.to_string(),
        })
    }
}

/// Convenience alias used across the crate
pub type MoonbotResult<T> = Result<T, MoonbotError>;
