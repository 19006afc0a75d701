//! SQLite persistence
//!
//! Append-only entry and signal tables plus an upserted token table and the
//! sniper-wallet credential store. No transaction wraps the engine's
//! write-entry / recount / signal sequence - the count read after an insert
//! may already include a concurrently written entry, which the engine
//! tolerates.

use crate::errors::{MoonbotError, MoonbotResult, StoreError};
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

/// One observed purchase of an asset by one buyer. Append-only.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub id: i64,
    pub mint: String,
    pub buyer: String,
    pub price: f64,
    pub amount: Option<f64>,
    pub timestamp_ms: i64,
    pub source: String,
    pub lp_pct: Option<f64>,
    pub is_renounced: bool,
    pub fdv_sol: Option<f64>,
}

/// Fields for a new entry row
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub mint: &'a str,
    pub buyer: &'a str,
    pub price: f64,
    pub amount: Option<f64>,
    pub timestamp_ms: i64,
    pub source: &'a str,
    pub lp_pct: Option<f64>,
    pub is_renounced: bool,
    pub fdv_sol: Option<f64>,
}

/// A persisted, externally-notified buyer-interest signal. Append-only.
#[derive(Debug, Clone)]
pub struct SignalRecord {
    pub id: i64,
    pub mint: String,
    pub price: f64,
    pub pair_address: String,
    pub timestamp_ms: i64,
    pub source: String,
    /// Unique-buyer count at emission. Legacy rows predate the column and
    /// carry NULL.
    pub buyers: Option<i64>,
    pub buyer: String,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewSignal<'a> {
    pub mint: &'a str,
    pub price: f64,
    pub pair_address: &'a str,
    pub timestamp_ms: i64,
    pub source: &'a str,
    pub buyers: i64,
    pub buyer: &'a str,
    pub amount: Option<f64>,
}

/// One row per mint, upserted with the latest metadata
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub pair_address: String,
    pub pair_source: String,
}

/// Managed sniper wallet credentials
#[derive(Debug, Clone)]
pub struct WalletRow {
    pub pubkey: String,
    /// base58-encoded 64-byte keypair
    pub keypair: String,
    pub label: String,
    pub enabled: bool,
}

/// Persistence collaborator interface consumed by the engine. `Database` is
/// the production implementation; tests wrap it to shape timing.
pub trait Store: Send + Sync {
    fn insert_entry(&self, entry: &NewEntry<'_>) -> MoonbotResult<EntryRecord>;
    fn unique_buyers(&self, mint: &str) -> MoonbotResult<Vec<String>>;
    fn signals_for_mint(&self, mint: &str) -> MoonbotResult<Vec<SignalRecord>>;
    fn insert_signal(&self, signal: &NewSignal<'_>) -> MoonbotResult<SignalRecord>;
    fn upsert_token(&self, token: &TokenRecord) -> MoonbotResult<()>;
    fn enabled_wallets(&self) -> MoonbotResult<Vec<WalletRow>>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> MoonbotResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            MoonbotError::Store(StoreError::OpenFailed {
                path: path.to_string(),
                detail: e.to_string(),
            })
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        logger::info(LogTag::Db, &format!("Database opened at {}", path));
        Ok(db)
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> MoonbotResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            MoonbotError::Store(StoreError::OpenFailed {
                path: ":memory:".to_string(),
                detail: e.to_string(),
            })
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> MoonbotResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tokens (
                mint TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                symbol TEXT NOT NULL,
                decimals INTEGER NOT NULL,
                pair_address TEXT NOT NULL,
                pair_source TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS token_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_mint TEXT NOT NULL,
                buyer TEXT NOT NULL,
                price REAL NOT NULL,
                amount REAL,
                timestamp INTEGER NOT NULL,
                source TEXT NOT NULL,
                lp_percentage REAL,
                is_renounced INTEGER NOT NULL DEFAULT 0,
                fdv REAL
            );
            CREATE INDEX IF NOT EXISTS idx_entries_mint ON token_entries (token_mint);
            CREATE TABLE IF NOT EXISTS token_signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_mint TEXT NOT NULL,
                price REAL NOT NULL,
                pair_address TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                source TEXT NOT NULL,
                buyers INTEGER,
                buyer TEXT NOT NULL,
                amount REAL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_mint ON token_signals (token_mint);
            CREATE TABLE IF NOT EXISTS sniper_wallets (
                pubkey TEXT PRIMARY KEY,
                keypair TEXT NOT NULL,
                label TEXT NOT NULL DEFAULT '',
                enabled INTEGER NOT NULL DEFAULT 1
            );",
        )?;
        Ok(())
    }

    /// Insert an entry row, returning the stored record
    pub fn insert_entry(&self, entry: &NewEntry<'_>) -> MoonbotResult<EntryRecord> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_entries
                (token_mint, buyer, price, amount, timestamp, source, lp_percentage, is_renounced, fdv)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.mint,
                entry.buyer,
                entry.price,
                entry.amount,
                entry.timestamp_ms,
                entry.source,
                entry.lp_pct,
                entry.is_renounced as i64,
                entry.fdv_sol,
            ],
        )?;

        Ok(EntryRecord {
            id: conn.last_insert_rowid(),
            mint: entry.mint.to_string(),
            buyer: entry.buyer.to_string(),
            price: entry.price,
            amount: entry.amount,
            timestamp_ms: entry.timestamp_ms,
            source: entry.source.to_string(),
            lp_pct: entry.lp_pct,
            is_renounced: entry.is_renounced,
            fdv_sol: entry.fdv_sol,
        })
    }

    /// Distinct buyer addresses ever recorded for a mint
    pub fn unique_buyers(&self, mint: &str) -> MoonbotResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT buyer FROM token_entries WHERE token_mint = ?1")?;
        let buyers = stmt
            .query_map(params![mint], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(buyers)
    }

    pub fn entry_count(&self, mint: &str) -> MoonbotResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM token_entries WHERE token_mint = ?1",
            params![mint],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Signals for a mint, oldest first
    pub fn signals_for_mint(&self, mint: &str) -> MoonbotResult<Vec<SignalRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, token_mint, price, pair_address, timestamp, source, buyers, buyer, amount
             FROM token_signals WHERE token_mint = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let signals = stmt
            .query_map(params![mint], |row| {
                Ok(SignalRecord {
                    id: row.get(0)?,
                    mint: row.get(1)?,
                    price: row.get(2)?,
                    pair_address: row.get(3)?,
                    timestamp_ms: row.get(4)?,
                    source: row.get(5)?,
                    buyers: row.get(6)?,
                    buyer: row.get(7)?,
                    amount: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(signals)
    }

    pub fn insert_signal(&self, signal: &NewSignal<'_>) -> MoonbotResult<SignalRecord> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_signals
                (token_mint, price, pair_address, timestamp, source, buyers, buyer, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                signal.mint,
                signal.price,
                signal.pair_address,
                signal.timestamp_ms,
                signal.source,
                signal.buyers,
                signal.buyer,
                signal.amount,
            ],
        )?;

        Ok(SignalRecord {
            id: conn.last_insert_rowid(),
            mint: signal.mint.to_string(),
            price: signal.price,
            pair_address: signal.pair_address.to_string(),
            timestamp_ms: signal.timestamp_ms,
            source: signal.source.to_string(),
            buyers: Some(signal.buyers),
            buyer: signal.buyer.to_string(),
            amount: signal.amount,
        })
    }

    /// Insert-or-update the token row for a mint
    pub fn upsert_token(&self, token: &TokenRecord) -> MoonbotResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tokens (mint, name, symbol, decimals, pair_address, pair_source, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%s','now'))
             ON CONFLICT(mint) DO UPDATE SET
                name = excluded.name,
                symbol = excluded.symbol,
                decimals = excluded.decimals,
                pair_address = excluded.pair_address,
                pair_source = excluded.pair_source,
                updated_at = excluded.updated_at",
            params![
                token.mint,
                token.name,
                token.symbol,
                token.decimals as i64,
                token.pair_address,
                token.pair_source,
            ],
        )?;
        Ok(())
    }

    pub fn token_by_mint(&self, mint: &str) -> MoonbotResult<Option<TokenRecord>> {
        let conn = self.conn.lock();
        let token = conn
            .query_row(
                "SELECT mint, name, symbol, decimals, pair_address, pair_source
                 FROM tokens WHERE mint = ?1",
                params![mint],
                |row| {
                    Ok(TokenRecord {
                        mint: row.get(0)?,
                        name: row.get(1)?,
                        symbol: row.get(2)?,
                        decimals: row.get::<_, i64>(3)? as u8,
                        pair_address: row.get(4)?,
                        pair_source: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(token)
    }

    /// Credentials of every enabled sniper wallet
    pub fn enabled_wallets(&self) -> MoonbotResult<Vec<WalletRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT pubkey, keypair, label, enabled FROM sniper_wallets WHERE enabled = 1",
        )?;
        let wallets = stmt
            .query_map([], |row| {
                Ok(WalletRow {
                    pubkey: row.get(0)?,
                    keypair: row.get(1)?,
                    label: row.get(2)?,
                    enabled: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(wallets)
    }

    /// Insert a wallet row (setup tooling and tests)
    pub fn insert_wallet(&self, wallet: &WalletRow) -> MoonbotResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO sniper_wallets (pubkey, keypair, label, enabled)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                wallet.pubkey,
                wallet.keypair,
                wallet.label,
                wallet.enabled as i64
            ],
        )?;
        Ok(())
    }

    /// Insert a legacy signal row without a buyers count, emulating rows written
    /// before the column existed (tests for the legacy fallback).
    #[cfg(test)]
    pub fn insert_legacy_signal(&self, mint: &str, price: f64, timestamp_ms: i64) -> MoonbotResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_signals
                (token_mint, price, pair_address, timestamp, source, buyers, buyer, amount)
             VALUES (?1, ?2, '', ?3, 'Raydium', NULL, '', NULL)",
            params![mint, price, timestamp_ms],
        )?;
        Ok(())
    }
}

impl Store for Database {
    fn insert_entry(&self, entry: &NewEntry<'_>) -> MoonbotResult<EntryRecord> {
        Database::insert_entry(self, entry)
    }

    fn unique_buyers(&self, mint: &str) -> MoonbotResult<Vec<String>> {
        Database::unique_buyers(self, mint)
    }

    fn signals_for_mint(&self, mint: &str) -> MoonbotResult<Vec<SignalRecord>> {
        Database::signals_for_mint(self, mint)
    }

    fn insert_signal(&self, signal: &NewSignal<'_>) -> MoonbotResult<SignalRecord> {
        Database::insert_signal(self, signal)
    }

    fn upsert_token(&self, token: &TokenRecord) -> MoonbotResult<()> {
        Database::upsert_token(self, token)
    }

    fn enabled_wallets(&self) -> MoonbotResult<Vec<WalletRow>> {
        Database::enabled_wallets(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry<'a>(mint: &'a str, buyer: &'a str) -> NewEntry<'a> {
        NewEntry {
            mint,
            buyer,
            price: 0.0001,
            amount: Some(1.5),
            timestamp_ms: 1_700_000_000_000,
            source: "Pumpfun",
            lp_pct: Some(20.0),
            is_renounced: true,
            fdv_sol: Some(100.0),
        }
    }

    #[test]
    fn unique_buyers_has_set_semantics() {
        let db = Database::open_in_memory().unwrap();

        for buyer in ["a", "b", "c"] {
            db.insert_entry(&entry("mint1", buyer)).unwrap();
        }
        assert_eq!(db.unique_buyers("mint1").unwrap().len(), 3);

        // Duplicate buyer leaves the distinct count unchanged
        db.insert_entry(&entry("mint1", "b")).unwrap();
        assert_eq!(db.unique_buyers("mint1").unwrap().len(), 3);
        assert_eq!(db.entry_count("mint1").unwrap(), 4);
    }

    #[test]
    fn signals_are_ordered_and_returned() {
        let db = Database::open_in_memory().unwrap();
        db.insert_signal(&NewSignal {
            mint: "mint1",
            price: 0.1,
            pair_address: "pair",
            timestamp_ms: 100,
            source: "Raydium",
            buyers: 2,
            buyer: "a",
            amount: None,
        })
        .unwrap();
        db.insert_signal(&NewSignal {
            mint: "mint1",
            price: 0.2,
            pair_address: "pair",
            timestamp_ms: 200,
            source: "Raydium",
            buyers: 3,
            buyer: "b",
            amount: None,
        })
        .unwrap();

        let signals = db.signals_for_mint("mint1").unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].buyers, Some(2));
        assert_eq!(signals[1].buyers, Some(3));
    }

    #[test]
    fn legacy_signal_rows_carry_null_buyers() {
        let db = Database::open_in_memory().unwrap();
        db.insert_legacy_signal("mint1", 0.1, 100).unwrap();
        let signals = db.signals_for_mint("mint1").unwrap();
        assert_eq!(signals[0].buyers, None);
    }

    #[test]
    fn token_upsert_replaces_pair() {
        let db = Database::open_in_memory().unwrap();
        let mut token = TokenRecord {
            mint: "mint1".to_string(),
            name: "Token".to_string(),
            symbol: "TKN".to_string(),
            decimals: 6,
            pair_address: "pair1".to_string(),
            pair_source: "Pumpfun".to_string(),
        };
        db.upsert_token(&token).unwrap();

        token.pair_address = "pair2".to_string();
        token.pair_source = "Raydium".to_string();
        db.upsert_token(&token).unwrap();

        let stored = db.token_by_mint("mint1").unwrap().unwrap();
        assert_eq!(stored.pair_address, "pair2");
        assert_eq!(stored.pair_source, "Raydium");
    }

    #[test]
    fn only_enabled_wallets_are_returned() {
        let db = Database::open_in_memory().unwrap();
        db.insert_wallet(&WalletRow {
            pubkey: "w1".to_string(),
            keypair: "kp1".to_string(),
            label: "one".to_string(),
            enabled: true,
        })
        .unwrap();
        db.insert_wallet(&WalletRow {
            pubkey: "w2".to_string(),
            keypair: "kp2".to_string(),
            label: "two".to_string(),
            enabled: false,
        })
        .unwrap();

        let wallets = db.enabled_wallets().unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].pubkey, "w1");
    }
}
