//! Storage collaborators: the security store and the trade repository.
//!
//! Both are injected; the pipeline only talks to these traits. `InMemoryStore`
//! implements them for the CLI and for tests.

pub mod in_memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AssetType, Exchange, OwnerCode, Security, TransactionType};
use crate::error::Result;

pub use in_memory::InMemoryStore;

/// Counts of reference rows created by one upsert call. Zero on every call after the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRowsInserted {
    pub exchanges: usize,
    pub asset_types: usize,
    pub sectors: usize,
}

impl ReferenceRowsInserted {
    pub fn total(&self) -> usize {
        self.exchanges + self.asset_types + self.sectors
    }
}

/// Security lookup and upsert, unique on `(ticker, exchange)`.
#[async_trait]
pub trait SecurityStore: Send + Sync {
    /// Idempotent insert of the exchanges, asset types and sectors securities may reference.
    async fn upsert_reference_rows(
        &self,
        exchanges: &[Exchange],
        asset_types: &[AssetType],
        sectors: &BTreeSet<String>,
    ) -> Result<ReferenceRowsInserted>;

    async fn find_by_ticker(&self, ticker: &str) -> Result<Vec<Security>>;
    async fn find(&self, ticker: &str, exchange: Option<Exchange>) -> Result<Option<Security>>;
    async fn list_securities(&self) -> Result<Vec<Security>>;

    /// Read-then-write under one guard. An existing row only gains fields it was missing.
    async fn upsert_security(&self, security: &Security) -> Result<Security>;

    /// Strict insert; fails with `DuplicateSecurity` when the key exists.
    async fn insert_security(&self, security: &Security) -> Result<Security>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Resolved,
    NeedsReview,
}

/// A persisted trade, resolved or awaiting review. Partial results are kept either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub trade_id: Uuid,
    pub source_id: String,
    pub row_number: u64,
    pub status: TradeStatus,
    pub asset_description: String,
    pub ticker: Option<String>,
    pub ticker_confidence: f64,
    pub amount_min: Option<i64>,
    pub amount_max: Option<i64>,
    pub amount_exact: Option<i64>,
    pub amount_confidence: f64,
    pub owner_code: OwnerCode,
    pub owner_confidence: f64,
    pub misaligned: bool,
    pub transaction_type: Option<TransactionType>,
    pub transaction_date: Option<NaiveDate>,
    pub security_id: Option<Uuid>,
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// Upsert one sub-batch keyed by trade id, all or nothing. Returns rows newly created.
    async fn commit_sub_batch(&self, trades: &[TradeRow]) -> Result<usize>;

    async fn get_trade(&self, trade_id: Uuid) -> Result<Option<TradeRow>>;
    async fn unlinked_trades(&self) -> Result<Vec<TradeRow>>;

    /// Sets the link only when unset. Returns whether anything changed.
    async fn link_security(&self, trade_id: Uuid, security_id: Uuid) -> Result<bool>;

    async fn count_trades(&self) -> Result<usize>;
}
