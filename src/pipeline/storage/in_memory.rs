use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{ReferenceRowsInserted, SecurityStore, TradeRepository, TradeRow};
use crate::domain::{AssetType, Exchange, Security};
use crate::error::{IngestError, Result};

type SecurityKey = (String, Option<Exchange>);

#[derive(Default)]
struct ReferenceRows {
    exchanges: HashSet<Exchange>,
    asset_types: HashSet<AssetType>,
    sectors: BTreeSet<String>,
}

/// In-memory storage for the CLI and tests
pub struct InMemoryStore {
    reference_rows: Arc<Mutex<ReferenceRows>>,
    securities: Arc<Mutex<HashMap<SecurityKey, Security>>>,
    trades: Arc<Mutex<HashMap<Uuid, TradeRow>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            reference_rows: Arc::new(Mutex::new(ReferenceRows::default())),
            securities: Arc::new(Mutex::new(HashMap::new())),
            trades: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of distinct securities stored.
    pub fn security_count(&self) -> Result<usize> {
        Ok(guard(&self.securities)?.len())
    }

    pub fn all_trades(&self) -> Result<Vec<TradeRow>> {
        let mut trades: Vec<TradeRow> = guard(&self.trades)?.values().cloned().collect();
        trades.sort_by(|a, b| (&a.source_id, a.row_number).cmp(&(&b.source_id, b.row_number)));
        Ok(trades)
    }
}

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| IngestError::storage("in-memory store lock poisoned"))
}

fn security_key(security: &Security) -> Result<SecurityKey> {
    let ticker = security
        .ticker
        .clone()
        .ok_or_else(|| IngestError::storage(format!("security '{}' has no ticker", security.name)))?;
    Ok((ticker, security.exchange))
}

fn check_references(rows: &ReferenceRows, security: &Security) -> Result<()> {
    if let Some(exchange) = security.exchange {
        if !rows.exchanges.contains(&exchange) {
            return Err(IngestError::storage(format!("exchange {} is not registered", exchange)));
        }
    }
    if let Some(asset_type) = security.asset_type {
        if !rows.asset_types.contains(&asset_type) {
            return Err(IngestError::storage(format!("asset type {} is not registered", asset_type)));
        }
    }
    if let Some(sector) = &security.sector {
        if !rows.sectors.contains(sector) {
            return Err(IngestError::storage(format!("sector '{}' is not registered", sector)));
        }
    }
    Ok(())
}

fn fill_missing(existing: &mut Security, incoming: &Security) -> bool {
    let mut changed = false;
    if existing.asset_type.is_none() && incoming.asset_type.is_some() {
        existing.asset_type = incoming.asset_type;
        changed = true;
    }
    if existing.sector.is_none() && incoming.sector.is_some() {
        existing.sector = incoming.sector.clone();
        changed = true;
    }
    if existing.name.is_empty() && !incoming.name.is_empty() {
        existing.name = incoming.name.clone();
        changed = true;
    }
    changed
}

#[async_trait]
impl SecurityStore for InMemoryStore {
    async fn upsert_reference_rows(
        &self,
        exchanges: &[Exchange],
        asset_types: &[AssetType],
        sectors: &BTreeSet<String>,
    ) -> Result<ReferenceRowsInserted> {
        let mut rows = guard(&self.reference_rows)?;
        let inserted = ReferenceRowsInserted {
            exchanges: exchanges.iter().filter(|e| rows.exchanges.insert(**e)).count(),
            asset_types: asset_types.iter().filter(|a| rows.asset_types.insert(**a)).count(),
            sectors: sectors.iter().filter(|s| rows.sectors.insert((*s).clone())).count(),
        };
        debug!("Upserted reference rows: {} new", inserted.total());
        Ok(inserted)
    }

    async fn find_by_ticker(&self, ticker: &str) -> Result<Vec<Security>> {
        let securities = guard(&self.securities)?;
        let mut found: Vec<Security> = securities
            .iter()
            .filter(|((t, _), _)| t == ticker)
            .map(|(_, s)| s.clone())
            .collect();
        found.sort_by_key(|s| s.exchange);
        Ok(found)
    }

    async fn find(&self, ticker: &str, exchange: Option<Exchange>) -> Result<Option<Security>> {
        let securities = guard(&self.securities)?;
        Ok(securities.get(&(ticker.to_string(), exchange)).cloned())
    }

    async fn list_securities(&self) -> Result<Vec<Security>> {
        let securities = guard(&self.securities)?;
        let mut all: Vec<Security> = securities.values().cloned().collect();
        all.sort_by(|a, b| (&a.ticker, a.exchange).cmp(&(&b.ticker, b.exchange)));
        Ok(all)
    }

    async fn upsert_security(&self, security: &Security) -> Result<Security> {
        let key = security_key(security)?;
        {
            let rows = guard(&self.reference_rows)?;
            check_references(&rows, security)?;
        }

        let mut securities = guard(&self.securities)?;
        if let Some(existing) = securities.get_mut(&key) {
            if fill_missing(existing, security) {
                debug!("Filled missing fields on security {}", key.0);
            }
            return Ok(existing.clone());
        }

        let mut stored = security.clone();
        stored.id = Some(stored.id.unwrap_or_else(Uuid::new_v4));
        securities.insert(key, stored.clone());
        debug!("Created security {:?} with id {:?}", stored.ticker, stored.id);
        Ok(stored)
    }

    async fn insert_security(&self, security: &Security) -> Result<Security> {
        let key = security_key(security)?;
        {
            let rows = guard(&self.reference_rows)?;
            check_references(&rows, security)?;
        }

        let mut securities = guard(&self.securities)?;
        if securities.contains_key(&key) {
            return Err(IngestError::DuplicateSecurity {
                ticker: key.0,
                exchange: key.1.map(|e| e.to_string()).unwrap_or_else(|| "NONE".to_string()),
            });
        }
        let mut stored = security.clone();
        stored.id = Some(stored.id.unwrap_or_else(Uuid::new_v4));
        securities.insert(key, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TradeRepository for InMemoryStore {
    async fn commit_sub_batch(&self, trades: &[TradeRow]) -> Result<usize> {
        let mut stored = guard(&self.trades)?;
        let mut created = 0;
        for trade in trades {
            match stored.get_mut(&trade.trade_id) {
                Some(existing) => {
                    // A link made by an earlier backfill survives a re-run
                    let security_id = existing.security_id.or(trade.security_id);
                    *existing = trade.clone();
                    existing.security_id = security_id;
                }
                None => {
                    stored.insert(trade.trade_id, trade.clone());
                    created += 1;
                }
            }
        }
        debug!("Committed sub-batch of {} trades ({} new)", trades.len(), created);
        Ok(created)
    }

    async fn get_trade(&self, trade_id: Uuid) -> Result<Option<TradeRow>> {
        Ok(guard(&self.trades)?.get(&trade_id).cloned())
    }

    async fn unlinked_trades(&self) -> Result<Vec<TradeRow>> {
        let stored = guard(&self.trades)?;
        let mut unlinked: Vec<TradeRow> = stored
            .values()
            .filter(|t| t.security_id.is_none())
            .cloned()
            .collect();
        unlinked.sort_by(|a, b| (&a.source_id, a.row_number).cmp(&(&b.source_id, b.row_number)));
        Ok(unlinked)
    }

    async fn link_security(&self, trade_id: Uuid, security_id: Uuid) -> Result<bool> {
        let mut stored = guard(&self.trades)?;
        let trade = stored
            .get_mut(&trade_id)
            .ok_or_else(|| IngestError::storage(format!("trade {} not found", trade_id)))?;
        if trade.security_id.is_some() {
            return Ok(false);
        }
        trade.security_id = Some(security_id);
        Ok(true)
    }

    async fn count_trades(&self) -> Result<usize> {
        Ok(guard(&self.trades)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OwnerCode;
    use crate::pipeline::storage::TradeStatus;

    fn create_test_security(ticker: &str, exchange: Exchange) -> Security {
        Security {
            id: None,
            ticker: Some(ticker.to_string()),
            name: format!("{} Inc", ticker),
            exchange: Some(exchange),
            asset_type: Some(AssetType::Stock),
            sector: None,
        }
    }

    fn create_test_trade(row: u64) -> TradeRow {
        TradeRow {
            trade_id: Uuid::new_v4(),
            source_id: "filing".to_string(),
            row_number: row,
            status: TradeStatus::Resolved,
            asset_description: "Apple Inc".to_string(),
            ticker: Some("AAPL".to_string()),
            ticker_confidence: 0.9,
            amount_min: Some(100_100),
            amount_max: Some(1_500_000),
            amount_exact: None,
            amount_confidence: 1.0,
            owner_code: OwnerCode::Filer,
            owner_confidence: 0.6,
            misaligned: false,
            transaction_type: None,
            transaction_date: None,
            security_id: None,
        }
    }

    async fn create_test_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let sectors: BTreeSet<String> = ["Financials".to_string()].into_iter().collect();
        store
            .upsert_reference_rows(&Exchange::all(), &AssetType::all(), &sectors)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_reference_rows_upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let sectors = BTreeSet::new();
        let first = store.upsert_reference_rows(&Exchange::all(), &[], &sectors).await.unwrap();
        let second = store.upsert_reference_rows(&Exchange::all(), &[], &sectors).await.unwrap();
        assert_eq!(first.exchanges, 4);
        assert_eq!(second.total(), 0);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_key() {
        let store = create_test_store().await;
        let a = store.upsert_security(&create_test_security("AAPL", Exchange::Nasdaq)).await.unwrap();
        let mut again = create_test_security("AAPL", Exchange::Nasdaq);
        again.sector = Some("Financials".to_string());
        let b = store.upsert_security(&again).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(b.sector.as_deref(), Some("Financials"));
        assert_eq!(store.security_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_strict_insert_rejects_duplicates() {
        let store = create_test_store().await;
        store.insert_security(&create_test_security("GS", Exchange::Nyse)).await.unwrap();
        let err = store
            .insert_security(&create_test_security("GS", Exchange::Nyse))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::DuplicateSecurity { .. }));
        // Same ticker on another exchange is a different key
        store.insert_security(&create_test_security("GS", Exchange::Otc)).await.unwrap();
        assert_eq!(store.find_by_ticker("GS").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_reference_row_is_rejected() {
        let store = InMemoryStore::new();
        let err = store
            .upsert_security(&create_test_security("AAPL", Exchange::Nasdaq))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_create_single_security() {
        let store = Arc::new(create_test_store().await);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.upsert_security(&create_test_security("MSFT", Exchange::Nasdaq)).await
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(store.security_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_link_only_when_unset_and_survives_recommit() {
        let store = create_test_store().await;
        let trade = create_test_trade(1);
        assert_eq!(store.commit_sub_batch(&[trade.clone()]).await.unwrap(), 1);

        let security_id = Uuid::new_v4();
        assert!(store.link_security(trade.trade_id, security_id).await.unwrap());
        assert!(!store.link_security(trade.trade_id, Uuid::new_v4()).await.unwrap());

        assert_eq!(store.commit_sub_batch(&[trade.clone()]).await.unwrap(), 0);
        let stored = store.get_trade(trade.trade_id).await.unwrap().unwrap();
        assert_eq!(stored.security_id, Some(security_id));
        assert!(store.unlinked_trades().await.unwrap().is_empty());
    }
}
