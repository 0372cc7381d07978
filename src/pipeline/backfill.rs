use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::Security;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::enrich::security_match_name;
use crate::pipeline::processing::similarity::name_similarity;
use crate::pipeline::processing::ticker::TickerExtractor;
use crate::pipeline::storage::{SecurityStore, TradeRepository, TradeRow};
use crate::reference::ReferenceData;

/// How an unlinked trade was matched to a stored security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillStrategy {
    Ticker,
    AssetName,
    DescriptionTicker,
}

impl BackfillStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackfillStrategy::Ticker => "ticker",
            BackfillStrategy::AssetName => "asset_name",
            BackfillStrategy::DescriptionTicker => "description_ticker",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillOutcome {
    pub trades_linked: usize,
    pub trades_unresolved: usize,
    /// Trades still without a security after this run
    pub unresolved: Vec<TradeRow>,
}

/// Links stored trades to securities. Converges: once every linkable trade is linked,
/// another run changes nothing.
pub struct TradeBackfiller {
    tickers: TickerExtractor,
    name_similarity_threshold: f64,
}

impl TradeBackfiller {
    pub fn new(reference: Arc<ReferenceData>, name_similarity_threshold: f64) -> Self {
        Self {
            tickers: TickerExtractor::new(reference),
            name_similarity_threshold,
        }
    }

    #[instrument(skip_all)]
    pub async fn backfill(
        &self,
        trades: &dyn TradeRepository,
        securities: &dyn SecurityStore,
    ) -> Result<BackfillOutcome> {
        let unlinked = trades.unlinked_trades().await?;
        if unlinked.is_empty() {
            debug!("No unlinked trades to backfill");
            return Ok(BackfillOutcome::default());
        }
        let candidates = securities.list_securities().await?;

        let mut outcome = BackfillOutcome::default();
        for trade in unlinked {
            let matched = self.match_trade(&trade, securities, &candidates).await?;
            let Some((security_id, strategy)) = matched else {
                outcome.unresolved.push(trade);
                continue;
            };
            if trades.link_security(trade.trade_id, security_id).await? {
                debug!(
                    "Linked trade {} to security {} via {}",
                    trade.trade_id,
                    security_id,
                    strategy.as_str()
                );
                metrics::backfill::linked(strategy.as_str());
                outcome.trades_linked += 1;
            }
        }

        outcome.trades_unresolved = outcome.unresolved.len();
        metrics::backfill::unresolved(outcome.trades_unresolved as u64);
        info!(
            "Backfill linked {} trades, {} unresolved",
            outcome.trades_linked, outcome.trades_unresolved
        );
        Ok(outcome)
    }

    async fn match_trade(
        &self,
        trade: &TradeRow,
        securities: &dyn SecurityStore,
        candidates: &[Security],
    ) -> Result<Option<(Uuid, BackfillStrategy)>> {
        if let Some(ticker) = trade.ticker.as_deref() {
            if let Some(id) = first_id(securities.find_by_ticker(ticker).await?) {
                return Ok(Some((id, BackfillStrategy::Ticker)));
            }
        }

        if let Some(id) = self.match_by_name(&trade.asset_description, candidates) {
            return Ok(Some((id, BackfillStrategy::AssetName)));
        }

        let extracted = self.tickers.extract(None, &trade.asset_description);
        if let Some(ticker) = extracted.value() {
            if trade.ticker.as_deref() != Some(ticker.as_str()) {
                if let Some(id) = first_id(securities.find_by_ticker(ticker).await?) {
                    return Ok(Some((id, BackfillStrategy::DescriptionTicker)));
                }
            }
        }

        Ok(None)
    }

    /// Best-scoring stored security at or above the threshold; the earlier candidate wins ties.
    fn match_by_name(&self, description: &str, candidates: &[Security]) -> Option<Uuid> {
        let wanted = security_match_name(description);
        if wanted.is_empty() {
            return None;
        }

        let mut best: Option<(f64, Uuid)> = None;
        for candidate in candidates {
            let Some(id) = candidate.id else { continue };
            let score = name_similarity(&wanted, &security_match_name(&candidate.name));
            if score < self.name_similarity_threshold {
                continue;
            }
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, id));
            }
        }
        best.map(|(_, id)| id)
    }
}

fn first_id(found: Vec<Security>) -> Option<Uuid> {
    found.into_iter().find_map(|s| s.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetType, Exchange, OwnerCode};
    use crate::pipeline::storage::{InMemoryStore, TradeStatus};
    use std::collections::BTreeSet;

    fn create_test_trade(row: u64, description: &str, ticker: Option<&str>) -> TradeRow {
        TradeRow {
            trade_id: Uuid::new_v4(),
            source_id: "filing".to_string(),
            row_number: row,
            status: TradeStatus::NeedsReview,
            asset_description: description.to_string(),
            ticker: ticker.map(str::to_string),
            ticker_confidence: 0.0,
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
        store
            .upsert_reference_rows(&Exchange::all(), &AssetType::all(), &BTreeSet::new())
            .await
            .unwrap();
        for (ticker, name) in [("AAPL", "Apple Inc. (AAPL)"), ("XOM", "Exxon Mobil Corporation")] {
            store
                .upsert_security(&Security {
                    id: None,
                    ticker: Some(ticker.to_string()),
                    name: name.to_string(),
                    exchange: Some(Exchange::Nyse),
                    asset_type: Some(AssetType::Stock),
                    sector: None,
                })
                .await
                .unwrap();
        }
        store
    }

    fn create_test_backfiller() -> TradeBackfiller {
        TradeBackfiller::new(Arc::new(ReferenceData::builtin()), 0.85)
    }

    #[tokio::test]
    async fn test_links_by_ticker_then_name_then_description() {
        let store = create_test_store().await;
        store
            .commit_sub_batch(&[
                create_test_trade(1, "whatever", Some("AAPL")),
                create_test_trade(2, "EXXON MOBIL CORP", None),
                create_test_trade(3, "Cupertino hardware maker (AAPL) [ST]", Some("AAPLX")),
                create_test_trade(4, "Private partnership", None),
            ])
            .await
            .unwrap();

        let outcome = create_test_backfiller().backfill(&store, &store).await.unwrap();
        assert_eq!(outcome.trades_linked, 3);
        assert_eq!(outcome.trades_unresolved, 1);
        assert_eq!(outcome.unresolved[0].row_number, 4);
    }

    #[tokio::test]
    async fn test_second_run_links_nothing() {
        let store = create_test_store().await;
        store
            .commit_sub_batch(&[
                create_test_trade(1, "Apple", Some("AAPL")),
                create_test_trade(2, "Unknown fund", None),
            ])
            .await
            .unwrap();

        let backfiller = create_test_backfiller();
        let first = backfiller.backfill(&store, &store).await.unwrap();
        assert_eq!(first.trades_linked, 1);

        let second = backfiller.backfill(&store, &store).await.unwrap();
        assert_eq!(second.trades_linked, 0);
        assert_eq!(second.trades_unresolved, 1);
    }

    #[test]
    fn test_name_match_respects_threshold() {
        let backfiller = create_test_backfiller();
        let candidate = Security {
            id: Some(Uuid::new_v4()),
            ticker: Some("XOM".to_string()),
            name: "Exxon Mobil Corporation".to_string(),
            exchange: Some(Exchange::Nyse),
            asset_type: Some(AssetType::Stock),
            sector: None,
        };
        assert_eq!(
            backfiller.match_by_name("Exxon Mobil Corp.", std::slice::from_ref(&candidate)),
            candidate.id
        );
        assert_eq!(backfiller.match_by_name("Chevron", &[candidate]), None);
    }
}
