use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{AssetType, Exchange, SectorStatus, Security};
use crate::error::{FieldFailure, Result};
use crate::pipeline::processing::text::{
    asset_code, contains_phrase, normalize_company_name, strip_asset_codes,
};
use crate::pipeline::storage::{ReferenceRowsInserted, SecurityStore};
use crate::reference::ReferenceData;

/// Phrases (matched on the lowercased description) for each non-stock asset type.
const CASH_PHRASES: &[&str] = &["cash", "money market", "sweep account", "bank deposit", "certificate of deposit"];
const BOND_PHRASES: &[&str] = &[
    "treasury", "t bill", "t bills", "municipal", "muni", "bond", "bonds", "note", "notes", "debenture",
];
const GOVERNMENT_PHRASES: &[&str] = &["treasury", "t bill", "t bills", "municipal", "muni", "government"];
const REIT_PHRASES: &[&str] = &["reit", "real estate investment trust"];
const ADR_PHRASES: &[&str] = &["adr", "ads", "american depositary", "depositary receipt", "depositary shares"];

/// A security after enrichment, with the fields that stayed unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSecurity {
    pub security: Security,
    /// Distinguishes a legitimately sector-less position from an unresolved one
    pub sector_status: SectorStatus,
    /// Non-fatal gaps; never includes fields that simply do not apply
    pub gaps: Vec<FieldFailure>,
}

/// Fills missing security metadata. Populated fields are never overwritten.
pub trait Enricher {
    fn enrich(&self, stub: &Security) -> EnrichedSecurity;
}

pub struct SecurityEnricher {
    reference: Arc<ReferenceData>,
}

impl SecurityEnricher {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    /// Make sure every exchange, asset type and sector the enricher can assign exists
    /// in the store. Safe to call repeatedly.
    pub async fn register_reference_rows<S>(&self, store: &S) -> Result<ReferenceRowsInserted>
    where
        S: SecurityStore + ?Sized,
    {
        let inserted = store
            .upsert_reference_rows(
                &self.reference.exchanges(),
                &self.reference.asset_types(),
                &self.reference.sectors(),
            )
            .await?;
        if inserted.total() > 0 {
            debug!(
                "Registered reference rows: {} exchanges, {} asset types, {} sectors",
                inserted.exchanges, inserted.asset_types, inserted.sectors
            );
        }
        Ok(inserted)
    }

    fn infer_asset_type(&self, security: &Security, text: &str) -> AssetType {
        if let Some(from_code) = asset_code(&security.name).and_then(|code| asset_type_for_code(&code)) {
            return from_code;
        }
        if any_phrase(text, CASH_PHRASES) {
            return AssetType::Cash;
        }
        if any_phrase(text, BOND_PHRASES) {
            return AssetType::Bond;
        }
        let known_etf = security
            .ticker
            .as_deref()
            .is_some_and(|t| self.reference.is_etf_ticker(t));
        if known_etf || self.reference.etf_keywords().iter().any(|k| contains_phrase(text, k)) {
            return AssetType::Etf;
        }
        if any_phrase(text, REIT_PHRASES) {
            return AssetType::Reit;
        }
        if any_phrase(text, ADR_PHRASES) {
            return AssetType::Adr;
        }
        AssetType::Stock
    }

    fn infer_exchange(&self, ticker: Option<&str>, asset_type: Option<AssetType>) -> Option<Exchange> {
        if asset_type == Some(AssetType::Cash) {
            return Some(Exchange::Cash);
        }
        let ticker = ticker?;
        // Five-letter symbols ending in F are foreign ordinaries quoted over the counter
        if ticker.len() == 5 && ticker.ends_with('F') {
            return Some(Exchange::Otc);
        }
        if self.reference.is_nasdaq_listed(ticker) {
            return Some(Exchange::Nasdaq);
        }
        Some(Exchange::Nyse)
    }

    fn infer_sector(&self, security: &Security, text: &str) -> (Option<String>, SectorStatus) {
        let government = security.asset_type == Some(AssetType::Bond)
            && (any_phrase(text, GOVERNMENT_PHRASES) || asset_code(&security.name).as_deref() == Some("GS"));
        if security.asset_type == Some(AssetType::Cash) || government {
            return (None, SectorStatus::NotApplicable);
        }

        if let Some(sector) = security
            .ticker
            .as_deref()
            .and_then(|t| self.reference.sector_for_ticker(t))
        {
            return (Some(sector.to_string()), SectorStatus::Known);
        }

        if let Some(hit) = self
            .reference
            .sector_keywords()
            .iter()
            .find(|k| contains_phrase(text, &k.keyword))
        {
            return (Some(hit.sector.clone()), SectorStatus::Known);
        }

        match security.asset_type {
            Some(AssetType::Etf) | Some(AssetType::MutualFund) => (None, SectorStatus::NotApplicable),
            _ => (None, SectorStatus::Unknown),
        }
    }
}

impl Enricher for SecurityEnricher {
    fn enrich(&self, stub: &Security) -> EnrichedSecurity {
        let mut security = stub.clone();
        let text = description_text(&stub.name);
        let mut gaps = Vec::new();

        if security.asset_type.is_none() {
            security.asset_type = Some(self.infer_asset_type(&security, &text));
        }

        if security.exchange.is_none() {
            security.exchange = self.infer_exchange(security.ticker.as_deref(), security.asset_type);
        }
        if security.exchange.is_none() {
            gaps.push(FieldFailure::EnrichmentGap {
                field: "exchange".to_string(),
            });
        }

        let sector_status = if security.sector.is_some() {
            SectorStatus::Known
        } else {
            let (sector, status) = self.infer_sector(&security, &text);
            security.sector = sector;
            status
        };
        if sector_status == SectorStatus::Unknown {
            gaps.push(FieldFailure::EnrichmentGap {
                field: "sector".to_string(),
            });
        }

        EnrichedSecurity {
            security,
            sector_status,
            gaps,
        }
    }
}

/// Disclosure asset-type codes.
fn asset_type_for_code(code: &str) -> Option<AssetType> {
    match code {
        "ST" => Some(AssetType::Stock),
        "EF" => Some(AssetType::Etf),
        "GS" | "CS" => Some(AssetType::Bond),
        "OP" => Some(AssetType::StockOption),
        "MF" => Some(AssetType::MutualFund),
        "RE" => Some(AssetType::Reit),
        _ => None,
    }
}

/// Asset type from an upstream asset-type column: a disclosure code or a type name.
pub fn asset_type_from_label(label: &str) -> Option<AssetType> {
    let key = label.trim().trim_matches(|c| c == '[' || c == ']').to_uppercase();
    asset_type_for_code(&key).or(match key.replace('_', " ").as_str() {
        "STOCK" | "COMMON STOCK" => Some(AssetType::Stock),
        "ETF" => Some(AssetType::Etf),
        "BOND" | "CORPORATE BOND" | "MUNICIPAL BOND" | "TREASURY" => Some(AssetType::Bond),
        "CASH" => Some(AssetType::Cash),
        "REIT" => Some(AssetType::Reit),
        "ADR" => Some(AssetType::Adr),
        "OPTION" | "STOCK OPTION" | "OPTIONS" => Some(AssetType::StockOption),
        "MUTUAL FUND" => Some(AssetType::MutualFund),
        _ => None,
    })
}

/// Lowercased words of the description, punctuation removed, corporate suffixes kept.
fn description_text(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn any_phrase(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(text, p))
}

/// Name form used when matching a stored security by name.
pub fn security_match_name(name: &str) -> String {
    normalize_company_name(&strip_asset_codes(name))
}
