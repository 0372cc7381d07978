//! Domain data shapes shared across the pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TRADE_ID_NAMESPACE;
use crate::error::FieldFailure;

/// One input row exactly as the upstream reader produced it.
/// Raw records are never mutated; every stage works on borrowed views or cleaned copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTradeRecord {
    /// Upstream file or filing identifier
    pub source_id: String,
    /// Position of the row within the source
    pub row_number: u64,
    #[serde(default)]
    pub filer: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub asset_description: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub notification_date: Option<String>,
}

impl RawTradeRecord {
    pub fn new(source_id: impl Into<String>, row_number: u64, asset_description: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            row_number,
            filer: None,
            owner: None,
            asset_description: asset_description.into(),
            ticker: None,
            asset_type: None,
            amount: None,
            transaction_type: None,
            transaction_date: None,
            notification_date: None,
        }
    }

    pub fn with_ticker(mut self, ticker: &str) -> Self {
        self.ticker = Some(ticker.to_string());
        self
    }

    pub fn with_amount(mut self, amount: &str) -> Self {
        self.amount = Some(amount.to_string());
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_transaction(mut self, transaction_type: &str, transaction_date: &str) -> Self {
        self.transaction_type = Some(transaction_type.to_string());
        self.transaction_date = Some(transaction_date.to_string());
        self
    }

    /// Stable id derived from the row's position in its source, so re-running
    /// a sub-batch addresses the same trade rows.
    pub fn trade_id(&self) -> Uuid {
        let key = format!("{}#{}", self.source_id, self.row_number);
        Uuid::new_v5(&TRADE_ID_NAMESPACE, key.as_bytes())
    }
}

/// Owner of the disclosed asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerCode {
    /// The filer
    #[serde(rename = "C")]
    Filer,
    #[serde(rename = "SP")]
    Spouse,
    #[serde(rename = "JT")]
    Joint,
    #[serde(rename = "DC")]
    DependentChild,
}

impl OwnerCode {
    pub fn as_code(&self) -> &'static str {
        match self {
            OwnerCode::Filer => "C",
            OwnerCode::Spouse => "SP",
            OwnerCode::Joint => "JT",
            OwnerCode::DependentChild => "DC",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" => Some(OwnerCode::Filer),
            "SP" => Some(OwnerCode::Spouse),
            "JT" => Some(OwnerCode::Joint),
            "DC" => Some(OwnerCode::DependentChild),
            _ => None,
        }
    }
}

impl fmt::Display for OwnerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Sale,
    PartialSale,
    Exchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Stock,
    Etf,
    Bond,
    Cash,
    Reit,
    Adr,
    #[serde(rename = "OPTION")]
    StockOption,
    MutualFund,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "STOCK",
            AssetType::Etf => "ETF",
            AssetType::Bond => "BOND",
            AssetType::Cash => "CASH",
            AssetType::Reit => "REIT",
            AssetType::Adr => "ADR",
            AssetType::StockOption => "OPTION",
            AssetType::MutualFund => "MUTUAL_FUND",
        }
    }

    pub fn all() -> [AssetType; 8] {
        [
            AssetType::Stock,
            AssetType::Etf,
            AssetType::Bond,
            AssetType::Cash,
            AssetType::Reit,
            AssetType::Adr,
            AssetType::StockOption,
            AssetType::MutualFund,
        ]
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Exchange {
    Nyse,
    Nasdaq,
    Otc,
    Cash,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nyse => "NYSE",
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Otc => "OTC",
            Exchange::Cash => "CASH",
        }
    }

    pub fn all() -> [Exchange; 4] {
        [Exchange::Nyse, Exchange::Nasdaq, Exchange::Otc, Exchange::Cash]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a missing sector is a real gap or simply does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorStatus {
    Known,
    /// Cash and government positions carry no sector
    NotApplicable,
    Unknown,
}

/// A security, possibly only partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub id: Option<Uuid>,
    pub ticker: Option<String>,
    pub name: String,
    pub exchange: Option<Exchange>,
    pub asset_type: Option<AssetType>,
    pub sector: Option<String>,
}

impl Security {
    pub fn stub(ticker: Option<&str>, name: &str) -> Self {
        Self {
            id: None,
            ticker: ticker.map(str::to_string),
            name: name.to_string(),
            exchange: None,
            asset_type: None,
            sector: None,
        }
    }
}

/// Tagged outcome of a field-level stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution<T, S> {
    Resolved { value: T, confidence: f64, source: S },
    Unresolved { reason: FieldFailure },
}

impl<T, S: Copy> Resolution<T, S> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    /// Unresolved results always report zero confidence.
    pub fn confidence(&self) -> f64 {
        match self {
            Resolution::Resolved { confidence, .. } => *confidence,
            Resolution::Unresolved { .. } => 0.0,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Resolution::Resolved { value, .. } => Some(value),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn source(&self) -> Option<S> {
        match self {
            Resolution::Resolved { source, .. } => Some(*source),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FieldFailure> {
        match self {
            Resolution::Resolved { .. } => None,
            Resolution::Unresolved { reason } => Some(reason),
        }
    }
}
