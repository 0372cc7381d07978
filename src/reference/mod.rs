//! Immutable reference data injected into every stage.
//!
//! Built once per process (from the curated tables, optionally extended by a TOML file),
//! validated, then shared through an `Arc`. A malformed file is the one fatal condition
//! of the pipeline since every record depends on these tables.

pub mod builtin;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{AssetType, Exchange, OwnerCode};
use crate::error::{IngestError, Result};
use crate::pipeline::processing::text::normalize_company_name;

/// Canonical ticker form after normalization (`.` already mapped to `-`).
static CANONICAL_TICKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,5}(-[A-Z])?$").expect("valid ticker regex"));

/// A company name keyword and the ticker it resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyTicker {
    /// Normalized with [`normalize_company_name`]
    pub name: String,
    pub ticker: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorKeyword {
    pub keyword: String,
    pub sector: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerSynonym {
    pub value: String,
    pub owner: OwnerCode,
}

/// On-disk shape of a reference-data file. Every table is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceFile {
    /// Start from empty tables instead of the curated ones
    #[serde(default)]
    pub replace_builtin: bool,
    #[serde(default)]
    pub company_tickers: Vec<CompanyTickerEntry>,
    #[serde(default)]
    pub ticker_aliases: HashMap<String, String>,
    #[serde(default)]
    pub excluded_tokens: Vec<String>,
    #[serde(default)]
    pub share_class_roots: Vec<String>,
    #[serde(default)]
    pub etf_tickers: Vec<String>,
    #[serde(default)]
    pub etf_keywords: Vec<String>,
    #[serde(default)]
    pub nasdaq_tickers: Vec<String>,
    #[serde(default)]
    pub ticker_sectors: HashMap<String, String>,
    #[serde(default)]
    pub sector_keywords: Vec<SectorKeywordEntry>,
    #[serde(default)]
    pub owner_synonyms: Vec<OwnerSynonymEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CompanyTickerEntry {
    pub name: String,
    pub ticker: String,
}

#[derive(Debug, Deserialize)]
pub struct SectorKeywordEntry {
    pub keyword: String,
    pub sector: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerSynonymEntry {
    pub value: String,
    /// One of C, SP, JT, DC
    pub owner: String,
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    company_tickers: Vec<CompanyTicker>,
    company_index: HashMap<String, String>,
    ticker_aliases: HashMap<String, String>,
    excluded_tokens: HashSet<String>,
    share_class_roots: HashSet<String>,
    etf_tickers: HashSet<String>,
    etf_keywords: Vec<String>,
    nasdaq_tickers: HashSet<String>,
    ticker_sectors: HashMap<String, String>,
    sector_keywords: Vec<SectorKeyword>,
    owner_synonyms: Vec<OwnerSynonym>,
}

impl ReferenceData {
    /// The curated tables shipped with the crate.
    pub fn builtin() -> Self {
        let mut data = Self::empty();
        data.extend_company_tickers(builtin::COMPANY_TICKERS.iter().map(|(n, t)| (n.to_string(), t.to_string())));
        data.ticker_aliases = builtin::TICKER_ALIASES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        data.excluded_tokens = builtin::EXCLUDED_TOKENS.iter().map(|s| s.to_string()).collect();
        data.share_class_roots = builtin::SHARE_CLASS_ROOTS.iter().map(|s| s.to_string()).collect();
        data.etf_tickers = builtin::ETF_TICKERS.iter().map(|s| s.to_string()).collect();
        data.etf_keywords = builtin::ETF_KEYWORDS.iter().map(|s| s.to_string()).collect();
        data.nasdaq_tickers = builtin::NASDAQ_TICKERS.iter().map(|s| s.to_string()).collect();
        data.ticker_sectors = builtin::TICKER_SECTORS
            .iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect();
        data.sector_keywords = builtin::SECTOR_KEYWORDS
            .iter()
            .map(|(k, s)| SectorKeyword {
                keyword: k.to_string(),
                sector: s.to_string(),
            })
            .collect();
        data.owner_synonyms = builtin::OWNER_SYNONYMS
            .iter()
            .map(|(v, o)| OwnerSynonym {
                value: v.to_string(),
                owner: *o,
            })
            .collect();
        data
    }

    fn empty() -> Self {
        Self {
            company_tickers: Vec::new(),
            company_index: HashMap::new(),
            ticker_aliases: HashMap::new(),
            excluded_tokens: HashSet::new(),
            share_class_roots: HashSet::new(),
            etf_tickers: HashSet::new(),
            etf_keywords: Vec::new(),
            nasdaq_tickers: HashSet::new(),
            ticker_sectors: HashMap::new(),
            sector_keywords: Vec::new(),
            owner_synonyms: Vec::new(),
        }
    }

    /// Load from a TOML file. Entries from the file take priority over curated ones.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::ReferenceData(format!("Failed to read reference data '{}': {}", path.display(), e))
        })?;
        let data = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            companies = data.company_tickers.len(),
            synonyms = data.owner_synonyms.len(),
            "Loaded reference data"
        );
        Ok(data)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ReferenceFile = toml::from_str(content)
            .map_err(|e| IngestError::ReferenceData(format!("Malformed reference data: {}", e)))?;
        Self::from_file(file)
    }

    pub fn from_file(file: ReferenceFile) -> Result<Self> {
        let base = if file.replace_builtin {
            Self::empty()
        } else {
            Self::builtin()
        };

        let mut data = Self::empty();
        data.extend_company_tickers(
            file.company_tickers
                .into_iter()
                .map(|e| (e.name, e.ticker.trim().to_uppercase().replace('.', "-"))),
        );
        data.extend_company_tickers(base.company_tickers.into_iter().map(|c| (c.name, c.ticker)));

        data.ticker_aliases = base.ticker_aliases;
        for (from, to) in file.ticker_aliases {
            data.ticker_aliases
                .insert(from.trim().to_uppercase(), to.trim().to_uppercase().replace('.', "-"));
        }

        data.excluded_tokens = base.excluded_tokens;
        data.excluded_tokens
            .extend(file.excluded_tokens.iter().map(|s| s.trim().to_uppercase()));
        data.share_class_roots = base.share_class_roots;
        data.share_class_roots
            .extend(file.share_class_roots.iter().map(|s| s.trim().to_uppercase()));
        data.etf_tickers = base.etf_tickers;
        data.etf_tickers
            .extend(file.etf_tickers.iter().map(|s| s.trim().to_uppercase()));
        data.etf_keywords = file
            .etf_keywords
            .iter()
            .map(|s| s.trim().to_lowercase())
            .chain(base.etf_keywords)
            .collect();
        data.nasdaq_tickers = base.nasdaq_tickers;
        data.nasdaq_tickers
            .extend(file.nasdaq_tickers.iter().map(|s| s.trim().to_uppercase()));

        data.ticker_sectors = base.ticker_sectors;
        for (ticker, sector) in file.ticker_sectors {
            data.ticker_sectors
                .insert(ticker.trim().to_uppercase().replace('.', "-"), sector.trim().to_string());
        }
        data.sector_keywords = file
            .sector_keywords
            .into_iter()
            .map(|e| SectorKeyword {
                keyword: e.keyword.trim().to_lowercase(),
                sector: e.sector.trim().to_string(),
            })
            .chain(base.sector_keywords)
            .collect();

        let mut synonyms = Vec::with_capacity(file.owner_synonyms.len());
        for entry in file.owner_synonyms {
            let owner = OwnerCode::from_code(entry.owner.trim()).ok_or_else(|| {
                IngestError::ReferenceData(format!(
                    "Owner synonym '{}' maps to unknown owner code '{}'",
                    entry.value, entry.owner
                ))
            })?;
            synonyms.push(OwnerSynonym {
                value: entry.value.trim().to_uppercase(),
                owner,
            });
        }
        synonyms.extend(base.owner_synonyms);
        data.owner_synonyms = synonyms;

        data.validate()?;
        Ok(data)
    }

    fn extend_company_tickers<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, ticker) in entries {
            let name = normalize_company_name(&name);
            if self.company_index.contains_key(&name) {
                debug!(name = %name, "Skipping lower-priority duplicate company entry");
                continue;
            }
            self.company_index.insert(name.clone(), ticker.clone());
            self.company_tickers.push(CompanyTicker { name, ticker });
        }
    }

    /// Reject tables that would make stage output invalid.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.company_tickers {
            if entry.name.is_empty() {
                return Err(IngestError::ReferenceData(format!(
                    "Company entry for '{}' has an empty name after normalization",
                    entry.ticker
                )));
            }
            if !CANONICAL_TICKER.is_match(&entry.ticker) {
                return Err(IngestError::ReferenceData(format!(
                    "Company '{}' maps to invalid ticker '{}'",
                    entry.name, entry.ticker
                )));
            }
        }
        for (from, to) in &self.ticker_aliases {
            if !CANONICAL_TICKER.is_match(to) {
                return Err(IngestError::ReferenceData(format!(
                    "Alias '{}' maps to invalid ticker '{}'",
                    from, to
                )));
            }
        }
        for (ticker, sector) in &self.ticker_sectors {
            if sector.is_empty() {
                return Err(IngestError::ReferenceData(format!("Ticker '{}' has an empty sector", ticker)));
            }
        }
        if let Some(empty) = self.owner_synonyms.iter().find(|s| s.value.is_empty()) {
            return Err(IngestError::ReferenceData(format!(
                "Empty owner synonym for code {}",
                empty.owner
            )));
        }
        if self.owner_synonyms.is_empty() {
            return Err(IngestError::ReferenceData("Owner synonym table is empty".to_string()));
        }
        Ok(())
    }

    pub fn company_tickers(&self) -> &[CompanyTicker] {
        &self.company_tickers
    }

    /// Exact lookup by normalized company name.
    pub fn ticker_for_company(&self, normalized_name: &str) -> Option<&str> {
        self.company_index.get(normalized_name).map(String::as_str)
    }

    pub fn alias(&self, ticker: &str) -> Option<&str> {
        self.ticker_aliases.get(ticker).map(String::as_str)
    }

    pub fn is_excluded(&self, token: &str) -> bool {
        self.excluded_tokens.contains(token)
    }

    pub fn is_share_class_root(&self, ticker: &str) -> bool {
        self.share_class_roots.contains(ticker)
    }

    pub fn is_etf_ticker(&self, ticker: &str) -> bool {
        self.etf_tickers.contains(ticker)
    }

    pub fn etf_keywords(&self) -> &[String] {
        &self.etf_keywords
    }

    pub fn is_nasdaq_listed(&self, ticker: &str) -> bool {
        self.nasdaq_tickers.contains(ticker)
    }

    pub fn sector_for_ticker(&self, ticker: &str) -> Option<&str> {
        self.ticker_sectors.get(ticker).map(String::as_str)
    }

    pub fn sector_keywords(&self) -> &[SectorKeyword] {
        &self.sector_keywords
    }

    pub fn owner_synonyms(&self) -> &[OwnerSynonym] {
        &self.owner_synonyms
    }

    /// Reference rows that must exist in the store before securities point at them.
    pub fn exchanges(&self) -> Vec<Exchange> {
        Exchange::all().to_vec()
    }

    pub fn asset_types(&self) -> Vec<AssetType> {
        AssetType::all().to_vec()
    }

    pub fn sectors(&self) -> BTreeSet<String> {
        self.ticker_sectors
            .values()
            .cloned()
            .chain(self.sector_keywords.iter().map(|k| k.sector.clone()))
            .collect()
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}
