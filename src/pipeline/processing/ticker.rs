//! Ticker extraction across the raw ticker column and the asset description.
//!
//! Strategies run in a fixed precedence order and the first success wins; later
//! strategies only see records that every earlier one rejected.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    TICKER_COMPANY_NAME_CONFIDENCE, TICKER_DIRECT_CONFIDENCE, TICKER_MIXED_CONTENT_CONFIDENCE,
    TICKER_PATTERN_CONFIDENCE,
};
use crate::domain::Resolution;
use crate::error::FieldFailure;
use crate::pipeline::processing::text::{
    clean_text, contains_phrase, normalize_company_name, strip_asset_codes,
};
use crate::reference::ReferenceData;

static DIRECT_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,5}([.-][A-Z])?$").expect("valid direct ticker regex"));

static EXCHANGE_PREFIXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((?:NYSE|NASDAQ|NYSEARCA|NYSEAMERICAN|OTC|AMEX)\s*:\s*([A-Z]{1,5}(?:[./-][A-Z])?)\)")
        .expect("valid exchange-prefixed regex")
});

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Z]{1,5}(?:[./-][A-Z])?)\)").expect("valid parenthesized regex"));

static TRAILING_DASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s[-–]\s*([A-Z]{1,5}(?:[./][A-Z])?)\s*$").expect("valid trailing dash regex")
});

static BEFORE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z]{1,5})\s+(?:-\s*)?(?:Class|CLASS)\s+([A-Z])\b").expect("valid class regex")
});

static AT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s([A-Z]{2,5})$").expect("valid end-of-string regex"));

static TICKER_THEN_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]{1,5}(?:[.-][A-Z])?)\s*[\s/,:-]\s*(?:P|S|E|S\s*\(PARTIAL\))$")
        .expect("valid ticker-type regex")
});

static TYPE_THEN_TICKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:P|S|E)\s*[\s/,:-]\s*([A-Z]{1,5}(?:[.-][A-Z])?)$").expect("valid type-ticker regex")
});

/// Which strategy produced the ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerSource {
    DirectField,
    DescriptionPattern,
    CompanyName,
    MixedContent,
}

impl TickerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickerSource::DirectField => "direct_field",
            TickerSource::DescriptionPattern => "description_pattern",
            TickerSource::CompanyName => "company_name",
            TickerSource::MixedContent => "mixed_content",
        }
    }
}

pub type TickerExtraction = Resolution<String, TickerSource>;

/// Format-level ticker normalization: uppercase, trim, and `.`/`/` share-class
/// separators become `-`.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('$')
        .trim()
        .to_uppercase()
        .replace(['.', '/'], "-")
}

pub struct TickerExtractor {
    reference: Arc<ReferenceData>,
}

impl TickerExtractor {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    /// Resolve a ticker from the raw ticker column and the asset description.
    pub fn extract(&self, raw_ticker_field: Option<&str>, asset_description: &str) -> TickerExtraction {
        let raw_field = raw_ticker_field.map(clean_text).filter(|s| !s.is_empty());
        let description = clean_text(asset_description);

        if let Some(ticker) = raw_field.as_deref().and_then(|f| self.from_direct_field(f)) {
            return resolved(ticker, TICKER_DIRECT_CONFIDENCE, TickerSource::DirectField);
        }

        if let Some(ticker) = self.from_description_patterns(&description) {
            return resolved(ticker, TICKER_PATTERN_CONFIDENCE, TickerSource::DescriptionPattern);
        }

        if let Some(ticker) = self.from_company_name(&description) {
            return resolved(ticker, TICKER_COMPANY_NAME_CONFIDENCE, TickerSource::CompanyName);
        }

        let mixed = raw_field
            .as_deref()
            .and_then(|f| self.from_mixed_content(f))
            .or_else(|| self.from_mixed_content(&description));
        if let Some(ticker) = mixed {
            return resolved(ticker, TICKER_MIXED_CONTENT_CONFIDENCE, TickerSource::MixedContent);
        }

        let input = if description.is_empty() {
            raw_field.unwrap_or_default()
        } else {
            description
        };
        Resolution::Unresolved {
            reason: FieldFailure::ExtractionFailure { input },
        }
    }

    /// Format normalization plus the alias table for irregular symbols.
    pub fn canonicalize(&self, raw: &str) -> String {
        let normalized = normalize_ticker(raw);
        if let Some(alias) = self.reference.alias(&normalized) {
            return alias.to_string();
        }
        let compact = normalized.replace('-', "");
        if let Some(alias) = self.reference.alias(&compact) {
            return alias.to_string();
        }
        normalized
    }

    /// A candidate is usable when neither it nor its root is an excluded token.
    fn accept(&self, candidate: &str) -> Option<String> {
        let upper = candidate.trim().to_uppercase();
        if upper.is_empty() || self.reference.is_excluded(&upper) {
            return None;
        }
        let root = upper.split(['.', '-', '/']).next().unwrap_or(&upper);
        if root != upper && self.reference.is_excluded(root) {
            return None;
        }
        Some(self.canonicalize(&upper))
    }

    fn from_direct_field(&self, field: &str) -> Option<String> {
        let candidate = field.trim_start_matches('$').trim().to_uppercase().replace('/', ".");
        if !DIRECT_FORMAT.is_match(&candidate) {
            return None;
        }
        self.accept(&candidate)
    }

    fn from_description_patterns(&self, description: &str) -> Option<String> {
        let text = strip_asset_codes(description);
        if text.is_empty() {
            return None;
        }

        // Ticker in parentheses, exchange-qualified form first
        for pattern in [&*EXCHANGE_PREFIXED, &*PARENTHESIZED] {
            for caps in pattern.captures_iter(&text) {
                if let Some(ticker) = caps.get(1).and_then(|m| self.accept(m.as_str())) {
                    return Some(ticker);
                }
            }
        }

        // Ticker after a trailing dash
        if let Some(ticker) = TRAILING_DASH
            .captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| self.accept(m.as_str()))
        {
            return Some(ticker);
        }

        // Ticker before "Class X"
        for caps in BEFORE_CLASS.captures_iter(&text) {
            let (Some(root), Some(class)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let root = root.as_str();
            if self.reference.is_excluded(root) {
                continue;
            }
            let candidate = if self.reference.is_share_class_root(root) {
                format!("{}-{}", root, class.as_str())
            } else {
                root.to_string()
            };
            if let Some(ticker) = self.accept(&candidate) {
                return Some(ticker);
            }
        }

        // Ticker at string end; only meaningful when the rest is not shouted,
        // otherwise every all-caps company name would end in a "ticker".
        let has_lowercase = text.chars().any(|c| c.is_lowercase());
        if has_lowercase {
            if let Some(ticker) = AT_END
                .captures(&text)
                .and_then(|c| c.get(1))
                .and_then(|m| self.accept(m.as_str()))
            {
                return Some(ticker);
            }
        }

        None
    }

    fn from_company_name(&self, description: &str) -> Option<String> {
        let normalized = normalize_company_name(&strip_asset_codes(description));
        if normalized.is_empty() {
            return None;
        }

        if let Some(ticker) = self.reference.ticker_for_company(&normalized) {
            return Some(ticker.to_string());
        }

        self.reference
            .company_tickers()
            .iter()
            .filter(|entry| entry.name.len() >= 4)
            .find(|entry| contains_phrase(&normalized, &entry.name))
            .map(|entry| entry.ticker.clone())
    }

    fn from_mixed_content(&self, text: &str) -> Option<String> {
        let upper = text.trim().to_uppercase();
        TICKER_THEN_TYPE
            .captures(&upper)
            .or_else(|| TYPE_THEN_TICKER.captures(&upper))
            .and_then(|c| c.get(1))
            .and_then(|m| self.accept(m.as_str()))
    }
}

fn resolved(ticker: String, confidence: f64, source: TickerSource) -> TickerExtraction {
    Resolution::Resolved {
        value: ticker,
        confidence,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TickerExtractor {
        TickerExtractor::new(Arc::new(ReferenceData::builtin()))
    }

    fn ticker_of(result: &TickerExtraction) -> Option<&str> {
        result.value().map(String::as_str)
    }

    #[test]
    fn test_normalize_ticker_maps_share_class_separator() {
        assert_eq!(normalize_ticker("BRK.A"), "BRK-A");
        assert_eq!(normalize_ticker(" brk/b "), "BRK-B");
        assert_eq!(normalize_ticker("$aapl"), "AAPL");
    }

    #[test]
    fn test_direct_field_wins() {
        let result = extractor().extract(Some("MSFT"), "Apple Inc (AAPL)");
        assert_eq!(ticker_of(&result), Some("MSFT"));
        assert_eq!(result.confidence(), 0.9);
        assert_eq!(result.source(), Some(TickerSource::DirectField));
    }

    #[test]
    fn test_direct_field_share_class_and_alias() {
        let ex = extractor();
        assert_eq!(ticker_of(&ex.extract(Some("BRK.B"), "")), Some("BRK-B"));
        assert_eq!(ticker_of(&ex.extract(Some("FB"), "")), Some("META"));
    }

    #[test]
    fn test_excluded_direct_field_falls_through() {
        let result = extractor().extract(Some("SP"), "Apple Inc. - Common Stock (AAPL) [ST]");
        assert_eq!(ticker_of(&result), Some("AAPL"));
        assert_eq!(result.source(), Some(TickerSource::DescriptionPattern));
        assert_eq!(result.confidence(), 0.8);
    }

    #[test]
    fn test_parenthesized_with_exchange_prefix() {
        let result = extractor().extract(None, "Tesla, Inc. (NASDAQ: TSLA)");
        assert_eq!(ticker_of(&result), Some("TSLA"));
    }

    #[test]
    fn test_trailing_dash_pattern() {
        let result = extractor().extract(None, "Berkshire Hathaway Inc - BRK.B");
        assert_eq!(ticker_of(&result), Some("BRK-B"));
        assert_eq!(result.source(), Some(TickerSource::DescriptionPattern));
    }

    #[test]
    fn test_before_class_pattern_uses_share_class_roots() {
        let ex = extractor();
        assert_eq!(ticker_of(&ex.extract(None, "Holding BRK Class B")), Some("BRK-B"));
        assert_eq!(ticker_of(&ex.extract(None, "Alphabet GOOGL Class A")), Some("GOOGL"));
    }

    #[test]
    fn test_end_of_string_pattern_requires_mixed_case() {
        let ex = extractor();
        assert_eq!(ticker_of(&ex.extract(None, "Nvidia Corporation NVDA")), Some("NVDA"));
        // all caps: falls through to the company-name table
        let result = ex.extract(None, "HOME DEPOT");
        assert_eq!(ticker_of(&result), Some("HD"));
        assert_eq!(result.source(), Some(TickerSource::CompanyName));
    }

    #[test]
    fn test_foreign_legal_form_suffix_is_not_a_ticker() {
        let ex = extractor();
        for (description, suffix) in [
            ("Nestle SA", "SA"),
            ("Siemens AG", "AG"),
            ("Airbus SE", "SE"),
            ("Koninklijke Philips NV", "NV"),
            ("Volvo AB", "AB"),
            ("Nokia Oyj", "OYJ"),
            ("Sony Group KK", "KK"),
        ] {
            let result = ex.extract(None, description);
            assert_ne!(ticker_of(&result), Some(suffix), "{}", description);
            assert_ne!(result.source(), Some(TickerSource::DescriptionPattern), "{}", description);
        }
    }

    #[test]
    fn test_company_name_exact_and_partial() {
        let ex = extractor();
        let exact = ex.extract(None, "Microsoft Corporation");
        assert_eq!(ticker_of(&exact), Some("MSFT"));
        assert_eq!(exact.confidence(), 0.7);

        let partial = ex.extract(None, "Bank of America Corp Series L Preferred");
        assert_eq!(ticker_of(&partial), Some("BAC"));
        assert_eq!(partial.source(), Some(TickerSource::CompanyName));
    }

    #[test]
    fn test_mixed_content_pattern() {
        let result = extractor().extract(Some("ZZZQ P"), "");
        assert_eq!(ticker_of(&result), Some("ZZZQ"));
        assert_eq!(result.source(), Some(TickerSource::MixedContent));
        assert_eq!(result.confidence(), 0.6);

        let reversed = extractor().extract(Some("s qrst"), "");
        assert_eq!(ticker_of(&reversed), Some("QRST"));
    }

    #[test]
    fn test_no_match_is_unresolved_with_zero_confidence() {
        let result = extractor().extract(Some("--"), "Some private partnership interest");
        assert!(!result.is_resolved());
        assert_eq!(result.confidence(), 0.0);
        assert!(matches!(
            result.failure(),
            Some(FieldFailure::ExtractionFailure { input }) if input == "Some private partnership interest"
        ));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let ex = extractor();
        let inputs = [
            (Some("AAPL"), "Apple"),
            (None, "Berkshire Hathaway Inc - BRK.B"),
            (None, "Walt Disney Co"),
            (Some("n/a"), "Unknown thing"),
        ];
        for (field, description) in inputs {
            let first = ex.extract(field, description);
            for _ in 0..5 {
                assert_eq!(ex.extract(field, description), first);
            }
        }
    }
}
