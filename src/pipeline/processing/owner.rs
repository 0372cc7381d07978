//! Owner column normalization with column-shift detection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{
    OWNER_BLANK_CONFIDENCE, OWNER_EXACT_CONFIDENCE, OWNER_FUZZY_CONFIDENCE,
    OWNER_FUZZY_THRESHOLD, OWNER_MISALIGNED_CONFIDENCE, OWNER_UNRECOGNIZED_CONFIDENCE,
};
use crate::domain::OwnerCode;
use crate::error::FieldFailure;
use crate::pipeline::processing::similarity::ratio;
use crate::pipeline::processing::text::{clean_text, contains_phrase, normalize_company_name};
use crate::reference::ReferenceData;

/// Corporate suffixes that never appear in a real owner value.
const CORPORATE_MARKERS: &[&str] = &[
    "INC", "CORP", "CORPORATION", "CO", "COMPANY", "LLC", "LTD", "PLC", "LP", "HOLDINGS",
    "GROUP", "TRUST", "FUND", "ETF", "STOCK", "SHARES", "BOND", "NOTES",
];

/// How the owner code was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerMatch {
    Exact,
    Fuzzy,
    /// Blank owner column; disclosures leave it empty for the filer
    Blank,
    /// Looked like a company or person name
    NameLike,
    Unrecognized,
}

impl OwnerMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerMatch::Exact => "exact",
            OwnerMatch::Fuzzy => "fuzzy",
            OwnerMatch::Blank => "blank",
            OwnerMatch::NameLike => "name_like",
            OwnerMatch::Unrecognized => "unrecognized",
        }
    }
}

/// Owner resolution always yields a code; trust is carried by `confidence` and `misaligned`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerNormalization {
    pub owner_code: OwnerCode,
    pub confidence: f64,
    pub misaligned: bool,
    pub source: OwnerMatch,
    /// Cleaned input, kept for review payloads
    pub input: String,
}

impl OwnerNormalization {
    /// Whether the owner counts as normalized for quality reporting.
    pub fn is_resolved(&self) -> bool {
        !self.misaligned
    }

    pub fn failure(&self) -> Option<FieldFailure> {
        self.misaligned.then(|| FieldFailure::MisalignmentDetected {
            input: self.input.clone(),
        })
    }
}

pub struct OwnerNormalizer {
    reference: Arc<ReferenceData>,
    fuzzy_threshold: f64,
}

impl OwnerNormalizer {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            reference,
            fuzzy_threshold: OWNER_FUZZY_THRESHOLD,
        }
    }

    pub fn normalize(&self, raw_owner: Option<&str>) -> OwnerNormalization {
        let input = raw_owner.map(clean_text).unwrap_or_default();
        let key = owner_key(&input);

        if key.is_empty() {
            return self.result(OwnerCode::Filer, OWNER_BLANK_CONFIDENCE, false, OwnerMatch::Blank, input);
        }

        let synonyms = self.reference.owner_synonyms();

        if let Some(hit) = synonyms.iter().find(|s| s.value == key) {
            return self.result(hit.owner, OWNER_EXACT_CONFIDENCE, false, OwnerMatch::Exact, input);
        }

        // Priority order decides between several close synonyms
        if let Some(hit) = synonyms
            .iter()
            .find(|s| ratio(&key, &s.value) >= self.fuzzy_threshold)
        {
            return self.result(hit.owner, OWNER_FUZZY_CONFIDENCE, false, OwnerMatch::Fuzzy, input);
        }

        if self.looks_like_name(&input, &key) {
            return self.result(
                OwnerCode::Filer,
                OWNER_MISALIGNED_CONFIDENCE,
                true,
                OwnerMatch::NameLike,
                input,
            );
        }

        self.result(
            OwnerCode::Filer,
            OWNER_UNRECOGNIZED_CONFIDENCE,
            true,
            OwnerMatch::Unrecognized,
            input,
        )
    }

    fn result(
        &self,
        owner_code: OwnerCode,
        confidence: f64,
        misaligned: bool,
        source: OwnerMatch,
        input: String,
    ) -> OwnerNormalization {
        OwnerNormalization {
            owner_code,
            confidence,
            misaligned,
            source,
            input,
        }
    }

    /// Company names, person names and shifted amount cells all count.
    fn looks_like_name(&self, input: &str, key: &str) -> bool {
        let words: Vec<&str> = input.split_whitespace().collect();

        let capitalized = words
            .iter()
            .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
            .filter(|w| !self.is_synonym_word(w))
            .count();
        if capitalized >= 2 {
            return true;
        }

        if key.split_whitespace().any(|w| CORPORATE_MARKERS.contains(&w)) {
            return true;
        }

        if input.contains('$') || input.chars().filter(|c| c.is_ascii_digit()).count() >= 3 {
            return true;
        }

        let company = normalize_company_name(input);
        if company.is_empty() {
            return false;
        }
        self.reference.ticker_for_company(&company).is_some()
            || self
                .reference
                .company_tickers()
                .iter()
                .any(|entry| entry.name.len() >= 4 && contains_phrase(&company, &entry.name))
    }

    fn is_synonym_word(&self, word: &str) -> bool {
        let upper = owner_key(word);
        self.reference
            .owner_synonyms()
            .iter()
            .any(|s| s.value.split_whitespace().any(|part| part == upper))
    }
}

/// Uppercase, punctuation to spaces, collapsed.
fn owner_key(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
