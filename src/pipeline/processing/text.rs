//! String cleanup and currency token primitives shared by the record stages.

use once_cell::sync::Lazy;
use regex::Regex;

/// `$1,001.50`, `15000`, `$ 50,000,001`
static CURRENCY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$?\s*((?:\d{1,3}(?:,\d{3})+)|\d+)(?:\.(\d{1,2}))?").expect("valid currency regex")
});

/// Bracketed disclosure asset codes such as `[ST]` or `[OP]`.
static ASSET_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Za-z]{2})\]").expect("valid asset code regex"));

/// Words dropped when comparing company names.
const COMPANY_NOISE_WORDS: &[&str] = &[
    "the", "inc", "incorporated", "corp", "corporation", "co", "company", "ltd", "limited",
    "plc", "llc", "lp", "holdings", "group", "common", "stock", "shares", "ordinary", "new",
];

/// Trim, drop control characters and collapse runs of whitespace.
pub fn clean_text(input: &str) -> String {
    let without_control: String = input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    collapse_whitespace(&without_control)
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean an optional field; blank values become `None`.
pub fn clean_field(input: Option<&str>) -> Option<String> {
    input.map(clean_text).filter(|s| !s.is_empty())
}

/// Lowercase a company name and strip punctuation and corporate suffixes
/// so that "Apple Inc." and "APPLE INC - COMMON STOCK" compare equal.
pub fn normalize_company_name(input: &str) -> String {
    let mut lowered = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '\'' || c == '’' {
            continue;
        }
        if c.is_alphanumeric() {
            lowered.extend(c.to_lowercase());
        } else {
            lowered.push(' ');
        }
    }
    lowered
        .split_whitespace()
        .filter(|word| !COMPANY_NOISE_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `phrase` occurs in `text` on word boundaries. Both sides are expected normalized.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let padded_text = format!(" {} ", text);
    let padded_phrase = format!(" {} ", phrase);
    padded_text.contains(&padded_phrase)
}

/// Bracketed two-letter asset code, uppercased.
pub fn asset_code(input: &str) -> Option<String> {
    ASSET_CODE
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Remove bracketed asset codes so they cannot be mistaken for tickers.
pub fn strip_asset_codes(input: &str) -> String {
    collapse_whitespace(&ASSET_CODE.replace_all(input, " "))
}

/// A currency amount found in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyToken {
    pub cents: i64,
    /// Byte offset of the token start (including any `$`)
    pub start: usize,
    pub end: usize,
}

/// A currency token whose digits do not fit in integer cents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount out of range: {token}")]
pub struct AmountOutOfRange {
    pub token: String,
}

/// Extract every currency-looking number from `input`, converted to integer cents.
/// Any token that cannot be represented fails the whole extraction.
pub fn extract_currency_tokens(input: &str) -> Result<Vec<CurrencyToken>, AmountOutOfRange> {
    let mut tokens = Vec::new();
    for caps in CURRENCY_TOKEN.captures_iter(input) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let out_of_range = || AmountOutOfRange {
            token: whole.as_str().trim().to_string(),
        };
        let dollars: i64 = digits
            .as_str()
            .replace(',', "")
            .parse()
            .map_err(|_| out_of_range())?;
        let fraction = caps
            .get(2)
            .map(|m| {
                let frac = m.as_str();
                let value: i64 = frac.parse().unwrap_or(0);
                if frac.len() == 1 {
                    value * 10
                } else {
                    value
                }
            })
            .unwrap_or(0);
        let cents = dollars
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(out_of_range)?;
        tokens.push(CurrencyToken {
            cents,
            start: whole.start(),
            end: whole.end(),
        });
    }
    Ok(tokens)
}

pub fn dollars_to_cents(dollars: i64) -> i64 {
    dollars.saturating_mul(100)
}
