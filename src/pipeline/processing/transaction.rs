use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::TransactionType;
use crate::pipeline::processing::text::clean_field;

/// Transaction columns after the CLEAN stage. Nothing here blocks resolution;
/// problems are carried as warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction_type: Option<TransactionType>,
    pub transaction_date: Option<NaiveDate>,
    pub notification_date: Option<NaiveDate>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionNormalizer;

impl TransactionNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(
        &self,
        transaction_type: Option<&str>,
        transaction_date: Option<&str>,
        notification_date: Option<&str>,
    ) -> TransactionDetails {
        let mut warnings = Vec::new();

        let raw_type = clean_field(transaction_type);
        let parsed_type = raw_type.as_deref().and_then(parse_transaction_type);
        if let (Some(raw), None) = (&raw_type, parsed_type) {
            warnings.push(format!("Unrecognized transaction type '{}'", raw));
        }

        let transaction_date = parse_field_date("transaction", transaction_date, &mut warnings);
        let notification_date = parse_field_date("notification", notification_date, &mut warnings);

        if let (Some(traded), Some(notified)) = (transaction_date, notification_date) {
            if notified < traded {
                warnings.push(format!(
                    "Notification date {} precedes transaction date {}",
                    notified, traded
                ));
            }
        }

        TransactionDetails {
            transaction_type: parsed_type,
            transaction_date,
            notification_date,
            warnings,
        }
    }
}

pub fn parse_transaction_type(raw: &str) -> Option<TransactionType> {
    let key = raw.trim().to_uppercase();
    if key.is_empty() {
        return None;
    }
    if key.contains("PARTIAL") {
        return Some(TransactionType::PartialSale);
    }
    match key.as_str() {
        "P" | "PURCHASE" | "BUY" | "BOUGHT" => Some(TransactionType::Purchase),
        "S" | "SALE" | "SALE (FULL)" | "S (FULL)" | "SELL" | "SOLD" => Some(TransactionType::Sale),
        "E" | "EXCHANGE" => Some(TransactionType::Exchange),
        _ => None,
    }
}

/// Disclosure dates in the formats seen across House and Senate filings.
pub fn parse_disclosure_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%y"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%B %d, %Y"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%b %d, %Y"))
        .ok()
}

fn parse_field_date(field: &str, raw: Option<&str>, warnings: &mut Vec<String>) -> Option<NaiveDate> {
    let raw = clean_field(raw)?;
    let parsed = parse_disclosure_date(&raw);
    if parsed.is_none() {
        warnings.push(format!("Unparseable {} date '{}'", field, raw));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_variants() {
        assert_eq!(parse_transaction_type("P"), Some(TransactionType::Purchase));
        assert_eq!(parse_transaction_type("sale"), Some(TransactionType::Sale));
        assert_eq!(parse_transaction_type("S (partial)"), Some(TransactionType::PartialSale));
        assert_eq!(parse_transaction_type("Sale (Partial)"), Some(TransactionType::PartialSale));
        assert_eq!(parse_transaction_type("E"), Some(TransactionType::Exchange));
        assert_eq!(parse_transaction_type("gift"), None);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 5);
        assert_eq!(parse_disclosure_date("2023-01-05"), expected);
        assert_eq!(parse_disclosure_date("01/05/2023"), expected);
        assert_eq!(parse_disclosure_date("01/05/23"), expected);
        assert_eq!(parse_disclosure_date("January 5, 2023"), expected);
        assert_eq!(parse_disclosure_date("Jan 5, 2023"), expected);
        assert_eq!(parse_disclosure_date("sometime"), None);
    }

    #[test]
    fn test_notification_before_transaction_warns() {
        let details = TransactionNormalizer::new().normalize(Some("P"), Some("03/10/2023"), Some("03/01/2023"));
        assert_eq!(details.transaction_type, Some(TransactionType::Purchase));
        assert_eq!(details.warnings.len(), 1);
        assert!(details.warnings[0].contains("precedes"));
    }

    #[test]
    fn test_bad_values_do_not_block() {
        let details = TransactionNormalizer::new().normalize(Some("gift"), Some("n/a"), None);
        assert_eq!(details.transaction_type, None);
        assert_eq!(details.transaction_date, None);
        assert_eq!(details.warnings.len(), 2);
    }
}
