use std::fs;
use std::path::Path;

use tracing::debug;

use crate::domain::RawTradeRecord;
use crate::error::Result;

/// Read raw records from a JSON array or newline-delimited JSON.
pub fn read_raw_records<P: AsRef<Path>>(path: P) -> Result<Vec<RawTradeRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let records = parse_raw_records(&content)?;
    debug!("Read {} raw records from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_raw_records(content: &str) -> Result<Vec<RawTradeRecord>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }

    let mut records = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use std::io::Write;

    #[test]
    fn test_reads_array_and_ndjson() {
        let array = r#"[{"source_id": "f", "row_number": 1, "asset_description": "Apple Inc"}]"#;
        assert_eq!(parse_raw_records(array).unwrap().len(), 1);

        let ndjson = concat!(
            "{\"source_id\": \"f\", \"row_number\": 1, \"asset_description\": \"Apple Inc\"}\n",
            "\n",
            "{\"source_id\": \"f\", \"row_number\": 2, \"amount\": \"$1,001 - $15,000\"}\n",
        );
        let records = parse_raw_records(ndjson).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].amount.as_deref(), Some("$1,001 - $15,000"));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"source_id\": \"f\", \"row_number\": 1}}").unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(read_raw_records(file.path()), Err(IngestError::Json(_))));
    }
}
