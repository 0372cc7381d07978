//! Amount text → official disclosure bucket.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    clamp_confidence, AMOUNT_BELOW_BUCKETS_CONFIDENCE, AMOUNT_EXACT_BUCKET_CONFIDENCE,
    AMOUNT_EXACT_VALUE_CONFIDENCE, AMOUNT_OPEN_ENDED_CONFIDENCE, AMOUNT_OUT_OF_TOLERANCE_CONFIDENCE,
    AMOUNT_SNAPPED_CONFIDENCE, DEFAULT_SNAP_TOLERANCE_RATIO,
};
use crate::domain::Resolution;
use crate::error::FieldFailure;
use crate::pipeline::processing::text::{clean_text, dollars_to_cents, extract_currency_tokens};

static TRAILING_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\b([A-Za-z]+)\s*$").expect("valid trailing word regex"));

/// Words that carry meaning for the amount shape and must survive garbage stripping.
const AMOUNT_WORDS: &[&str] = &[
    "and", "to", "over", "more", "than", "above", "between", "plus", "or", "usd", "dollars",
];

/// One of the official congressional disclosure ranges, in whole dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmountBucket {
    pub min_dollars: i64,
    /// `None` for the open-ended top bucket
    pub max_dollars: Option<i64>,
}

pub const OFFICIAL_BUCKETS: [AmountBucket; 10] = [
    AmountBucket { min_dollars: 1_001, max_dollars: Some(15_000) },
    AmountBucket { min_dollars: 15_001, max_dollars: Some(50_000) },
    AmountBucket { min_dollars: 50_001, max_dollars: Some(100_000) },
    AmountBucket { min_dollars: 100_001, max_dollars: Some(250_000) },
    AmountBucket { min_dollars: 250_001, max_dollars: Some(500_000) },
    AmountBucket { min_dollars: 500_001, max_dollars: Some(1_000_000) },
    AmountBucket { min_dollars: 1_000_001, max_dollars: Some(5_000_000) },
    AmountBucket { min_dollars: 5_000_001, max_dollars: Some(25_000_000) },
    AmountBucket { min_dollars: 25_000_001, max_dollars: Some(50_000_000) },
    AmountBucket { min_dollars: 50_000_001, max_dollars: None },
];

impl AmountBucket {
    pub fn min_cents(&self) -> i64 {
        dollars_to_cents(self.min_dollars)
    }

    pub fn max_cents(&self) -> Option<i64> {
        self.max_dollars.map(dollars_to_cents)
    }

    pub fn contains(&self, cents: i64) -> bool {
        cents >= self.min_cents() && self.max_cents().map_or(true, |max| cents <= max)
    }
}

impl fmt::Display for AmountBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_dollars {
            Some(max) => write!(f, "${} - ${}", group_thousands(self.min_dollars), group_thousands(max)),
            None => write!(f, "${} +", group_thousands(self.min_dollars)),
        }
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// How the parsed amount relates to the official buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountMatch {
    ExactBucket,
    SnappedBucket,
    ExactValue,
    BelowBuckets,
    OpenEnded,
    /// Kept as parsed; too far from any bucket to snap
    OutOfTolerance,
}

impl AmountMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountMatch::ExactBucket => "exact_bucket",
            AmountMatch::SnappedBucket => "snapped_bucket",
            AmountMatch::ExactValue => "exact_value",
            AmountMatch::BelowBuckets => "below_buckets",
            AmountMatch::OpenEnded => "open_ended",
            AmountMatch::OutOfTolerance => "out_of_tolerance",
        }
    }
}

/// Amounts in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAmount {
    pub amount_min: i64,
    pub amount_max: Option<i64>,
    pub amount_exact: Option<i64>,
    pub bucket: Option<AmountBucket>,
}

pub type AmountParse = Resolution<ParsedAmount, AmountMatch>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountShape {
    Exact(i64),
    Range { low: i64, high: i64, reversed: bool },
    OpenEnded(i64),
}

#[derive(Debug, Clone)]
pub struct AmountRangeParser {
    /// Allowed distance from a bucket bound, as a fraction of that bound
    snap_tolerance_ratio: f64,
}

impl Default for AmountRangeParser {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_TOLERANCE_RATIO)
    }
}

impl AmountRangeParser {
    pub fn new(snap_tolerance_ratio: f64) -> Self {
        Self {
            snap_tolerance_ratio: snap_tolerance_ratio.max(0.0),
        }
    }

    pub fn parse(&self, raw_amount: &str) -> AmountParse {
        let cleaned = strip_garbage(raw_amount);
        let failure = |message: &str| Resolution::Unresolved {
            reason: FieldFailure::ParseFailure {
                input: raw_amount.to_string(),
                message: message.to_string(),
            },
        };

        if !cleaned.chars().any(|c| c.is_ascii_digit()) {
            return failure("no digits");
        }

        let shape = match classify(&cleaned) {
            Ok(shape) => shape,
            Err(message) => return failure(message),
        };

        self.canonicalize(shape)
    }

    fn canonicalize(&self, shape: AmountShape) -> AmountParse {
        match shape {
            AmountShape::Range { low, high, reversed } => self.canonicalize_range(low, high, reversed),
            AmountShape::Exact(value) => match OFFICIAL_BUCKETS.iter().find(|b| b.contains(value)) {
                Some(bucket) => resolved(
                    ParsedAmount {
                        amount_min: value,
                        amount_max: Some(value),
                        amount_exact: Some(value),
                        bucket: Some(*bucket),
                    },
                    AMOUNT_EXACT_VALUE_CONFIDENCE,
                    AmountMatch::ExactValue,
                ),
                None => resolved(
                    ParsedAmount {
                        amount_min: value,
                        amount_max: Some(value),
                        amount_exact: Some(value),
                        bucket: None,
                    },
                    AMOUNT_BELOW_BUCKETS_CONFIDENCE,
                    AmountMatch::BelowBuckets,
                ),
            },
            AmountShape::OpenEnded(low) => {
                let bucket = nearest_by_lower_bound(low)
                    .filter(|b| self.within(low, b.min_cents()))
                    .copied();
                resolved(
                    ParsedAmount {
                        amount_min: low,
                        amount_max: None,
                        amount_exact: None,
                        bucket,
                    },
                    AMOUNT_OPEN_ENDED_CONFIDENCE,
                    AmountMatch::OpenEnded,
                )
            }
        }
    }

    fn canonicalize_range(&self, low: i64, high: i64, reversed: bool) -> AmountParse {
        let exact = OFFICIAL_BUCKETS
            .iter()
            .find(|b| b.min_cents() == low && b.max_cents() == Some(high));
        if let Some(bucket) = exact {
            let (confidence, kind) = if reversed {
                (AMOUNT_SNAPPED_CONFIDENCE, AmountMatch::SnappedBucket)
            } else {
                (AMOUNT_EXACT_BUCKET_CONFIDENCE, AmountMatch::ExactBucket)
            };
            return resolved(bucket_amount(bucket), confidence, kind);
        }

        if let Some(bucket) = nearest_by_lower_bound(low) {
            let upper_ok = match bucket.max_cents() {
                Some(max) => self.within(high, max),
                None => true,
            };
            if self.within(low, bucket.min_cents()) && upper_ok {
                return resolved(bucket_amount(bucket), AMOUNT_SNAPPED_CONFIDENCE, AmountMatch::SnappedBucket);
            }
        }

        resolved(
            ParsedAmount {
                amount_min: low,
                amount_max: Some(high),
                amount_exact: None,
                bucket: None,
            },
            AMOUNT_OUT_OF_TOLERANCE_CONFIDENCE,
            AmountMatch::OutOfTolerance,
        )
    }

    /// Within tolerance of a bucket bound; never tighter than one dollar.
    fn within(&self, value: i64, bound: i64) -> bool {
        let tolerance = ((bound as f64) * self.snap_tolerance_ratio).round() as i64;
        (value - bound).abs() <= tolerance.max(100)
    }
}

fn resolved(value: ParsedAmount, confidence: f64, kind: AmountMatch) -> AmountParse {
    Resolution::Resolved {
        value,
        confidence: clamp_confidence(confidence),
        source: kind,
    }
}

fn bucket_amount(bucket: &AmountBucket) -> ParsedAmount {
    ParsedAmount {
        amount_min: bucket.min_cents(),
        amount_max: bucket.max_cents(),
        amount_exact: None,
        bucket: Some(*bucket),
    }
}

/// Nearest bucket by lower-bound distance; ties go to the lower bucket.
fn nearest_by_lower_bound(cents: i64) -> Option<&'static AmountBucket> {
    OFFICIAL_BUCKETS
        .iter()
        .min_by_key(|b| (b.min_cents() - cents).abs())
}

/// Drop trailing alphabetic junk (PDF checkbox glyphs render as "gfedc") and
/// non-ASCII noise, keeping words that describe the amount's shape.
pub fn strip_garbage(raw: &str) -> String {
    let ascii: String = raw
        .chars()
        .map(|c| match c {
            '–' | '—' => '-',
            c if c.is_ascii() => c,
            _ => ' ',
        })
        .collect();
    let mut text = clean_text(&ascii);

    loop {
        let Some(caps) = TRAILING_WORD.captures(&text) else {
            break;
        };
        let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        if AMOUNT_WORDS.contains(&word.as_str().to_lowercase().as_str()) {
            break;
        }
        let cut = whole.start();
        text.truncate(cut);
        text = text.trim_end().to_string();
    }

    text
}

fn classify(cleaned: &str) -> Result<AmountShape, &'static str> {
    let tokens = extract_currency_tokens(cleaned).map_err(|_| "amount out of range")?;
    let Some(first) = tokens.first() else {
        return Err("no currency tokens");
    };

    let prefix = cleaned[..first.start].trim_end();
    if prefix.ends_with('-') || prefix.ends_with('(') {
        return Err("negative amount");
    }

    if tokens.len() >= 2 {
        let (a, b) = (tokens[0].cents, tokens[1].cents);
        if a <= 0 || b <= 0 {
            return Err("zero amount");
        }
        let (low, high, reversed) = if a <= b { (a, b, false) } else { (b, a, true) };
        return Ok(AmountShape::Range { low, high, reversed });
    }

    let value = first.cents;
    if value <= 0 {
        return Err("zero amount");
    }

    let lowered = cleaned.to_lowercase();
    let suffix = cleaned[first.end..].trim_start();
    let open_ended = suffix.starts_with('+')
        || lowered.contains("over")
        || lowered.contains("more than")
        || lowered.contains("above")
        || lowered.contains("or more")
        || lowered.contains("plus");
    if open_ended {
        Ok(AmountShape::OpenEnded(value))
    } else {
        Ok(AmountShape::Exact(value))
    }
}
