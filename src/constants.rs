//! Confidence levels per extraction strategy and parse shape, and configuration defaults.

// Ticker strategies, in precedence order
pub const TICKER_DIRECT_CONFIDENCE: f64 = 0.9;
pub const TICKER_PATTERN_CONFIDENCE: f64 = 0.8;
pub const TICKER_COMPANY_NAME_CONFIDENCE: f64 = 0.7;
pub const TICKER_MIXED_CONTENT_CONFIDENCE: f64 = 0.6;

// Amount shapes
pub const AMOUNT_EXACT_BUCKET_CONFIDENCE: f64 = 1.0;
pub const AMOUNT_EXACT_VALUE_CONFIDENCE: f64 = 0.9;
pub const AMOUNT_SNAPPED_CONFIDENCE: f64 = 0.8;
pub const AMOUNT_BELOW_BUCKETS_CONFIDENCE: f64 = 0.7;
pub const AMOUNT_OPEN_ENDED_CONFIDENCE: f64 = 0.5;
pub const AMOUNT_OUT_OF_TOLERANCE_CONFIDENCE: f64 = 0.4;

// Owner normalization
pub const OWNER_EXACT_CONFIDENCE: f64 = 1.0;
pub const OWNER_FUZZY_CONFIDENCE: f64 = 0.8;
pub const OWNER_BLANK_CONFIDENCE: f64 = 0.6;
pub const OWNER_MISALIGNED_CONFIDENCE: f64 = 0.3;
pub const OWNER_UNRECOGNIZED_CONFIDENCE: f64 = 0.2;
pub const OWNER_FUZZY_THRESHOLD: f64 = 0.85;

// Validation defaults
pub const DEFAULT_MIN_TICKER_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MIN_AMOUNT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_COMMIT_BATCH_SIZE: usize = 500;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_REVIEW_TOP_N: usize = 25;
pub const DEFAULT_NAME_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_SNAP_TOLERANCE_RATIO: f64 = 0.05;

/// Namespace for deterministic trade ids (UUID v5).
pub const TRADE_ID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x6b1d_5f0e_8c2a_4e57_9a43_d1f0_2c7e_b915);

/// Clamp a score into the [0, 1] confidence range.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
