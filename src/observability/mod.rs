// Observability: Prometheus metric catalog and recording functions

pub mod metrics;

pub use metrics::{init, MetricName};
