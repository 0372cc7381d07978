// Pipeline processing: pure, independent per-field stages

pub mod amount;
pub mod enrich;
pub mod owner;
pub mod quality_gate;
pub mod similarity;
pub mod text;
pub mod ticker;
pub mod transaction;
