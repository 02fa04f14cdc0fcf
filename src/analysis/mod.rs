//! Aggregation over many region records.

pub mod aggregator;

pub use aggregator::*;
