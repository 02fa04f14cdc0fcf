//! Output generation: CSV tables, JSON reports and console summaries.

pub mod generator;

pub use generator::*;
