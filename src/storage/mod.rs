//! Fact storage for FactLog.
//!
//! The store is rebuilt from scratch every tick, so it only needs insertion
//! and lookup.

mod fact_store;

pub use fact_store::{FactStore, Tuple};
