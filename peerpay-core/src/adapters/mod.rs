//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Repository port
//! - In-memory maps with per-account locks, for tests and embedding

pub mod duckdb;
pub mod memory;
