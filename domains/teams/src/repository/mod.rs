//! Storage layer for the teams domain
//!
//! Persistence technology is an external concern; this module provides the
//! reference transactional engine the core runs against. Callers receive a
//! `TeamStore` handle explicitly (no module-level singleton), so tests can
//! substitute an isolated instance.

pub mod store;

pub use store::{RecordedUsage, StoreTx, TeamStore};
