//! SQLite-backed Durable Store for response snapshots.
//!
//! This module provides a persistent, generation-scoped key-value store using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named store generations, deleted wholesale when superseded
//! - Atomic per-key upserts (last write wins)
//! - Prefix scans in insertion order
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use store::Store;
