//! Core types and shared functionality for offgrid.
//!
//! This crate provides:
//! - Durable Store implementation with SQLite backend
//! - Request/response model and canonical request identity
//! - Request classification by pattern rules
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use cache::{CacheDb, CacheEntry, Store};
pub use classify::{Classifier, RuleConfig, Strategy};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::Request;
pub use response::{Response, ResponseSource};
