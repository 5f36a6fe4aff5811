//! Core types and shared functionality for swtier.
//!
//! This crate provides:
//! - Request/response snapshots exchanged with the network and the cache
//! - Cache tier storage with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage, TierHandle, TierNames, TierPurpose, TierRegistry};
pub use config::{AppConfig, ConfigError, RoutingRules};
pub use error::Error;
pub use http::{Destination, Request, Response};
