//! Cache tier storage.
//!
//! A tier is a named, independently managed partition of cached responses.
//! Storage sits behind the [`CacheStorage`] trait; [`CacheDb`] is the SQLite
//! implementation with async access via tokio-rusqlite. It supports:
//!
//! - Request identity keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-tier deletion that frees every entry of the tier

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod tiers;

use async_trait::async_trait;

pub use crate::Error;
use crate::http::Response;

pub use connection::CacheDb;
pub use hash::RequestKey;
pub use tiers::{TierHandle, TierNames, TierPurpose, TierRegistry};

/// Storage contract for cache tiers.
///
/// Opening is idempotent, deleting a missing tier is a no-op, and a put into
/// a tier that does not exist yet creates it. Implementations provide atomic
/// per-key reads and writes.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the tier if absent.
    async fn open_tier(&self, tier: &str) -> Result<(), Error>;

    /// Every tier currently present, stale ones included.
    async fn tier_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a tier and all its entries. Returns whether it existed.
    async fn delete_tier(&self, tier: &str) -> Result<bool, Error>;

    async fn get_entry(&self, tier: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Insert or overwrite the entry for `key`.
    async fn put_entry(&self, tier: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// URLs of the entries stored in a tier, ordered by URL.
    async fn entry_urls(&self, tier: &str) -> Result<Vec<String>, Error>;
}
