//! Cache-related MCP tools.
//!
//! This module provides read-only views of the cache tiers.

pub mod lookup;
pub mod tiers;

pub use lookup::{CacheLookupParams, lookup_impl};
pub use tiers::{CacheTiersParams, tiers_impl};
