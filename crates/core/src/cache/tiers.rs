//! Cache tier registry.
//!
//! Maps logical tier purposes to versioned tier names and hands out
//! [`TierHandle`]s bound to a storage backend.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CacheStorage, RequestKey};
use crate::Error;
use crate::http::Response;

/// What a tier holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TierPurpose {
    Static,
    Api,
    Image,
}

impl TierPurpose {
    pub const ALL: [TierPurpose; 3] = [TierPurpose::Static, TierPurpose::Api, TierPurpose::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierPurpose::Static => "static",
            TierPurpose::Api => "api",
            TierPurpose::Image => "image",
        }
    }
}

impl fmt::Display for TierPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierPurpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(TierPurpose::Static),
            "api" => Ok(TierPurpose::Api),
            "image" | "img" => Ok(TierPurpose::Image),
            other => Err(Error::InvalidInput(format!("unknown tier purpose: {other}"))),
        }
    }
}

/// The known-tier set of one cache version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierNames {
    names: [String; 3],
}

impl TierNames {
    /// Names are `{prefix}-{purpose}-{version}`, or `{purpose}-{version}`
    /// when the prefix is empty.
    pub fn new(prefix: &str, version: &str) -> Self {
        let prefix = prefix.trim().trim_end_matches('-');
        let version = version.trim();
        let names = TierPurpose::ALL.map(|purpose| {
            if prefix.is_empty() { format!("{purpose}-{version}") } else { format!("{prefix}-{purpose}-{version}") }
        });
        Self { names }
    }

    pub fn name(&self, purpose: TierPurpose) -> &str {
        let index = match purpose {
            TierPurpose::Static => 0,
            TierPurpose::Api => 1,
            TierPurpose::Image => 2,
        };
        &self.names[index]
    }

    pub fn contains(&self, tier: &str) -> bool {
        self.names.iter().any(|name| name == tier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Opens, enumerates and deletes tiers on a storage backend.
#[derive(Clone)]
pub struct TierRegistry {
    storage: Arc<dyn CacheStorage>,
}

impl TierRegistry {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Open a tier, creating it if absent. Opening twice is not an error.
    pub async fn open(&self, name: &str) -> Result<TierHandle, Error> {
        self.storage.open_tier(name).await?;
        Ok(TierHandle { name: name.to_string(), storage: Arc::clone(&self.storage) })
    }

    /// Handle without touching storage. A write through it creates the tier;
    /// lookups in a tier that does not exist miss.
    pub fn handle(&self, name: &str) -> TierHandle {
        TierHandle { name: name.to_string(), storage: Arc::clone(&self.storage) }
    }

    /// Every stored tier, including those of superseded versions.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.storage.tier_names().await
    }

    /// Irreversibly delete a tier. Deleting a missing tier returns `false`.
    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.storage.delete_tier(name).await
    }

    /// Look `key` up in each named tier in order; storage errors count as misses.
    pub async fn match_any<'a>(&self, tiers: impl IntoIterator<Item = &'a str>, key: &RequestKey) -> Option<Response> {
        for tier in tiers {
            match self.storage.get_entry(tier, key).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => tracing::warn!(tier, url = %key.url, error = %e, "cache lookup failed"),
            }
        }
        None
    }
}

/// A single opened tier.
#[derive(Clone)]
pub struct TierHandle {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for TierHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierHandle").field("name", &self.name).finish_non_exhaustive()
    }
}

impl TierHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn lookup(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.storage.get_entry(&self.name, key).await
    }

    pub async fn put(&self, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.storage.put_entry(&self.name, key, response).await
    }

    pub async fn urls(&self) -> Result<Vec<String>, Error> {
        self.storage.entry_urls(&self.name).await
    }
}
