//! Client side of swtier.
//!
//! This crate provides the caching engine (strategy selection, executors,
//! fallbacks, install/activate lifecycle) and the reqwest-backed network
//! collaborator it fetches through.

pub mod engine;
pub mod fetch;

pub use engine::{
    ActivateReport, Engine, Fallback, GcReport, InstallReport, Interception, Outcome, Phase, PrefetchReport,
    ResourceDescriptor, Strategy, StrategyDecision,
};

pub use fetch::{CacheMode, Credentials, FetchClient, FetchConfig, FetchRequest, Network, OriginSet};
