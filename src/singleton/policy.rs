use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// How the one instance of a singleton type is obtained
///
/// Every policy upholds the same contract (at most one live instance per
/// type, slot cleared before teardown continues); they differ in how they
/// synchronize first access and what steady-state access costs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Unsynchronized check-then-construct.
    ///
    /// Reads are a single atomic load. If two callers race on an empty slot,
    /// both may construct; the first to publish wins and the other instance
    /// is discarded. Use when first access is known to happen on one thread.
    Eager,

    /// The whole check-construct-return sequence runs under a mutex.
    ///
    /// Safe from any thread, but every access, including steady-state
    /// reads, takes the lock.
    #[strum(to_string = "locked", serialize = "lock")]
    Locked,

    /// One-shot deferred construction.
    ///
    /// Concurrent first accesses run construction at most once; afterwards
    /// access is a wait-free load that never enters a guarded section.
    #[default]
    Lazy,
}
