//! Reachability analysis and reflog expiry for a git object store

pub mod areas;
pub mod artifacts;
pub mod commands;

/// Seconds since the unix epoch
pub type Timestamp = i64;
