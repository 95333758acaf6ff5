//! Durable install markers.
//!
//! The environment provisioner records its progress as two markers. Their
//! existence, not their content, drives state transitions; the JSON payload
//! is for diagnostics only.

use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable state of a managed environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// No install has been attempted.
    Absent,
    /// An install started and never committed.
    InProgress,
    /// Validation passed and the install was committed.
    Complete,
}

/// Payload written into a marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerInfo {
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub platform: String,
}

impl MarkerInfo {
    /// Marker payload for this build on this machine, stamped now.
    pub fn current() -> Self {
        Self {
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

/// Persistence for the two install markers.
///
/// `begin` must be durable before the environment is mutated; `commit` writes
/// the completion marker and then removes the in-progress one.
pub trait MarkerStore: Send + Sync {
    fn state(&self) -> MarkerState;

    fn begin(&self, info: &MarkerInfo) -> io::Result<()>;

    fn commit(&self, info: &MarkerInfo) -> io::Result<()>;

    /// Remove both markers. Missing markers are not an error.
    fn reset(&self) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_info_round_trips() {
        let info = MarkerInfo::current();
        let json = serde_json::to_string(&info).unwrap();
        let back: MarkerInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
        assert!(info.platform.contains(std::env::consts::OS));
    }
}
