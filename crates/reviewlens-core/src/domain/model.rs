use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A model installed in the local inference service.
///
/// Point-in-time snapshot of the service's own catalogue; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ModelRecord {
    /// Whether this record is the model a caller asked for.
    ///
    /// A requested name without a tag matches the `latest` tag.
    pub fn matches(&self, requested: &str) -> bool {
        if self.name == requested {
            return true;
        }
        !requested.contains(':') && self.name == format!("{requested}:latest")
    }

    /// Size in gigabytes, for display.
    #[allow(clippy::cast_precision_loss)]
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / 1_073_741_824.0
    }
}
