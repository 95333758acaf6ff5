//! Progress parsing for `ollama pull` output.

use std::sync::LazyLock;

use regex::Regex;
use reviewlens_core::ServiceStage;

/// Model-phase percentage reached when the download finishes.
const DOWNLOAD_CEILING: u8 = 90;

static PERCENT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})%").ok());

/// One recognised pull output line, as model-phase progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullUpdate {
    pub stage: ServiceStage,
    pub progress: u8,
    pub message: String,
}

impl PullUpdate {
    fn new(stage: ServiceStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress,
            message: message.into(),
        }
    }
}

/// Parse one pull output line. Unknown lines yield `None`.
pub fn parse_pull_line(line: &str) -> Option<PullUpdate> {
    let line = line.trim();
    let lower = line.to_ascii_lowercase();

    if lower.starts_with("pulling manifest") {
        return Some(PullUpdate::new(ServiceStage::PullingModel, 0, "Fetching model manifest"));
    }
    if lower.starts_with("pulling ") {
        let percent = extract_percent(line)?;
        let progress = u8::try_from(u16::from(percent) * u16::from(DOWNLOAD_CEILING) / 100)
            .unwrap_or(DOWNLOAD_CEILING);
        return Some(PullUpdate::new(
            ServiceStage::PullingModel,
            progress,
            format!("Downloading model: {percent}%"),
        ));
    }
    if lower.starts_with("verifying sha256 digest") {
        return Some(PullUpdate::new(ServiceStage::Verifying, 92, "Verifying download"));
    }
    if lower.starts_with("writing manifest") {
        return Some(PullUpdate::new(ServiceStage::Verifying, 95, "Writing manifest"));
    }
    if lower.starts_with("removing any unused layers") || lower.starts_with("removing unused layers") {
        return Some(PullUpdate::new(ServiceStage::Verifying, 97, "Cleaning up"));
    }
    if lower == "success" {
        return Some(PullUpdate::new(ServiceStage::Verifying, 98, "Model downloaded"));
    }
    None
}

fn extract_percent(line: &str) -> Option<u8> {
    let captures = PERCENT_PATTERN.as_ref()?.captures(line)?;
    let value: u8 = captures.get(1)?.as_str().parse().ok()?;
    Some(value.min(100))
}
