//! Progress estimation from package installer output.

/// Percentage reached when the installer starts unpacking packages.
const INSTALLING_MILESTONE: u8 = 80;

/// Percentage added per resolved package, before the milestone.
const STEP: u8 = 2;

/// Derives a monotonically increasing percentage from installer lines.
///
/// Every resolved or already-satisfied package nudges the estimate upward,
/// capped just below the "installing collected packages" milestone so a long
/// download phase never looks frozen and never overshoots the install step.
#[derive(Debug, Default)]
pub struct PipProgress {
    percent: u8,
}

impl PipProgress {
    /// Feed one output line; returns a new `(percent, message)` when the
    /// estimate advanced.
    pub fn observe(&mut self, line: &str) -> Option<(u8, String)> {
        let line = line.trim();

        let (target, message) = if let Some(rest) = line.strip_prefix("Collecting ") {
            (self.nudge(), format!("Downloading {}", package_name(rest)))
        } else if let Some(rest) = line.strip_prefix("Requirement already satisfied: ") {
            (self.nudge(), format!("Found {}", package_name(rest)))
        } else if line.starts_with("Successfully built") {
            (self.nudge(), "Built packages".to_string())
        } else if line.starts_with("Installing collected packages") {
            (INSTALLING_MILESTONE, "Installing packages".to_string())
        } else if line.starts_with("Successfully installed") {
            (100, "Dependencies installed".to_string())
        } else {
            return None;
        };

        if target <= self.percent {
            return None;
        }
        self.percent = target;
        Some((target, message))
    }

    /// Current estimate.
    pub const fn percent(&self) -> u8 {
        self.percent
    }

    fn nudge(&self) -> u8 {
        self.percent
            .saturating_add(STEP)
            .min(INSTALLING_MILESTONE - 1)
    }
}

/// Package name from a requirement such as `torch>=2.1 (from -r req.txt)`.
fn package_name(requirement: &str) -> &str {
    let end = requirement
        .find(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~' | ' ' | '[' | ';' | '('))
        .unwrap_or(requirement.len());
    &requirement[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_advances_below_milestone() {
        let mut progress = PipProgress::default();
        for _ in 0..100 {
            progress.observe("Collecting pandas>=2.0");
        }
        assert_eq!(progress.percent(), INSTALLING_MILESTONE - 1);

        let (percent, _) = progress
            .observe("Installing collected packages: pandas, numpy")
            .unwrap();
        assert_eq!(percent, INSTALLING_MILESTONE);
    }

    #[test]
    fn test_messages_name_the_package() {
        let mut progress = PipProgress::default();
        let (_, message) = progress.observe("Collecting torch>=2.1").unwrap();
        assert_eq!(message, "Downloading torch");

        let (_, message) = progress
            .observe("Requirement already satisfied: numpy in ./venv/lib (1.26.4)")
            .unwrap();
        assert_eq!(message, "Found numpy");
    }

    #[test]
    fn test_never_goes_backwards() {
        let mut progress = PipProgress::default();
        progress.observe("Successfully installed pandas-2.2.0");
        assert_eq!(progress.percent(), 100);
        assert!(progress.observe("Collecting numpy").is_none());
        assert!(progress.observe("Installing collected packages: numpy").is_none());
    }

    #[test]
    fn test_ignores_unrelated_lines() {
        let mut progress = PipProgress::default();
        assert!(progress.observe("  Downloading pandas-2.2.0.whl (12.7 MB)").is_none());
        assert_eq!(progress.percent(), 0);
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("scikit-learn"), "scikit-learn");
        assert_eq!(package_name("langchain-core~=0.2"), "langchain-core");
        assert_eq!(package_name("uvicorn[standard] (from -r r.txt)"), "uvicorn");
    }
}
