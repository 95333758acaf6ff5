//! Classifier for the worker's free-text diagnostic stream.
//!
//! The worker's stderr carries library chatter, warnings, tracebacks and
//! progress bars. Each line is classified in isolation:
//!
//! 1. A line containing a known informational phrase is demoted to info.
//! 2. A line containing a failure keyword is surfaced as an error, even when
//!    it also carries a percentage.
//! 3. A `"<label>: NN%"` progress line becomes a [`ProgressEvent`], but only
//!    while a phase context is set. Without one it is dropped so a finished
//!    phase cannot leak progress into the next.
//! 4. Everything else is dropped.

use std::sync::LazyLock;

use regex::Regex;
use reviewlens_core::{PhaseContext, ProgressEvent};

/// Benign phrases from the worker's libraries, matched case-insensitively.
pub const INFO_PHRASES: &[&str] = &[
    "futurewarning",
    "userwarning",
    "deprecationwarning",
    "warnings.warn(",
    "device set to use",
    "some weights of",
    "you should probably train",
    "huggingface/tokenizers",
    "disabling parallelism",
    "xet storage",
    "onednn custom operations",
    "[nltk_data]",
];

/// Failure keywords, matched case-insensitively.
pub const ERROR_KEYWORDS: &[&str] = &["error", "exception", "traceback", "failed", "fatal"];

static PROGRESS_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?P<label>[^:\r\n|]+):\s*(?P<pct>\d{1,3})%(?:\|[^|]*\|\s*(?P<cur>\d+)/(?P<total>\d+))?",
    )
    .ok()
});

/// How a diagnostic line should be surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticLine {
    Progress(ProgressEvent),
    Info(String),
    Error(String),
    Ignored,
}

/// Classify one diagnostic line against the current phase context.
pub fn classify_diagnostic_line(line: &str, context: Option<&PhaseContext>) -> DiagnosticLine {
    let line = line.trim();
    if line.is_empty() {
        return DiagnosticLine::Ignored;
    }

    let lower = line.to_lowercase();
    if INFO_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return DiagnosticLine::Info(line.to_string());
    }
    if ERROR_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        return DiagnosticLine::Error(line.to_string());
    }

    if let (Some(progress), Some(ctx)) = (parse_progress(line), context) {
        return DiagnosticLine::Progress(ProgressEvent::for_phase(
            ctx,
            progress.percent,
            progress.message,
        ));
    }

    DiagnosticLine::Ignored
}

struct ParsedProgress {
    percent: i32,
    message: String,
}

fn parse_progress(line: &str) -> Option<ParsedProgress> {
    let caps = PROGRESS_PATTERN.as_ref()?.captures(line)?;
    let percent: i32 = caps.name("pct")?.as_str().parse().ok()?;
    if percent > 100 {
        return None;
    }

    let message = match (caps.name("cur"), caps.name("total")) {
        (Some(cur), Some(total)) => format!("Processing {}/{}", cur.as_str(), total.as_str()),
        _ => format!("{}: {percent}%", caps.name("label")?.as_str().trim()),
    };

    Some(ParsedProgress { percent, message })
}
