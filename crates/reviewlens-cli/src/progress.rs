//! Terminal progress bars for installer and worker progress.

use indicatif::{ProgressBar, ProgressStyle};

/// A 0-100 bar driven by state callbacks.
///
/// `ProgressBar` is internally shared, so a `&StageBar` can be captured by
/// the `Send + Sync` callbacks the installers take.
#[derive(Debug, Clone)]
pub struct StageBar {
    bar: ProgressBar,
}

impl StageBar {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(bar_style());
        Self { bar }
    }

    pub fn update(&self, progress: u8, message: &str) {
        self.bar.set_position(u64::from(progress.min(100)));
        self.bar.set_message(message.to_string());
    }

    /// Print above the bar without breaking it.
    pub fn println(&self, message: &str) {
        self.bar.println(message);
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn fail(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl Default for StageBar {
    fn default() -> Self {
        Self::new()
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("█▓░"))
}
