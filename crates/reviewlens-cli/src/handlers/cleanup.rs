//! Cleanup command handler.

use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};

use crate::CliContext;

/// Detect and remove everything reviewlens installed.
///
/// Without `auto` the detection report is shown and the user must confirm.
pub async fn execute(ctx: &CliContext, auto: bool) -> Result<()> {
    let coordinator = ctx.coordinator();
    let detected = coordinator.detect().await;

    if detected.is_empty() {
        println!("Nothing to clean up");
        return Ok(());
    }

    if !auto {
        println!("The following will be removed:");
        for path in detected.paths() {
            println!("  {}", path.display());
        }
        if detected.service_running {
            println!("  (the running inference service will be stopped)");
        }
        if !confirm("Continue? [y/N] ")? {
            println!("Cancelled");
            return Ok(());
        }
    }

    let report = coordinator.cleanup().await;
    for path in &report.removed {
        println!("Removed {}", path.display());
    }
    for failure in &report.failures {
        eprintln!("Failed: {failure}");
    }

    if report.is_clean() {
        Ok(())
    } else {
        bail!("Cleanup finished with {} failure(s)", report.failures.len())
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
