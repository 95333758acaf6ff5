//! Inference service command handlers.

use anyhow::{Result, bail};
use reviewlens_core::InferenceInstallState;

use crate::CliContext;
use crate::commands::ServiceCommand;
use crate::progress::StageBar;

pub async fn execute(ctx: &CliContext, command: ServiceCommand) -> Result<()> {
    match command {
        ServiceCommand::Install { model } => {
            install(ctx, model.or_else(|| ctx.settings.local_model.clone())).await
        }
        ServiceCommand::Models => list(ctx).await,
        ServiceCommand::Remove { name } => {
            ctx.installer().delete_model(&name).await?;
            println!("Removed {name}");
            Ok(())
        }
        ServiceCommand::Uninstall => {
            let report = ctx.installer().uninstall().await;
            for path in &report.removed {
                println!("Removed {}", path.display());
            }
            for failure in &report.failures {
                eprintln!("Failed: {failure}");
            }
            if report.is_clean() {
                Ok(())
            } else {
                bail!("Uninstall finished with {} failure(s)", report.failures.len())
            }
        }
    }
}

async fn install(ctx: &CliContext, model: Option<String>) -> Result<()> {
    let installer = ctx.installer();
    let bar = StageBar::new();

    let report = |state: InferenceInstallState| {
        let message = format!(
            "[{:?}/{:?}] {}",
            state.current_phase, state.stage, state.message
        );
        bar.update(state.unified_progress, &message);
        if let Some(error) = &state.error {
            bar.println(&format!("Error: {error}"));
        }
    };

    if installer.setup(model.as_deref(), &report).await {
        bar.finish("Inference service ready");
        Ok(())
    } else {
        bar.fail("Inference service setup failed");
        bail!("Inference service setup failed")
    }
}

async fn list(ctx: &CliContext) -> Result<()> {
    let models = ctx.installer().list_models().await?;
    if models.is_empty() {
        println!("No models installed");
        return Ok(());
    }

    println!("{:<40} {:>8}  MODIFIED", "NAME", "SIZE");
    for model in models {
        let modified = model
            .modified_at
            .map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string());
        println!("{:<40} {:>6.1}GB  {modified}", model.name, model.size_gb());
    }
    Ok(())
}
