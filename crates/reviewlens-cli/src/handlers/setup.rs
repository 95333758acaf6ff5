//! Setup command handler.

use anyhow::{Result, bail};
use reviewlens_core::InstallationState;

use crate::CliContext;
use crate::progress::StageBar;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let provisioner = ctx.provisioner();
    let bar = StageBar::new();

    let report = |state: InstallationState| {
        bar.update(state.progress, &format!("[{}] {}", state.stage.as_str(), state.message));
        if let Some(error) = &state.error {
            bar.println(&format!("Error: {error}"));
        }
    };

    if provisioner.setup(&report).await {
        bar.finish("Environment ready");
        Ok(())
    } else {
        bar.fail("Environment setup failed");
        bail!("Environment setup failed; fix the error above and run `reviewlens setup` again")
    }
}
