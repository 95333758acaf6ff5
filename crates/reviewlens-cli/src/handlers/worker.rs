//! Worker command handlers.

use anyhow::Result;
use reviewlens_worker::{
    BridgeEvent, WorkerBridge, WorkerCommand, WorkerResponse, reset_shared_bridge,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::CliContext;
use crate::commands::WorkerAction;
use crate::progress::StageBar;

pub async fn execute(ctx: &CliContext, action: WorkerAction) -> Result<()> {
    if let Err(e) = ctx.settings.validate() {
        warn!(error = %e, "Worker settings are incomplete; LLM-backed phases may fail");
    }

    let bridge = ctx.bridge()?;
    let printer = spawn_event_printer(&bridge);

    let result = dispatch(&bridge, action).await;

    reset_shared_bridge().await;
    printer.abort();

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn dispatch(bridge: &WorkerBridge, action: WorkerAction) -> Result<WorkerResponse> {
    let response = match action {
        WorkerAction::Ping => bridge.ping().await?,
        WorkerAction::Phase { phase, config } => bridge.run_phase(phase, config).await?,
        WorkerAction::Status => bridge.get_status().await?,
        WorkerAction::Validate { path } => bridge.validate_dataset(&path).await?,
        WorkerAction::Exec { action, params } => {
            let command = params
                .into_iter()
                .fold(WorkerCommand::new(action), |cmd, (key, value)| {
                    cmd.with(key, value)
                });
            bridge.execute(command).await?.into_result()?
        }
    };
    Ok(response)
}

/// Render bridge events until the worker closes.
fn spawn_event_printer(bridge: &WorkerBridge) -> JoinHandle<()> {
    let mut events = bridge.subscribe();
    tokio::spawn(async move {
        let bar = StageBar::new();
        loop {
            match events.recv().await {
                Ok(BridgeEvent::PhaseProgress(event)) => {
                    let percent = u8::try_from(event.progress.clamp(0, 100)).unwrap_or(0);
                    let label = event.phase_name.unwrap_or_default();
                    let message = event.message.unwrap_or_default();
                    bar.update(percent, &format!("{label}: {message}"));
                }
                Ok(BridgeEvent::Progress(event)) => {
                    if let Some(subtype) = event.subtype {
                        let model = event.model.unwrap_or_default();
                        bar.println(&format!("[{subtype}] {model} {}%", event.progress));
                    }
                }
                Ok(BridgeEvent::Info(message)) => bar.println(&message),
                Ok(BridgeEvent::Error(message)) => bar.println(&format!("Worker error: {message}")),
                Ok(BridgeEvent::Ready) => {}
                Ok(BridgeEvent::Closed { code }) => {
                    bar.println(&format!("Worker exited (code {code:?})"));
                    break;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped worker events"),
                Err(RecvError::Closed) => break,
            }
        }
        bar.finish("");
    })
}
