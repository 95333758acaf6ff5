//! CLI bootstrap - the composition root.
//!
//! This is the only place where concrete adapters are wired together:
//! - Environment provisioner (markers, venv, runtime provider, disk probe)
//! - Inference service installer (Ollama platform + HTTP API)
//! - Uninstall coordinator
//! - The shared worker bridge

use std::sync::Arc;

use anyhow::{Context, Result};
use reviewlens_core::paths::{ServiceLayout, worker_script_path};
use reviewlens_core::{PythonEnvLayout, WorkerSettings};
use reviewlens_runtime::{
    CleanupTargets, EnvironmentProvisioner, InferenceInstaller, OllamaApi, OllamaPlatform,
    ServiceConfig, UninstallCoordinator,
};
use reviewlens_worker::{PythonWorkerLauncher, WorkerBridge, shared_bridge};

use crate::settings_args::SettingsArgs;

/// Resolved layouts and settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub layout: PythonEnvLayout,
    pub service_layout: ServiceLayout,
    pub settings: WorkerSettings,
}

/// Resolve paths and settings for this machine.
pub fn bootstrap(args: &SettingsArgs) -> Result<CliContext> {
    let layout = PythonEnvLayout::resolve().context("Failed to resolve data directory")?;
    let service_layout =
        ServiceLayout::resolve().context("Failed to resolve inference service directory")?;
    let settings = args.to_settings(&layout)?;

    Ok(CliContext {
        layout,
        service_layout,
        settings,
    })
}

impl CliContext {
    pub fn provisioner(&self) -> EnvironmentProvisioner {
        EnvironmentProvisioner::for_layout(&self.layout)
    }

    pub fn service_api(&self) -> Arc<OllamaApi> {
        Arc::new(OllamaApi::new(self.settings.service_url.clone()))
    }

    pub fn service_platform(&self) -> Arc<OllamaPlatform> {
        Arc::new(OllamaPlatform::new(self.service_layout.clone()))
    }

    pub fn installer(&self) -> InferenceInstaller {
        InferenceInstaller::new(
            self.service_platform(),
            self.service_api(),
            ServiceConfig::default(),
        )
    }

    pub fn coordinator(&self) -> UninstallCoordinator {
        let targets = CleanupTargets::from_layouts(&self.layout, &self.service_layout);
        UninstallCoordinator::new(targets, self.service_platform(), self.service_api())
    }

    /// The process-wide worker bridge, created on first use.
    pub fn bridge(&self) -> Result<WorkerBridge> {
        let script = worker_script_path().context("Failed to locate worker script")?;
        let launcher = PythonWorkerLauncher::new(self.layout.clone(), script);
        let settings = self.settings.clone();
        Ok(shared_bridge(move || {
            WorkerBridge::new(Arc::new(launcher), settings)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_targets_follow_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PythonEnvLayout::new(dir.path());
        let ctx = CliContext {
            settings: SettingsArgs::default().to_settings(&layout).unwrap(),
            service_layout: ServiceLayout::new(dir.path().join("ollama"), dir.path().join(".ollama")),
            layout,
        };

        let targets = ctx.coordinator().targets().clone();
        assert_eq!(targets.data_dir, dir.path());
        assert_eq!(targets.service_install_dir, dir.path().join("ollama"));
        assert_eq!(targets.service_home_dir, dir.path().join(".ollama"));
    }
}
