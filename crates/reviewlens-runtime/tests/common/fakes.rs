//! In-memory port implementations shared by the installer tests.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reviewlens_core::ports::{
    EnvError, IsolatedEnvironment, LineSink, MarkerInfo, MarkerState, MarkerStore,
    RuntimeProvider, RuntimeReport, RuntimeStep, ServiceApi, ServiceError, ServicePlatform,
    ServiceReport,
};
use reviewlens_core::{ModelRecord, ServiceStage};

/// Ordered record of side effects across fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    pub fn push(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| **e == entry).count()
    }

    /// Index of the first occurrence of `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| *e == entry)
    }
}

// =============================================================================
// Provisioning fakes
// =============================================================================

pub struct FakeRuntime {
    pub installed: Option<PathBuf>,
    pub journal: Journal,
}

#[async_trait]
impl RuntimeProvider for FakeRuntime {
    async fn detect(&self) -> Option<PathBuf> {
        self.journal.push("runtime.detect");
        self.installed.clone()
    }

    async fn acquire(&self, report: RuntimeReport<'_>) -> Result<PathBuf, EnvError> {
        self.journal.push("runtime.acquire");
        report(RuntimeStep::Downloading, 50, "Downloading Python");
        report(RuntimeStep::Downloading, 100, "Downloading Python");
        report(RuntimeStep::Installing, 100, "Python installed");
        Ok(PathBuf::from("/fake/python3"))
    }
}

pub struct FakeEnv {
    pub exists: AtomicBool,
    /// Installs that fail before one succeeds.
    pub failing_installs: AtomicU32,
    pub valid: AtomicBool,
    pub journal: Journal,
}

impl FakeEnv {
    pub fn new(journal: Journal) -> Self {
        Self {
            exists: AtomicBool::new(false),
            failing_installs: AtomicU32::new(0),
            valid: AtomicBool::new(true),
            journal,
        }
    }
}

#[async_trait]
impl IsolatedEnvironment for FakeEnv {
    fn exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }

    async fn create(&self, _base_runtime: &Path) -> Result<(), EnvError> {
        self.journal.push("env.create");
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self) -> Result<(), EnvError> {
        self.journal.push("env.remove");
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn install_dependencies(&self, on_line: LineSink<'_>) -> Result<(), EnvError> {
        self.journal.push("env.install");
        on_line("Collecting pandas>=2.0");
        on_line("Collecting torch>=2.1");
        let remaining = self.failing_installs.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_installs.store(remaining - 1, Ordering::SeqCst);
            return Err(EnvError::InstallFailed("file is locked".to_string()));
        }
        on_line("Installing collected packages: pandas, torch");
        on_line("Successfully installed pandas-2.2.0 torch-2.3.0");
        Ok(())
    }

    async fn validate(&self) -> Result<(), EnvError> {
        self.journal.push("env.validate");
        if self.valid.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EnvError::ValidationFailed("No module named 'torch'".to_string()))
        }
    }
}

pub struct MemoryMarkers {
    pub state: Mutex<MarkerState>,
    pub journal: Journal,
}

impl MemoryMarkers {
    pub fn new(state: MarkerState, journal: Journal) -> Self {
        Self {
            state: Mutex::new(state),
            journal,
        }
    }
}

impl MarkerStore for MemoryMarkers {
    fn state(&self) -> MarkerState {
        *self.state.lock().unwrap()
    }

    fn begin(&self, _info: &MarkerInfo) -> io::Result<()> {
        self.journal.push("markers.begin");
        *self.state.lock().unwrap() = MarkerState::InProgress;
        Ok(())
    }

    fn commit(&self, _info: &MarkerInfo) -> io::Result<()> {
        self.journal.push("markers.commit");
        *self.state.lock().unwrap() = MarkerState::Complete;
        Ok(())
    }

    fn reset(&self) -> io::Result<()> {
        self.journal.push("markers.reset");
        *self.state.lock().unwrap() = MarkerState::Absent;
        Ok(())
    }
}

// =============================================================================
// Inference service fakes
// =============================================================================

pub fn model(name: &str) -> ModelRecord {
    ModelRecord {
        name: name.to_string(),
        size_bytes: 1_000,
        modified_at: None,
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub healthy: AtomicBool,
    pub models: Mutex<Vec<ModelRecord>>,
    pub pull_lines: Vec<&'static str>,
    pub journal: Journal,
}

impl FakeApi {
    pub fn with_models(names: &[&str]) -> Self {
        Self {
            models: Mutex::new(names.iter().map(|n| model(n)).collect()),
            ..Self::default()
        }
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }
}

#[async_trait]
impl ServiceApi for FakeApi {
    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>, ServiceError> {
        Ok(self.models.lock().unwrap().clone())
    }

    async fn delete_model(&self, name: &str) -> Result<(), ServiceError> {
        self.journal.push("api.delete");
        let mut models = self.models.lock().unwrap();
        let before = models.len();
        models.retain(|m| m.name != name);
        if models.len() == before {
            return Err(ServiceError::ModelNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn pull_model(
        &self,
        _binary: &Path,
        name: &str,
        on_line: LineSink<'_>,
    ) -> Result<(), ServiceError> {
        self.journal.push("api.pull");
        for line in &self.pull_lines {
            on_line(line);
        }
        let tagged = if name.contains(':') {
            name.to_string()
        } else {
            format!("{name}:latest")
        };
        self.models.lock().unwrap().push(model(&tagged));
        Ok(())
    }
}

pub struct FakePlatform {
    pub binary: Mutex<Option<PathBuf>>,
    /// Starting the service flips this fake API to healthy when set.
    pub api: Option<Arc<FakeApi>>,
    pub removable: Vec<PathBuf>,
    pub fail_stop: bool,
    pub journal: Journal,
}

impl FakePlatform {
    pub fn new(api: Option<Arc<FakeApi>>, journal: Journal) -> Self {
        Self {
            binary: Mutex::new(None),
            api,
            removable: Vec::new(),
            fail_stop: false,
            journal,
        }
    }

    pub fn installed(self) -> Self {
        *self.binary.lock().unwrap() = Some(PathBuf::from("/fake/ollama"));
        self
    }
}

#[async_trait]
impl ServicePlatform for FakePlatform {
    fn locate_binary(&self) -> Option<PathBuf> {
        self.binary.lock().unwrap().clone()
    }

    async fn install(&self, report: ServiceReport<'_>) -> Result<PathBuf, ServiceError> {
        self.journal.push("platform.install");
        report(ServiceStage::Downloading, 30, "Downloading inference service");
        report(ServiceStage::Extracting, 80, "Extracting");
        let binary = PathBuf::from("/fake/ollama");
        *self.binary.lock().unwrap() = Some(binary.clone());
        Ok(binary)
    }

    async fn start(&self, _binary: &Path) -> Result<(), ServiceError> {
        self.journal.push("platform.start");
        if let Some(api) = &self.api {
            api.healthy.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.journal.push("platform.stop");
        if self.fail_stop {
            return Err(ServiceError::Start("access denied".to_string()));
        }
        Ok(())
    }

    fn removable_paths(&self) -> Vec<PathBuf> {
        self.removable.clone()
    }

    async fn unregister(&self) -> Result<(), ServiceError> {
        self.journal.push("platform.unregister");
        Ok(())
    }
}
