//! State-machine tests for the environment provisioner against in-memory
//! ports.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::fakes::{FakeEnv, FakeRuntime, Journal, MemoryMarkers};
use mockall::mock;
use reviewlens_core::ports::{DiskSpaceProbe, MarkerState, MarkerStore};
use reviewlens_core::{InstallationState, SetupStage};
use reviewlens_runtime::{EnvironmentProvisioner, ProvisionConfig, ProvisionError};
use tokio_test::{assert_err, assert_ok};

mock! {
    pub Disk {}

    impl DiskSpaceProbe for Disk {
        fn available_bytes(&self, path: &Path) -> Option<u64>;
    }
}

const GIB: u64 = 1024 * 1024 * 1024;

struct Harness {
    provisioner: EnvironmentProvisioner,
    env: Arc<FakeEnv>,
    markers: Arc<MemoryMarkers>,
    journal: Journal,
    _dir: tempfile::TempDir,
    output_dir: PathBuf,
}

fn plenty_of_disk() -> MockDisk {
    let mut disk = MockDisk::new();
    disk.expect_available_bytes().return_const(Some(100 * GIB));
    disk
}

fn harness(marker_state: MarkerState, runtime: Option<PathBuf>, disk: MockDisk) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("data").join("shared");
    let journal = Journal::default();

    let env = Arc::new(FakeEnv::new(journal.clone()));
    let markers = Arc::new(MemoryMarkers::new(marker_state, journal.clone()));
    let runtime = Arc::new(FakeRuntime {
        installed: runtime,
        journal: journal.clone(),
    });

    let config = ProvisionConfig {
        min_free_bytes: 5 * GIB,
        install_attempts: 3,
        retry_delay: Duration::ZERO,
        target_dir: dir.path().to_path_buf(),
        output_dirs: vec![output_dir.clone()],
    };

    let provisioner = EnvironmentProvisioner::new(
        runtime,
        env.clone(),
        Arc::new(disk),
        markers.clone(),
        config,
    );

    Harness {
        provisioner,
        env,
        markers,
        journal,
        _dir: dir,
        output_dir,
    }
}

fn system_python() -> Option<PathBuf> {
    Some(PathBuf::from("/usr/bin/python3"))
}

async fn run_setup(provisioner: &EnvironmentProvisioner) -> (bool, Vec<InstallationState>) {
    let states = Mutex::new(Vec::new());
    let report = |state: InstallationState| states.lock().unwrap().push(state);
    let ok = provisioner.setup(&report).await;
    (ok, states.into_inner().unwrap())
}

fn stages(states: &[InstallationState]) -> Vec<SetupStage> {
    let mut stages: Vec<SetupStage> = states.iter().map(|s| s.stage).collect();
    stages.dedup();
    stages
}

#[tokio::test]
async fn fresh_install_walks_every_stage() {
    let h = harness(MarkerState::Absent, system_python(), plenty_of_disk());

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(ok);
    assert_eq!(
        stages(&states),
        vec![
            SetupStage::Checking,
            SetupStage::CreatingIsolatedEnv,
            SetupStage::InstallingDeps,
            SetupStage::Complete,
        ]
    );
    assert!(states.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert_eq!(states.last().unwrap().progress, 100);
    assert_eq!(h.markers.state(), MarkerState::Complete);
    assert!(h.output_dir.is_dir());
    assert!(h.provisioner.is_ready());
}

#[tokio::test]
async fn markers_bracket_environment_mutation() {
    let h = harness(MarkerState::Absent, system_python(), plenty_of_disk());

    assert!(run_setup(&h.provisioner).await.0);

    let begin = h.journal.position("markers.begin").unwrap();
    let create = h.journal.position("env.create").unwrap();
    let commit = h.journal.position("markers.commit").unwrap();
    assert!(begin < create);
    assert!(create < commit);
    // Validated after install and again after output directories exist.
    assert_eq!(h.journal.count("env.validate"), 2);
    assert_eq!(h.journal.entries().last(), Some(&"markers.commit"));
}

#[tokio::test]
async fn interrupted_install_is_discarded_and_restarted() {
    let h = harness(MarkerState::InProgress, system_python(), plenty_of_disk());
    h.env.exists.store(true, Ordering::SeqCst);

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(ok);
    assert_eq!(states[0].stage, SetupStage::Checking);
    let entries = h.journal.entries();
    assert_eq!(&entries[..3], &["env.remove", "markers.reset", "runtime.detect"]);
    assert!(h.journal.position("env.create").unwrap() > h.journal.position("markers.begin").unwrap());
    assert_eq!(h.markers.state(), MarkerState::Complete);
}

#[tokio::test]
async fn install_fails_after_three_attempts() {
    let h = harness(MarkerState::Absent, system_python(), plenty_of_disk());
    h.env.failing_installs.store(3, Ordering::SeqCst);

    let result = h.provisioner.run(&|_| {}).await;

    match assert_err!(result) {
        ProvisionError::Install { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.journal.count("env.install"), 3);
    assert_eq!(h.markers.state(), MarkerState::InProgress);
}

#[tokio::test]
async fn install_succeeds_after_transient_failures() {
    let h = harness(MarkerState::Absent, system_python(), plenty_of_disk());
    h.env.failing_installs.store(2, Ordering::SeqCst);

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(ok);
    assert_eq!(h.journal.count("env.install"), 3);
    assert_eq!(h.markers.state(), MarkerState::Complete);

    // Retry banners must not pull the bar back to the start of the band
    let deps: Vec<u8> = states
        .iter()
        .filter(|s| s.stage == SetupStage::InstallingDeps)
        .map(|s| s.progress)
        .collect();
    assert!(deps.iter().filter(|p| **p > 35).count() >= 2);
    assert!(deps.windows(2).all(|w| w[0] <= w[1]), "{deps:?}");
    assert!(states.windows(2).all(|w| w[0].progress <= w[1].progress));
}

#[tokio::test]
async fn failed_setup_reports_error_stage() {
    let h = harness(MarkerState::Absent, system_python(), plenty_of_disk());
    h.env.failing_installs.store(3, Ordering::SeqCst);

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(!ok);
    let last = states.last().unwrap();
    assert_eq!(last.stage, SetupStage::Error);
    assert!(last.error.as_deref().unwrap().contains("after 3 attempts"));
    assert!(last.progress >= 35);
}

#[tokio::test]
async fn low_disk_fails_before_any_marker() {
    let mut disk = MockDisk::new();
    disk.expect_available_bytes()
        .times(1)
        .return_const(Some(GIB));
    let h = harness(MarkerState::Absent, system_python(), disk);

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(!ok);
    assert_eq!(states.last().unwrap().stage, SetupStage::Error);
    assert!(states.last().unwrap().error.as_deref().unwrap().contains("disk space"));
    assert_eq!(h.markers.state(), MarkerState::Absent);
    assert!(h.journal.entries().is_empty());
}

#[tokio::test]
async fn unknown_disk_space_does_not_block() {
    let mut disk = MockDisk::new();
    disk.expect_available_bytes().return_const(None);
    let h = harness(MarkerState::Absent, system_python(), disk);

    assert!(run_setup(&h.provisioner).await.0);
}

#[tokio::test]
async fn committed_environment_is_reused() {
    let h = harness(MarkerState::Complete, system_python(), plenty_of_disk());
    h.env.exists.store(true, Ordering::SeqCst);

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(ok);
    assert_eq!(stages(&states), vec![SetupStage::Checking, SetupStage::Complete]);
    assert_eq!(h.journal.entries(), vec!["env.validate"]);
    assert!(h.output_dir.is_dir());
}

#[tokio::test]
async fn committed_but_broken_environment_is_reinstalled() {
    let h = harness(MarkerState::Complete, system_python(), plenty_of_disk());
    h.env.exists.store(true, Ordering::SeqCst);
    h.env.valid.store(false, Ordering::SeqCst);

    let result = h.provisioner.run(&|_| {}).await;

    // Still broken after reinstall, so the final validation fails.
    assert!(matches!(result, Err(ProvisionError::Validation(_))));
    assert_eq!(h.journal.position("env.remove"), Some(1));
    assert_eq!(h.journal.count("env.create"), 1);
    assert_eq!(h.markers.state(), MarkerState::InProgress);
}

#[tokio::test]
async fn missing_runtime_is_acquired() {
    let h = harness(MarkerState::Absent, None, plenty_of_disk());

    let (ok, states) = run_setup(&h.provisioner).await;

    assert!(ok);
    assert_eq!(
        stages(&states)[..3],
        [
            SetupStage::Checking,
            SetupStage::DownloadingRuntime,
            SetupStage::InstallingRuntime,
        ]
    );
    for state in &states {
        match state.stage {
            SetupStage::DownloadingRuntime => assert!((5..=15).contains(&state.progress)),
            SetupStage::InstallingRuntime => assert!((15..=25).contains(&state.progress)),
            _ => {}
        }
    }
    assert_eq!(h.journal.count("runtime.acquire"), 1);
}
