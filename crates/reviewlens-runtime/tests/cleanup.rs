mod common;

use std::sync::Arc;

use common::fakes::{FakeApi, FakePlatform, Journal};
use reviewlens_runtime::{CleanupTargets, UninstallCoordinator};

fn targets(root: &std::path::Path) -> CleanupTargets {
    CleanupTargets {
        data_dir: root.join("reviewlens"),
        service_install_dir: root.join("ollama"),
        service_home_dir: root.join(".ollama"),
    }
}

#[tokio::test]
async fn detects_only_existing_resources() {
    let dir = tempfile::tempdir().unwrap();
    let targets = targets(dir.path());
    std::fs::create_dir_all(&targets.data_dir).unwrap();

    let coordinator = UninstallCoordinator::new(
        targets.clone(),
        Arc::new(FakePlatform::new(None, Journal::default())),
        Arc::new(FakeApi::default()),
    );
    let detected = coordinator.detect().await;

    assert_eq!(detected.data_dir, Some(targets.data_dir));
    assert!(detected.service_install_dir.is_none());
    assert!(detected.service_home_dir.is_none());
    assert!(!detected.service_running);
}

#[tokio::test]
async fn cleanup_stops_service_and_removes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let targets = targets(dir.path());
    for path in [&targets.data_dir, &targets.service_install_dir, &targets.service_home_dir] {
        std::fs::create_dir_all(path.join("nested")).unwrap();
    }

    let journal = Journal::default();
    let coordinator = UninstallCoordinator::new(
        targets.clone(),
        Arc::new(FakePlatform::new(None, journal.clone())),
        Arc::new(FakeApi::default()),
    );
    let report = coordinator.cleanup().await;

    assert!(report.is_clean());
    assert_eq!(report.removed.len(), 3);
    assert_eq!(journal.entries(), vec!["platform.stop", "platform.unregister"]);
    assert!(coordinator.detect().await.is_empty());
}

#[tokio::test]
async fn cleanup_with_nothing_installed_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let coordinator = UninstallCoordinator::new(
        targets(dir.path()),
        Arc::new(FakePlatform::new(None, journal.clone())),
        Arc::new(FakeApi::default()),
    );

    let report = coordinator.cleanup().await;

    assert!(report.removed.is_empty());
    assert!(report.is_clean());
    assert!(journal.entries().is_empty());
}
