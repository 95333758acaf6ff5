//! Installation and process control for the Ollama service.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reviewlens_core::paths::ServiceLayout;
use reviewlens_core::ports::{ServiceError, ServicePlatform, ServiceReport};
use reviewlens_core::ServiceStage;
use sysinfo::{ProcessesToUpdate, System};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::archive::{extract_tar_gz, extract_zip};
use crate::download::{download_to_file, percent};

const DOWNLOAD_BASE_URL: &str = "https://ollama.com/download";

/// Download share of the software phase; extraction and start fill the rest.
const DOWNLOAD_SHARE: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    TarGz,
}

/// Prebuilt bundle for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReleaseAsset {
    file_name: &'static str,
    kind: ArchiveKind,
    /// Binary location relative to the install directory.
    binary: &'static str,
}

fn release_asset() -> Result<ReleaseAsset, ServiceError> {
    let asset = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => ReleaseAsset {
            file_name: "ollama-linux-amd64.tgz",
            kind: ArchiveKind::TarGz,
            binary: "bin/ollama",
        },
        ("linux", "aarch64") => ReleaseAsset {
            file_name: "ollama-linux-arm64.tgz",
            kind: ArchiveKind::TarGz,
            binary: "bin/ollama",
        },
        ("macos", _) => ReleaseAsset {
            file_name: "Ollama-darwin.zip",
            kind: ArchiveKind::Zip,
            binary: "Ollama.app/Contents/Resources/ollama",
        },
        ("windows", "x86_64") => ReleaseAsset {
            file_name: "ollama-windows-amd64.zip",
            kind: ArchiveKind::Zip,
            binary: "ollama.exe",
        },
        (os, arch) => {
            return Err(ServiceError::Install(format!(
                "no prebuilt inference service for {os}-{arch}"
            )));
        }
    };
    Ok(asset)
}

/// [`ServicePlatform`] that installs the vendor's prebuilt archive into the
/// per-user install directory.
#[derive(Debug, Clone)]
pub struct OllamaPlatform {
    layout: ServiceLayout,
    download_base: String,
    client: reqwest::Client,
}

impl OllamaPlatform {
    pub fn new(layout: ServiceLayout) -> Self {
        Self {
            layout,
            download_base: DOWNLOAD_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn installed_binary(&self) -> Option<PathBuf> {
        let asset = release_asset().ok()?;
        let path = self.layout.install_dir().join(asset.binary);
        path.exists().then_some(path)
    }
}

#[async_trait]
impl ServicePlatform for OllamaPlatform {
    fn locate_binary(&self) -> Option<PathBuf> {
        self.installed_binary().or_else(|| which::which("ollama").ok())
    }

    async fn install(&self, report: ServiceReport<'_>) -> Result<PathBuf, ServiceError> {
        let asset = release_asset()?;
        let install_dir = self.layout.install_dir();
        let archive = install_dir.join(asset.file_name);
        let url = format!("{}/{}", self.download_base, asset.file_name);

        info!(%url, dir = %install_dir.display(), "Installing inference service");
        report(ServiceStage::Downloading, 0, "Downloading inference service");
        let on_progress = |done: u64, total: u64| {
            let scaled = u16::from(percent(done, total)) * u16::from(DOWNLOAD_SHARE) / 100;
            report(
                ServiceStage::Downloading,
                u8::try_from(scaled).unwrap_or(DOWNLOAD_SHARE),
                "Downloading inference service",
            );
        };
        download_to_file(&self.client, &url, &archive, &on_progress)
            .await
            .map_err(|e| ServiceError::Install(format!("{e:#}")))?;

        report(ServiceStage::Extracting, DOWNLOAD_SHARE + 5, "Extracting");
        let (src, dest) = (archive.clone(), install_dir.to_path_buf());
        let extracted = tokio::task::spawn_blocking(move || match asset.kind {
            ArchiveKind::Zip => extract_zip(&src, &dest),
            ArchiveKind::TarGz => extract_tar_gz(&src, &dest),
        })
        .await
        .map_err(|e| ServiceError::Install(e.to_string()))?;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!(error = %e, "Failed to remove downloaded archive");
        }
        extracted.map_err(|e| ServiceError::Install(format!("{e:#}")))?;

        let binary = install_dir.join(asset.binary);
        if !binary.exists() {
            return Err(ServiceError::Install(format!(
                "archive did not contain {}",
                asset.binary
            )));
        }
        make_executable(&binary)?;

        if cfg!(windows) {
            if let Err(e) = edit_user_path(install_dir, PathEdit::Add).await {
                warn!(error = %e, "Failed to add inference service to PATH");
            }
        }

        report(ServiceStage::Extracting, 85, "Inference service installed");
        Ok(binary)
    }

    async fn start(&self, binary: &Path) -> Result<(), ServiceError> {
        info!(binary = %binary.display(), "Starting inference service");
        // Detached: the service outlives this process.
        Command::new(binary)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|e| ServiceError::Start(e.to_string()))
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        let own_pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut stopped = 0;
        for (pid, process) in system.processes() {
            if Some(*pid) == own_pid {
                continue;
            }
            let name = process.name().to_string_lossy().to_ascii_lowercase();
            if name.starts_with("ollama") && process.kill() {
                debug!(%pid, %name, "Stopped inference service process");
                stopped += 1;
            }
        }

        info!(stopped, "Inference service stopped");
        Ok(())
    }

    fn removable_paths(&self) -> Vec<PathBuf> {
        vec![
            self.layout.install_dir().to_path_buf(),
            self.layout.home_dir().to_path_buf(),
        ]
    }

    async fn unregister(&self) -> Result<(), ServiceError> {
        if cfg!(windows) {
            edit_user_path(self.layout.install_dir(), PathEdit::Remove).await?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ServiceError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ServiceError> {
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum PathEdit {
    Add,
    Remove,
}

/// Add or remove `dir` from the per-user `Path` via PowerShell.
async fn edit_user_path(dir: &Path, edit: PathEdit) -> Result<(), ServiceError> {
    let dir = dir.display().to_string().replace('\'', "''");
    let filtered = format!(
        "$p = [Environment]::GetEnvironmentVariable('Path', 'User'); \
         $parts = @($p -split ';' | Where-Object {{ $_ -and $_ -ne '{dir}' }});"
    );
    let script = match edit {
        PathEdit::Add => format!(
            "{filtered} $parts += '{dir}'; \
             [Environment]::SetEnvironmentVariable('Path', ($parts -join ';'), 'User')"
        ),
        PathEdit::Remove => format!(
            "{filtered} [Environment]::SetEnvironmentVariable('Path', ($parts -join ';'), 'User')"
        ),
    };

    let output = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .stdin(Stdio::null())
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ServiceError::Install(format!(
            "PATH update failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_asset_for_this_platform() {
        match release_asset() {
            Ok(asset) => {
                assert!(!asset.file_name.is_empty());
                if cfg!(target_os = "linux") {
                    assert_eq!(asset.kind, ArchiveKind::TarGz);
                    assert_eq!(asset.binary, "bin/ollama");
                }
            }
            Err(e) => assert!(matches!(e, ServiceError::Install(_))),
        }
    }

    #[test]
    fn test_removable_paths_cover_install_and_home() {
        let platform = OllamaPlatform::new(ServiceLayout::new("/opt/ollama", "/home/u/.ollama"));
        let paths = platform.removable_paths();
        assert!(paths.contains(&PathBuf::from("/opt/ollama")));
        assert!(paths.contains(&PathBuf::from("/home/u/.ollama")));
    }

    #[test]
    fn test_installed_binary_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let platform = OllamaPlatform::new(ServiceLayout::new(dir.path(), dir.path().join("home")));
        assert!(platform.installed_binary().is_none());
    }
}
