//! Virtual environment adapter for the worker's dependencies.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reviewlens_core::paths::venv_python;
use reviewlens_core::ports::{EnvError, IsolatedEnvironment, LineSink};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::process::run_streaming;

/// Packages the worker imports.
pub const REQUIREMENTS: &[&str] = &[
    "pandas>=2.0",
    "numpy>=1.24",
    "torch>=2.1",
    "transformers>=4.40",
    "sentence-transformers>=2.7",
    "langchain-core>=0.2",
    "langchain-openai>=0.1",
    "langchain-ollama>=0.1",
    "pydantic>=2.0",
    "tqdm>=4.66",
    "nltk>=3.8",
    "scikit-learn>=1.3",
    "umap-learn>=0.5",
    "hdbscan>=0.8",
    "bertopic>=0.16",
    "python-dotenv>=1.0",
    "matplotlib>=3.8",
    "openpyxl>=3.1",
];

/// Imports every dependency and exercises each heavy one with a real call.
const VALIDATION_SCRIPT: &str = r"
import pandas, numpy, torch, transformers, sentence_transformers
import langchain_core, langchain_ollama, sklearn, nltk
t = torch.tensor([[1.0, 2.0], [3.0, 4.0]])
assert float((t @ t).sum()) == 54.0
df = pandas.DataFrame({'a': numpy.arange(3)})
assert int(df['a'].sum()) == 3
from sklearn.feature_extraction.text import TfidfVectorizer
TfidfVectorizer().fit(['ok review', 'bad review'])
print('OK')
";

const REQUIREMENTS_FILE: &str = "requirements.txt";

/// [`IsolatedEnvironment`] implemented with `python -m venv` and pip.
#[derive(Debug, Clone)]
pub struct VenvEnvironment {
    dir: PathBuf,
}

impl VenvEnvironment {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn python(&self) -> PathBuf {
        venv_python(&self.dir)
    }

    fn python_command(&self) -> Command {
        let mut cmd = Command::new(self.python());
        cmd.env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1");
        cmd
    }
}

#[async_trait]
impl IsolatedEnvironment for VenvEnvironment {
    fn exists(&self) -> bool {
        self.python().exists()
    }

    async fn create(&self, base_runtime: &Path) -> Result<(), EnvError> {
        info!(dir = %self.dir.display(), runtime = %base_runtime.display(), "Creating virtual environment");
        if let Some(parent) = self.dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = Command::new(base_runtime)
            .arg("-m")
            .arg("venv")
            .arg(&self.dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EnvError::CreateFailed {
                path: self.dir.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EnvError::CreateFailed {
                path: self.dir.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let upgrade = self
            .python_command()
            .args(["-m", "pip", "install", "--upgrade", "pip"])
            .stdin(Stdio::null())
            .output()
            .await;
        match upgrade {
            Ok(out) if out.status.success() => debug!("Upgraded pip"),
            Ok(out) => warn!(status = %out.status, "pip upgrade failed, continuing with bundled pip"),
            Err(e) => warn!(error = %e, "pip upgrade failed, continuing with bundled pip"),
        }

        Ok(())
    }

    async fn remove(&self) -> Result<(), EnvError> {
        if !self.dir.exists() {
            return Ok(());
        }
        info!(dir = %self.dir.display(), "Removing virtual environment");
        tokio::fs::remove_dir_all(&self.dir).await?;
        Ok(())
    }

    async fn install_dependencies(&self, on_line: LineSink<'_>) -> Result<(), EnvError> {
        let requirements = self.dir.join(REQUIREMENTS_FILE);
        tokio::fs::write(&requirements, REQUIREMENTS.join("\n")).await?;

        let mut cmd = self.python_command();
        cmd.args(["-m", "pip", "install", "--progress-bar", "off", "-r"])
            .arg(&requirements);

        let outcome = run_streaming(cmd, on_line).await?;
        if outcome.status.success() {
            Ok(())
        } else {
            Err(EnvError::InstallFailed(outcome.failure()))
        }
    }

    async fn validate(&self) -> Result<(), EnvError> {
        if !self.exists() {
            return Err(EnvError::ValidationFailed(format!(
                "interpreter missing at {}",
                self.python().display()
            )));
        }

        let output = self
            .python_command()
            .args(["-I", "-c", VALIDATION_SCRIPT])
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && stdout.trim_end().ends_with("OK") {
            debug!("Environment validation passed");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("validation script produced no output")
            .to_string();
        Err(EnvError::ValidationFailed(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_cover_validation_imports() {
        for module in ["pandas", "numpy", "torch", "transformers", "nltk"] {
            assert!(REQUIREMENTS.iter().any(|r| r.starts_with(module)), "{module}");
        }
        assert!(REQUIREMENTS.iter().any(|r| r.starts_with("scikit-learn")));
    }

    #[tokio::test]
    async fn test_missing_env_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let env = VenvEnvironment::new(dir.path().join("venv"));
        assert!(!env.exists());
        assert!(matches!(
            env.validate().await,
            Err(EnvError::ValidationFailed(_))
        ));
        env.remove().await.unwrap();
    }
}
