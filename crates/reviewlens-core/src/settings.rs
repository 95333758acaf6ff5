//! Worker settings and the process environment derived from them.
//!
//! The worker reads its configuration exclusively from environment variables
//! at spawn time, so any change here requires a bridge restart.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default hosted model when none is configured.
pub const DEFAULT_API_MODEL: &str = "gpt-4o-mini";

/// Default inference service address passed to the worker.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:11434";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Which language model backend the worker should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// Hosted API (requires an API key).
    Api,
    /// Local inference service.
    #[default]
    Local,
    /// Phases that need a language model are skipped.
    None,
}

impl LlmMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Local => "local",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for LlmMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LlmMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "local" => Ok(Self::Local),
            "none" => Ok(Self::None),
            other => Err(SettingsError::UnknownMode(other.to_string())),
        }
    }
}

/// Validation errors for [`WorkerSettings`].
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("Unknown LLM mode '{0}' (expected api, local or none)")]
    UnknownMode(String),

    #[error("API mode requires an API key")]
    MissingApiKey,

    #[error("Local mode requires a model name")]
    MissingLocalModel,

    #[error("Temperature {0} is outside the supported range 0.0..=2.0")]
    TemperatureOutOfRange(f32),
}

/// Configuration handed to the worker process as environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSettings {
    pub mode: LlmMode,
    pub api_key: Option<String>,
    pub api_model: String,
    pub local_model: Option<String>,
    pub service_url: String,
    pub temperature: f32,
    pub output_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub models_cache_dir: Option<PathBuf>,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    /// Two-letter language code for worker-generated text.
    pub language: String,
    pub log_level: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            mode: LlmMode::default(),
            api_key: None,
            api_model: DEFAULT_API_MODEL.to_string(),
            local_model: None,
            service_url: DEFAULT_SERVICE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            output_dir: None,
            data_dir: None,
            models_cache_dir: None,
            http_proxy: None,
            https_proxy: None,
            no_proxy: None,
            language: "es".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl WorkerSettings {
    /// Check the settings are usable for the selected mode.
    pub fn validate(&self) -> Result<(), SettingsError> {
        match self.mode {
            LlmMode::Api if is_blank(self.api_key.as_deref()) => {
                return Err(SettingsError::MissingApiKey);
            }
            LlmMode::Local if is_blank(self.local_model.as_deref()) => {
                return Err(SettingsError::MissingLocalModel);
            }
            _ => {}
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SettingsError::TemperatureOutOfRange(self.temperature));
        }

        Ok(())
    }

    /// Environment variables for the worker process.
    ///
    /// Unset optional values are omitted rather than passed empty, so the
    /// worker's own defaults apply.
    pub fn to_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = vec![
            ("PYTHONUNBUFFERED".into(), "1".into()),
            ("PYTHONIOENCODING".into(), "utf-8".into()),
            ("LLM_MODE".into(), self.mode.as_str().into()),
            ("OPENAI_MODEL".into(), self.api_model.clone()),
            ("OLLAMA_BASE_URL".into(), self.service_url.clone()),
            ("LLM_TEMPERATURE".into(), self.temperature.to_string()),
            ("APP_LANG".into(), self.language.clone()),
            ("LOG_LEVEL".into(), self.log_level.clone()),
        ];

        let optional = [
            ("OPENAI_API_KEY", self.api_key.clone()),
            ("OLLAMA_MODEL", self.local_model.clone()),
            ("OUTPUT_DIR", path_string(self.output_dir.as_ref())),
            ("DATA_DIR", path_string(self.data_dir.as_ref())),
            ("MODELS_CACHE_DIR", path_string(self.models_cache_dir.as_ref())),
            ("HTTP_PROXY", self.http_proxy.clone()),
            ("HTTPS_PROXY", self.https_proxy.clone()),
            ("NO_PROXY", self.no_proxy.clone()),
        ];

        for (key, value) in optional {
            if let Some(value) = value
                && !value.trim().is_empty()
            {
                env.push((key.to_string(), value));
            }
        }

        env
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn path_string(path: Option<&PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_is_local_without_model() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.mode, LlmMode::Local);
        assert_eq!(
            settings.validate(),
            Err(SettingsError::MissingLocalModel)
        );
    }

    #[test]
    fn test_api_mode_requires_key() {
        let mut settings = WorkerSettings {
            mode: LlmMode::Api,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::MissingApiKey));

        settings.api_key = Some("sk-test".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_temperature_range() {
        let settings = WorkerSettings {
            mode: LlmMode::None,
            temperature: 2.5,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::TemperatureOutOfRange(2.5))
        );
    }

    #[test]
    fn test_to_env_contains_mode_and_unbuffered() {
        let settings = WorkerSettings {
            mode: LlmMode::Local,
            local_model: Some("llama3.2:3b".into()),
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        };
        let env = settings.to_env();

        assert_eq!(lookup(&env, "LLM_MODE"), Some("local"));
        assert_eq!(lookup(&env, "OLLAMA_MODEL"), Some("llama3.2:3b"));
        assert_eq!(lookup(&env, "OUTPUT_DIR"), Some("/tmp/out"));
        assert_eq!(lookup(&env, "PYTHONUNBUFFERED"), Some("1"));
        assert_eq!(lookup(&env, "OPENAI_API_KEY"), None);
    }

    #[test]
    fn test_blank_proxy_is_omitted() {
        let settings = WorkerSettings {
            http_proxy: Some("  ".into()),
            https_proxy: Some("http://proxy:3128".into()),
            ..Default::default()
        };
        let env = settings.to_env();
        assert_eq!(lookup(&env, "HTTP_PROXY"), None);
        assert_eq!(lookup(&env, "HTTPS_PROXY"), Some("http://proxy:3128"));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("API".parse::<LlmMode>(), Ok(LlmMode::Api));
        assert!("cloud".parse::<LlmMode>().is_err());
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let settings: WorkerSettings =
            serde_json::from_str(r#"{"mode":"api","apiKey":"k","outputDir":"/x"}"#).unwrap();
        assert_eq!(settings.mode, LlmMode::Api);
        assert_eq!(settings.api_key.as_deref(), Some("k"));
        assert_eq!(settings.api_model, DEFAULT_API_MODEL);
        assert_eq!(settings.output_dir, Some(PathBuf::from("/x")));
    }
}
