//! Worker settings from flags, environment variables and `.env`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use reviewlens_core::{LlmMode, PythonEnvLayout, WorkerSettings};

/// Flags that configure the worker. Each falls back to the environment
/// variable the worker itself reads.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Language model backend: api, local or none
    #[arg(long, env = "LLM_MODE")]
    pub llm_mode: Option<String>,

    /// API key for the hosted backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Hosted model name
    #[arg(long, env = "OPENAI_MODEL")]
    pub api_model: Option<String>,

    /// Local inference model name
    #[arg(long, env = "OLLAMA_MODEL")]
    pub local_model: Option<String>,

    /// Local inference service URL
    #[arg(long, env = "OLLAMA_BASE_URL")]
    pub service_url: Option<String>,

    /// Sampling temperature (0.0-2.0)
    #[arg(long, env = "LLM_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Directory for pipeline outputs
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Language code for generated text
    #[arg(long, env = "APP_LANG")]
    pub language: Option<String>,
}

impl SettingsArgs {
    /// Build worker settings, filling data directories from `layout`.
    pub fn to_settings(&self, layout: &PythonEnvLayout) -> Result<WorkerSettings> {
        let mut settings = WorkerSettings {
            data_dir: Some(layout.worker_data_dir()),
            models_cache_dir: Some(layout.models_cache_dir()),
            http_proxy: proxy_var("HTTP_PROXY"),
            https_proxy: proxy_var("HTTPS_PROXY"),
            no_proxy: proxy_var("NO_PROXY"),
            ..WorkerSettings::default()
        };

        if let Some(mode) = &self.llm_mode {
            settings.mode = mode.parse::<LlmMode>().context("Invalid --llm-mode")?;
        }
        if let Some(model) = &self.api_model {
            settings.api_model.clone_from(model);
        }
        if let Some(url) = &self.service_url {
            settings.service_url.clone_from(url);
        }
        if let Some(temperature) = self.temperature {
            settings.temperature = temperature;
        }
        if let Some(language) = &self.language {
            settings.language.clone_from(language);
        }
        settings.api_key.clone_from(&self.api_key);
        settings.local_model.clone_from(&self.local_model);
        if self.output_dir.is_some() {
            settings.output_dir.clone_from(&self.output_dir);
        }

        Ok(settings)
    }
}

fn proxy_var(name: &str) -> Option<String> {
    std::env::var(name)
        .or_else(|_| std::env::var(name.to_ascii_lowercase()))
        .ok()
        .filter(|v| !v.trim().is_empty())
}
