//! HTTP client for the inference service's model API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use reviewlens_core::ModelRecord;
use reviewlens_core::ports::{LineSink, ServiceApi, ServiceError};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::run_streaming;

/// Loopback address the service listens on by default.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: Option<String>,
}

impl From<TagModel> for ModelRecord {
    fn from(model: TagModel) -> Self {
        let modified_at = model
            .modified_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            name: model.name,
            size_bytes: model.size,
            modified_at,
        }
    }
}

/// [`ServiceApi`] over the service's REST endpoints.
///
/// `GET /api/tags` serves both liveness and model enumeration. Pulls go
/// through the service binary so its textual progress can be parsed.
#[derive(Debug, Clone)]
pub struct OllamaApi {
    base_url: String,
    client: Client,
}

impl OllamaApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Host value for the service CLI, e.g. `127.0.0.1:11434`.
    fn host(&self) -> &str {
        self.base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, host)| host)
    }
}

impl Default for OllamaApi {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn http_error(e: &reqwest::Error) -> ServiceError {
    ServiceError::Http(e.to_string())
}

#[async_trait]
impl ServiceApi for OllamaApi {
    async fn is_healthy(&self) -> bool {
        match self
            .client
            .get(self.url("/api/tags"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Inference service health check failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>, ServiceError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| http_error(&e))?;

        if !response.status().is_success() {
            return Err(ServiceError::Http(format!(
                "listing models returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await.map_err(|e| http_error(&e))?;
        Ok(tags.models.into_iter().map(ModelRecord::from).collect())
    }

    async fn delete_model(&self, name: &str) -> Result<(), ServiceError> {
        info!(model = %name, "Deleting model");
        let response = self
            .client
            .delete(self.url("/api/delete"))
            .json(&serde_json::json!({ "model": name, "name": name }))
            .send()
            .await
            .map_err(|e| http_error(&e))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ServiceError::ModelNotFound(name.to_string())),
            status => Err(ServiceError::Http(format!(
                "deleting {name} returned {status}"
            ))),
        }
    }

    async fn pull_model(
        &self,
        binary: &Path,
        name: &str,
        on_line: LineSink<'_>,
    ) -> Result<(), ServiceError> {
        info!(model = %name, "Pulling model");
        let mut cmd = Command::new(binary);
        cmd.arg("pull").arg(name).env("OLLAMA_HOST", self.host());

        let outcome = run_streaming(cmd, on_line).await.map_err(|e| ServiceError::Pull {
            model: name.to_string(),
            reason: e.to_string(),
        })?;

        if outcome.status.success() {
            Ok(())
        } else {
            Err(ServiceError::Pull {
                model: name.to_string(),
                reason: outcome.failure(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_response_parsing() {
        let body = r#"{"models":[
            {"name":"llama3.2:3b","size":2019393189,"modified_at":"2024-10-01T12:00:00.123456-07:00"},
            {"name":"qwen2.5:7b"}
        ]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        let models: Vec<ModelRecord> = tags.models.into_iter().map(ModelRecord::from).collect();

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].size_bytes, 2_019_393_189);
        assert!(models[0].modified_at.is_some());
        assert_eq!(models[1].size_bytes, 0);
        assert!(models[1].modified_at.is_none());
    }

    #[test]
    fn test_host_strips_scheme() {
        assert_eq!(OllamaApi::default().host(), "127.0.0.1:11434");
        assert_eq!(OllamaApi::new("http://localhost:11434/").host(), "localhost:11434");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unhealthy() {
        let api = OllamaApi::new("http://127.0.0.1:9");
        assert!(!api.is_healthy().await);
        assert!(matches!(api.list_models().await, Err(ServiceError::Http(_))));
    }
}
