//! Liveness polling for the inference service.

use std::time::Duration;

use reviewlens_core::ports::{ServiceApi, ServiceError};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Poll `api` every `interval` until it answers or `timeout` elapses.
pub async fn wait_for_health(
    api: &dyn ServiceApi,
    interval: Duration,
    timeout: Duration,
) -> Result<(), ServiceError> {
    info!(?timeout, "Waiting for inference service to become healthy");
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        sleep(interval).await;

        if api.is_healthy().await {
            info!(attempt, "Inference service is healthy");
            return Ok(());
        }
        debug!(attempt, "Health check failed, retrying");

        if Instant::now() >= deadline {
            return Err(ServiceError::HealthTimeout {
                secs: timeout.as_secs(),
            });
        }
    }
}
