//! Termination of the worker process.
//!
//! Two strategies:
//! - `kill_child`: immediate kill and reap, used by a normal bridge stop
//! - `force_stop`: escalation for a worker that may be unresponsive

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Kill a child immediately and wait for it to be reaped.
pub async fn kill_child(mut child: Child) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    child.kill().await?;
    child.wait().await
}

/// Forcefully stop a child process.
///
/// # Strategy
/// - Windows: kill the whole process tree (`taskkill /F /T`), then reap
/// - Unix: send SIGINT and wait up to `grace`; if still running, SIGKILL and reap
pub async fn force_stop(mut child: Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        force_stop_unix(&mut child, grace).await
    }

    #[cfg(not(unix))]
    {
        force_stop_windows(&mut child, grace).await
    }
}

#[cfg(unix)]
async fn force_stop_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGINT) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    debug!(pid, "Worker ignored SIGINT, escalating to SIGKILL");
    child.kill().await?;
    child.wait().await
}

#[cfg(not(unix))]
async fn force_stop_windows(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        let status = tokio::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .status()
            .await;
        debug!(pid, ?status, "taskkill finished");
    }

    match timeout(grace, child.wait()).await {
        Ok(result) => result,
        Err(_) => {
            child.kill().await?;
            child.wait().await
        }
    }
}

/// Wait briefly for an exited (or exiting) child and report its exit code.
pub(crate) async fn reap(mut child: Child, grace: Duration) -> Option<i32> {
    let status = match timeout(grace, child.wait()).await {
        Ok(status) => status.ok(),
        Err(_) => kill_child(child).await.ok(),
    };
    status.and_then(|s| s.code())
}
