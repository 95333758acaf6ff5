//! The worker bridge: one worker process, many correlated calls.
//!
//! # Lifecycle
//!
//! `start()` is idempotent. The first caller spawns a start task and every
//! concurrent caller awaits the same outcome through a watch channel. The
//! task spawns the worker, wires the stream readers, then waits for the
//! worker's `ready` line or the ready timeout, whichever comes first. On
//! timeout the bridge assumes the worker is ready and logs a warning.
//!
//! # Generations
//!
//! Every teardown bumps a generation counter. Stream readers carry the
//! generation they were spawned for and ignore everything once it is stale,
//! so output from a stopped worker can never resolve calls made against its
//! successor.

mod commands;
mod pending;
mod shared;

pub use shared::{reset_shared_bridge, shared_bridge};

use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use reviewlens_core::{PhaseContext, WorkerSettings};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, broadcast, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use self::pending::PendingTable;
use crate::codec::LineCodec;
use crate::diagnostics::{DiagnosticLine, classify_diagnostic_line};
use crate::error::BridgeError;
use crate::events::{BridgeEvent, EventHub, route_progress};
use crate::launcher::{WorkerExecutable, WorkerLauncher};
use crate::protocol::{Inbound, NoticeLevel, WorkerCommand, WorkerResponse, classify};
use crate::{shutdown, stream};

// =============================================================================
// Configuration
// =============================================================================

/// How long `start()` waits for the worker's ready line.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-call timeout for `execute()`.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Grace period between interrupt and hard kill in `force_stop()`.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub ready_timeout: Duration,
    pub call_timeout: Duration,
    pub kill_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ready_timeout: DEFAULT_READY_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

// =============================================================================
// State
// =============================================================================

type StartOutcome = Option<Result<(), String>>;

enum Lifecycle {
    Idle,
    Starting(watch::Receiver<StartOutcome>),
    Ready,
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
}

struct Inner {
    launcher: Arc<dyn WorkerLauncher>,
    settings: RwLock<WorkerSettings>,
    config: BridgeConfig,
    events: EventHub,
    lifecycle: AsyncMutex<Lifecycle>,
    process: AsyncMutex<Option<WorkerProcess>>,
    pending: Mutex<PendingTable>,
    phase: Mutex<Option<PhaseContext>>,
    executable: Mutex<Option<WorkerExecutable>>,
    ready_signal: Mutex<Option<oneshot::Sender<()>>>,
    generation: AtomicU64,
    spawn_count: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the worker bridge. Clones share the same worker.
#[derive(Clone)]
pub struct WorkerBridge {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBridge")
            .field("config", &self.inner.config)
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .field("pending", &self.pending_calls())
            .finish_non_exhaustive()
    }
}

impl WorkerBridge {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, settings: WorkerSettings) -> Self {
        Self::with_config(launcher, settings, BridgeConfig::default())
    }

    pub fn with_config(
        launcher: Arc<dyn WorkerLauncher>,
        settings: WorkerSettings,
        config: BridgeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                launcher,
                settings: RwLock::new(settings),
                config,
                events: EventHub::new(),
                lifecycle: AsyncMutex::new(Lifecycle::Idle),
                process: AsyncMutex::new(None),
                pending: Mutex::new(PendingTable::default()),
                phase: Mutex::new(None),
                executable: Mutex::new(None),
                ready_signal: Mutex::new(None),
                generation: AtomicU64::new(0),
                spawn_count: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to bridge events.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> BridgeConfig {
        self.inner.config
    }

    pub fn settings(&self) -> WorkerSettings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the worker settings. Takes effect on the next `restart()`.
    pub fn update_settings(&self, settings: WorkerSettings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.inner.lifecycle.lock().await, Lifecycle::Ready)
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Number of worker processes spawned over the bridge's lifetime.
    pub fn spawn_count(&self) -> u64 {
        self.inner.spawn_count.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn executable(&self) -> Result<WorkerExecutable, BridgeError> {
        let mut cached = lock(&self.inner.executable);
        if let Some(exe) = cached.as_ref() {
            return Ok(exe.clone());
        }
        let exe = self.inner.launcher.resolve()?;
        *cached = Some(exe.clone());
        Ok(exe)
    }

    // =========================================================================
    // Start
    // =========================================================================

    /// Ensure the worker is running and ready.
    ///
    /// Concurrent callers share one start attempt; a ready bridge returns
    /// immediately.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut outcome = {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            match &*lifecycle {
                Lifecycle::Ready => return Ok(()),
                Lifecycle::Starting(rx) => rx.clone(),
                Lifecycle::Idle => {
                    let (tx, rx) = watch::channel(None);
                    *lifecycle = Lifecycle::Starting(rx.clone());

                    let generation = self.inner.generation.load(Ordering::SeqCst);
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        let result = bridge.launch(generation).await;
                        bridge.finish_start(generation, result.is_ok()).await;
                        let _ = tx.send(Some(result.map_err(|e| e.to_string())));
                    });
                    rx
                }
            }
        };

        let result = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| BridgeError::StartFailed("start task ended unexpectedly".into()))?
            .clone();

        match result {
            Some(Ok(())) => Ok(()),
            Some(Err(reason)) => Err(BridgeError::StartFailed(reason)),
            None => Err(BridgeError::StartFailed("start did not complete".into())),
        }
    }

    async fn finish_start(&self, generation: u64, ok: bool) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if self.is_current(generation) {
            *lifecycle = if ok {
                Lifecycle::Ready
            } else {
                Lifecycle::Idle
            };
        }
    }

    async fn launch(&self, generation: u64) -> Result<(), BridgeError> {
        let exe = self.executable()?;
        let env = self.settings().to_env();

        info!(program = %exe.program.display(), args = ?exe.args, "Starting worker");

        let mut command = Command::new(&exe.program);
        command
            .args(&exe.args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &exe.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| BridgeError::Spawn {
            program: exe.program.clone(),
            reason: e.to_string(),
        })?;
        self.inner.spawn_count.fetch_add(1, Ordering::SeqCst);

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = shutdown::kill_child(child).await;
            return Err(BridgeError::StartFailed("worker pipes unavailable".into()));
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut slot = self.inner.process.lock().await;
            if !self.is_current(generation) {
                drop(slot);
                let _ = shutdown::kill_child(child).await;
                return Err(BridgeError::Stopped);
            }
            *lock(&self.inner.ready_signal) = Some(ready_tx);
            *slot = Some(WorkerProcess { child, stdin });
        }

        self.spawn_readers(generation, stdout, stderr);

        match timeout(self.inner.config.ready_timeout, ready_rx).await {
            Ok(Ok(())) => {
                info!("Worker ready");
                Ok(())
            }
            Ok(Err(_)) => Err(BridgeError::StartFailed(
                "worker exited before signalling ready".into(),
            )),
            Err(_) => {
                warn!(
                    timeout = ?self.inner.config.ready_timeout,
                    "Worker sent no ready signal, assuming ready"
                );
                Ok(())
            }
        }
    }

    fn spawn_readers(&self, generation: u64, stdout: ChildStdout, stderr: ChildStderr) {
        let bridge = self.clone();
        tokio::spawn(async move {
            let mut codec = LineCodec::new();
            stream::read_chunks(stdout, "stdout", |chunk| {
                for decoded in codec.feed(chunk) {
                    match decoded {
                        Ok(value) => bridge.handle_value(generation, value),
                        Err(e) => warn!(error = %e, "Skipping malformed worker line"),
                    }
                }
            })
            .await;
            bridge.handle_close(generation).await;
        });

        let bridge = self.clone();
        stream::spawn_line_reader(stderr, "stderr", move |line| {
            bridge.handle_diagnostic(generation, &line);
        });
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Send a command with the default timeout and await its response.
    pub async fn execute(&self, command: WorkerCommand) -> Result<WorkerResponse, BridgeError> {
        self.execute_with_timeout(command, self.inner.config.call_timeout)
            .await
    }

    /// Send a command and await its response.
    ///
    /// Calls may overlap. The bridge does not serialize them; callers must
    /// not issue concurrently commands that conflict inside the worker.
    pub async fn execute_with_timeout(
        &self,
        command: WorkerCommand,
        call_timeout: Duration,
    ) -> Result<WorkerResponse, BridgeError> {
        self.start().await?;

        let action = command.action().to_string();
        let (call_id, reply) = lock(&self.inner.pending).register(&action);
        let _registration = Registration {
            pending: &self.inner.pending,
            call_id,
        };

        let line = LineCodec::encode(&command, call_id)?;
        debug!(call_id, %action, "Sending worker command");
        self.write_line(&action, &line).await?;

        match timeout(call_timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Stopped),
            Err(_) => {
                warn!(call_id, %action, timeout = ?call_timeout, "Worker call timed out");
                Err(BridgeError::Timeout {
                    action,
                    timeout: call_timeout,
                })
            }
        }
    }

    async fn write_line(&self, action: &str, line: &[u8]) -> Result<(), BridgeError> {
        let mut slot = self.inner.process.lock().await;
        let Some(process) = slot.as_mut() else {
            return Err(BridgeError::Write {
                action: action.to_string(),
                reason: "worker is not running".into(),
            });
        };

        let written = async {
            process.stdin.write_all(line).await?;
            process.stdin.flush().await
        }
        .await;

        written.map_err(|e| BridgeError::Write {
            action: action.to_string(),
            reason: e.to_string(),
        })
    }

    // =========================================================================
    // Inbound routing
    // =========================================================================

    fn handle_value(&self, generation: u64, value: Value) {
        if !self.is_current(generation) {
            return;
        }

        match classify(value) {
            Inbound::Ready => {
                if let Some(signal) = lock(&self.inner.ready_signal).take() {
                    let _ = signal.send(());
                    self.inner.events.emit(BridgeEvent::Ready);
                }
            }
            Inbound::Progress(event) => {
                let context = self.phase_context();
                for event in route_progress(event, context.as_ref()) {
                    self.inner.events.emit(event);
                }
            }
            Inbound::Notice { level, message } => {
                let event = match level {
                    NoticeLevel::Info => BridgeEvent::Info(message),
                    NoticeLevel::Error => BridgeEvent::Error(message),
                };
                self.inner.events.emit(event);
            }
            Inbound::Response(response) => self.resolve(response),
            Inbound::Ignored(reason) => debug!(%reason, "Ignoring worker output"),
        }
    }

    fn resolve(&self, response: WorkerResponse) {
        let matched = lock(&self.inner.pending).take_for(response.call_id);
        match matched {
            Some((call_id, call)) => {
                debug!(call_id, action = %call.action, success = response.success, "Worker call completed");
                let _ = call.reply.send(Ok(response));
            }
            None => {
                warn!(call_id = ?response.call_id, "Worker response matched no pending call");
            }
        }
    }

    fn handle_diagnostic(&self, generation: u64, line: &str) {
        if !self.is_current(generation) {
            return;
        }
        debug!(target: "reviewlens_worker::stderr", "{line}");

        let context = self.phase_context();
        match classify_diagnostic_line(line, context.as_ref()) {
            DiagnosticLine::Progress(event) => {
                for event in route_progress(event, context.as_ref()) {
                    self.inner.events.emit(event);
                }
            }
            DiagnosticLine::Info(message) => self.inner.events.emit(BridgeEvent::Info(message)),
            DiagnosticLine::Error(message) => self.inner.events.emit(BridgeEvent::Error(message)),
            DiagnosticLine::Ignored => {}
        }
    }

    async fn handle_close(&self, generation: u64) {
        // A bridge-initiated teardown already bumped the generation.
        if self
            .inner
            .generation
            .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let process = self.detach(|| BridgeError::Closed).await;
        let code = match process {
            Some(process) => {
                drop(process.stdin);
                shutdown::reap(process.child, self.inner.config.kill_grace).await
            }
            None => None,
        };

        warn!(?code, "Worker process exited");
        self.inner.events.emit(BridgeEvent::Closed { code });
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Take the process out of the bridge, reject every pending call with
    /// `reason()` and reset to idle. The caller bumps the generation first.
    async fn detach(&self, reason: fn() -> BridgeError) -> Option<WorkerProcess> {
        let process = self.inner.process.lock().await.take();

        let rejected = lock(&self.inner.pending).drain();
        if !rejected.is_empty() {
            debug!(count = rejected.len(), "Rejecting pending worker calls");
        }
        for call in rejected {
            let _ = call.reply.send(Err(reason()));
        }

        lock(&self.inner.ready_signal).take();
        *self.inner.lifecycle.lock().await = Lifecycle::Idle;
        process
    }

    /// Reject all pending calls, kill the worker and reset to idle.
    pub async fn cleanup(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(process) = self.detach(|| BridgeError::Stopped).await {
            drop(process.stdin);
            if let Err(e) = shutdown::kill_child(process.child).await {
                warn!(error = %e, "Failed to kill worker process");
            }
        }
    }

    /// Stop the worker. Pending calls fail with [`BridgeError::Stopped`].
    pub async fn stop(&self) {
        info!("Stopping worker bridge");
        self.cleanup().await;
    }

    /// Stop a possibly unresponsive worker with interrupt-then-kill
    /// escalation (process-tree kill on Windows).
    pub async fn force_stop(&self) -> io::Result<()> {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let Some(process) = self.detach(|| BridgeError::Stopped).await else {
            return Ok(());
        };
        drop(process.stdin);

        let status = shutdown::force_stop(process.child, self.inner.config.kill_grace).await?;
        info!(%status, "Worker force-stopped");
        Ok(())
    }

    /// Tear down, re-resolve the worker executable and start again.
    ///
    /// Required after provisioning or a settings change.
    pub async fn restart(&self) -> Result<(), BridgeError> {
        info!("Restarting worker bridge");
        self.cleanup().await;
        lock(&self.inner.executable).take();
        self.start().await
    }

    // =========================================================================
    // Phase context
    // =========================================================================

    pub fn phase_context(&self) -> Option<PhaseContext> {
        lock(&self.inner.phase).clone()
    }

    pub fn set_phase_context(&self, context: PhaseContext) {
        *lock(&self.inner.phase) = Some(context);
    }

    pub fn clear_phase_context(&self) {
        lock(&self.inner.phase).take();
    }

    /// Set the phase context until the returned guard is dropped.
    #[must_use = "the phase context is cleared when the guard is dropped"]
    pub fn enter_phase(&self, context: PhaseContext) -> PhaseGuard {
        self.set_phase_context(context);
        PhaseGuard {
            bridge: self.clone(),
        }
    }
}

/// Clears the bridge's phase context on drop.
#[derive(Debug)]
pub struct PhaseGuard {
    bridge: WorkerBridge,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.bridge.clear_phase_context();
    }
}

/// Removes a call from the table when its caller stops waiting.
struct Registration<'a> {
    pending: &'a Mutex<PendingTable>,
    call_id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(self.call_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> WorkerBridge {
        WorkerBridge::new(
            Arc::new(WorkerExecutable::new("/nonexistent/worker")),
            WorkerSettings::default(),
        )
    }

    #[test]
    fn test_phase_guard_clears_context() {
        let bridge = bridge();
        {
            let _phase = bridge.enter_phase(PhaseContext::new(2, "Basic Statistics"));
            assert_eq!(bridge.phase_context().map(|c| c.phase), Some(2));
        }
        assert!(bridge.phase_context().is_none());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let bridge = bridge();
        let mut rx = bridge.subscribe();
        bridge.set_phase_context(PhaseContext::new(1, "Basic Processing"));

        bridge.handle_value(7, serde_json::json!({"type": "progress", "progress": 10}));
        bridge.handle_diagnostic(7, "Progreso: 10%");
        assert!(rx.try_recv().is_err());

        bridge.handle_value(0, serde_json::json!({"type": "progress", "progress": 10}));
        assert!(matches!(rx.try_recv(), Ok(BridgeEvent::Progress(_))));
        assert!(matches!(rx.try_recv(), Ok(BridgeEvent::PhaseProgress(_))));
    }

    #[test]
    fn test_stderr_progress_needs_phase_context() {
        let bridge = bridge();
        let mut rx = bridge.subscribe();

        bridge.handle_diagnostic(0, "   Progreso:  42%|####| 205/483");
        assert!(rx.try_recv().is_err());

        bridge.set_phase_context(PhaseContext::new(7, "Intelligent Summary"));
        bridge.handle_diagnostic(0, "   Progreso:  42%|####| 205/483");
        assert!(matches!(rx.try_recv(), Ok(BridgeEvent::Progress(_))));
        let Ok(BridgeEvent::PhaseProgress(event)) = rx.try_recv() else {
            panic!("expected phase progress");
        };
        assert_eq!(event.phase, Some(7));
        assert_eq!(event.progress, 42);
    }

    #[test]
    fn test_notices_route_to_info_and_error() {
        let bridge = bridge();
        let mut rx = bridge.subscribe();

        bridge.handle_value(0, serde_json::json!({"type": "info", "message": "backup removed"}));
        bridge.handle_value(0, serde_json::json!({"type": "error", "message": "status failed"}));

        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::Info("backup removed".into()));
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::Error("status failed".into()));
        assert_eq!(bridge.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_and_resets() {
        let bridge = bridge();

        let err = bridge.start().await.unwrap_err();
        assert!(matches!(err, BridgeError::StartFailed(_)));
        assert!(!bridge.is_ready().await);
        assert_eq!(bridge.spawn_count(), 0);
    }
}
