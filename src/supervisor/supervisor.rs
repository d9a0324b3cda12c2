//! Single-launch backend supervisor.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::backend::LoopbackServer;
use crate::config::TimeoutConfig;
use crate::supervisor::launcher::{BackendProcess, Launcher};
use crate::supervisor::probe::ReadinessProbe;
use crate::supervisor::state::{ServerState, StartupError};

/// Work that must finish before the backend is launched (asset provisioning).
/// Runs inside the single startup sequence; its outcome is never fatal.
#[async_trait]
pub trait Preparation: Send + Sync {
    async fn prepare(&self);
}

/// Deadlines used by the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTimeouts {
    /// Delay between readiness probes.
    pub probe_interval: Duration,
    /// Deadline for the backend to become reachable.
    pub launch: Duration,
    /// Caller-visible bound on `ensure_ready`.
    pub ready_wait: Duration,
}

impl From<&TimeoutConfig> for SupervisorTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            probe_interval: config.probe_interval(),
            launch: config.launch(),
            ready_wait: config.ready_wait(),
        }
    }
}

/// Starts the loopback backend at most once per instance and lets every
/// caller wait on the same outcome.
pub struct ServerSupervisor {
    server: LoopbackServer,
    launcher: Box<dyn Launcher>,
    probe: Box<dyn ReadinessProbe>,
    preparation: Option<Arc<dyn Preparation>>,
    timeouts: SupervisorTimeouts,
    state: watch::Sender<ServerState>,
    process: Mutex<Option<Box<dyn BackendProcess>>>,
    launches: AtomicUsize,
}

impl ServerSupervisor {
    pub fn new(
        server: LoopbackServer,
        launcher: Box<dyn Launcher>,
        probe: Box<dyn ReadinessProbe>,
        timeouts: SupervisorTimeouts,
    ) -> Self {
        let (state, _) = watch::channel(ServerState::NotStarted);
        Self {
            server,
            launcher,
            probe,
            preparation: None,
            timeouts,
            state,
            process: Mutex::new(None),
            launches: AtomicUsize::new(0),
        }
    }

    /// Run `preparation` at the start of the startup sequence.
    pub fn with_preparation(mut self, preparation: Arc<dyn Preparation>) -> Self {
        self.preparation = Some(preparation);
        self
    }

    pub fn server(&self) -> &LoopbackServer {
        &self.server
    }

    /// Current state snapshot.
    pub fn state(&self) -> ServerState {
        self.state.borrow().clone()
    }

    /// Number of startup sequences begun (0 or 1).
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Wait until the backend is Ready, starting it if nobody has yet.
    ///
    /// The startup sequence runs in a background task, so it keeps going
    /// even if this caller gives up after `ready_wait`.
    pub async fn ensure_ready(self: &Arc<Self>) -> Result<(), StartupError> {
        let mut rx = self.state.subscribe();

        let won = self.state.send_if_modified(|state| {
            if *state == ServerState::NotStarted {
                *state = ServerState::Starting;
                true
            } else {
                false
            }
        });
        if won {
            self.spawn_startup();
        }

        let wait = async {
            rx.wait_for(ServerState::is_terminal)
                .await
                .map(|state| state.clone())
        };

        match time::timeout(self.timeouts.ready_wait, wait).await {
            Ok(Ok(ServerState::Ready)) => Ok(()),
            Ok(Ok(ServerState::Failed(e))) => Err(e),
            Ok(Ok(state)) => Err(StartupError::Launch(format!(
                "unexpected state {:?}",
                state
            ))),
            Ok(Err(_)) => Err(StartupError::Launch("supervisor dropped".to_string())),
            Err(_) => {
                tracing::error!(
                    server = %self.server,
                    waited = ?self.timeouts.ready_wait,
                    "Gave up waiting for backend startup"
                );
                Err(StartupError::WaitTimeout(self.timeouts.ready_wait))
            }
        }
    }

    fn spawn_startup(self: &Arc<Self>) {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let supervisor = Arc::clone(self);

        tokio::spawn(async move {
            let worker = {
                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move { supervisor.start().await })
            };
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => Err(StartupError::Launch(format!("startup task aborted: {}", e))),
            };

            let next = match outcome {
                Ok(()) => {
                    tracing::info!(server = %supervisor.server, "Backend ready");
                    ServerState::Ready
                }
                Err(e) => {
                    tracing::error!(
                        server = %supervisor.server,
                        error = %e,
                        "Backend startup failed"
                    );
                    supervisor.shutdown();
                    ServerState::Failed(e)
                }
            };
            supervisor.state.send_replace(next);
        });
    }

    async fn start(&self) -> Result<(), StartupError> {
        if let Some(preparation) = &self.preparation {
            preparation.prepare().await;
        }

        tracing::info!(server = %self.server, "Launching backend");
        let process = self.launcher.launch(&self.server)?;
        *self.lock_process() = Some(process);

        self.await_readiness().await
    }

    async fn await_readiness(&self) -> Result<(), StartupError> {
        let started = Instant::now();
        let deadline = started + self.timeouts.launch;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if self.probe.is_ready(&self.server).await {
                tracing::debug!(
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Backend accepted a connection"
                );
                return Ok(());
            }

            if let Some(status) = self.poll_exit() {
                return Err(StartupError::Exited(status));
            }

            if Instant::now() >= deadline {
                return Err(StartupError::NotReady {
                    addr: self.server.authority(),
                    deadline: self.timeouts.launch,
                });
            }

            time::sleep(self.timeouts.probe_interval).await;
        }
    }

    fn poll_exit(&self) -> Option<String> {
        self.lock_process().as_mut().and_then(|process| process.poll_exit())
    }

    fn lock_process(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn BackendProcess>>> {
        self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the backend process, if one was launched.
    pub fn shutdown(&self) {
        if let Some(mut process) = self.lock_process().take() {
            tracing::info!(server = %self.server, "Stopping backend process");
            process.terminate();
        }
    }
}
