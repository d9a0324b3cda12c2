//! Backend process launching.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::backend::LoopbackServer;
use crate::config::ServerConfig;
use crate::supervisor::state::StartupError;

/// Starts the backend's own entry point without blocking the caller.
pub trait Launcher: Send + Sync {
    fn launch(&self, server: &LoopbackServer) -> Result<Box<dyn BackendProcess>, StartupError>;
}

/// Handle to a launched backend.
pub trait BackendProcess: Send {
    /// `Some(description)` once the backend has terminated.
    fn poll_exit(&mut self) -> Option<String>;

    /// Ask the backend to stop. Best effort.
    fn terminate(&mut self) {}
}

/// Spawns the configured command as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir: None,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    /// Arguments with `{host}` / `{port}` filled in.
    pub fn render_args(&self, server: &LoopbackServer) -> Vec<String> {
        let port = server.port.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{host}", &server.host).replace("{port}", &port))
            .collect()
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, server: &LoopbackServer) -> Result<Box<dyn BackendProcess>, StartupError> {
        let args = self.render_args(server);
        let mut command = Command::new(&self.command);
        command
            .args(&args)
            .env("LT_HOST", &server.host)
            .env("LT_PORT", server.port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| StartupError::Launch(format!("{}: {}", self.command, e)))?;

        tracing::info!(
            pid = ?child.id(),
            command = %self.command,
            args = ?args,
            server = %server,
            "Backend process spawned"
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

impl BackendProcess for ChildProcess {
    fn poll_exit(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(format!("wait failed: {}", e)),
        }
    }

    fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Backend process already gone");
        }
    }
}
