//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use lt_lambda_adapter::adapter::Adapter;
use lt_lambda_adapter::assets::{ArchiveSource, ProvisioningError};
use lt_lambda_adapter::backend::LoopbackServer;
use lt_lambda_adapter::config::ArchiveLocation;
use lt_lambda_adapter::http::UpstreamClient;
use lt_lambda_adapter::supervisor::{
    BackendProcess, Launcher, Preparation, ServerSupervisor, StartupError, SupervisorTimeouts,
    TcpProbe,
};

/// A loopback port nobody is listening on right now.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn fast_timeouts() -> SupervisorTimeouts {
    SupervisorTimeouts {
        probe_interval: Duration::from_millis(20),
        launch: Duration::from_secs(5),
        ready_wait: Duration::from_secs(10),
    }
}

/// Supervisor + upstream client wired the way the adapter wires them.
pub fn loopback_adapter(
    server: LoopbackServer,
    launcher: impl Launcher + 'static,
    timeouts: SupervisorTimeouts,
    preparation: Option<Arc<dyn Preparation>>,
) -> Adapter {
    let mut supervisor = ServerSupervisor::new(
        server.clone(),
        Box::new(launcher),
        Box::new(TcpProbe::new(Duration::from_millis(200))),
        timeouts,
    );
    if let Some(preparation) = preparation {
        supervisor = supervisor.with_preparation(preparation);
    }
    let upstream = UpstreamClient::new(server, Duration::from_secs(5), 1024 * 1024);
    Adapter::loopback(Arc::new(supervisor), upstream)
}

/// Start a programmable raw HTTP/1.1 backend: every request gets the
/// status, headers and body returned by `f`.
pub async fn start_programmable_backend<F, Fut>(listener: TcpListener, f: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<(String, String)>, Vec<u8>)> + Send + 'static,
{
    let f = Arc::new(f);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request(&mut socket).await;
                        let (status, headers, body) = f().await;
                        let mut head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            status,
                            reason(status),
                            body.len()
                        );
                        for (name, value) in headers {
                            head.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        head.push_str("\r\n");
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    })
}

/// Start a backend that accepts connections and drops them unanswered.
pub async fn start_hangup_backend(listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            read_request(&mut socket).await;
            drop(socket);
        }
    })
}

/// Consume one request (headers plus a Content-Length body).
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// "Launches" an axum app inside the test process, optionally after a
/// delay, and counts launches.
pub struct InProcessLauncher {
    app: Router,
    delay: Duration,
    pub launches: Arc<AtomicUsize>,
}

impl InProcessLauncher {
    pub fn new(app: Router, delay: Duration) -> Self {
        Self {
            app,
            delay,
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Launcher for InProcessLauncher {
    fn launch(&self, server: &LoopbackServer) -> Result<Box<dyn BackendProcess>, StartupError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let app = self.app.clone();
        let addr = server.authority();
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let listener = TcpListener::bind(&addr).await.unwrap();
            axum::serve(listener, app).await.unwrap();
        });
        Ok(Box::new(TaskProcess { task }))
    }
}

struct TaskProcess {
    task: JoinHandle<()>,
}

impl BackendProcess for TaskProcess {
    fn poll_exit(&mut self) -> Option<String> {
        self.task.is_finished().then(|| "server task ended".to_string())
    }

    fn terminate(&mut self) {
        self.task.abort();
    }
}

/// Launches "successfully" but never opens a port.
pub struct SilentLauncher {
    pub launches: Arc<AtomicUsize>,
}

impl SilentLauncher {
    pub fn new() -> Self {
        Self {
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Launcher for SilentLauncher {
    fn launch(&self, _server: &LoopbackServer) -> Result<Box<dyn BackendProcess>, StartupError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Silent))
    }
}

struct Silent;

impl BackendProcess for Silent {
    fn poll_exit(&mut self) -> Option<String> {
        None
    }
}

/// Serves a prebuilt archive from memory and counts fetches.
pub struct FixtureArchiveSource {
    archive: Vec<u8>,
    pub fetches: AtomicUsize,
}

impl FixtureArchiveSource {
    pub fn new(archive: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            archive,
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ArchiveSource for FixtureArchiveSource {
    async fn fetch(
        &self,
        _location: &ArchiveLocation,
        destination: &Path,
    ) -> Result<u64, ProvisioningError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, &self.archive).await.unwrap();
        Ok(self.archive.len() as u64)
    }
}

/// Build a tar.gz from (name, contents) pairs. Names are written into the
/// header verbatim so traversal attempts are preserved.
pub fn tar_gz(members: &[(&str, &[u8])]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
