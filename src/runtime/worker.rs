//! Invocation pollers.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinSet;

use crate::adapter::Adapter;
use crate::http::InvocationEvent;
use crate::lifecycle::Shutdown;
use crate::runtime::client::{ErrorReport, Invocation, RuntimeClient};
use crate::runtime::RuntimeError;

/// Pause after a failed poll before asking again.
const POLL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Run `concurrency` pollers until `shutdown` fires. In-flight invocations
/// are completed before a poller exits.
pub async fn run(
    client: Arc<RuntimeClient>,
    adapter: Arc<Adapter>,
    concurrency: usize,
    shutdown: Shutdown,
) {
    let mut workers = JoinSet::new();
    for worker in 0..concurrency.max(1) {
        workers.spawn(poll(worker, client.clone(), adapter.clone(), shutdown.clone()));
    }
    tracing::info!(workers = concurrency.max(1), api = %client.base_url(), "Runtime loop started");

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Runtime worker aborted");
        }
    }
    tracing::info!("Runtime loop stopped");
}

async fn poll(
    worker: usize,
    client: Arc<RuntimeClient>,
    adapter: Arc<Adapter>,
    shutdown: Shutdown,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.wait() => break,
            next = client.next_invocation() => next,
        };

        match next {
            Ok(invocation) => {
                if let Err(e) = process(&client, &adapter, invocation).await {
                    tracing::error!(worker, error = %e, "Failed to report invocation result");
                }
            }
            Err(e) => {
                tracing::error!(worker, error = %e, "Failed to fetch next invocation");
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
    tracing::debug!(worker, "Runtime worker exiting");
}

/// Handle one invocation and report its outcome to the runtime.
pub async fn process(
    client: &RuntimeClient,
    adapter: &Adapter,
    invocation: Invocation,
) -> Result<(), RuntimeError> {
    let request_id = invocation.request_id.as_str();
    tracing::debug!(
        request_id,
        remaining_ms = ?remaining_ms(invocation.deadline_ms),
        bytes = invocation.payload.len(),
        "Invocation started"
    );

    let event: InvocationEvent = match serde_json::from_slice(&invocation.payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(request_id, error = %e, "Invocation payload is not an event");
            let report = ErrorReport::new(
                "InvalidEvent",
                format!("invalid invocation event: {}", e),
            );
            return client.post_error(request_id, &report).await;
        }
    };

    match adapter.handle(&event).await {
        Ok(response) => {
            tracing::debug!(request_id, status = response.status_code, "Invocation completed");
            client.post_response(request_id, &response).await
        }
        Err(e) => {
            tracing::error!(
                request_id,
                error = %e,
                error_type = e.error_type(),
                "Invocation failed"
            );
            let report = ErrorReport::new(e.error_type(), e.to_string());
            client.post_error(request_id, &report).await
        }
    }
}

fn remaining_ms(deadline_ms: Option<u64>) -> Option<i64> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_millis() as i64;
    deadline_ms.map(|deadline| deadline as i64 - now)
}
