//! The adapter instance shared by every invocation.

use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::adapter::AdapterError;
use crate::assets::{ArchiveSource, AssetProvisioner};
use crate::backend::{
    AppRegistry, BackendHandle, BackendResolver, CandidateLocation, LoopbackServer, NativeHandler,
};
use crate::config::AdapterConfig;
use crate::http::{to_http_request, AdapterResponse, InvocationEvent, UpstreamClient};
use crate::supervisor::{ProcessLauncher, ServerSupervisor, SupervisorTimeouts, TcpProbe};

enum Route {
    Native {
        location: CandidateLocation,
        handler: NativeHandler,
        max_response_bytes: usize,
    },
    Loopback {
        supervisor: Arc<ServerSupervisor>,
        upstream: UpstreamClient,
    },
}

/// Turns invocation events into backend calls.
pub struct Adapter {
    route: Route,
}

impl Adapter {
    /// Resolve the backend once: an in-process app from `registry` if one of
    /// the configured candidates is registered, else the supervised server.
    pub fn from_config(
        config: &AdapterConfig,
        registry: &AppRegistry,
        source: Option<Arc<dyn ArchiveSource>>,
    ) -> Self {
        let resolver = BackendResolver::new(registry, &config.native.candidates);
        if let Some((location, handler)) = resolver.resolve() {
            tracing::info!(
                location = %location,
                capability = ?handler.capability(),
                "Using in-process app"
            );
            return Self::native(location, handler, config.runtime.max_response_bytes);
        }

        let server = LoopbackServer::new(config.server.bind_host.clone(), config.server.port);
        tracing::info!(
            server = %server,
            command = %config.server.command,
            "No in-process app; using supervised server"
        );

        let provisioner = AssetProvisioner::new(config.assets.clone(), source);
        let supervisor = ServerSupervisor::new(
            server.clone(),
            Box::new(ProcessLauncher::from_config(&config.server)),
            Box::new(TcpProbe::new(config.timeouts.probe_connect())),
            SupervisorTimeouts::from(&config.timeouts),
        )
        .with_preparation(Arc::new(provisioner));

        let upstream = UpstreamClient::new(
            server,
            config.timeouts.upstream(),
            config.runtime.max_response_bytes,
        );
        Self::loopback(Arc::new(supervisor), upstream)
    }

    /// Route invocations to an in-process app. Async apps get a request
    /// trace layer, like any axum service.
    pub fn native(
        location: CandidateLocation,
        handler: NativeHandler,
        max_response_bytes: usize,
    ) -> Self {
        let handler = match handler {
            NativeHandler::Async(router) => {
                NativeHandler::Async(router.layer(TraceLayer::new_for_http()))
            }
            sync => sync,
        };
        Self {
            route: Route::Native {
                location,
                handler,
                max_response_bytes,
            },
        }
    }

    pub fn loopback(supervisor: Arc<ServerSupervisor>, upstream: UpstreamClient) -> Self {
        Self {
            route: Route::Loopback { supervisor, upstream },
        }
    }

    pub fn backend(&self) -> BackendHandle {
        match &self.route {
            Route::Native { handler, .. } => BackendHandle::Native(handler.clone()),
            Route::Loopback { upstream, .. } => BackendHandle::Loopback(upstream.server().clone()),
        }
    }

    /// The supervisor, when invocations are proxied to a loopback server.
    pub fn supervisor(&self) -> Option<&Arc<ServerSupervisor>> {
        match &self.route {
            Route::Loopback { supervisor, .. } => Some(supervisor),
            Route::Native { .. } => None,
        }
    }

    /// Handle one invocation.
    pub async fn handle(&self, event: &InvocationEvent) -> Result<AdapterResponse, AdapterError> {
        let request = to_http_request(event)?;
        tracing::debug!(
            method = %request.method,
            target = %request.path_and_query,
            shape = ?event.shape(),
            "Invocation received"
        );

        match &self.route {
            Route::Native {
                location,
                handler,
                max_response_bytes,
            } => {
                tracing::trace!(location = %location, "Dispatching in-process");
                Ok(handler.call(request, *max_response_bytes).await?)
            }
            Route::Loopback { supervisor, upstream } => {
                supervisor.ensure_ready().await?;
                Ok(upstream.forward(request).await)
            }
        }
    }

    /// Stop the supervised backend, if any.
    pub fn shutdown(&self) {
        if let Some(supervisor) = self.supervisor() {
            supervisor.shutdown();
        }
    }
}
