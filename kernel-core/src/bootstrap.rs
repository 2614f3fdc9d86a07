//! The deterministic ten-step startup sequence.
//!
//! Startup hooks run before the listener binds; shutdown hooks run after
//! graceful shutdown completes. Steps 4-8 go through `Scanner`,
//! `Container`, `ProviderRegistry` and `HttpDispatcherBuilder` themselves
//! rather than a bespoke one-off sequence.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::{self, AppConfig};
use crate::container::Container;
use crate::error::BootstrapError;
use crate::events::{EventBus, EventBusConfig};
use crate::http::{HttpDispatcher, HttpDispatcherBuilder};
use crate::registry::ProviderRegistry;
use crate::scanner::{ScanResult, Scanner};

/// Assembles a `Container`, `ProviderRegistry`, `EventBus` and
/// `HttpDispatcher` from a `Scanner` and configuration, per the ten-step
/// sequence. Call [`Bootstrap::run`].
pub struct Bootstrap;

/// Everything produced by a successful `Bootstrap::run`, ready to serve.
pub struct RunningApp {
    pub container: Arc<Container>,
    pub registry: Arc<ProviderRegistry>,
    pub bus: Arc<EventBus>,
    pub config: AppConfig,
    pub scan_result: ScanResult,
    router: axum::Router,
}

impl Bootstrap {
    /// Run steps 1-8: print the banner, construct the container, register
    /// core beans, load configuration, scan, and register every discovered
    /// component/provider/controller. Step 9 (start the dispatcher) and
    /// step 10 (shutdown hook) are [`RunningApp::serve`]'s job.
    pub fn run(scanner: Scanner, scan_root_default: &str) -> Result<RunningApp, BootstrapError> {
        crate::logging::init();
        info!("kernel starting"); // step 1: banner

        let container = Arc::new(Container::new()); // step 2

        let config = config::load(scan_root_default)?; // step 4 (read before scanning so scanRoot is known)

        let bus = EventBus::new(EventBusConfig {
            async_workers: config.event_workers,
            async_queue_capacity: config.event_queue_capacity,
        });
        container.register_arc(bus.clone()).map_err(BootstrapError::Container)?; // step 3

        let registry = Arc::new(ProviderRegistry::new(container.categories()));
        container.register_arc(registry.clone()).map_err(BootstrapError::Container)?; // step 3

        container.register(Bootstrap).map_err(BootstrapError::Container)?; // step 3: "Bootstrap itself"

        let (scan_result, routes) = scanner.scan(&container)?; // steps 5-6 (components registered inside scan)
        info!(
            components = scan_result.components.len(),
            providers = scan_result.providers.len(),
            controllers = scan_result.controllers.len(),
            agents = scan_result.agents.len(),
            "scan complete"
        );

        let mut dispatcher_builder = HttpDispatcherBuilder::new();
        if !config.cors_enabled {
            dispatcher_builder = dispatcher_builder.without_cors();
        }
        if !config.health_endpoint {
            dispatcher_builder = dispatcher_builder.without_health();
        }
        for route in routes {
            // step 8: resolve the owning controller (via `route.build`) and
            // register the route.
            let handler = (route.build)(&container)?;
            crate::http::log_route_registered(route.method, &route.path);
            dispatcher_builder.route(route.method, route.path.clone(), handler)?;
        }
        let dispatcher = Arc::new(dispatcher_builder.build(container.clone()));
        container.register_arc(dispatcher.clone()).map_err(BootstrapError::Container)?; // step 3 ("HttpDispatcher"), done here once its final route table is known
        let router = HttpDispatcher::into_router(dispatcher);

        Ok(RunningApp { container, registry, bus, config, scan_result, router })
    }
}

impl RunningApp {
    /// A clone of the assembled `axum::Router`, for in-process testing via
    /// `tower::ServiceExt::oneshot` without binding a real listener.
    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    /// Step 9: bind and serve, with graceful shutdown on ctrl-c/SIGTERM.
    /// On return, step 10 has already run: dispatcher stopped, bus
    /// drained, container closed, in that order.
    pub async fn serve(self) -> Result<(), BootstrapError> {
        let addr: SocketAddr = self.config.bind_addr().parse().map_err(|e| BootstrapError::Bind {
            addr: self.config.bind_addr(),
            message: format!("{e}"),
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| BootstrapError::Bind {
            addr: self.config.bind_addr(),
            message: e.to_string(),
        })?;
        info!(%addr, "kernel listening");

        let drain_deadline = Duration::from_millis(self.config.event_drain_deadline_ms);
        let bus = self.bus.clone();
        let container = self.container.clone();

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| BootstrapError::Bind { addr: self.config.bind_addr(), message: e.to_string() })?;

        info!("kernel shutting down"); // step 10
        if !bus.close(drain_deadline).await {
            error!("event bus did not drain within the deadline");
        }
        container.close();
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
