//! HTTP auto-routing.
//!
//! Longest-literal-segment matching isn't something axum's own router
//! exposes, so `HttpDispatcher` owns a small route table above axum and
//! dispatches through a single fallback handler rather than registering
//! one axum route per pattern.

mod route_table;

pub use route_table::{MatchOutcome, RouteTable};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::container::Container;
use crate::error::DispatchError;
use crate::meta::RouteMethod;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The raw request data handed to a route handler. Parameter binding
/// (path vars, query, body, ambient dependencies) is performed by the
/// handler closure itself — generated by `kernel-macros`, or hand-written
/// in explicit-registration mode — using [`ParameterBinding`](crate::meta::ParameterBinding)
/// only as documentation of *what* is bound, not *how*.
pub struct HandlerRequest {
    pub path_vars: std::collections::HashMap<String, String>,
    pub query: std::collections::HashMap<String, String>,
    pub body: Bytes,
}

/// What a handler returns on success.
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl HandlerResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        HandlerResponse { status: StatusCode::OK, body }
    }
}

pub type Handler =
    Arc<dyn Fn(Arc<Container>, HandlerRequest) -> BoxFuture<'static, Result<HandlerResponse, DispatchError>> + Send + Sync>;

/// Accumulates routes before the dispatcher is frozen and started.
pub struct HttpDispatcherBuilder {
    routes: RouteTable,
    cors: bool,
    health: bool,
}

impl Default for HttpDispatcherBuilder {
    fn default() -> Self {
        HttpDispatcherBuilder { routes: RouteTable::new(), cors: true, health: true }
    }
}

impl HttpDispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the permissive-by-default CORS layer.
    pub fn without_cors(mut self) -> Self {
        self.cors = false;
        self
    }

    /// Disable the built-in `GET /health` endpoint.
    pub fn without_health(mut self) -> Self {
        self.health = false;
        self
    }

    pub fn route(
        &mut self,
        method: RouteMethod,
        path: impl Into<String>,
        handler: Handler,
    ) -> Result<(), DispatchError> {
        self.routes.insert(method, path.into(), handler)
    }

    /// Freeze the route table (adding the built-in health route unless
    /// disabled or already taken) and produce the dispatcher.
    pub fn build(mut self, container: Arc<Container>) -> HttpDispatcher {
        if self.health && !self.routes.has(RouteMethod::Get, "/health") {
            let started_at = Instant::now();
            let handler: Handler = Arc::new(move |_container, _request| {
                let uptime_seconds = started_at.elapsed().as_secs();
                Box::pin(async move {
                    Ok(HandlerResponse::ok(json!({ "status": "UP", "uptimeSeconds": uptime_seconds })))
                })
            });
            self.routes
                .insert(RouteMethod::Get, "/health".to_string(), handler)
                .expect("built-in health route cannot collide, just checked");
        }
        HttpDispatcher { routes: Arc::new(self.routes), container, cors: self.cors }
    }
}

/// Matches incoming requests against a frozen route table and invokes the
/// bound handler.
pub struct HttpDispatcher {
    routes: Arc<RouteTable>,
    container: Arc<Container>,
    cors: bool,
}

impl HttpDispatcher {
    pub fn builder() -> HttpDispatcherBuilder {
        HttpDispatcherBuilder::new()
    }

    /// Build the axum `Router` that serves this dispatcher's route table.
    /// A single fallback handler performs the longest-literal-segment
    /// match; axum itself only owns the listener and the outer middleware
    /// stack (CORS, tracing, panic-catching). Takes `Arc<Self>` so the
    /// caller can also register the dispatcher as a container bean before
    /// handing it off.
    pub fn into_router(dispatcher: Arc<Self>) -> Router {
        let cors = dispatcher.cors;
        let router = Router::new().fallback(move |req: Request<Body>| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.handle(req).await }
        });
        let router = router.layer(tower_http::catch_panic::CatchPanicLayer::custom(handle_panic));
        let router = router.layer(tower_http::trace::TraceLayer::new_for_http());
        if cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    async fn handle(&self, req: Request<Body>) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query_raw = req.uri().query().unwrap_or("").to_string();

        let route_method = match RouteMethod::from_axum(&method) {
            Some(m) => m,
            None => return error_response(StatusCode::METHOD_NOT_ALLOWED, "method not supported"),
        };

        match self.routes.match_request(route_method, &path) {
            MatchOutcome::Matched { handler, path_vars } => {
                let query = form_urlencoded::parse(query_raw.as_bytes())
                    .into_owned()
                    .collect::<std::collections::HashMap<_, _>>();
                let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
                    Ok(bytes) => bytes,
                    Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("could not read body: {e}")),
                };
                let request = HandlerRequest { path_vars, query, body };
                match handler(self.container.clone(), request).await {
                    Ok(response) => (response.status, axum::Json(response.body)).into_response(),
                    Err(DispatchError::Bind { parameter, reason }) => error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("failed to bind {parameter}: {reason}"),
                    ),
                    Err(e) => {
                        warn!(error = %e, "handler returned an error");
                        error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
                    }
                }
            }
            MatchOutcome::MethodNotAllowed => {
                error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed for this path")
            }
            MatchOutcome::NotFound => error_response(StatusCode::NOT_FOUND, "no such route"),
        }
    }
}

/// Serializes a handler's return value into the body a [`HandlerResponse`]
/// expects. Used by `kernel-macros`-generated route handlers.
pub fn to_json_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| DispatchError::Handler { message: e.to_string() })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(json!({ "error": message, "status": status.as_u16() }))).into_response()
}

fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    warn!("handler panicked, returning 500");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

impl RouteMethod {
    fn from_axum(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET => Some(RouteMethod::Get),
            axum::http::Method::POST => Some(RouteMethod::Post),
            axum::http::Method::PUT => Some(RouteMethod::Put),
            axum::http::Method::DELETE => Some(RouteMethod::Delete),
            _ => None,
        }
    }
}

pub fn log_route_registered(method: RouteMethod, path: &str) {
    info!(method = %method, path, "route registered");
}
