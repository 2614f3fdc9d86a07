//! End-to-end HTTP coverage over a real `Bootstrap::run` + `axum::Router`,
//! exercised via `tower::ServiceExt::oneshot` — no listener bound.
//!
//! A binary crate's modules aren't importable from an integration test, so
//! this file hand-wires a tiny stand-in component/route set through
//! `Scanner`'s explicit-registration API instead of reaching into `src/`.
//! The macro-expanded path (`#[derive(Component)]` plus `#[routes]`) is
//! already covered end-to-end by `kernel-macros`'s own integration tests;
//! this file instead exercises the `Bootstrap`/`HttpDispatcher`/axum
//! `Router` wiring itself.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use kernel::kernel_core;
use kernel::prelude::*;
use kernel_core::http::Handler;
use tower::ServiceExt;

struct GreetingService;

impl AutoWired for GreetingService {
    fn dependencies() -> Vec<(std::any::TypeId, &'static str)> {
        vec![]
    }
    fn construct(_c: &Container) -> Result<Self, ContainerError> {
        Ok(GreetingService)
    }
}

fn hello_handler() -> Handler {
    Arc::new(|_container, _request| {
        Box::pin(async move { Ok(HandlerResponse::ok(serde_json::json!({ "msg": "hi" }))) })
    })
}

fn user_handler() -> Handler {
    Arc::new(|_container, request| {
        Box::pin(async move {
            let id = request.path_vars.get("id").cloned().unwrap_or_default();
            Ok(HandlerResponse::ok(serde_json::json!({ "id": id })))
        })
    })
}

fn search_handler() -> Handler {
    Arc::new(|_container, request| {
        Box::pin(async move {
            let q = request.query.get("q").cloned().ok_or_else(|| {
                kernel_core::error::DispatchError::Bind {
                    parameter: "q".to_string(),
                    reason: "missing required query parameter".to_string(),
                }
            })?;
            Ok(HandlerResponse::ok(serde_json::json!({ "q": q })))
        })
    })
}

fn echo_handler() -> Handler {
    Arc::new(|_container, request| {
        Box::pin(async move {
            let body: serde_json::Value =
                serde_json::from_slice(&request.body).map_err(|e| kernel_core::error::DispatchError::Bind {
                    parameter: "body".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(HandlerResponse::ok(body))
        })
    })
}

async fn build_app() -> RunningApp {
    let scanner = Scanner::new()
        .service::<GreetingService>()
        .route(RouteMethod::Get, "/api/hello/", |_c| Ok(hello_handler()))
        .route(RouteMethod::Get, "/api/hello/users/{id}", |_c| Ok(user_handler()))
        .route(RouteMethod::Get, "/api/hello/search", |_c| Ok(search_handler()))
        .route(RouteMethod::Post, "/api/hello/echo", |_c| Ok(echo_handler()));
    Bootstrap::run(scanner, "quickstart").expect("bootstrap should succeed with no conflicting routes")
}

async fn send(router: axum::Router, method: &str, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn happy_path_get_returns_msg() {
    let app = build_app().await;
    let (status, body) = send(app.router(), "GET", "/api/hello/", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "msg": "hi" }));
}

#[tokio::test]
async fn path_variable_is_bound_and_returned() {
    let app = build_app().await;
    let (status, body) = send(app.router(), "GET", "/api/hello/users/42", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "id": "42" }));
}

#[tokio::test]
async fn missing_required_query_param_is_a_400() {
    let app = build_app().await;
    let (status, body) = send(app.router(), "GET", "/api/hello/search", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("missing required query parameter"));
}

#[tokio::test]
async fn json_body_is_echoed_back() {
    let app = build_app().await;
    let (status, body) = send(app.router(), "POST", "/api/hello/echo", r#"{"n":7}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "n": 7 }));
}

#[tokio::test]
async fn health_endpoint_reports_uptime() {
    let app = build_app().await;
    let (status, body) = send(app.router(), "GET", "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
    assert!(body["uptimeSeconds"].as_u64().is_some());
}

#[tokio::test]
async fn unknown_route_is_a_404() {
    let app = build_app().await;
    let (status, _body) = send(app.router(), "GET", "/api/hello/nope", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
