//! End-to-end check that `#[routes]` expands tagged methods into working
//! route handlers: path variables, query parameters, JSON bodies, and a
//! handler that fails (`Result<T, E>` return) all go through the real
//! generated `build` closure rather than a hand-rolled stand-in.

use std::sync::Arc;

use bytes::Bytes;
use kernel_core::container::Container;
use kernel_core::http::HandlerRequest;
use kernel_core::scanner::Scanner;
use kernel_macros::{routes, Component};
use serde::{Deserialize, Serialize};

#[derive(Component)]
#[controller("/api/hello")]
struct HelloController;

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Echo {
    n: i64,
}

/// A plain bean with no provider role, resolved through an `#[ambient]`
/// handler parameter rather than a constructor `#[inject]` field.
#[derive(Component)]
struct Clock;

impl Clock {
    fn now(&self) -> &'static str {
        "o'clock"
    }
}

#[routes("/api/hello")]
impl HelloController {
    #[get("/")]
    async fn hello(&self) -> serde_json::Value {
        serde_json::json!({ "msg": "hi" })
    }

    #[get("/users/{id}")]
    async fn user(&self, #[path_var] id: String) -> serde_json::Value {
        serde_json::json!({ "id": id })
    }

    #[get("/search")]
    async fn search(&self, #[query] q: String) -> serde_json::Value {
        serde_json::json!({ "q": q })
    }

    #[post("/echo")]
    async fn echo(&self, #[body] body: Echo) -> Echo {
        body
    }

    #[get("/boom")]
    async fn boom(&self) -> Result<serde_json::Value, String> {
        Err("kaboom".to_string())
    }

    #[get("/time")]
    async fn time(&self, #[ambient] clock: Arc<Clock>) -> serde_json::Value {
        serde_json::json!({ "time": clock.now() })
    }
}

fn request(path_vars: &[(&str, &str)], query: &[(&str, &str)], body: &[u8]) -> HandlerRequest {
    HandlerRequest {
        path_vars: path_vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        body: Bytes::copy_from_slice(body),
    }
}

async fn build(container: &Arc<Container>, path: &str) -> kernel_core::http::Handler {
    let (_, routes) = Scanner::with_root("").scan(container).unwrap();
    let route = routes.into_iter().find(|r| r.path == path).unwrap_or_else(|| panic!("no route for {path}"));
    (route.build)(container).unwrap()
}

#[tokio::test]
async fn path_var_is_bound_verbatim() {
    let container = Arc::new(Container::new());
    let handler = build(&container, "/api/hello/users/{id}").await;
    let response = handler(container.clone(), request(&[("id", "42")], &[], b"")).await.unwrap();
    assert_eq!(response.body, serde_json::json!({ "id": "42" }));
}

#[tokio::test]
async fn required_query_param_is_bound() {
    let container = Arc::new(Container::new());
    let handler = build(&container, "/api/hello/search").await;
    let response = handler(container.clone(), request(&[], &[("q", "rust")], b"")).await.unwrap();
    assert_eq!(response.body, serde_json::json!({ "q": "rust" }));
}

#[tokio::test]
async fn missing_required_query_param_fails_binding() {
    let container = Arc::new(Container::new());
    let handler = build(&container, "/api/hello/search").await;
    let err = handler(container.clone(), request(&[], &[], b"")).await.unwrap_err();
    assert!(matches!(err, kernel_core::error::DispatchError::Bind { .. }));
}

#[tokio::test]
async fn json_body_round_trips() {
    let container = Arc::new(Container::new());
    let handler = build(&container, "/api/hello/echo").await;
    let body = serde_json::to_vec(&Echo { n: 7 }).unwrap();
    let response = handler(container.clone(), request(&[], &[], &body)).await.unwrap();
    assert_eq!(response.body, serde_json::json!({ "n": 7 }));
}

#[tokio::test]
async fn handler_err_becomes_handler_error() {
    let container = Arc::new(Container::new());
    let handler = build(&container, "/api/hello/boom").await;
    let err = handler(container.clone(), request(&[], &[], b"")).await.unwrap_err();
    match err {
        kernel_core::error::DispatchError::Handler { message } => assert_eq!(message, "kaboom"),
        other => panic!("expected Handler error, got {other:?}"),
    }
}

#[tokio::test]
async fn ambient_parameter_resolves_from_container() {
    let container = Arc::new(Container::new());
    let handler = build(&container, "/api/hello/time").await;
    let response = handler(container.clone(), request(&[], &[], b"")).await.unwrap();
    assert_eq!(response.body, serde_json::json!({ "time": "o'clock" }));
}

#[tokio::test]
async fn base_path_is_prefixed_on_every_route() {
    let container = Arc::new(Container::new());
    let (_, routes) = Scanner::with_root("").scan(&container).unwrap();
    assert!(routes.iter().any(|r| r.path == "/api/hello/"));
}
