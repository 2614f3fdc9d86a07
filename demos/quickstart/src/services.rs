use kernel::{Component, Service};
use serde::Serialize;

/// A plain singleton bean with no provider role — greets by name.
#[derive(Service)]
pub struct GreetingService;

impl GreetingService {
    pub fn greet(&self, name: &str) -> String {
        format!("hello, {name}")
    }
}

/// A named provider in the `tool` category, resolvable later via
/// `registry.get::<EchoTool>("tool", "echo")`.
#[derive(Component)]
#[provider(category = "tool", name = "echo")]
pub struct EchoTool;

#[derive(Debug, Serialize)]
pub struct EchoResult {
    pub n: i64,
}

impl EchoTool {
    pub fn echo(&self, n: i64) -> EchoResult {
        EchoResult { n }
    }
}
