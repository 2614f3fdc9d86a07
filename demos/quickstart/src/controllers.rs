use std::sync::Arc;

use kernel::prelude::*;
use kernel::{routes, Component};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::events::Greeted;
use crate::services::{EchoTool, GreetingService};

/// One base path exercising a plain JSON response, a path variable, a
/// required query parameter, and a request body bound to a named provider.
#[derive(Component)]
#[controller("/api/hello")]
pub struct HelloController {
    #[inject]
    greeting: Arc<GreetingService>,
    #[inject]
    bus: Arc<EventBus>,
    #[inject]
    registry: Arc<ProviderRegistry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EchoBody {
    pub n: i64,
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

    #[get("/greet")]
    async fn greet(&self, #[query] name: String) -> serde_json::Value {
        let message = self.greeting.greet(&name);
        if let Err(e) = self.bus.publish(Greeted { name: name.clone() }).await {
            info!(error = %e, "could not publish greeted event");
        }
        serde_json::json!({ "message": message })
    }

    #[post("/echo")]
    async fn echo(&self, #[body] body: EchoBody) -> Result<serde_json::Value, String> {
        let tool = self
            .registry
            .get::<EchoTool>("tool", "echo")
            .ok_or_else(|| "echo tool not registered".to_string())?;
        Ok(serde_json::json!(tool.echo(body.n)))
    }
}
