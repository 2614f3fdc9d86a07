//! Core runtime for the kernel application-composition framework.
//!
//! Six cooperating pieces, wired by [`bootstrap::Bootstrap`]:
//!
//! ```text
//! MetadataModel ← Container ← { Scanner, ProviderRegistry, EventBus } ← HttpDispatcher ← Bootstrap
//! ```
//!
//! - [`meta`] — the tag vocabulary (`ComponentKind`, `ProviderCategory`,
//!   `RouteMethod`, `ParameterBinding`) and a type-erased metadata store.
//! - [`container`] — the dependency-injection container.
//! - [`scanner`] — reflective (`inventory`-based) and explicit discovery.
//! - [`registry`] — the category-partitioned provider registry.
//! - [`events`] — the in-process, type-keyed pub/sub bus.
//! - [`http`] — auto-routing built on `axum`.
//! - [`config`] — layered configuration (defaults → YAML → env).
//! - [`bootstrap`] — the ten-step startup/shutdown sequence.
//! - [`error`] — the error taxonomy shared across all of the above.

pub mod bootstrap;
pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod meta;
pub mod registry;
pub mod scanner;

/// Re-exported so `kernel-macros`-generated code can refer to
/// `inventory::submit!` and `serde_json::from_slice` without requiring
/// direct dependencies in user crates.
pub use inventory;
pub use serde_json;

pub mod prelude {
    //! Re-exports the types most applications reach for.
    pub use crate::bootstrap::{Bootstrap, RunningApp};
    pub use crate::container::{AutoWired, Closeable, Container};
    pub use crate::error::{BootstrapError, BusError, ConfigError, ContainerError, DispatchError, RegistryError, ScanError};
    pub use crate::events::{EventBus, EventBusConfig, Subscription};
    pub use crate::http::{HandlerRequest, HandlerResponse};
    pub use crate::meta::{ComponentKind, ParameterBinding, ProviderCategory, RouteMethod};
    pub use crate::registry::ProviderRegistry;
    pub use crate::scanner::{Agent, ScanResult, Scanner};
}
