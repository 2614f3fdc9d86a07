//! Discovers tagged types and turns them into `Container`/`ProviderRegistry`/
//! `HttpDispatcher` registrations.
//!
//! Rust has no runtime reflection, so "scan the classpath" becomes two
//! concrete, testable mechanisms:
//!
//! - **Reflective discovery**: `kernel-macros` expands `#[derive(Component)]`
//!   etc. into `inventory::submit!` entries, collected here via
//!   `inventory::iter`.
//! - **Explicit registration**: `Scanner::new()` plus builder-style calls.
//!
//! A single `Scanner` can use either or both; `scan` drains explicit
//! registrations first, then reflective ones (documented, not load-bearing
//! — see DESIGN.md).

use std::any::TypeId;

use tracing::info;

use crate::container::{AutoWired, Closeable, Container};
use crate::error::{ContainerError, ScanError};
use crate::http::Handler;
use crate::meta::{ComponentKind, RouteMethod};

/// Implemented by agent types. Agents are discovered "by capability, not
/// tag": unlike components/providers/controllers there is no
/// `#[derive(Agent)]`, since Rust cannot enumerate trait implementors
/// without a registration step of some kind — this trait plus
/// [`Scanner::agent`] is that step.
pub trait Agent: Send + Sync + 'static {}

/// A type + role pair reported back from a scan, for diagnostics and
/// testing. The authoritative registration already happened in the
/// `Container`/`ProviderRegistry` by the time a `ScanResult` is returned.
#[derive(Debug, Clone)]
pub struct ScannedType {
    pub type_name: &'static str,
    pub kind: ComponentKind,
}

/// What one `Scanner::scan` call discovered, split by role.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub components: Vec<ScannedType>,
    pub providers: Vec<ScannedType>,
    pub controllers: Vec<ScannedType>,
    pub agents: Vec<&'static str>,
}

impl ScanResult {
    fn push(&mut self, entry: ScannedType) {
        match &entry.kind {
            ComponentKind::Provider { .. } => self.providers.push(entry),
            ComponentKind::Controller { .. } => self.controllers.push(entry),
            ComponentKind::Generic | ComponentKind::Service => self.components.push(entry),
        }
    }
}

/// A route discovered (or explicitly registered) during a scan, ready to
/// hand to an [`HttpDispatcherBuilder`](crate::http::HttpDispatcherBuilder).
pub struct RouteSpec {
    pub method: RouteMethod,
    pub path: String,
    pub build: Box<dyn FnOnce(&Container) -> Result<Handler, ContainerError>>,
}

/// The error type a registration closure may fail with: either a
/// `Container` or `ProviderRegistry` failure, unified so provider-kind
/// components (which register into both) need no bespoke error variant.
pub type RegisterError = Box<dyn std::error::Error + Send + Sync>;

/// Reflectively discovered component/provider/controller, registered via
/// `inventory::submit!` by a `kernel-macros` derive.
///
/// `register` only registers the type with the `Container` (spec.md §4.7
/// step 6); for a provider-kind type, `resolve_provider` is `Some` and
/// performs the separate resolve-then-register-into-`ProviderRegistry` step
/// (step 7). Splitting these into two fields — rather than having
/// `register` do both inline — lets `Scanner::scan` register every
/// component across the whole scan *before* resolving any provider, so a
/// provider that depends on a component registered later in the same scan
/// resolves correctly instead of failing with a spurious `BeanNotFound`.
pub struct ComponentDescriptor {
    pub type_id: fn() -> TypeId,
    pub type_name: &'static str,
    pub module_path: &'static str,
    pub kind: fn() -> ComponentKind,
    pub register: fn(&Container) -> Result<(), RegisterError>,
    pub resolve_provider: Option<fn(&Container) -> Result<(), RegisterError>>,
}
inventory::collect!(ComponentDescriptor);

/// Reflectively discovered route, registered via `inventory::submit!` by a
/// `kernel-macros` method attribute (`#[get(..)]` etc).
pub struct RouteDescriptor {
    pub owner_type_name: &'static str,
    pub module_path: &'static str,
    pub method: RouteMethod,
    pub path: &'static str,
    pub build: fn(&Container) -> Result<Handler, ContainerError>,
}
inventory::collect!(RouteDescriptor);

enum Explicit {
    Component {
        type_name: &'static str,
        kind: ComponentKind,
        register: Box<dyn FnOnce(&Container) -> Result<(), RegisterError>>,
        /// `Some` only for a provider-kind component: resolves the bean and
        /// registers it into the `ProviderRegistry`, deferred to the second
        /// pass so every component is registered first (spec.md §4.7 steps
        /// 6/7).
        resolve_provider: Option<Box<dyn FnOnce(&Container) -> Result<(), RegisterError>>>,
    },
    Agent { type_name: &'static str, register: Box<dyn FnOnce(&Container) -> Result<(), RegisterError>> },
    Route(RouteSpec),
}

/// Performs one discovery pass: drains any explicitly registered entries,
/// then (if a reflective root was given) every `inventory`-collected
/// descriptor whose module path starts with that root.
pub struct Scanner {
    root: Option<&'static str>,
    explicit: Vec<Explicit>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// A scanner with no reflective discovery — explicit registrations only.
    pub fn new() -> Self {
        Scanner { root: None, explicit: Vec::new() }
    }

    /// Enable reflective discovery for every `inventory`-collected
    /// descriptor whose declared module path starts with `root` (typically
    /// the crate name, e.g. `"my_app"`).
    pub fn with_root(root: &'static str) -> Self {
        Scanner { root: Some(root), explicit: Vec::new() }
    }

    /// Explicitly register an auto-wired component.
    pub fn component<T: AutoWired>(mut self) -> Self {
        self.explicit.push(Explicit::Component {
            type_name: std::any::type_name::<T>(),
            kind: ComponentKind::Generic,
            register: Box::new(|c| Ok(c.register_auto_wired::<T>()?)),
            resolve_provider: None,
        });
        self
    }

    /// Explicitly register an auto-wired service (identical treatment to
    /// [`component`](Self::component) — kept distinct so `ScanResult` can
    /// report the role the author declared).
    pub fn service<T: AutoWired>(mut self) -> Self {
        self.explicit.push(Explicit::Component {
            type_name: std::any::type_name::<T>(),
            kind: ComponentKind::Service,
            register: Box::new(|c| Ok(c.register_auto_wired::<T>()?)),
            resolve_provider: None,
        });
        self
    }

    /// Explicitly register a provider under `category`/`name`: wired into
    /// the `Container` as a singleton and, once resolved (after every
    /// component in this scan has been registered — spec.md §4.7 steps
    /// 6/7), into the `ProviderRegistry` bean under that category/name.
    pub fn provider<T: AutoWired>(mut self, category: &'static str, name: &'static str) -> Self {
        self.explicit.push(Explicit::Component {
            type_name: std::any::type_name::<T>(),
            kind: ComponentKind::Provider { category, name },
            register: Box::new(|c| Ok(c.register_auto_wired::<T>()?)),
            resolve_provider: Some(Box::new(move |c| {
                let instance = c.resolve::<T>()?;
                let registry = c.resolve::<crate::registry::ProviderRegistry>()?;
                registry.register_arc(category, name, instance)?;
                Ok(())
            })),
        });
        self
    }

    /// Explicitly register a controller with an optional base path.
    pub fn controller<T: AutoWired>(mut self, base_path: Option<&'static str>) -> Self {
        self.explicit.push(Explicit::Component {
            type_name: std::any::type_name::<T>(),
            kind: ComponentKind::Controller { base_path },
            register: Box::new(|c| Ok(c.register_auto_wired::<T>()?)),
            resolve_provider: None,
        });
        self
    }

    /// Explicitly register a closeable auto-wired component.
    pub fn component_closeable<T: AutoWired + Closeable>(mut self) -> Self {
        self.explicit.push(Explicit::Component {
            type_name: std::any::type_name::<T>(),
            kind: ComponentKind::Generic,
            register: Box::new(|c| Ok(c.register_auto_wired_closeable::<T>()?)),
            resolve_provider: None,
        });
        self
    }

    /// Explicitly register an agent.
    pub fn agent<T: AutoWired + Agent>(mut self) -> Self {
        self.explicit.push(Explicit::Agent {
            type_name: std::any::type_name::<T>(),
            register: Box::new(|c| Ok(c.register_auto_wired::<T>()?)),
        });
        self
    }

    /// Explicitly register a route.
    pub fn route(
        mut self,
        method: RouteMethod,
        path: impl Into<String>,
        build: impl FnOnce(&Container) -> Result<Handler, ContainerError> + 'static,
    ) -> Self {
        self.explicit.push(Explicit::Route(RouteSpec { method, path: path.into(), build: Box::new(build) }));
        self
    }

    /// Run the scan: register every discovered type into `container`
    /// (explicit entries first, then reflective ones), then resolve every
    /// discovered provider into the `ProviderRegistry` as a second pass,
    /// matching spec.md §4.7's "register components" (step 6) strictly
    /// before "resolve providers" (step 7) — a provider that depends on a
    /// component registered later in the same scan must still resolve.
    /// Returns the classification plus the routes `Bootstrap` should pass
    /// to the dispatcher.
    pub fn scan(self, container: &Container) -> Result<(ScanResult, Vec<RouteSpec>), ScanError> {
        let mut result = ScanResult::default();
        let mut routes = Vec::new();
        let mut pending_providers: Vec<(&'static str, Box<dyn FnOnce(&Container) -> Result<(), RegisterError>>)> =
            Vec::new();

        for entry in self.explicit {
            match entry {
                Explicit::Component { type_name, kind, register, resolve_provider } => {
                    register(container).map_err(|e| ScanError::Registration {
                        type_name: crate::error::TypeName(type_name),
                        reason: e.to_string(),
                    })?;
                    info!(type_name, kind = ?kind, "component registered (explicit)");
                    result.push(ScannedType { type_name, kind });
                    if let Some(resolve_provider) = resolve_provider {
                        pending_providers.push((type_name, resolve_provider));
                    }
                }
                Explicit::Agent { type_name, register } => {
                    register(container).map_err(|e| ScanError::Registration {
                        type_name: crate::error::TypeName(type_name),
                        reason: e.to_string(),
                    })?;
                    info!(type_name, "agent registered (explicit)");
                    result.agents.push(type_name);
                }
                Explicit::Route(spec) => routes.push(spec),
            }
        }

        if let Some(root) = self.root {
            for descriptor in inventory::iter::<ComponentDescriptor> {
                if !descriptor.module_path.starts_with(root) {
                    continue;
                }
                (descriptor.register)(container).map_err(|e| ScanError::Registration {
                    type_name: crate::error::TypeName(descriptor.type_name),
                    reason: e.to_string(),
                })?;
                let kind = (descriptor.kind)();
                info!(type_name = descriptor.type_name, kind = ?kind, "component registered (reflective)");
                result.push(ScannedType { type_name: descriptor.type_name, kind });
                if let Some(resolve_provider) = descriptor.resolve_provider {
                    pending_providers.push((descriptor.type_name, Box::new(resolve_provider)));
                }
            }

            for descriptor in inventory::iter::<RouteDescriptor> {
                if !descriptor.module_path.starts_with(root) {
                    continue;
                }
                routes.push(RouteSpec {
                    method: descriptor.method,
                    path: descriptor.path.to_string(),
                    build: Box::new(descriptor.build),
                });
            }
        }

        for (type_name, resolve_provider) in pending_providers {
            resolve_provider(container).map_err(|e| ScanError::Registration {
                type_name: crate::error::TypeName(type_name),
                reason: e.to_string(),
            })?;
            info!(type_name, "provider resolved and registered");
        }

        Ok((result, routes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    impl AutoWired for Widget {
        fn dependencies() -> Vec<(TypeId, &'static str)> {
            vec![]
        }
        fn construct(_c: &Container) -> Result<Self, ContainerError> {
            Ok(Widget)
        }
    }
    impl Agent for Widget {}

    #[test]
    fn explicit_component_is_registered_and_reported() {
        let container = Container::new();
        let (result, routes) = Scanner::new().component::<Widget>().scan(&container).unwrap();
        assert_eq!(result.components.len(), 1);
        assert!(routes.is_empty());
        assert!(container.contains::<Widget>());
    }

    #[test]
    fn explicit_provider_is_classified_separately() {
        let container = Container::new();
        let (result, _) = Scanner::new().provider::<Widget>("tool", "widget").scan(&container).unwrap();
        assert_eq!(result.providers.len(), 1);
        assert!(result.components.is_empty());
    }

    #[test]
    fn explicit_agent_is_reported() {
        let container = Container::new();
        let (result, _) = Scanner::new().agent::<Widget>().scan(&container).unwrap();
        assert_eq!(result.agents, vec![std::any::type_name::<Widget>()]);
    }

    #[test]
    fn duplicate_component_registration_surfaces_as_scan_error() {
        let container = Container::new();
        container.register_auto_wired::<Widget>().unwrap();
        let err = Scanner::new().component::<Widget>().scan(&container).unwrap_err();
        assert!(matches!(err, ScanError::Registration { .. }));
    }
}
