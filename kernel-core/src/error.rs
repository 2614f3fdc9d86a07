//! The error taxonomy shared by every runtime component.
//!
//! Each component gets its own enum with a hand-written `Display` and
//! `std::error::Error` impl rather than a derive macro.

use std::fmt;

/// A type identity used purely for diagnostics: the pair a `TypeId` carries
/// no name for, so every error that needs to name "which type" carries this
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeName(pub &'static str);

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Failures from [`Container`](crate::container::Container) registration and
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// A type was registered more than once.
    DuplicateRegistration { type_name: TypeName },
    /// `resolve` reached a type with no registration and no built-in
    /// default, requested (transitively) by `required_by`.
    BeanNotFound {
        type_name: TypeName,
        required_by: Option<TypeName>,
    },
    /// `resolve` re-entered a type already on the in-progress path. `cycle`
    /// is the full chain, root-to-repeat, e.g. `["A", "B", "C", "A"]`.
    CircularDependency { cycle: Vec<TypeName> },
    /// A provider category name failed validation.
    UnknownCategory { category: String },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::DuplicateRegistration { type_name } => {
                write!(f, "type '{type_name}' is already registered in the container")
            }
            ContainerError::BeanNotFound {
                type_name,
                required_by: Some(parent),
            } => write!(f, "no registration for '{type_name}', required by '{parent}'"),
            ContainerError::BeanNotFound {
                type_name,
                required_by: None,
            } => write!(f, "no registration for '{type_name}'"),
            ContainerError::CircularDependency { cycle } => {
                let chain = cycle
                    .iter()
                    .map(|t| t.0)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                write!(f, "circular dependency: {chain}")
            }
            ContainerError::UnknownCategory { category } => {
                write!(f, "unknown provider category '{category}'")
            }
        }
    }
}

impl std::error::Error for ContainerError {}

/// Failures from [`Scanner`](crate::scanner::Scanner) traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Two descriptors claimed the same type with conflicting kinds.
    ConflictingKind { type_name: TypeName },
    /// The container rejected a discovered registration.
    Registration { type_name: TypeName, reason: String },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::ConflictingKind { type_name } => {
                write!(f, "'{type_name}' was declared with conflicting kinds")
            }
            ScanError::Registration { type_name, reason } => {
                write!(f, "registering '{type_name}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Failures from [`ProviderRegistry`](crate::registry::ProviderRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A name was already registered within this category.
    DuplicateProvider { category: String, name: String },
    /// The category itself does not exist.
    UnknownCategory { category: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateProvider { category, name } => {
                write!(f, "provider '{name}' is already registered in category '{category}'")
            }
            RegistryError::UnknownCategory { category } => {
                write!(f, "unknown provider category '{category}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Failures from [`EventBus`](crate::events::EventBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `publish`/`subscribe` called after `close()` completed.
    Closed,
    /// A bounded async queue stayed full past the caller's deadline.
    Backpressure,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Closed => write!(f, "event bus is closed"),
            BusError::Backpressure => write!(f, "event bus queue is full"),
        }
    }
}

impl std::error::Error for BusError {}

/// Failures from [`HttpDispatcher`](crate::http::HttpDispatcher) route
/// registration and request handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Two routes registered the same method + path pattern.
    DuplicateRoute { method: String, path: String },
    /// A request parameter could not be bound (missing path var, bad query,
    /// malformed body).
    Bind { parameter: String, reason: String },
    /// The handler itself returned an error.
    Handler { message: String },
    /// An `#[ambient]` parameter could not be resolved out of the
    /// `Container`. Distinct from `Bind` because spec.md §4.6 treats a
    /// missing ambient bean as a 500 (a wiring defect), not a 400 (a
    /// malformed request).
    Dependency(ContainerError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::DuplicateRoute { method, path } => {
                write!(f, "route already registered: {method} {path}")
            }
            DispatchError::Bind { parameter, reason } => {
                write!(f, "failed to bind {parameter}: {reason}")
            }
            DispatchError::Handler { message } => write!(f, "handler error: {message}"),
            DispatchError::Dependency(e) => write!(f, "ambient dependency resolution failed: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<ContainerError> for DispatchError {
    fn from(e: ContainerError) -> Self {
        DispatchError::Dependency(e)
    }
}

/// Failures from [`config`](crate::config) loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An `application.yaml` was present but not valid YAML.
    InvalidYaml { message: String },
    /// An environment variable or YAML value couldn't be parsed as the
    /// option's declared type.
    InvalidValue { key: String, message: String },
    /// `application.yaml` exists but could not be read (permissions, etc).
    Io { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidYaml { message } => write!(f, "invalid application.yaml: {message}"),
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid value for '{key}': {message}")
            }
            ConfigError::Io { message } => write!(f, "could not read configuration: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io { message: e.to_string() }
    }
}

/// Failures from [`Bootstrap::run`](crate::bootstrap::Bootstrap::run),
/// wrapping every stage's error with the step that produced it so the
/// process can report a named diagnostic and exit with the right code
/// (0 normal, 1 startup failure, 2 bind failure).
#[derive(Debug)]
pub enum BootstrapError {
    Config(ConfigError),
    Scan(ScanError),
    Container(ContainerError),
    Registry(RegistryError),
    Dispatch(DispatchError),
    /// The HTTP listener could not bind to the configured address.
    Bind { addr: String, message: String },
}

impl BootstrapError {
    /// The process exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::Bind { .. } => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::Config(e) => write!(f, "startup failed while loading configuration: {e}"),
            BootstrapError::Scan(e) => write!(f, "startup failed while scanning: {e}"),
            BootstrapError::Container(e) => write!(f, "startup failed while wiring the container: {e}"),
            BootstrapError::Registry(e) => write!(f, "startup failed while registering providers: {e}"),
            BootstrapError::Dispatch(e) => write!(f, "startup failed while registering routes: {e}"),
            BootstrapError::Bind { addr, message } => {
                write!(f, "failed to bind {addr}: {message}")
            }
        }
    }
}

impl std::error::Error for BootstrapError {}

impl From<ConfigError> for BootstrapError {
    fn from(e: ConfigError) -> Self {
        BootstrapError::Config(e)
    }
}
impl From<ScanError> for BootstrapError {
    fn from(e: ScanError) -> Self {
        BootstrapError::Scan(e)
    }
}
impl From<ContainerError> for BootstrapError {
    fn from(e: ContainerError) -> Self {
        BootstrapError::Container(e)
    }
}
impl From<RegistryError> for BootstrapError {
    fn from(e: RegistryError) -> Self {
        BootstrapError::Registry(e)
    }
}
impl From<DispatchError> for BootstrapError {
    fn from(e: DispatchError) -> Self {
        BootstrapError::Dispatch(e)
    }
}
