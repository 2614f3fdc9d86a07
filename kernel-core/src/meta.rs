//! The tag vocabulary authors attach to types and methods.
//!
//! `MetadataModel` only stores and looks up tag values — it never acts on
//! them. The [`Scanner`](crate::scanner::Scanner) classifies types by
//! reading these tags; the [`Container`](crate::container::Container) wires
//! constructors; the [`HttpDispatcher`](crate::http::HttpDispatcher) turns
//! route tags into a routing table. Decoupling "what does it mean to be a
//! `Service`?" from the machinery that acts on it keeps each component
//! independently testable.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// The thirteen built-in provider categories. New
/// categories may only be added while the [`Container`](crate::container::Container)
/// is being constructed — see [`Container::register_category`](crate::container::Container::register_category).
pub const BUILTIN_CATEGORIES: &[&str] = &[
    "llm",
    "infrastructure",
    "storage",
    "messaging",
    "orchestration",
    "memory",
    "queue",
    "tool",
    "evaluation",
    "agent",
    "resilience",
    "health",
    "metrics",
];

/// A provider category identifier: a non-empty lowercase ASCII name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderCategory(String);

impl ProviderCategory {
    /// Validate and wrap a category name.
    ///
    /// Categories must be non-empty and lowercase ASCII (matching the
    /// built-in set: `llm`, `storage`, `queue`, ...).
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidCategoryName> {
        let name = name.into();
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
            return Err(InvalidCategoryName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A category name failed validation (empty, or not lowercase ASCII).
#[derive(Debug, Clone)]
pub struct InvalidCategoryName(pub String);

impl fmt::Display for InvalidCategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid provider category name: '{}'", self.0)
    }
}

impl std::error::Error for InvalidCategoryName {}

/// The role a scanned type plays.
///
/// A type carries exactly one `ComponentKind`. Provider tags imply
/// `Component` (they are components too, plus a named role in a category).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// A plain auto-wired singleton with no special treatment.
    Generic,
    /// Same as `Generic` — kept distinct because authors reach for `Service`
    /// by name; the Scanner and Container treat both identically.
    Service,
    /// An HTTP handler container. `base_path` is the prefix prepended to
    /// every route declared on the type.
    Controller { base_path: Option<&'static str> },
    /// A named provider within one of the thirteen provider categories.
    Provider {
        category: &'static str,
        name: &'static str,
    },
}

impl ComponentKind {
    pub fn is_controller(&self) -> bool {
        matches!(self, ComponentKind::Controller { .. })
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, ComponentKind::Provider { .. })
    }
}

/// One of the four HTTP methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
        }
    }

    pub fn to_axum(self) -> axum::http::Method {
        match self {
            RouteMethod::Get => axum::http::Method::GET,
            RouteMethod::Post => axum::http::Method::POST,
            RouteMethod::Put => axum::http::Method::PUT,
            RouteMethod::Delete => axum::http::Method::DELETE,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes how one handler parameter is populated from a request.
/// Diagnostic metadata only — the actual extraction is
/// performed by the generated (or hand-written) `invoke` closure on a
/// [`RouteDescriptor`](crate::scanner::RouteDescriptor); this enum exists so
/// bind failures can name which parameter and which kind failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterBinding {
    PathVar(&'static str),
    Query {
        name: &'static str,
        required: bool,
        default: Option<&'static str>,
    },
    Body(&'static str),
    Ambient(&'static str),
}

impl ParameterBinding {
    pub fn describe(&self) -> String {
        match self {
            ParameterBinding::PathVar(n) => format!("path variable '{n}'"),
            ParameterBinding::Query { name, .. } => format!("query parameter '{name}'"),
            ParameterBinding::Body(ty) => format!("request body ({ty})"),
            ParameterBinding::Ambient(ty) => format!("ambient dependency ({ty})"),
        }
    }
}

/// A generic, type-erased metadata registry.
///
/// Stores `Vec<M>` per type, keyed by `TypeId`, so consumers can push and
/// later iterate arbitrary metadata shapes (route info, OpenAPI-style
/// descriptions, etc.) without `MetadataModel` knowing about them.
#[derive(Default)]
pub struct MetadataModel {
    inner: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MetadataModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Any + Send + Sync>(&mut self, item: M) {
        self.entry::<M>().push(item);
    }

    pub fn get<M: Any + Send + Sync>(&self) -> &[M] {
        self.inner
            .get(&TypeId::of::<M>())
            .and_then(|boxed| boxed.downcast_ref::<Vec<M>>())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn entry<M: Any + Send + Sync>(&mut self) -> &mut Vec<M> {
        self.inner
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Box::new(Vec::<M>::new()))
            .downcast_mut::<Vec<M>>()
            .expect("MetadataModel: type mismatch (should be impossible)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_rejects_uppercase_and_empty() {
        assert!(ProviderCategory::new("llm").is_ok());
        assert!(ProviderCategory::new("LLM").is_err());
        assert!(ProviderCategory::new("").is_err());
    }

    #[test]
    fn metadata_model_round_trips_by_type() {
        let mut model = MetadataModel::new();
        model.push(1u32);
        model.push(2u32);
        model.push("hello");
        assert_eq!(model.get::<u32>(), &[1, 2]);
        assert_eq!(model.get::<&str>(), &["hello"]);
        assert!(model.get::<u64>().is_empty());
    }
}
