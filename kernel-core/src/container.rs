//! The dependency-injection container.
//!
//! Beans are constructed lazily and recursively: the first `resolve::<T>()`
//! walks `T`'s declared dependencies on demand rather than sorting the
//! whole graph up front, so a circular dependency is reported as the exact
//! traversal chain (`A -> B -> A`) rather than a generic "unresolved beans"
//! failure.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};

use crate::error::{ContainerError, TypeName};
use crate::meta::{ProviderCategory, BUILTIN_CATEGORIES};

/// Implemented by types the container can construct on demand, wiring their
/// dependencies by recursively resolving them out of the same container.
///
/// Generated by `#[derive(Component)]` / `#[derive(Service)]` in
/// `kernel-macros`; can also be hand-written.
pub trait AutoWired: Send + Sync + Sized + 'static {
    /// The `(TypeId, type_name)` of every dependency `construct` resolves.
    /// Used only for diagnostics; the actual resolution happens lazily
    /// inside `construct`.
    fn dependencies() -> Vec<(TypeId, &'static str)>;

    /// Build an instance, resolving dependencies from `container`.
    fn construct(container: &Container) -> Result<Self, ContainerError>;
}

/// Implemented by beans that hold a resource needing explicit release.
/// `Container::close()` invokes this in reverse construction order.
pub trait Closeable: Send + Sync + 'static {
    fn close(&self);
}

type Closer = Box<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;
type Ctor = Box<dyn Fn(&Container) -> Result<Box<dyn Any + Send + Sync>, ContainerError> + Send + Sync>;

enum Registration {
    Instance {
        value: Arc<dyn Any + Send + Sync>,
        closer: Option<Closer>,
    },
    Factory {
        build: Ctor,
        closer: Option<Closer>,
    },
    AutoWired {
        dependencies: Vec<(TypeId, &'static str)>,
        build: Ctor,
        closer: Option<Closer>,
    },
}

impl Registration {
    fn closer(&self) -> &Option<Closer> {
        match self {
            Registration::Instance { closer, .. } => closer,
            Registration::Factory { closer, .. } => closer,
            Registration::AutoWired { closer, .. } => closer,
        }
    }
}

thread_local! {
    /// The chain of types currently being constructed on this thread, used
    /// to detect circular `resolve` calls. Empty between top-level calls.
    static IN_PROGRESS: RefCell<Vec<(TypeId, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// The dependency-injection container.
///
/// Every resolved bean is a singleton: the first successful `resolve::<T>()`
/// constructs and caches an `Arc<T>`; every call after that returns a clone
/// of the same `Arc`.
pub struct Container {
    registrations: Mutex<HashMap<TypeId, Arc<Registration>>>,
    cache: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    type_locks: Mutex<HashMap<TypeId, Arc<Mutex<()>>>>,
    construction_order: Mutex<Vec<TypeId>>,
    categories: RwLock<Vec<ProviderCategory>>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Create an empty container with the thirteen built-in provider
    /// categories already registered.
    pub fn new() -> Self {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|c| ProviderCategory::new(*c).expect("built-in category names are valid"))
            .collect();
        Container {
            registrations: Mutex::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            type_locks: Mutex::new(HashMap::new()),
            construction_order: Mutex::new(Vec::new()),
            categories: RwLock::new(categories),
        }
    }

    /// Add a new provider category. This is only meaningful
    /// while the container is being assembled (before `resolve` has been
    /// called against provider-registry consumers) — the method itself does
    /// not enforce that; callers follow the documented convention.
    pub fn register_category(&self, name: impl Into<String>) -> Result<(), ContainerError> {
        let category = ProviderCategory::new(name).map_err(|e| ContainerError::UnknownCategory {
            category: e.0,
        })?;
        let mut categories = self.categories.write().expect("categories lock poisoned");
        if !categories.contains(&category) {
            categories.push(category);
        }
        Ok(())
    }

    pub fn categories(&self) -> Vec<ProviderCategory> {
        self.categories.read().expect("categories lock poisoned").clone()
    }

    /// Register a pre-built instance as a singleton.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) -> Result<(), ContainerError> {
        self.insert_registration::<T>(Registration::Instance {
            value: Arc::new(instance),
            closer: None,
        })
    }

    /// Register an already-`Arc`-wrapped instance as a singleton, without
    /// wrapping it in a second `Arc`. Used for core beans (`EventBus`,
    /// `ProviderRegistry`) that the bootstrap sequence also holds its own
    /// handle to.
    pub fn register_arc<T: Send + Sync + 'static>(&self, instance: Arc<T>) -> Result<(), ContainerError> {
        self.insert_registration::<T>(Registration::Instance { value: instance, closer: None })
    }

    /// Register a pre-built instance that must be released on
    /// `Container::close()`.
    pub fn register_closeable<T: Closeable>(&self, instance: T) -> Result<(), ContainerError> {
        let closer: Closer = Box::new(|any: &(dyn Any + Send + Sync)| {
            any.downcast_ref::<T>()
                .expect("closer type mismatch (should be impossible)")
                .close();
        });
        self.insert_registration::<T>(Registration::Instance {
            value: Arc::new(instance),
            closer: Some(closer),
        })
    }

    /// Register a factory closure invoked (at most once) on first resolve.
    pub fn register_factory<T, F>(&self, build: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let ctor: Ctor = Box::new(move |c| build(c).map(|v| Box::new(v) as Box<dyn Any + Send + Sync>));
        self.insert_registration::<T>(Registration::Factory { build: ctor, closer: None })
    }

    /// Register a type that wires its own dependencies via [`AutoWired`].
    pub fn register_auto_wired<T: AutoWired>(&self) -> Result<(), ContainerError> {
        let dependencies = T::dependencies();
        let ctor: Ctor =
            Box::new(|c: &Container| T::construct(c).map(|v| Box::new(v) as Box<dyn Any + Send + Sync>));
        self.insert_registration::<T>(Registration::AutoWired {
            dependencies,
            build: ctor,
            closer: None,
        })
    }

    /// Like [`register_auto_wired`](Self::register_auto_wired), for types
    /// that also implement [`Closeable`].
    pub fn register_auto_wired_closeable<T: AutoWired + Closeable>(&self) -> Result<(), ContainerError> {
        let dependencies = T::dependencies();
        let ctor: Ctor =
            Box::new(|c: &Container| T::construct(c).map(|v| Box::new(v) as Box<dyn Any + Send + Sync>));
        let closer: Closer = Box::new(|any: &(dyn Any + Send + Sync)| {
            any.downcast_ref::<T>()
                .expect("closer type mismatch (should be impossible)")
                .close();
        });
        self.insert_registration::<T>(Registration::AutoWired {
            dependencies,
            build: ctor,
            closer: Some(closer),
        })
    }

    fn insert_registration<T: 'static>(&self, registration: Registration) -> Result<(), ContainerError> {
        let type_id = TypeId::of::<T>();
        let mut registrations = self.registrations.lock().expect("registrations lock poisoned");
        if registrations.contains_key(&type_id) {
            return Err(ContainerError::DuplicateRegistration {
                type_name: TypeName(std::any::type_name::<T>()),
            });
        }
        registrations.insert(type_id, Arc::new(registration));
        Ok(())
    }

    /// Does the container have a registration or cached instance for `T`?
    pub fn contains<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.cache.read().expect("cache lock poisoned").contains_key(&type_id)
            || self
                .registrations
                .lock()
                .expect("registrations lock poisoned")
                .contains_key(&type_id)
    }

    /// Resolve a singleton instance of `T`, constructing it (and, through
    /// [`AutoWired::construct`], recursively resolving its dependencies) on
    /// first use.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        if let Some(existing) = self.cache.read().expect("cache lock poisoned").get(&type_id) {
            return Ok(downcast_arc::<T>(existing.clone()));
        }

        let cycle_check = IN_PROGRESS.with(|path| {
            let path = path.borrow();
            path.iter().position(|(id, _)| *id == type_id).map(|start| {
                let mut cycle: Vec<TypeName> = path[start..].iter().map(|(_, n)| TypeName(n)).collect();
                cycle.push(TypeName(type_name));
                cycle
            })
        });
        if let Some(cycle) = cycle_check {
            return Err(ContainerError::CircularDependency { cycle });
        }

        let type_lock = {
            let mut locks = self.type_locks.lock().expect("type_locks lock poisoned");
            locks.entry(type_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        let _guard = type_lock.lock().expect("per-type lock poisoned");

        if let Some(existing) = self.cache.read().expect("cache lock poisoned").get(&type_id) {
            return Ok(downcast_arc::<T>(existing.clone()));
        }

        let required_by = IN_PROGRESS.with(|path| path.borrow().last().map(|(_, n)| TypeName(n)));

        let registration = {
            let registrations = self.registrations.lock().expect("registrations lock poisoned");
            match registrations.get(&type_id) {
                Some(r) => r.clone(),
                None => {
                    return Err(ContainerError::BeanNotFound {
                        type_name: TypeName(type_name),
                        required_by,
                    })
                }
            }
        };

        if let Registration::Instance { value, .. } = registration.as_ref() {
            let value = value.clone();
            self.cache.write().expect("cache lock poisoned").insert(type_id, value.clone());
            self.construction_order.lock().expect("construction_order lock poisoned").push(type_id);
            return Ok(downcast_arc::<T>(value));
        }

        IN_PROGRESS.with(|path| path.borrow_mut().push((type_id, type_name)));
        trace!(type_name, "resolving bean");

        let result = match registration.as_ref() {
            Registration::AutoWired { build, .. } => build(self),
            Registration::Factory { build, .. } => build(self),
            Registration::Instance { .. } => unreachable!("handled above"),
        };

        IN_PROGRESS.with(|path| {
            path.borrow_mut().pop();
        });

        let boxed = result?;
        let arc: Arc<dyn Any + Send + Sync> = Arc::from(boxed);
        self.cache.write().expect("cache lock poisoned").insert(type_id, arc.clone());
        self.construction_order.lock().expect("construction_order lock poisoned").push(type_id);
        debug!(type_name, "bean constructed");
        Ok(downcast_arc::<T>(arc))
    }

    /// Release every close-capable bean, in reverse construction order.
    pub fn close(&self) {
        let order = {
            let mut order = self.construction_order.lock().expect("construction_order lock poisoned");
            std::mem::take(&mut *order)
        };
        let cache = self.cache.read().expect("cache lock poisoned");
        let registrations = self.registrations.lock().expect("registrations lock poisoned");
        for type_id in order.into_iter().rev() {
            let Some(registration) = registrations.get(&type_id) else { continue };
            let Some(closer) = registration.closer() else { continue };
            let Some(instance) = cache.get(&type_id) else { continue };
            closer(instance.as_ref());
        }
    }
}

fn downcast_arc<T: Send + Sync + 'static>(arc: Arc<dyn Any + Send + Sync>) -> Arc<T> {
    arc.downcast::<T>().unwrap_or_else(|_| panic!("downcast type mismatch (should be impossible)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(u32);
    impl AutoWired for Leaf {
        fn dependencies() -> Vec<(TypeId, &'static str)> {
            vec![]
        }
        fn construct(_c: &Container) -> Result<Self, ContainerError> {
            Ok(Leaf(42))
        }
    }

    struct Branch(Arc<Leaf>);
    impl AutoWired for Branch {
        fn dependencies() -> Vec<(TypeId, &'static str)> {
            vec![(TypeId::of::<Leaf>(), std::any::type_name::<Leaf>())]
        }
        fn construct(c: &Container) -> Result<Self, ContainerError> {
            Ok(Branch(c.resolve::<Leaf>()?))
        }
    }

    struct CyclicA;
    struct CyclicB;
    impl AutoWired for CyclicA {
        fn dependencies() -> Vec<(TypeId, &'static str)> {
            vec![]
        }
        fn construct(c: &Container) -> Result<Self, ContainerError> {
            c.resolve::<CyclicB>()?;
            Ok(CyclicA)
        }
    }
    impl AutoWired for CyclicB {
        fn dependencies() -> Vec<(TypeId, &'static str)> {
            vec![]
        }
        fn construct(c: &Container) -> Result<Self, ContainerError> {
            c.resolve::<CyclicA>()?;
            Ok(CyclicB)
        }
    }

    #[test]
    fn resolves_recursive_dependencies() {
        let container = Container::new();
        container.register_auto_wired::<Leaf>().unwrap();
        container.register_auto_wired::<Branch>().unwrap();
        let branch = container.resolve::<Branch>().unwrap();
        assert_eq!(branch.0 .0, 42);
    }

    #[test]
    fn resolve_is_idempotent() {
        let container = Container::new();
        container.register_auto_wired::<Leaf>().unwrap();
        let a = container.resolve::<Leaf>().unwrap();
        let b = container.resolve::<Leaf>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let container = Container::new();
        container.register_auto_wired::<Leaf>().unwrap();
        let err = container.register_auto_wired::<Leaf>().unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateRegistration { .. }));
    }

    #[test]
    fn missing_dependency_names_the_requester() {
        let container = Container::new();
        container.register_auto_wired::<Branch>().unwrap();
        let err = container.resolve::<Branch>().unwrap_err();
        match err {
            ContainerError::BeanNotFound { type_name, required_by } => {
                assert_eq!(type_name.0, std::any::type_name::<Leaf>());
                assert_eq!(required_by.unwrap().0, std::any::type_name::<Branch>());
            }
            other => panic!("expected BeanNotFound, got {other:?}"),
        }
    }

    #[test]
    fn circular_dependency_reports_full_chain() {
        let container = Container::new();
        container.register_auto_wired::<CyclicA>().unwrap();
        container.register_auto_wired::<CyclicB>().unwrap();
        let err = container.resolve::<CyclicA>().unwrap_err();
        assert!(matches!(err, ContainerError::CircularDependency { .. }));
    }

    #[test]
    fn built_in_categories_are_present() {
        let container = Container::new();
        let categories = container.categories();
        assert_eq!(categories.len(), BUILTIN_CATEGORIES.len());
        assert!(categories.iter().any(|c| c.as_str() == "llm"));
    }

    #[test]
    fn register_category_is_idempotent() {
        let container = Container::new();
        container.register_category("custom").unwrap();
        container.register_category("custom").unwrap();
        assert_eq!(container.categories().iter().filter(|c| c.as_str() == "custom").count(), 1);
    }
}
