//! The provider registry: a two-level, insertion-ordered map from category
//! to named provider instances.
//!
//! Implemented as a hand-rolled ordered map rather than an external
//! ordered-map crate: categories are written once at startup and read many
//! times afterward, so a `Vec` plus an index `HashMap` is the right shape.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;
use crate::meta::ProviderCategory;

struct Category {
    order: Vec<String>,
    by_name: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Category {
    fn new() -> Self {
        Category { order: Vec::new(), by_name: HashMap::new() }
    }
}

/// Holds named provider instances grouped by category.
///
/// Every category from [`Container::categories`](crate::container::Container::categories)
/// exists in the registry from construction, even if empty — `byCategory`
/// and `countIn` never fail with `UnknownCategory` for a category the
/// container knows about.
pub struct ProviderRegistry {
    categories: RwLock<HashMap<String, Category>>,
    type_ids: RwLock<HashMap<(String, String), TypeId>>,
}

impl ProviderRegistry {
    /// Create a registry pre-populated with `categories` (typically
    /// `container.categories()`).
    pub fn new(categories: impl IntoIterator<Item = ProviderCategory>) -> Self {
        let mut map = HashMap::new();
        for category in categories {
            map.insert(category.as_str().to_string(), Category::new());
        }
        ProviderRegistry {
            categories: RwLock::new(map),
            type_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Register `instance` under `name` within `category`.
    pub fn register<T: Send + Sync + 'static>(
        &self,
        category: &str,
        name: &str,
        instance: T,
    ) -> Result<(), RegistryError> {
        self.register_arc::<T>(category, name, Arc::new(instance))
    }

    /// Like [`register`](Self::register), for an instance that's already
    /// `Arc`-wrapped (e.g. one just pulled out of a [`Container`](crate::container::Container)),
    /// without wrapping it in a second `Arc`.
    pub fn register_arc<T: Send + Sync + 'static>(
        &self,
        category: &str,
        name: &str,
        instance: Arc<T>,
    ) -> Result<(), RegistryError> {
        let mut categories = self.categories.write().expect("categories lock poisoned");
        let bucket = categories.get_mut(category).ok_or_else(|| RegistryError::UnknownCategory {
            category: category.to_string(),
        })?;
        if bucket.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateProvider {
                category: category.to_string(),
                name: name.to_string(),
            });
        }
        bucket.order.push(name.to_string());
        bucket.by_name.insert(name.to_string(), instance);
        self.type_ids
            .write()
            .expect("type_ids lock poisoned")
            .insert((category.to_string(), name.to_string()), TypeId::of::<T>());
        Ok(())
    }

    /// Fetch a named provider, downcast to `T`. Returns `None` if the
    /// category is unknown, the name isn't registered, or `T` doesn't match
    /// the registered type.
    pub fn get<T: Send + Sync + 'static>(&self, category: &str, name: &str) -> Option<Arc<T>> {
        let categories = self.categories.read().expect("categories lock poisoned");
        let instance = categories.get(category)?.by_name.get(name)?.clone();
        instance.downcast::<T>().ok()
    }

    /// All provider names in `category`, in registration order.
    pub fn by_category(&self, category: &str) -> Result<Vec<String>, RegistryError> {
        let categories = self.categories.read().expect("categories lock poisoned");
        categories
            .get(category)
            .map(|bucket| bucket.order.clone())
            .ok_or_else(|| RegistryError::UnknownCategory { category: category.to_string() })
    }

    /// All known category names.
    pub fn categories(&self) -> Vec<String> {
        self.categories.read().expect("categories lock poisoned").keys().cloned().collect()
    }

    /// The number of providers registered in `category`.
    pub fn count_in(&self, category: &str) -> Result<usize, RegistryError> {
        self.by_category(category).map(|names| names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(
            ["llm", "storage"].into_iter().map(|c| ProviderCategory::new(c).unwrap()),
        )
    }

    #[test]
    fn registers_and_fetches_by_name() {
        let registry = registry();
        registry.register("llm", "primary", 7u32).unwrap();
        assert_eq!(*registry.get::<u32>("llm", "primary").unwrap(), 7);
        assert!(registry.get::<u32>("llm", "missing").is_none());
    }

    #[test]
    fn duplicate_name_in_category_is_rejected() {
        let registry = registry();
        registry.register("llm", "primary", 1u32).unwrap();
        let err = registry.register("llm", "primary", 2u32).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProvider { .. }));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let registry = registry();
        let err = registry.register("not-a-category", "x", 1u32).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownCategory { .. }));
    }

    #[test]
    fn by_category_preserves_insertion_order() {
        let registry = registry();
        registry.register("llm", "b", 1u32).unwrap();
        registry.register("llm", "a", 2u32).unwrap();
        assert_eq!(registry.by_category("llm").unwrap(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn count_in_reflects_registrations() {
        let registry = registry();
        assert_eq!(registry.count_in("storage").unwrap(), 0);
        registry.register("storage", "db", 1u32).unwrap();
        assert_eq!(registry.count_in("storage").unwrap(), 1);
    }
}
