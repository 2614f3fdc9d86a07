//! End-to-end check that `#[derive(Component)]`/`#[derive(Service)]` expand
//! into a working `AutoWired` impl plus reflective registration, exercised
//! the way `kernel-core`'s own unit tests exercise a hand-written `AutoWired`
//! impl, but going through the real macro output this time.

use std::sync::Arc;

use kernel_core::container::Container;
use kernel_core::registry::ProviderRegistry;
use kernel_core::scanner::Scanner;
use kernel_macros::{Component, Service};

#[derive(Component)]
struct Leaf {
    value: u32,
}

#[derive(Service)]
struct Branch {
    #[inject]
    leaf: Arc<Leaf>,
}

#[derive(Component)]
#[provider(category = "tool", name = "echo")]
struct EchoTool;

#[test]
fn injected_field_resolves_plain_field_defaults() {
    let container = Arc::new(Container::new());
    let registry = Arc::new(ProviderRegistry::new(container.categories()));
    container.register_arc(registry).unwrap();

    let (result, _routes) = Scanner::with_root("").scan(&container).unwrap();
    assert!(result.components.iter().any(|c| c.type_name.contains("Branch")));

    let branch = container.resolve::<Branch>().unwrap();
    assert_eq!(branch.leaf.value, 0);
}

#[test]
fn provider_attribute_registers_into_provider_registry() {
    let container = Arc::new(Container::new());
    let registry = Arc::new(ProviderRegistry::new(container.categories()));
    container.register_arc(registry.clone()).unwrap();

    let (result, _routes) = Scanner::with_root("").scan(&container).unwrap();
    assert_eq!(result.providers.len(), 1);
    assert!(registry.get::<EchoTool>("tool", "echo").is_some());
}
