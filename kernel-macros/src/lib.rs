//! Derive and attribute macros for the kernel framework.
//!
//! - `#[derive(Component)]` / `#[derive(Service)]` — expand a struct into an
//!   [`AutoWired`](kernel_core::container::AutoWired) impl plus a reflective
//!   `inventory::submit!` registration. `#[inject]` on a field (which must
//!   be `Arc<T>`) marks it as a resolved dependency; everything else is
//!   `Default::default()`. A struct-level `#[controller("base/path")]` or
//!   `#[provider(category = "...", name = "...")]` attribute selects the
//!   `ComponentKind` the scanner reports it under.
//! - `#[routes]` — placed on an `impl Controller { .. }` block, turns
//!   methods tagged `#[get("/path")]` / `#[post(..)]` / `#[put(..)]` /
//!   `#[delete(..)]` into registered HTTP routes. Parameters are bound with
//!   `#[path_var]`, `#[query]` (`#[query(optional)]` /
//!   `#[query(default = "..")]`), `#[body]` or `#[ambient]`.

mod component;
mod crate_path;
mod parsing;
mod route;

use proc_macro::TokenStream;

/// Derive `AutoWired` for a generic component, reflectively registered.
#[proc_macro_derive(Component, attributes(inject, controller, provider))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    component::expand(input, component::Role::Component)
}

/// Derive `AutoWired` for a service, reflectively registered with
/// `ComponentKind::Service` (unless overridden by `#[controller]` /
/// `#[provider]`).
#[proc_macro_derive(Service, attributes(inject, controller, provider))]
pub fn derive_service(input: TokenStream) -> TokenStream {
    component::expand(input, component::Role::Service)
}

/// Expand an `impl Controller { .. }` block's `#[get]`/`#[post]`/`#[put]`/
/// `#[delete]`-tagged methods into registered route handlers.
#[proc_macro_attribute]
pub fn routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    route::expand(attr, item)
}
