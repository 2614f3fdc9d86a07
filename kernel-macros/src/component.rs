//! `#[derive(Component)]` / `#[derive(Service)]`: expand a struct into an
//! `AutoWired` impl plus an `inventory::submit!` registration. Fields are
//! classified as `#[inject]` (a dependency, resolved via
//! `container.resolve::<T>()`) or plain (`Default::default()`); a
//! struct-level `#[controller(...)]`/`#[provider(...)]` attribute selects
//! the registered `ComponentKind`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::crate_path::kernel_core_path;
use crate::parsing::inner_of_arc;

pub enum Role {
    Component,
    Service,
}

struct FieldPlan {
    ident: syn::Ident,
    ty: syn::Type,
    injected: bool,
}

enum Kind {
    Generic,
    Service,
    Controller { base_path: Option<String> },
    Provider { category: String, name: String },
}

pub fn expand(input: proc_macro::TokenStream, role: Role) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let kernel_core = kernel_core_path();
    let ident = input.ident.clone();

    let Data::Struct(data) = &input.data else {
        return syn::Error::new_spanned(&input, "Component/Service can only be derived on a struct")
            .to_compile_error()
            .into();
    };
    // A unit struct (`struct Greeter;`) is a perfectly ordinary stateless
    // bean — no dependencies, no fields to default-initialize — so it gets
    // zero `FieldPlan`s rather than being rejected.
    let plans: Vec<FieldPlan> = match &data.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|f| FieldPlan {
                ident: f.ident.clone().expect("named field"),
                ty: f.ty.clone(),
                injected: f.attrs.iter().any(|a| a.path().is_ident("inject")),
            })
            .collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return syn::Error::new_spanned(&input, "Component/Service does not support tuple structs")
                .to_compile_error()
                .into();
        }
    };

    let kind = struct_kind(&input, role);
    let kind_tokens = kind_expr(&kind, &kernel_core);

    let mut field_errors = Vec::new();
    let inner_types: Vec<Option<syn::Type>> = plans
        .iter()
        .map(|p| {
            if !p.injected {
                return None;
            }
            match inner_of_arc(&p.ty) {
                Some(inner) => Some(inner),
                None => {
                    field_errors.push(
                        syn::Error::new_spanned(&p.ty, "#[inject] fields must be of type Arc<T>")
                            .to_compile_error(),
                    );
                    None
                }
            }
        })
        .collect();
    if !field_errors.is_empty() {
        return proc_macro::TokenStream::from(quote! { #(#field_errors)* });
    }

    let dep_entries = plans.iter().zip(&inner_types).filter_map(|(p, inner)| {
        if !p.injected {
            return None;
        }
        let inner = inner.as_ref().expect("validated above");
        Some(quote! { (::std::any::TypeId::of::<#inner>(), ::std::any::type_name::<#inner>()) })
    });

    let field_inits = plans.iter().zip(&inner_types).map(|(p, inner)| {
        let name = &p.ident;
        let ty = &p.ty;
        if p.injected {
            let inner = inner.as_ref().expect("validated above");
            quote! { #name: container.resolve::<#inner>()? }
        } else {
            quote! { #name: <#ty as ::std::default::Default>::default() }
        }
    });
    // `Self { }` is not valid syntax for a unit struct — only `Self` is.
    let self_literal = if plans.is_empty() {
        quote! { Self }
    } else {
        quote! { Self { #(#field_inits),* } }
    };

    let register_fn_name = quote::format_ident!("__kernel_register_{}", ident);

    // `register` only wires the type into the `Container` (spec.md §4.7
    // step 6). A provider-kind component additionally needs a bean in the
    // `ProviderRegistry` under its category/name, but that resolve step is
    // deferred to a second function run only after every component in the
    // scan has been registered (step 7) — otherwise a provider depending on
    // a component discovered later in the same scan would fail to resolve.
    let resolve_provider_fn = match &kind {
        Kind::Provider { .. } => Some(quote::format_ident!("__kernel_resolve_provider_{}", ident)),
        _ => None,
    };

    let resolve_provider_item = match (&kind, &resolve_provider_fn) {
        (Kind::Provider { category, name }, Some(fn_name)) => quote! {
            #[doc(hidden)]
            fn #fn_name(
                container: &#kernel_core::container::Container,
            ) -> ::std::result::Result<(), #kernel_core::scanner::RegisterError> {
                let instance = container.resolve::<#ident>()?;
                let registry = container.resolve::<#kernel_core::registry::ProviderRegistry>()?;
                registry.register_arc(#category, #name, instance)?;
                ::std::result::Result::Ok(())
            }
        },
        _ => quote! {},
    };

    let resolve_provider_field = match &resolve_provider_fn {
        Some(fn_name) => quote! { ::std::option::Option::Some(#fn_name) },
        None => quote! { ::std::option::Option::None },
    };

    let expanded = quote! {
        impl #kernel_core::container::AutoWired for #ident {
            fn dependencies() -> ::std::vec::Vec<(::std::any::TypeId, &'static str)> {
                ::std::vec![ #(#dep_entries),* ]
            }

            fn construct(container: &#kernel_core::container::Container) -> ::std::result::Result<Self, #kernel_core::error::ContainerError> {
                ::std::result::Result::Ok(#self_literal)
            }
        }

        #[doc(hidden)]
        fn #register_fn_name(
            container: &#kernel_core::container::Container,
        ) -> ::std::result::Result<(), #kernel_core::scanner::RegisterError> {
            ::std::result::Result::Ok(container.register_auto_wired::<#ident>()?)
        }

        #resolve_provider_item

        #kernel_core::inventory::submit! {
            #kernel_core::scanner::ComponentDescriptor {
                type_id: ::std::any::TypeId::of::<#ident>,
                type_name: ::std::any::type_name::<#ident>(),
                module_path: ::std::module_path!(),
                kind: || #kind_tokens,
                register: #register_fn_name,
                resolve_provider: #resolve_provider_field,
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

fn struct_kind(input: &DeriveInput, role: Role) -> Kind {
    for attr in &input.attrs {
        if attr.path().is_ident("controller") {
            let base_path = attr
                .parse_args::<syn::LitStr>()
                .ok()
                .map(|lit| lit.value());
            return Kind::Controller { base_path };
        }
        if attr.path().is_ident("provider") {
            let mut category = None;
            let mut name = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("category") {
                    let value = meta.value()?;
                    let lit: syn::LitStr = value.parse()?;
                    category = Some(lit.value());
                } else if meta.path.is_ident("name") {
                    let value = meta.value()?;
                    let lit: syn::LitStr = value.parse()?;
                    name = Some(lit.value());
                }
                Ok(())
            });
            return Kind::Provider {
                category: category.unwrap_or_default(),
                name: name.unwrap_or_else(|| input.ident.to_string()),
            };
        }
    }
    match role {
        Role::Component => Kind::Generic,
        Role::Service => Kind::Service,
    }
}

fn kind_expr(kind: &Kind, kernel_core: &TokenStream) -> TokenStream {
    match kind {
        Kind::Generic => quote! { #kernel_core::meta::ComponentKind::Generic },
        Kind::Service => quote! { #kernel_core::meta::ComponentKind::Service },
        Kind::Controller { base_path: Some(bp) } => {
            quote! { #kernel_core::meta::ComponentKind::Controller { base_path: ::std::option::Option::Some(#bp) } }
        }
        Kind::Controller { base_path: None } => {
            quote! { #kernel_core::meta::ComponentKind::Controller { base_path: ::std::option::Option::None } }
        }
        Kind::Provider { category, name } => {
            quote! { #kernel_core::meta::ComponentKind::Provider { category: #category, name: #name } }
        }
    }
}
