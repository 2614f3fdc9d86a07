//! `#[routes]`: expand an `impl Controller { ... }` block's tagged methods
//! into route handlers, registered via `inventory::submit!`.
//!
//! Walks an annotated *impl block* rather than attaching a macro to each
//! method — an attribute macro placed directly on one method only ever sees that
//! method's own tokens, never the enclosing `impl`'s `Self` type, so there
//! is no way to name the controller being registered. Wrapping the whole
//! block gives the expansion `self_ty` once and lets every tagged method
//! share it.
//!
//! `#[get("/path")]` / `#[post(..)]` / `#[put(..)]` / `#[delete(..)]` and the
//! parameter attributes (`#[path_var]`, `#[query]`, `#[body]`,
//! `#[ambient]`) are not proc-macro entry points themselves — they are
//! inert syntax inside `#[routes]`'s own input, parsed and stripped here.

use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{FnArg, ImplItem, ImplItemFn, ItemImpl, Pat, Type};

use crate::crate_path::kernel_core_path;
use crate::parsing::inner_of_arc;

struct RouteTag {
    method: &'static str,
    path: syn::LitStr,
}

enum Binding {
    PathVar(String),
    Query { name: String, required: bool, default: Option<syn::LitStr> },
    Body,
    Ambient,
}

struct ParamPlan {
    ident: syn::Ident,
    ty: Type,
    binding: Binding,
}

pub fn expand(attr: proc_macro::TokenStream, item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    // `#[routes]` registers method paths literally; `#[routes("/api/hello")]`
    // prefixes every method path with a base (matching the `#[controller("..")]`
    // given to the same type's `#[derive(Component)]`, repeated here because
    // one macro invocation never sees another item's attributes).
    let base_path: Option<String> = if attr.is_empty() {
        None
    } else {
        match syn::parse::<syn::LitStr>(attr) {
            Ok(lit) => Some(lit.value()),
            Err(e) => return e.to_compile_error().into(),
        }
    };
    let mut input: ItemImpl = match syn::parse(item) {
        Ok(i) => i,
        Err(e) => return e.to_compile_error().into(),
    };
    let kernel_core = kernel_core_path();
    let self_ty = input.self_ty.clone();

    let mut registrations = Vec::new();
    let mut errors = Vec::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else { continue };
        let Some(tag) = take_route_tag(&mut method.attrs) else { continue };

        match plan_route(method, &tag, base_path.as_deref(), &self_ty, &kernel_core) {
            Ok(tokens) => registrations.push(tokens),
            Err(e) => errors.push(e.to_compile_error()),
        }
    }

    if !errors.is_empty() {
        return proc_macro::TokenStream::from(quote! { #input #(#errors)* });
    }

    proc_macro::TokenStream::from(quote! {
        #input
        #(#registrations)*
    })
}

/// Finds and removes the first `get`/`post`/`put`/`delete` attribute on a
/// method, returning the HTTP method and path literal it carried.
fn take_route_tag(attrs: &mut Vec<syn::Attribute>) -> Option<RouteTag> {
    let index = attrs.iter().position(|a| {
        a.path().is_ident("get") || a.path().is_ident("post") || a.path().is_ident("put") || a.path().is_ident("delete")
    })?;
    let attr = attrs.remove(index);
    let method = if attr.path().is_ident("get") {
        "Get"
    } else if attr.path().is_ident("post") {
        "Post"
    } else if attr.path().is_ident("put") {
        "Put"
    } else {
        "Delete"
    };
    let path = attr.parse_args::<syn::LitStr>().unwrap_or_else(|_| syn::LitStr::new("/", attr.span()));
    Some(RouteTag { method, path })
}

/// Does `ty` read as `Result<_, _>` (possibly qualified, e.g.
/// `std::result::Result<T, E>`)? Checked syntactically, not by resolving the
/// type — same trick `?`-desugaring-aware frameworks (axum's own handler
/// impls, `actix-web`'s `Responder`) use to special-case a handler's return
/// shape at the macro layer.
fn is_result_type(ty: &Type) -> bool {
    let Type::Path(type_path) = ty else { return false };
    type_path.path.segments.last().is_some_and(|seg| seg.ident == "Result")
}

/// Joins a controller's base path with one route's own path, matching the
/// spec's example (`base "/api/hello"` + route `"/"` => `"/api/hello/"`).
fn join_path(base: Option<&str>, path: &str) -> String {
    match base {
        Some(base) => format!("{}{path}", base.trim_end_matches('/')),
        None => path.to_string(),
    }
}

fn plan_route(
    method: &mut ImplItemFn,
    tag: &RouteTag,
    base_path: Option<&str>,
    self_ty: &Type,
    kernel_core: &TokenStream,
) -> syn::Result<TokenStream> {
    if method.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(&method.sig, "route handlers must be `async fn`"));
    }

    let mut has_receiver = false;
    let mut params = Vec::new();

    for input in method.sig.inputs.iter_mut() {
        match input {
            FnArg::Receiver(_) => has_receiver = true,
            FnArg::Typed(pat_type) => {
                let ident = match pat_type.pat.as_ref() {
                    Pat::Ident(p) => p.ident.clone(),
                    other => return Err(syn::Error::new_spanned(other, "route parameters must be simple bindings")),
                };
                let binding = take_binding(&mut pat_type.attrs, &ident)?;
                params.push(ParamPlan { ident, ty: (*pat_type.ty).clone(), binding });
            }
        }
    }
    if !has_receiver {
        return Err(syn::Error::new_spanned(&method.sig, "route handlers must take `&self`"));
    }

    let method_ident = method.sig.ident.clone();
    let route_method = quote::format_ident!("{}", tag.method);
    let full_path = join_path(base_path, &tag.path.value());
    let returns_result = match &method.sig.output {
        syn::ReturnType::Type(_, ty) => is_result_type(ty),
        syn::ReturnType::Default => false,
    };

    let mut bind_stmts = Vec::new();
    let mut arg_idents = Vec::new();
    for p in &params {
        let ident = &p.ident;
        let ty = &p.ty;
        arg_idents.push(quote! { #ident });
        let stmt = match &p.binding {
            Binding::PathVar(name) => quote! {
                let #ident: #ty = request.path_vars.get(#name)
                    .ok_or_else(|| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: "missing path variable".to_string(),
                    })?
                    .parse()
                    .map_err(|e| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: format!("{e}"),
                    })?;
            },
            Binding::Query { name, required: true, default: None } => quote! {
                let #ident: #ty = request.query.get(#name)
                    .ok_or_else(|| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: "missing required query parameter".to_string(),
                    })?
                    .parse()
                    .map_err(|e| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: format!("{e}"),
                    })?;
            },
            Binding::Query { name, required: false, default: Some(default) } => quote! {
                let #ident: #ty = match request.query.get(#name) {
                    ::std::option::Option::Some(raw) => raw.parse().map_err(|e| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: format!("{e}"),
                    })?,
                    ::std::option::Option::None => #default.parse().map_err(|e| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: format!("{e}"),
                    })?,
                };
            },
            Binding::Query { name, required: false, default: None } => quote! {
                let #ident: #ty = match request.query.get(#name) {
                    ::std::option::Option::Some(raw) => raw.parse().map_err(|e| #kernel_core::error::DispatchError::Bind {
                        parameter: #name.to_string(),
                        reason: format!("{e}"),
                    })?,
                    ::std::option::Option::None => <#ty as ::std::default::Default>::default(),
                };
            },
            Binding::Query { required: true, default: Some(_), .. } => unreachable!("parsed as required xor defaulted"),
            Binding::Body => quote! {
                let #ident: #ty = #kernel_core::serde_json::from_slice(&request.body)
                    .map_err(|e| #kernel_core::error::DispatchError::Bind {
                        parameter: ::std::stringify!(#ident).to_string(),
                        reason: e.to_string(),
                    })?;
            },
            Binding::Ambient => {
                let inner = inner_of_arc(ty).ok_or_else(|| {
                    syn::Error::new_spanned(ty, "#[ambient] parameters must be of type Arc<T>")
                })?;
                quote! {
                    let #ident: #ty = container.resolve::<#inner>()?;
                }
            }
        };
        bind_stmts.push(stmt);
    }

    let build_fn = quote::format_ident!("__kernel_route_build_{}", method_ident);

    // A handler whose signature reads `-> Result<T, E>` gets its `Err` arm
    // turned into a `DispatchError::Handler` (500 + diagnostic message). A
    // handler returning a bare `T` always succeeds.
    let outcome_stmt = if returns_result {
        quote! {
            let value = controller.#method_ident(#(#arg_idents),*).await
                .map_err(|e| #kernel_core::error::DispatchError::Handler { message: ::std::string::ToString::to_string(&e) })?;
        }
    } else {
        quote! {
            let value = controller.#method_ident(#(#arg_idents),*).await;
        }
    };

    Ok(quote! {
        #[doc(hidden)]
        fn #build_fn(
            container: &#kernel_core::container::Container,
        ) -> ::std::result::Result<#kernel_core::http::Handler, #kernel_core::error::ContainerError> {
            let controller = container.resolve::<#self_ty>()?;
            ::std::result::Result::Ok(::std::sync::Arc::new(move |container: ::std::sync::Arc<#kernel_core::container::Container>, request: #kernel_core::http::HandlerRequest| {
                let controller = controller.clone();
                ::std::boxed::Box::pin(async move {
                    #(#bind_stmts)*
                    #outcome_stmt
                    let body = #kernel_core::http::to_json_body(&value)?;
                    ::std::result::Result::Ok(#kernel_core::http::HandlerResponse::ok(body))
                })
            }))
        }

        #kernel_core::inventory::submit! {
            #kernel_core::scanner::RouteDescriptor {
                owner_type_name: ::std::any::type_name::<#self_ty>(),
                module_path: ::std::module_path!(),
                method: #kernel_core::meta::RouteMethod::#route_method,
                path: #full_path,
                build: #build_fn,
            }
        }
    })
}

/// Reads and removes the first `path_var`/`query`/`body`/`ambient`
/// attribute on a parameter. Parameters with none of these are rejected —
/// every bound value must say where it comes from.
fn take_binding(attrs: &mut Vec<syn::Attribute>, ident: &syn::Ident) -> syn::Result<Binding> {
    let index = attrs.iter().position(|a| {
        a.path().is_ident("path_var") || a.path().is_ident("query") || a.path().is_ident("body") || a.path().is_ident("ambient")
    });
    let Some(index) = index else {
        return Err(syn::Error::new_spanned(
            ident,
            "route parameters need a #[path_var], #[query], #[body] or #[ambient] attribute",
        ));
    };
    let attr = attrs.remove(index);

    if attr.path().is_ident("path_var") {
        let name = attr
            .parse_args::<syn::LitStr>()
            .map(|lit| lit.value())
            .unwrap_or_else(|_| ident.to_string());
        return Ok(Binding::PathVar(name));
    }
    if attr.path().is_ident("body") {
        return Ok(Binding::Body);
    }
    if attr.path().is_ident("ambient") {
        return Ok(Binding::Ambient);
    }

    // #[query] or #[query(optional)] or #[query(default = "...")]
    let mut required = true;
    let mut default = None;
    let _ = attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("optional") {
            required = false;
        } else if meta.path.is_ident("default") {
            required = false;
            let value = meta.value()?;
            default = Some(value.parse::<syn::LitStr>()?);
        }
        Ok(())
    });
    Ok(Binding::Query { name: ident.to_string(), required, default })
}
