//! Small attribute-parsing helpers shared by [`crate::component`] and
//! [`crate::route`].

/// If `ty` is written as `Arc<Inner>` (or `std::sync::Arc<Inner>` etc.),
/// returns `Inner`. Both `#[inject]` component fields and `#[ambient]`
/// route parameters are required to be `Arc<T>` so resolving a dependency
/// never requires `T: Clone`.
pub fn inner_of_arc(ty: &syn::Type) -> Option<syn::Type> {
    let syn::Type::Path(type_path) = ty else { return None };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else { return None };
    args.args.iter().find_map(|arg| match arg {
        syn::GenericArgument::Type(t) => Some(t.clone()),
        _ => None,
    })
}
