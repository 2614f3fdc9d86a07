//! Resolves whether the user depends on `kernel` (facade) or `kernel-core`
//! directly, so generated code references the right path.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

/// Token stream for reaching `kernel_core` types from generated code.
pub fn kernel_core_path() -> TokenStream {
    if let Ok(found) = crate_name("kernel") {
        return match found {
            FoundCrate::Itself => quote!(crate::kernel_core),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::kernel_core)
            }
        };
    }
    if let Ok(found) = crate_name("kernel-core") {
        return match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        };
    }
    quote!(::kernel_core)
}
