use proc_macro::TokenStream;

mod singleton;

/// Derive macro implementing `forgecore::singleton::Singleton` for a `Default` type
///
/// The instance is built with `Default::default()` the first time it is
/// requested from a registry. The access policy defaults to `lazy` and can be
/// chosen with the `singleton` attribute.
///
/// # Example
/// ```ignore
/// use forgecore::Singleton;
///
/// #[derive(Default, Singleton)]
/// #[singleton(policy = "locked")]
/// pub struct AudioService {
///     volume: f32,
/// }
/// ```
#[proc_macro_derive(Singleton, attributes(singleton))]
pub fn derive_singleton(input: TokenStream) -> TokenStream {
    singleton::derive_singleton(input)
}
