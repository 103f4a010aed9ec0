use darling::FromDeriveInput;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

#[derive(FromDeriveInput)]
#[darling(attributes(singleton), supports(struct_any))]
struct SingletonArgs {
    ident: syn::Ident,
    generics: syn::Generics,
    #[darling(default)]
    policy: Option<String>,
}

pub fn derive_singleton(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match SingletonArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return TokenStream::from(err.write_errors()),
    };

    match generate_singleton_impl(&args) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn generate_singleton_impl(args: &SingletonArgs) -> syn::Result<TokenStream2> {
    let struct_name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();
    let policy = policy_tokens(args)?;

    Ok(quote! {
        impl #impl_generics ::forgecore::singleton::Singleton for #struct_name #ty_generics #where_clause {
            const POLICY: ::forgecore::singleton::AccessPolicy = #policy;

            fn construct(
                _registry: &::forgecore::singleton::SingletonRegistry,
            ) -> ::forgecore::anyhow::Result<Self> {
                ::core::result::Result::Ok(<Self as ::core::default::Default>::default())
            }
        }
    })
}

/// Map the `policy = "..."` string onto an `AccessPolicy` variant path
fn policy_tokens(args: &SingletonArgs) -> syn::Result<TokenStream2> {
    let variant = match args.policy.as_deref() {
        None | Some("lazy") => quote!(Lazy),
        Some("eager") => quote!(Eager),
        Some("locked") | Some("lock") => quote!(Locked),
        Some(other) => {
            return Err(syn::Error::new(
                args.ident.span(),
                format!(
                    "unknown singleton policy `{}`, expected one of `eager`, `locked`, `lazy`",
                    other
                ),
            ))
        }
    };

    Ok(quote!(::forgecore::singleton::AccessPolicy::#variant))
}
