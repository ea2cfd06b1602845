//! Derive macro for `peek::Inspectable`.
//!
//! # Usage
//!
//! ```ignore
//! use peek::Inspectable;
//!
//! #[derive(Inspectable)]
//! #[inspect(parent = "app::Model", implements = "serde::Serialize")]
//! pub struct User {
//!     pub name: String,
//!     pub(crate) email: String,
//!     #[inspect(skip)]
//!     password: String,
//! }
//!
//! // Shown by name only, without its fields
//! #[derive(Inspectable)]
//! #[inspect(opaque)]
//! pub struct Connection {
//!     socket: std::net::TcpStream,
//! }
//! ```
//!
//! Field visibility follows the Rust visibility: `pub` is public,
//! restricted `pub(...)` is protected and private stays private.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Visibility, parse_macro_input, parse_quote};

/// Derive `peek::Inspectable` and `peek::Describe`.
///
/// # Attributes
///
/// On the type:
/// - `#[inspect(name = "...")]` - class name shown in headers (default:
///   `module_path!()::Type`)
/// - `#[inspect(parent = "...")]`, `#[inspect(implements = "...")]` -
///   hierarchy shown in the info section; repeatable
/// - `#[inspect(opaque)]` - report no fields
///
/// On fields:
/// - `#[inspect(skip)]` - leave the field out
/// - `#[inspect(rename = "...")]` - display name
/// - `#[inspect(visibility = "public" | "protected" | "private")]` -
///   override the visibility taken from the Rust declaration
#[proc_macro_derive(Inspectable, attributes(inspect))]
pub fn derive_inspectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct TypeAttrs {
    name: Option<LitStr>,
    parents: Vec<LitStr>,
    interfaces: Vec<LitStr>,
    opaque: bool,
}

impl TypeAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("inspect")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    out.name = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("parent") {
                    out.parents.push(meta.value()?.parse()?);
                } else if meta.path.is_ident("implements") {
                    out.interfaces.push(meta.value()?.parse()?);
                } else if meta.path.is_ident("opaque") {
                    out.opaque = true;
                } else {
                    return Err(meta.error("expected `name`, `parent`, `implements` or `opaque`"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    rename: Option<LitStr>,
    visibility: Option<LitStr>,
}

impl FieldAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("inspect")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    out.skip = true;
                } else if meta.path.is_ident("rename") {
                    out.rename = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("visibility") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if !matches!(lit.value().as_str(), "public" | "protected" | "private") {
                        return Err(syn::Error::new(
                            lit.span(),
                            "expected \"public\", \"protected\" or \"private\"",
                        ));
                    }
                    out.visibility = Some(lit);
                } else {
                    return Err(meta.error("expected `skip`, `rename` or `visibility`"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

/// One reported field: display name, visibility tokens and how to reach it.
struct Reported {
    name: String,
    visibility: TokenStream2,
    access: TokenStream2,
}

/// `declared` is `None` for enum variant fields, which are always public.
fn visibility_tokens(declared: Option<&Visibility>, attrs: &FieldAttrs) -> TokenStream2 {
    let word = match (&attrs.visibility, declared) {
        (Some(lit), _) => lit.value(),
        (None, None | Some(Visibility::Public(_))) => "public".to_owned(),
        (None, Some(Visibility::Restricted(_))) => "protected".to_owned(),
        (None, Some(Visibility::Inherited)) => "private".to_owned(),
    };
    match word.as_str() {
        "public" => quote!(::peek::Visibility::Public),
        "protected" => quote!(::peek::Visibility::Protected),
        _ => quote!(::peek::Visibility::Private),
    }
}

/// Fields of a struct or variant. `access` builds the expression reaching
/// each field from its member (`self.name`, or a binding in a match arm).
fn reported_fields(
    fields: &Fields,
    access: impl Fn(usize, Option<&Ident>) -> TokenStream2,
    enum_variant: bool,
) -> syn::Result<Vec<Reported>> {
    let mut out = Vec::new();
    for (idx, field) in fields.iter().enumerate() {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let name = attrs.rename.as_ref().map_or_else(
            || {
                field
                    .ident
                    .as_ref()
                    .map_or_else(|| idx.to_string(), |ident| ident.unraw().to_string())
            },
            LitStr::value,
        );
        let declared = (!enum_variant).then_some(&field.vis);
        out.push(Reported {
            name,
            visibility: visibility_tokens(declared, &attrs),
            access: access(idx, field.ident.as_ref()),
        });
    }
    Ok(out)
}

fn field_list(fields: &[Reported]) -> TokenStream2 {
    let entries = fields.iter().map(|f| {
        let Reported {
            name,
            visibility,
            access,
        } = f;
        quote! {
            ::peek::Field::new(#name, #visibility, ::peek::ToValue::to_value(#access))
        }
    });
    quote!(::std::vec![#(#entries),*])
}

fn binding(idx: usize, ident: Option<&Ident>) -> Ident {
    ident.map_or_else(
        || format_ident!("__field{}", idx),
        |ident| format_ident!("__{}", ident.unraw()),
    )
}

fn expand(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    let attrs = TypeAttrs::parse(&input.attrs)?;
    let ident = input.ident.clone();

    // Inspectable: Any, so every type parameter must be 'static and
    // convertible for its fields to be reported.
    let type_params: Vec<Ident> = input.generics.type_params().map(|p| p.ident.clone()).collect();
    let where_clause = input.generics.make_where_clause();
    for param in &type_params {
        where_clause
            .predicates
            .push(parse_quote!(#param: ::peek::ToValue + 'static));
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let class_name = attrs.name.as_ref().map_or_else(
        || {
            let ident = ident.to_string();
            quote!(::core::concat!(::core::module_path!(), "::", #ident))
        },
        |name| quote!(#name),
    );
    let parents = &attrs.parents;
    let interfaces = &attrs.interfaces;

    let (fields_fn, inspect_fn, described_fields) = match &input.data {
        Data::Struct(data) => {
            let fields = reported_fields(
                &data.fields,
                |idx, ident| match ident {
                    Some(ident) => quote!(&self.#ident),
                    None => {
                        let idx = syn::Index::from(idx);
                        quote!(&self.#idx)
                    }
                },
                false,
            )?;
            let list = field_list(&fields);
            let fields_fn = (!attrs.opaque).then(|| {
                quote! {
                    fn fields(&self) -> ::std::vec::Vec<::peek::Field> {
                        #list
                    }
                }
            });
            let described = if attrs.opaque { Vec::new() } else { fields };
            (fields_fn, None, described)
        }
        Data::Enum(data) => {
            if data.variants.is_empty() {
                return Err(syn::Error::new(
                    ident.span(),
                    "Inspectable cannot be derived for an enum without variants",
                ));
            }
            let mut field_arms = Vec::new();
            let mut name_arms = Vec::new();
            for variant in &data.variants {
                let variant_ident = &variant.ident;
                let variant_name = variant_ident.to_string();
                let fields = reported_fields(
                    &variant.fields,
                    |idx, ident| {
                        let binding = binding(idx, ident);
                        quote!(#binding)
                    },
                    true,
                )?;
                let list = field_list(&fields);
                let bindings: Vec<Ident> = variant
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(idx, field)| binding(idx, field.ident.as_ref()))
                    .collect();
                let pattern = match &variant.fields {
                    Fields::Named(named) => {
                        let members = named.named.iter().filter_map(|f| f.ident.as_ref());
                        quote!(Self::#variant_ident { #(#members: #bindings),* })
                    }
                    Fields::Unnamed(_) => quote!(Self::#variant_ident(#(#bindings),*)),
                    Fields::Unit => quote!(Self::#variant_ident),
                };
                field_arms.push(quote! {
                    #[allow(unused_variables)]
                    #pattern => #list,
                });
                name_arms.push(quote!(Self::#variant_ident { .. } => #variant_name,));
            }

            let fields_fn = (!attrs.opaque).then(|| {
                quote! {
                    fn fields(&self) -> ::std::vec::Vec<::peek::Field> {
                        match self {
                            #(#field_arms)*
                        }
                    }
                }
            });
            let inspect_fn = quote! {
                fn inspect(
                    &self,
                    entity: &mut ::peek::Entity,
                    _inspector: &mut ::peek::Inspector<'_>,
                ) -> ::core::ops::ControlFlow<()> {
                    let variant: &'static str = match self {
                        #(#name_arms)*
                    };
                    entity.set_meta("variant", variant);
                    ::core::ops::ControlFlow::Continue(())
                }
            };
            (fields_fn, Some(inspect_fn), Vec::new())
        }
        Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span,
                "Inspectable cannot be derived for unions",
            ));
        }
    };

    let described = described_fields.iter().map(|f| {
        let Reported {
            name, visibility, ..
        } = f;
        quote!(.with_field(#name, #visibility))
    });

    Ok(quote! {
        impl #impl_generics ::peek::Inspectable for #ident #ty_generics #where_clause {
            fn class_name(&self) -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed(#class_name)
            }

            fn parent_classes(&self) -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![#(::std::string::String::from(#parents)),*]
            }

            fn interfaces(&self) -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![#(::std::string::String::from(#interfaces)),*]
            }

            #fields_fn

            #inspect_fn

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl #impl_generics ::peek::Describe for #ident #ty_generics #where_clause {
            fn class_info() -> ::peek::ClassInfo {
                ::peek::ClassInfo::class(#class_name)
                    #(.with_parent(#parents))*
                    #(.with_interface(#interfaces))*
                    #(#described)*
                    .defined_at(::core::file!(), ::core::line!())
            }
        }
    })
}
