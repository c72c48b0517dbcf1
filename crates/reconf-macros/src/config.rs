//! `#[derive(Config)]` implementation.
//!
//! # Overview
//!
//! For a struct with named fields the derive generates:
//!
//! 1. `impl Inspect`: declared type, equality, JSON read/write, detaching of
//!    shared nodes
//! 2. `impl Aggregate`: member access by catalog index
//! 3. `impl Configurable`: name, scope, label and the static member catalog
//!
//! # Struct-level attributes `#[config(...)]`
//!
//! | Key | Example | Description |
//! |-----|---------|-------------|
//! | `name` | `"ServerSettings"` | Local name (default: the struct name) |
//! | `scope` | `"server_shared"` | `client_only` (default), `server_only`, `server_shared` |
//! | `label` | `"Server"` | Display label, also inherited by members of this type |
//! | `reload_required` | | Members of this type require a reload when they differ |
//! | `ignore` | | Members of this type are ignored |
//! | `native_eq` | | Compare with `PartialEq` instead of member-wise |
//!
//! # Field-level attributes `#[config(...)]`
//!
//! | Key | Description |
//! |-----|-------------|
//! | `reload_required` | A difference in this member requires a full reload |
//! | `ignore` | Excluded from diffing, equality and persistence |
//! | `label = "…"` | Display label |
//! | `skip` | Not part of the catalog at all |

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Type, ext::IdentExt, spanned::Spanned};

// ============================================================================
// Attribute structures
// ============================================================================

/// Annotations shared by struct- and field-level attributes.
#[derive(Default)]
struct Annotations {
    ignore: bool,
    reload_required: bool,
    label: Option<LitStr>,
}

impl Annotations {
    fn to_tokens(&self) -> TokenStream {
        let mut items = Vec::new();
        if self.ignore {
            items.push(quote! { ::reconf_core::Annotation::Ignore });
        }
        if self.reload_required {
            items.push(quote! { ::reconf_core::Annotation::ReloadRequired });
        }
        if let Some(label) = &self.label {
            items.push(quote! { ::reconf_core::Annotation::Label(#label) });
        }
        quote! { &[#(#items),*] }
    }
}

/// Struct-level `#[config(…)]` options.
#[derive(Default)]
struct TypeAttrs {
    name: Option<LitStr>,
    scope: Option<LitStr>,
    native_eq: bool,
    annotations: Annotations,
}

/// Per-field `#[config(…)]` options.
#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    annotations: Annotations,
}

/// A field that takes part in the catalog.
struct CatalogField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    annotations: Annotations,
}

// ============================================================================
// Entry point
// ============================================================================

pub fn derive_config(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Config cannot be derived for generic types",
        ));
    }

    let attrs = parse_type_attrs(&input.attrs)?;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Config requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Config cannot be derived for enums",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Config cannot be derived for unions",
            ));
        }
    };

    let mut catalog = Vec::new();
    for field in fields {
        let field_attrs = parse_field_attrs(&field.attrs)?;
        if field_attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        catalog.push(CatalogField {
            ident,
            ty: &field.ty,
            annotations: field_attrs.annotations,
        });
    }

    generate(&input.ident, &attrs, &catalog)
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_type_attrs(attrs: &[Attribute]) -> syn::Result<TypeAttrs> {
    let mut result = TypeAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("scope") {
                result.scope = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("label") {
                result.annotations.label = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("reload_required") {
                result.annotations.reload_required = true;
            } else if meta.path.is_ident("ignore") {
                result.annotations.ignore = true;
            } else if meta.path.is_ident("native_eq") {
                result.native_eq = true;
            } else {
                return Err(meta.error("unknown #[config] option"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("ignore") {
                result.annotations.ignore = true;
            } else if meta.path.is_ident("reload_required") {
                result.annotations.reload_required = true;
            } else if meta.path.is_ident("label") {
                result.annotations.label = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("unknown #[config] field option"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn scope_tokens(scope: Option<&LitStr>) -> syn::Result<TokenStream> {
    let Some(scope) = scope else {
        return Ok(quote! { ::reconf_core::Scope::ClientOnly });
    };
    match scope.value().as_str() {
        "client_only" => Ok(quote! { ::reconf_core::Scope::ClientOnly }),
        "server_only" => Ok(quote! { ::reconf_core::Scope::ServerOnly }),
        "server_shared" => Ok(quote! { ::reconf_core::Scope::ServerShared }),
        _ => Err(syn::Error::new(
            scope.span(),
            "scope must be one of `client_only`, `server_only`, `server_shared`",
        )),
    }
}

// ============================================================================
// Code generation
// ============================================================================

fn generate(name: &Ident, attrs: &TypeAttrs, fields: &[CatalogField<'_>]) -> syn::Result<TokenStream> {
    let config_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| LitStr::new(&name.to_string(), name.span()));
    let scope = scope_tokens(attrs.scope.as_ref())?;
    let label = match &attrs.annotations.label {
        Some(label) => quote! { ::core::option::Option::Some(#label) },
        None => quote! { ::core::option::Option::None },
    };
    let type_annotations = attrs.annotations.to_tokens();

    // ── catalog entries ──
    let members = fields.iter().enumerate().map(|(index, field)| {
        let member_name = LitStr::new(&field.ident.unraw().to_string(), field.ident.span());
        let annotations = field.annotations.to_tokens();
        let ty = field.ty;
        quote! {
            ::reconf_core::Member::new(
                #member_name,
                #index,
                #annotations,
                <#ty as ::reconf_core::Inspect>::declared,
            )
        }
    });

    let member_count = fields.len();

    // ── field access by index ──
    let field_arms = fields.iter().enumerate().map(|(index, field)| {
        let ident = field.ident;
        quote! { #index => ::core::option::Option::Some(&self.#ident as &dyn ::reconf_core::Inspect), }
    });
    let field_mut_arms = fields.iter().enumerate().map(|(index, field)| {
        let ident = field.ident;
        quote! { #index => ::core::option::Option::Some(&mut self.#ident as &mut dyn ::reconf_core::Inspect), }
    });

    let detach_fields = fields.iter().map(|field| {
        let ident = field.ident;
        quote! { ::reconf_core::Inspect::detach(&mut self.#ident, copies); }
    });

    let eq_body = if attrs.native_eq {
        quote! { self == other }
    } else {
        quote! { ::reconf_core::members_equal(self, other, guard) }
    };

    Ok(quote! {
        impl ::reconf_core::Inspect for #name {
            fn declared() -> ::reconf_core::TypeInfo {
                ::reconf_core::TypeInfo::of::<Self>(::reconf_core::TypeKind::Aggregate)
                    .with_annotations(#type_annotations)
                    .with_catalog(<Self as ::reconf_core::Configurable>::members)
            }

            fn type_info(&self) -> ::reconf_core::TypeInfo {
                <Self as ::reconf_core::Inspect>::declared()
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            #[allow(unused_variables)]
            fn eq_inspect(
                &self,
                other: &dyn ::reconf_core::Inspect,
                guard: &mut ::reconf_core::VisitGuard,
            ) -> bool {
                match other.as_any().downcast_ref::<Self>() {
                    ::core::option::Option::Some(other) => #eq_body,
                    ::core::option::Option::None => false,
                }
            }

            fn as_aggregate(&self) -> ::core::option::Option<&dyn ::reconf_core::Aggregate> {
                ::core::option::Option::Some(self)
            }

            #[allow(unused_variables)]
            fn detach(&mut self, copies: &mut ::reconf_core::SharedCopies) {
                #(#detach_fields)*
            }

            fn to_json(&self) -> ::reconf_core::__private::Value {
                ::reconf_core::aggregate_to_json(self)
            }

            fn assign_json(
                &mut self,
                value: &::reconf_core::__private::Value,
            ) -> ::reconf_core::ValueResult<()> {
                ::reconf_core::aggregate_assign_json(self, value)
            }
        }

        impl ::reconf_core::Aggregate for #name {
            fn catalog(&self) -> &'static ::reconf_core::Catalog {
                <Self as ::reconf_core::Configurable>::members()
            }

            fn field(&self, index: usize) -> ::core::option::Option<&dyn ::reconf_core::Inspect> {
                match index {
                    #(#field_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_mut(
                &mut self,
                index: usize,
            ) -> ::core::option::Option<&mut dyn ::reconf_core::Inspect> {
                match index {
                    #(#field_mut_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::reconf_core::Configurable for #name {
            const NAME: &'static str = #config_name;
            const SCOPE: ::reconf_core::Scope = #scope;
            const LABEL: ::core::option::Option<&'static str> = #label;

            fn members() -> &'static ::reconf_core::Catalog {
                static MEMBERS: [::reconf_core::Member; #member_count] = [#(#members),*];
                static CATALOG: ::reconf_core::Catalog =
                    ::reconf_core::Catalog::new(#config_name, &MEMBERS);
                &CATALOG
            }
        }
    })
}
