//! `#[derive(Record)]`: emits the compile-time field descriptor and the
//! generic accessors crudkit needs to bind, scan and validate a record
//! type without per-type boilerplate.
//!
//! Field mapping: `i64` and `String` fields become table columns,
//! `Option<T>` fields are link references to other record types, and the
//! first field must be `id: i64`. Validation rules ride along in
//! `#[crud("...")]` tags, parsed when the schema is built:
//!
//! ```rust,ignore
//! #[derive(Record, Serialize, Deserialize, Default)]
//! struct Session {
//!     id: i64,
//!     flags: i64,
//!     #[crud("req uniq lenmin:32")]
//!     key: String,
//!     expires_at: i64,
//!     #[crud("req link:user")]
//!     user_id: i64,
//!     #[serde(skip)]
//!     user: Option<User>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Type};

#[proc_macro_derive(Record, attributes(crud))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

enum Kind {
    I64,
    Text,
    Link,
}

struct RecordField {
    ident: syn::Ident,
    kind: Kind,
    tag: String,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record requires named fields",
        ));
    };

    let mut fields = Vec::new();
    for field in &named.named {
        let ident = field.ident.clone().expect("named field");
        let kind = classify(&field.ty)?;
        let tag = crud_tag(&field.attrs)?;
        fields.push(RecordField { ident, kind, tag });
    }

    match fields.first() {
        Some(f) if f.ident == "id" && matches!(f.kind, Kind::I64) => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "the first field must be `id: i64`",
            ))
        }
    }

    let name = &input.ident;
    let type_name = name.to_string();

    let defs = fields.iter().map(|f| {
        let field_name = f.ident.to_string();
        let kind = match f.kind {
            Kind::I64 => quote!(::crudkit::FieldKind::I64),
            Kind::Text => quote!(::crudkit::FieldKind::Text),
            Kind::Link => quote!(::crudkit::FieldKind::Link),
        };
        let tag = &f.tag;
        quote!(::crudkit::FieldDef {
            name: #field_name,
            kind: #kind,
            tag: #tag,
        })
    });

    let get_arms = fields.iter().enumerate().filter_map(|(j, f)| {
        let ident = &f.ident;
        match f.kind {
            Kind::I64 => Some(quote! {
                #j => ::std::option::Option::Some(::crudkit::FieldRef::I64(self.#ident)),
            }),
            Kind::Text => Some(quote! {
                #j => ::std::option::Option::Some(::crudkit::FieldRef::Text(self.#ident.as_str())),
            }),
            Kind::Link => None,
        }
    });

    let slot_exprs = fields.iter().enumerate().filter_map(|(j, f)| {
        if j == 0 {
            return None;
        }
        let ident = &f.ident;
        match f.kind {
            Kind::I64 => Some(quote!(::crudkit::FieldSlot::I64(&mut self.#ident))),
            Kind::Text => Some(quote!(::crudkit::FieldSlot::Text(&mut self.#ident))),
            Kind::Link => None,
        }
    });

    let linked_arms = fields.iter().enumerate().filter_map(|(j, f)| {
        if !matches!(f.kind, Kind::Link) {
            return None;
        }
        let ident = &f.ident;
        Some(quote! {
            #j => self.#ident.as_ref().map(::crudkit::Record::id),
        })
    });

    let clear_stmts = fields.iter().filter_map(|f| {
        if !matches!(f.kind, Kind::Link) {
            return None;
        }
        let ident = &f.ident;
        Some(quote!(self.#ident = ::std::option::Option::None;))
    });

    Ok(quote! {
        #[automatically_derived]
        impl ::crudkit::Record for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> &'static [::crudkit::FieldDef] {
                const FIELDS: &[::crudkit::FieldDef] = &[#(#defs),*];
                FIELDS
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn id_mut(&mut self) -> &mut i64 {
                &mut self.id
            }

            fn get(&self, index: usize) -> ::std::option::Option<::crudkit::FieldRef<'_>> {
                match index {
                    #(#get_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn slots(&mut self) -> ::std::vec::Vec<::crudkit::FieldSlot<'_>> {
                ::std::vec![#(#slot_exprs),*]
            }

            fn linked_id(&self, index: usize) -> ::std::option::Option<i64> {
                match index {
                    #(#linked_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn clear_links(&mut self) {
                #(#clear_stmts)*
            }
        }
    })
}

/// `i64` and `String` are scalar columns; `Option<T>` is a link to
/// another record type. Anything else has no column mapping and is
/// rejected at compile time.
fn classify(ty: &Type) -> syn::Result<Kind> {
    let Type::Path(path) = ty else {
        return Err(syn::Error::new_spanned(
            ty,
            "unsupported field type; use i64, String, or Option<T> for links",
        ));
    };
    let Some(segment) = path.path.segments.last() else {
        return Err(syn::Error::new_spanned(ty, "unsupported field type"));
    };
    match segment.ident.to_string().as_str() {
        "i64" => Ok(Kind::I64),
        "String" => Ok(Kind::Text),
        "Option" => Ok(Kind::Link),
        other => Err(syn::Error::new_spanned(
            ty,
            format!(
                "unsupported field type `{}`; use i64, String, or Option<T> for links",
                other
            ),
        )),
    }
}

fn crud_tag(attrs: &[syn::Attribute]) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("crud") {
            let lit: LitStr = attr.parse_args()?;
            return Ok(lit.value());
        }
    }
    Ok(String::new())
}
