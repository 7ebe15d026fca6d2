//! Entity derive macro implementation

use crate::attrs::{field_attr, struct_attr};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Generics, Result, parse_quote};

struct MappedField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    column: String,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = entity_generics(&input.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let attr = struct_attr(&input)?;
    let table = attr.table.unwrap_or_else(|| name.to_string());

    let mut mapped = Vec::new();
    let mut skipped = Vec::new();
    let mut explicit_id: Option<usize> = None;
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let fattr = field_attr(field)?;
        if !fattr.mapped {
            skipped.push(ident);
            continue;
        }
        if fattr.is_id {
            if explicit_id.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field can be marked #[orm(id)]",
                ));
            }
            explicit_id = Some(mapped.len());
        }
        mapped.push(MappedField {
            ident,
            ty: &field.ty,
            column: fattr.column.unwrap_or_else(|| ident.to_string()),
        });
    }

    let id_field = explicit_id
        .or_else(|| mapped.iter().position(|f| f.ident == "id"))
        .map(|idx| &mapped[idx]);
    let named = |field_name: &str| mapped.iter().find(|f| f.ident == field_name);
    let created_at = named("created_at");
    let updated_at = named("updated_at");

    let field_defs = mapped.iter().map(|f| {
        let field_name = f.ident.to_string();
        let column = &f.column;
        let ty = f.ty;
        quote! {
            sqlcraft::FieldDef {
                field: #field_name,
                column: #column,
                kind: <#ty as sqlcraft::ColumnType>::KIND,
                nullable: <#ty as sqlcraft::ColumnType>::NULLABLE,
            }
        }
    });

    let values = mapped.iter().map(|f| {
        let ident = f.ident;
        quote! { sqlcraft::ColumnType::to_sql_value(&self.#ident) }
    });

    let decode_mapped = mapped.iter().map(|f| {
        let ident = f.ident;
        let ty = f.ty;
        let column = &f.column;
        quote! { #ident: record.try_get::<#ty>(#column)? }
    });
    let decode_skipped = skipped.iter().map(|ident| {
        quote! { #ident: ::core::default::Default::default() }
    });

    let id_column = match id_field {
        Some(f) => {
            let column = &f.column;
            quote! { Some(#column) }
        }
        None => quote! { None },
    };
    let created_at_column = match created_at {
        Some(f) => {
            let column = &f.column;
            quote! { Some(#column) }
        }
        None => quote! { None },
    };
    let sql_view = match &attr.view {
        Some(view) => quote! { Some(#view) },
        None => quote! { None },
    };

    let (identity, identity_uuid, assign_id) = match id_field {
        Some(f) => {
            let ident = f.ident;
            (
                quote! { Some(sqlcraft::ColumnType::to_sql_value(&self.#ident)) },
                quote! { sqlcraft::ColumnType::as_uuid(&self.#ident) },
                quote! { sqlcraft::ColumnType::fill_uuid(&mut self.#ident, id) },
            )
        }
        None => (quote! { None }, quote! { None }, quote! { let _ = id; false }),
    };

    let touch = |field: Option<&MappedField<'_>>| match field {
        Some(f) => {
            let ident = f.ident;
            quote! { sqlcraft::ColumnType::touch(&mut self.#ident, now) }
        }
        None => quote! { let _ = now; false },
    };
    let touch_created_at = touch(created_at);
    let touch_updated_at = touch(updated_at);

    let registration = if input.generics.params.is_empty() {
        let type_name = name.to_string();
        quote! {
            sqlcraft::inventory::submit! {
                sqlcraft::EntityRegistration::of::<#name>(#type_name)
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl #impl_generics sqlcraft::Entity for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const FIELDS: &'static [sqlcraft::FieldDef] = &[#(#field_defs),*];
            const ID_COLUMN: Option<&'static str> = #id_column;
            const CREATED_AT_COLUMN: Option<&'static str> = #created_at_column;
            const SQL_VIEW: Option<&'static str> = #sql_view;

            fn values(&self) -> Vec<sqlcraft::SqlValue> {
                vec![#(#values),*]
            }

            fn identity(&self) -> Option<sqlcraft::SqlValue> {
                #identity
            }

            fn identity_uuid(&self) -> Option<sqlcraft::uuid::Uuid> {
                #identity_uuid
            }

            fn assign_id(&mut self, id: sqlcraft::uuid::Uuid) -> bool {
                #assign_id
            }

            fn touch_created_at(
                &mut self,
                now: sqlcraft::chrono::DateTime<sqlcraft::chrono::Utc>,
            ) -> bool {
                #touch_created_at
            }

            fn touch_updated_at(
                &mut self,
                now: sqlcraft::chrono::DateTime<sqlcraft::chrono::Utc>,
            ) -> bool {
                #touch_updated_at
            }

            fn from_record(record: &sqlcraft::Record) -> sqlcraft::OrmResult<Self> {
                Ok(Self {
                    #(#decode_mapped,)*
                    #(#decode_skipped,)*
                })
            }
        }

        #registration
    })
}

/// Entities are shared across tasks, so every type parameter picks up
/// `Send + Sync + 'static`.
fn entity_generics(generics: &Generics) -> Generics {
    let mut generics = generics.clone();
    let params: Vec<syn::Ident> = generics.type_params().map(|p| p.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for ident in params {
        where_clause
            .predicates
            .push(parse_quote! { #ident: ::core::marker::Send + ::core::marker::Sync + 'static });
    }
    generics
}
