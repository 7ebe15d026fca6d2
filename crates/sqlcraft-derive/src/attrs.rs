//! Parsing of struct-level and field-level `#[orm(...)]` attributes.

use syn::parse::{Parse, ParseStream};
use syn::{DeriveInput, Result};

/// `#[orm(table = "...", view = "...")]` on the struct.
#[derive(Default)]
pub(crate) struct StructAttr {
    pub table: Option<String>,
    pub view: Option<String>,
}

impl Parse for StructAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = StructAttr::default();
        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            let _: syn::Token![=] = input.parse()?;
            let value: syn::LitStr = input.parse()?;
            if key == "table" {
                attr.table = Some(value.value());
            } else if key == "view" {
                attr.view = Some(value.value());
            } else {
                return Err(syn::Error::new_spanned(
                    key,
                    "unknown struct attribute, expected `table` or `view`",
                ));
            }
            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }
        Ok(attr)
    }
}

/// `#[orm(column)]`, `#[orm(column = "...")]` and `#[orm(id)]` on a field.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub mapped: bool,
    pub is_id: bool,
    pub column: Option<String>,
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();
        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            if key == "id" {
                attr.is_id = true;
                attr.mapped = true;
            } else if key == "column" {
                attr.mapped = true;
                if input.peek(syn::Token![=]) {
                    let _: syn::Token![=] = input.parse()?;
                    let value: syn::LitStr = input.parse()?;
                    attr.column = Some(value.value());
                }
            } else {
                return Err(syn::Error::new_spanned(
                    key,
                    "unknown field attribute, expected `column` or `id`",
                ));
            }
            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }
        Ok(attr)
    }
}

fn orm_attrs(attrs: &[syn::Attribute]) -> impl Iterator<Item = &syn::Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("orm"))
}

pub(crate) fn struct_attr(input: &DeriveInput) -> Result<StructAttr> {
    let mut merged = StructAttr::default();
    for attr in orm_attrs(&input.attrs) {
        let parsed: StructAttr = attr.parse_args()?;
        merged.table = parsed.table.or(merged.table);
        merged.view = parsed.view.or(merged.view);
    }
    Ok(merged)
}

pub(crate) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in orm_attrs(&field.attrs) {
        let parsed: FieldAttr = attr.parse_args()?;
        merged.mapped |= parsed.mapped;
        merged.is_id |= parsed.is_id;
        merged.column = parsed.column.or(merged.column);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn parses_field_attributes() {
        let field: syn::Field = parse_quote!(#[orm(column = "user_name")] name: String);
        let attr = field_attr(&field).unwrap();
        assert!(attr.mapped);
        assert!(!attr.is_id);
        assert_eq!(attr.column.as_deref(), Some("user_name"));

        let field: syn::Field = parse_quote!(#[orm(id, column)] key: Uuid);
        let attr = field_attr(&field).unwrap();
        assert!(attr.mapped && attr.is_id);
        assert_eq!(attr.column, None);

        let field: syn::Field = parse_quote!(scratch: Vec<u8>);
        assert!(!field_attr(&field).unwrap().mapped);
    }

    #[test]
    fn rejects_unknown_keys() {
        let field: syn::Field = parse_quote!(#[orm(colum)] name: String);
        assert!(field_attr(&field).is_err());

        let input: DeriveInput = parse_quote! {
            #[orm(tabel = "x")]
            struct T;
        };
        assert!(struct_attr(&input).is_err());
    }

    #[test]
    fn parses_struct_attributes() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "users", view = "SELECT * FROM users")]
            struct User;
        };
        let attr = struct_attr(&input).unwrap();
        assert_eq!(attr.table.as_deref(), Some("users"));
        assert_eq!(attr.view.as_deref(), Some("SELECT * FROM users"));
    }
}
