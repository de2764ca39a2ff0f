//! Stable digests of values and function code.

use std::collections::BTreeMap;

use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::visit_mut::{self, VisitMut};
use tarry_common::{codec, ContentHash, Value};

use crate::error::{TarryError, TarryResult};
use crate::function::Function;

/// Name every function is given before its code is hashed.
const PLACEHOLDER_NAME: &str = "_fn_";

/// Hashes a value through its codec serialization.
pub fn hash_value(value: &Value) -> TarryResult<ContentHash> {
    Ok(ContentHash::from_bytes(&codec::encode(value)?))
}

/// Hashes a function's normalized source.
///
/// See [`normalize_source`] for what the hash is insensitive to.
pub fn hash_code(function: &Function) -> TarryResult<ContentHash> {
    let normalized = match normalize_source(function.source()) {
        Ok(normalized) => normalized,
        Err(reason) => {
            return Err(TarryError::CodeHash {
                function: function.name().to_string(),
                reason,
            });
        }
    };
    Ok(ContentHash::from_bytes(normalized.as_bytes()))
}

/// Renders function source in canonical form.
///
/// The source must contain exactly one function definition. Its name is
/// replaced by a placeholder, doc comments are dropped and optional commas
/// are put in one fixed form; comments, whitespace and layout never survive
/// tokenization.
pub fn normalize_source(source: &str) -> Result<String, String> {
    let file = syn::parse_file(source).map_err(|e| e.to_string())?;
    let mut item = match file.items.as_slice() {
        [syn::Item::Fn(item)] => item.clone(),
        [_] => return Err("source is not a function definition".to_string()),
        items => {
            return Err(format!(
                "expected exactly one function definition, found {} items",
                items.len()
            ));
        }
    };
    item.sig.ident = syn::Ident::new(PLACEHOLDER_NAME, item.sig.ident.span());
    item.attrs.retain(|attr| !attr.path().is_ident("doc"));
    CanonicalCommas.visit_item_fn_mut(&mut item);
    Ok(item.to_token_stream().to_string())
}

/// Drops optional trailing commas and gives every match arm a comma.
struct CanonicalCommas;

fn strip_trailing<T, P>(list: &mut Punctuated<T, P>) {
    if list.trailing_punct() {
        if let Some(last) = list.pop() {
            list.push_value(last.into_value());
        }
    }
}

/// Tuples of one element need their comma.
fn strip_trailing_tuple<T, P>(list: &mut Punctuated<T, P>) {
    if list.len() > 1 {
        strip_trailing(list);
    }
}

impl VisitMut for CanonicalCommas {
    fn visit_signature_mut(&mut self, node: &mut syn::Signature) {
        strip_trailing(&mut node.inputs);
        visit_mut::visit_signature_mut(self, node);
    }

    fn visit_generics_mut(&mut self, node: &mut syn::Generics) {
        strip_trailing(&mut node.params);
        visit_mut::visit_generics_mut(self, node);
    }

    fn visit_expr_call_mut(&mut self, node: &mut syn::ExprCall) {
        strip_trailing(&mut node.args);
        visit_mut::visit_expr_call_mut(self, node);
    }

    fn visit_expr_method_call_mut(&mut self, node: &mut syn::ExprMethodCall) {
        strip_trailing(&mut node.args);
        visit_mut::visit_expr_method_call_mut(self, node);
    }

    fn visit_expr_closure_mut(&mut self, node: &mut syn::ExprClosure) {
        strip_trailing(&mut node.inputs);
        visit_mut::visit_expr_closure_mut(self, node);
    }

    fn visit_expr_array_mut(&mut self, node: &mut syn::ExprArray) {
        strip_trailing(&mut node.elems);
        visit_mut::visit_expr_array_mut(self, node);
    }

    fn visit_expr_tuple_mut(&mut self, node: &mut syn::ExprTuple) {
        strip_trailing_tuple(&mut node.elems);
        visit_mut::visit_expr_tuple_mut(self, node);
    }

    fn visit_expr_struct_mut(&mut self, node: &mut syn::ExprStruct) {
        if node.rest.is_none() {
            strip_trailing(&mut node.fields);
        }
        visit_mut::visit_expr_struct_mut(self, node);
    }

    fn visit_pat_tuple_mut(&mut self, node: &mut syn::PatTuple) {
        strip_trailing_tuple(&mut node.elems);
        visit_mut::visit_pat_tuple_mut(self, node);
    }

    fn visit_pat_tuple_struct_mut(&mut self, node: &mut syn::PatTupleStruct) {
        strip_trailing(&mut node.elems);
        visit_mut::visit_pat_tuple_struct_mut(self, node);
    }

    fn visit_pat_struct_mut(&mut self, node: &mut syn::PatStruct) {
        if node.rest.is_none() {
            strip_trailing(&mut node.fields);
        }
        visit_mut::visit_pat_struct_mut(self, node);
    }

    fn visit_pat_slice_mut(&mut self, node: &mut syn::PatSlice) {
        strip_trailing(&mut node.elems);
        visit_mut::visit_pat_slice_mut(self, node);
    }

    fn visit_type_tuple_mut(&mut self, node: &mut syn::TypeTuple) {
        strip_trailing_tuple(&mut node.elems);
        visit_mut::visit_type_tuple_mut(self, node);
    }

    fn visit_fields_named_mut(&mut self, node: &mut syn::FieldsNamed) {
        strip_trailing(&mut node.named);
        visit_mut::visit_fields_named_mut(self, node);
    }

    fn visit_arm_mut(&mut self, node: &mut syn::Arm) {
        if node.comma.is_none() {
            node.comma = Some(Default::default());
        }
        visit_mut::visit_arm_mut(self, node);
    }
}

/// Combines a code hash with named argument hashes.
///
/// Arguments are combined in name order, so the result does not depend on
/// the order they were collected in.
pub fn hash_combined(
    code_hash: &ContentHash,
    arg_hashes: &BTreeMap<String, ContentHash>,
) -> TarryResult<ContentHash> {
    let encoded = codec::encode(&(code_hash, arg_hashes))?;
    Ok(ContentHash::from_bytes(&encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_hash(source: &str) -> ContentHash {
        ContentHash::from_bytes(normalize_source(source).unwrap().as_bytes())
    }

    #[test]
    fn rename_does_not_change_hash() {
        assert_eq!(
            code_hash("fn make_supply_list(n: i64) -> i64 { n * 4 }"),
            code_hash("fn plan_supplies(n: i64) -> i64 { n * 4 }"),
        );
    }

    #[test]
    fn comments_and_layout_do_not_change_hash() {
        let compact = "fn f(n: i64) -> i64 { n * 4 }";
        let spread = "
            /// Multiplies.
            fn f(
                n: i64, // people
            ) -> i64 {
                /* four each */
                n * 4
            }
        ";
        assert_eq!(code_hash(compact), code_hash(spread));
    }

    #[test]
    fn trailing_parameter_comma_does_not_change_hash() {
        assert_eq!(
            code_hash("fn f(n: i64) -> i64 { n * 4 }"),
            code_hash("fn f(n: i64,) -> i64 { n * 4 }"),
        );
    }

    #[test]
    fn trailing_argument_comma_does_not_change_hash() {
        assert_eq!(
            code_hash("fn f() -> i64 { g(1, 2) + s.h(3) }"),
            code_hash("fn f() -> i64 { g(1, 2,) + s.h(3,) }"),
        );
        assert_eq!(
            code_hash("fn f() -> P { let v = [1, 2]; P { x: 1, y: 2 } }"),
            code_hash("fn f() -> P { let v = [1, 2,]; P { x: 1, y: 2, } }"),
        );
    }

    #[test]
    fn match_arm_commas_do_not_change_hash() {
        assert_eq!(
            code_hash("fn f(x: i64) -> i64 { match x { 0 => { 1 } _ => 2 } }"),
            code_hash("fn f(x: i64) -> i64 { match x { 0 => { 1 }, _ => 2, } }"),
        );
    }

    #[test]
    fn one_element_tuple_keeps_its_comma() {
        assert_ne!(
            code_hash("fn f() -> i64 { let t = (1,); t.0 }"),
            code_hash("fn f() -> i64 { let t = (1); t.0 }"),
        );
    }

    #[test]
    fn structural_change_changes_hash() {
        assert_ne!(
            code_hash("fn f(n: i64) -> i64 { n * 4 }"),
            code_hash("fn f(n: i64) -> i64 { n * 5 }"),
        );
        assert_ne!(
            code_hash("fn f(n: i64) -> i64 { n }"),
            code_hash("fn f(m: i64) -> i64 { m }"),
        );
    }

    #[test]
    fn non_doc_attributes_are_kept() {
        assert_ne!(code_hash("fn f() {}"), code_hash("#[inline] fn f() {}"));
    }

    #[test]
    fn rejects_anything_but_one_function() {
        assert!(normalize_source("fn a() {} fn b() {}").is_err());
        assert!(normalize_source("struct S;").is_err());
        assert!(normalize_source("").is_err());
        assert!(normalize_source("fn broken( {").is_err());
    }

    #[test]
    fn hash_code_reports_function_name() {
        let f = Function::new("demo::bad", "not rust at all (", |_| Ok(Value::Unit));
        match hash_code(&f).unwrap_err() {
            TarryError::CodeHash { function, .. } => assert_eq!(function, "demo::bad"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn value_hash_is_deterministic() {
        let v = Value::List(vec![Value::Int(1), Value::from("flap")]);
        assert_eq!(hash_value(&v).unwrap(), hash_value(&v.clone()).unwrap());
        let one = hash_value(&Value::Int(1)).unwrap();
        assert_ne!(one, hash_value(&Value::Int(2)).unwrap());
    }

    #[test]
    fn combined_hash_is_insertion_order_independent() {
        let code = ContentHash::from_bytes(b"code");
        let a = ContentHash::from_bytes(b"a");
        let b = ContentHash::from_bytes(b"b");

        let mut first = BTreeMap::new();
        first.insert("x".to_string(), a);
        first.insert("y".to_string(), b);
        let mut second = BTreeMap::new();
        second.insert("y".to_string(), b);
        second.insert("x".to_string(), a);

        assert_eq!(
            hash_combined(&code, &first).unwrap(),
            hash_combined(&code, &second).unwrap()
        );
    }

    #[test]
    fn combined_hash_is_sensitive_to_every_input() {
        let code = ContentHash::from_bytes(b"code");
        let mut args = BTreeMap::new();
        args.insert("x".to_string(), ContentHash::from_bytes(b"1"));
        let base = hash_combined(&code, &args).unwrap();

        let other_code = ContentHash::from_bytes(b"other");
        assert_ne!(base, hash_combined(&other_code, &args).unwrap());

        let mut changed = args.clone();
        changed.insert("x".to_string(), ContentHash::from_bytes(b"2"));
        assert_ne!(base, hash_combined(&code, &changed).unwrap());

        let mut renamed = BTreeMap::new();
        renamed.insert("z".to_string(), ContentHash::from_bytes(b"1"));
        assert_ne!(base, hash_combined(&code, &renamed).unwrap());
    }
}
