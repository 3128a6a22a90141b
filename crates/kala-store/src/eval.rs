use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::expression::Expression;
use crate::field::get_path;
use crate::order::{compare_within_type, value_eq};

/// Evaluate whether a document matches the given expression.
pub(crate) fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|child| matches(doc, child)),
        Expression::Or(children) => children.iter().any(|child| matches(doc, child)),
        Expression::Nor(children) => !children.iter().any(|child| matches(doc, child)),
        Expression::Not(inner) => !matches(doc, inner),
        Expression::Eq(field, val) => eq_matches(get_path(doc, field), val),
        Expression::Ne(field, val) => !eq_matches(get_path(doc, field), val),
        Expression::Gt(field, val)
        | Expression::Gte(field, val)
        | Expression::Lt(field, val)
        | Expression::Lte(field, val) => {
            let predicate: fn(Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o == Ordering::Greater,
                Expression::Gte(..) => |o| o != Ordering::Less,
                Expression::Lt(..) => |o| o == Ordering::Less,
                _ => |o| o != Ordering::Greater,
            };
            any_value(get_path(doc, field), |v| {
                compare_within_type(v, val).is_some_and(predicate)
            })
        }
        Expression::In(field, values) => {
            let stored = get_path(doc, field);
            values.iter().any(|val| eq_matches(stored, val))
        }
        Expression::Nin(field, values) => {
            let stored = get_path(doc, field);
            !values.iter().any(|val| eq_matches(stored, val))
        }
        Expression::Regex(field, re) => any_value(get_path(doc, field), |v| match v {
            Bson::String(s) => re.is_match(s),
            _ => false,
        }),
        // $exists checks physical presence, even a null value counts as "exists"
        Expression::Exists(field, expected) => get_path(doc, field).is_some() == *expected,
    }
}

/// `$eq` semantics: null matches missing fields and explicit nulls, and an
/// array field matches when the whole array or any element equals the value.
fn eq_matches(stored: Option<&Bson>, val: &Bson) -> bool {
    match stored {
        None => matches!(val, Bson::Null),
        Some(whole @ Bson::Array(items)) => {
            value_eq(whole, val) || items.iter().any(|item| value_eq(item, val))
        }
        Some(v) => value_eq(v, val),
    }
}

/// Apply `predicate` to a scalar field, or to each element of an array field.
fn any_value(stored: Option<&Bson>, predicate: impl Fn(&Bson) -> bool) -> bool {
    match stored {
        Some(Bson::Array(items)) => items.iter().any(&predicate),
        Some(v) => predicate(v),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_filter::parse_filter;
    use bson::doc;

    fn check(filter: Document, doc: &Document) -> bool {
        let expr = parse_filter(&filter).unwrap();
        matches(doc, &expr)
    }

    #[test]
    fn comparison_operators() {
        let d = doc! { "age": 21, "name": "Ann" };
        assert!(check(doc! { "age": { "$gt": 18 } }, &d));
        assert!(!check(doc! { "age": { "$gt": 21 } }, &d));
        assert!(check(doc! { "age": { "$gte": 21.0 } }, &d));
        assert!(check(doc! { "age": { "$lt": 30, "$gt": 20 } }, &d));
        assert!(!check(doc! { "age": { "$lte": 20 } }, &d));
        // Mismatched types never match a range
        assert!(!check(doc! { "age": { "$gt": "1" } }, &d));
    }

    #[test]
    fn null_matches_missing() {
        let d = doc! { "name": "Ann" };
        assert!(check(doc! { "status": null }, &d));
        assert!(!check(doc! { "name": null }, &d));
        assert!(check(doc! { "status": { "$exists": false } }, &d));
    }

    #[test]
    fn array_fields_match_any_element() {
        let d = doc! { "tags": ["red", "blue"], "scores": [3, 9] };
        assert!(check(doc! { "tags": "blue" }, &d));
        assert!(check(doc! { "tags": ["red", "blue"] }, &d));
        assert!(check(doc! { "scores": { "$gt": 5 } }, &d));
        assert!(check(doc! { "tags": { "$in": ["green", "red"] } }, &d));
        assert!(!check(doc! { "tags": { "$nin": ["red"] } }, &d));
    }

    #[test]
    fn logical_operators() {
        let d = doc! { "a": 1, "b": 2 };
        assert!(check(doc! { "$or": [{ "a": 5 }, { "b": 2 }] }, &d));
        assert!(!check(doc! { "$and": [{ "a": 1 }, { "b": 3 }] }, &d));
        assert!(check(doc! { "$nor": [{ "a": 5 }, { "b": 5 }] }, &d));
        assert!(check(doc! { "a": { "$not": { "$gt": 3 } } }, &d));
        assert!(check(doc! { "a": { "$ne": 2 } }, &d));
    }

    #[test]
    fn nested_paths_and_regex() {
        let d = doc! { "address": { "city": "Leeds" } };
        assert!(check(doc! { "address.city": "Leeds" }, &d));
        assert!(check(doc! { "address.city": { "$regex": "^lee", "$options": "i" } }, &d));
        assert!(!check(doc! { "address.city": { "$regex": "^lee" } }, &d));
    }

    #[test]
    fn empty_filter_matches() {
        assert!(check(doc! {}, &doc! { "x": 1 }));
    }
}
