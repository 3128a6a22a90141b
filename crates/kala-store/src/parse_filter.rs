use bson::{Bson, Document};
use regex::Regex;

use crate::error::StoreError;
use crate::expression::Expression;

/// Parse a filter document into an Expression tree.
///
/// Follows MongoDB query semantics:
/// - Top-level document is an implicit AND of all entries
/// - An empty document matches everything
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` / `{ "$nor": [...] }` for logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
/// - `{ "field": { "$not": { ... } } }` negates an operator document
pub fn parse_filter(doc: &Document) -> Result<Expression<'_>, StoreError> {
    let mut children = Vec::new();

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(Expression::And(parse_logical_array(key, value)?)),
            "$or" => children.push(Expression::Or(parse_logical_array(key, value)?)),
            "$nor" => children.push(Expression::Nor(parse_logical_array(key, value)?)),
            k if k.starts_with('$') => {
                return Err(StoreError::invalid(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    match children.len() {
        0 => Ok(Expression::all()),
        1 => Ok(children.remove(0)),
        _ => Ok(Expression::And(children)),
    }
}

/// Parse a `$and`, `$or` or `$nor` array value into its children.
fn parse_logical_array<'a>(
    op: &str,
    value: &'a Bson,
) -> Result<Vec<Expression<'a>>, StoreError> {
    let arr = match value {
        Bson::Array(a) => a,
        _ => return Err(StoreError::invalid(format!("{op} value must be an array"))),
    };

    if arr.is_empty() {
        return Err(StoreError::invalid(format!("{op} array must not be empty")));
    }

    arr.iter()
        .map(|elem| match elem {
            Bson::Document(sub_doc) => parse_filter(sub_doc),
            _ => Err(StoreError::invalid(format!(
                "{op} array elements must be documents"
            ))),
        })
        .collect()
}

/// Parse a field condition: either implicit $eq or an operator sub-document.
fn parse_field_condition<'a>(
    field: &'a str,
    value: &'a Bson,
) -> Result<Expression<'a>, StoreError> {
    match value {
        // If value is a document whose first key starts with $, it's an operator doc
        Bson::Document(sub_doc)
            if sub_doc.keys().next().is_some_and(|k| k.starts_with('$')) =>
        {
            parse_operator_doc(field, sub_doc)
        }
        Bson::RegularExpression(re) => Ok(Expression::Regex(
            field,
            compile_regex(&re.pattern, &re.options)?,
        )),
        _ => Ok(Expression::Eq(field, value)),
    }
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc<'a>(
    field: &'a str,
    doc: &'a Document,
) -> Result<Expression<'a>, StoreError> {
    // $regex consumes its $options sibling
    if let Some(pattern) = doc.get("$regex") {
        let options = match doc.get("$options") {
            Some(Bson::String(s)) => s.as_str(),
            Some(_) => return Err(StoreError::invalid("$options must be a string")),
            None => "",
        };
        let regex = match pattern {
            Bson::String(p) => compile_regex(p, options)?,
            Bson::RegularExpression(re) => {
                let merged = format!("{}{}", re.options, options);
                compile_regex(&re.pattern, &merged)?
            }
            _ => return Err(StoreError::invalid("$regex must be a string")),
        };
        let mut conditions = vec![Expression::Regex(field, regex)];
        for (op_key, op_value) in doc {
            if op_key != "$regex" && op_key != "$options" {
                conditions.push(parse_operator(field, op_key, op_value)?);
            }
        }
        return Ok(collapse(conditions));
    }

    let conditions = doc
        .iter()
        .map(|(op_key, op_value)| parse_operator(field, op_key, op_value))
        .collect::<Result<Vec<_>, _>>()?;

    if conditions.is_empty() {
        return Err(StoreError::invalid("empty operator document"));
    }

    Ok(collapse(conditions))
}

fn parse_operator<'a>(
    field: &'a str,
    op_key: &str,
    op_value: &'a Bson,
) -> Result<Expression<'a>, StoreError> {
    let expr = match op_key {
        "$eq" => Expression::Eq(field, op_value),
        "$ne" => Expression::Ne(field, op_value),
        "$gt" => Expression::Gt(field, op_value),
        "$gte" => Expression::Gte(field, op_value),
        "$lt" => Expression::Lt(field, op_value),
        "$lte" => Expression::Lte(field, op_value),
        "$in" | "$nin" => {
            let values = match op_value {
                Bson::Array(values) => values.as_slice(),
                _ => return Err(StoreError::invalid(format!("{op_key} value must be an array"))),
            };
            if op_key == "$in" {
                Expression::In(field, values)
            } else {
                Expression::Nin(field, values)
            }
        }
        "$exists" => match op_value {
            Bson::Boolean(b) => Expression::Exists(field, *b),
            Bson::Int32(n) => Expression::Exists(field, *n != 0),
            Bson::Int64(n) => Expression::Exists(field, *n != 0),
            _ => return Err(StoreError::invalid("$exists value must be a boolean")),
        },
        "$not" => match op_value {
            Bson::Document(sub_doc) => Expression::Not(Box::new(parse_operator_doc(field, sub_doc)?)),
            Bson::RegularExpression(re) => Expression::Not(Box::new(Expression::Regex(
                field,
                compile_regex(&re.pattern, &re.options)?,
            ))),
            _ => return Err(StoreError::invalid("$not needs a regex or a document")),
        },
        "$options" => return Err(StoreError::invalid("$options without $regex")),
        k => return Err(StoreError::invalid(format!("unknown field operator: {k}"))),
    };
    Ok(expr)
}

fn collapse(mut conditions: Vec<Expression<'_>>) -> Expression<'_> {
    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        Expression::And(conditions)
    }
}

/// Compile a pattern with MongoDB-style option letters as inline flags.
fn compile_regex(pattern: &str, options: &str) -> Result<Regex, StoreError> {
    let mut flags = String::new();
    for c in options.chars() {
        match c {
            'i' | 'm' | 's' | 'x' => {
                if !flags.contains(c) {
                    flags.push(c);
                }
            }
            _ => return Err(StoreError::invalid(format!("unsupported regex option: {c}"))),
        }
    }

    let full = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{flags}){pattern}")
    };
    Regex::new(&full).map_err(|e| StoreError::invalid(format!("invalid regex: {e}")))
}
