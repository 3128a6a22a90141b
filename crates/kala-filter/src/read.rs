use bson::{Bson, Document};
use kala_store::Sort;

use crate::shape::Shape;
use crate::whitelist::Whitelist;

/// Keys starting with this sigil are query operators, not field names.
pub(crate) const OPERATOR_SIGIL: char = '$';

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

pub(crate) fn is_operator(key: &str) -> bool {
    key.starts_with(OPERATOR_SIGIL)
}

/// Prune a query value down to whitelisted fields.
///
/// - No whitelist: the value comes back untouched.
/// - Mapping: non-whitelisted keys are removed; operator keys stay and their
///   values are filtered recursively.
/// - Sequence: elements whose filtered form is falsy are dropped. Sort pairs
///   survive only if their field is whitelisted.
/// - Pair: answers whether the field is whitelisted, as a boolean scalar.
/// - Absent: becomes an inclusion projection of exactly the whitelist.
/// - Scalar: unchanged.
pub fn filter_read(value: Shape, whitelist: Option<&Whitelist>) -> Shape {
    let Some(whitelist) = whitelist else {
        return value;
    };

    match value {
        Shape::Mapping(doc) => Shape::Mapping(filter_mapping(doc, whitelist)),
        Shape::Sequence(items) => Shape::Sequence(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Shape::Pair(sort) => whitelist.contains(&sort.field).then_some(Shape::Pair(sort)),
                    other => Some(filter_read(other, Some(whitelist))).filter(Shape::is_truthy),
                })
                .collect(),
        ),
        Shape::Pair(sort) => Shape::Scalar(Bson::Boolean(whitelist.contains(&sort.field))),
        Shape::Absent => Shape::Mapping(whitelist.projection()),
        Shape::Scalar(value) => Shape::Scalar(value),
    }
}

fn filter_mapping(doc: Document, whitelist: &Whitelist) -> Document {
    doc.into_iter()
        .filter_map(|(key, value)| {
            if is_operator(&key) {
                let filtered = filter_read(Shape::from(value), Some(whitelist)).into_bson()?;
                // Stores refuse an empty branch list.
                if LOGICAL_OPERATORS.contains(&key.as_str())
                    && matches!(&filtered, Bson::Array(branches) if branches.is_empty())
                {
                    tracing::debug!(operator = %key, "dropping logical operator with no branches left");
                    return None;
                }
                Some((key, filtered))
            } else if whitelist.contains(&key) {
                Some((key, value))
            } else {
                tracing::debug!(field = %key, "dropping non-whitelisted field");
                None
            }
        })
        .collect()
}

/// Read filtering bound to the configured whitelist.
#[derive(Debug, Clone, Copy)]
pub struct ReadFilter<'a> {
    whitelist: Option<&'a Whitelist>,
}

impl<'a> ReadFilter<'a> {
    pub fn new(whitelist: Option<&'a Whitelist>) -> Self {
        Self { whitelist }
    }

    pub fn whitelist(&self) -> Option<&'a Whitelist> {
        self.whitelist
    }

    pub fn filter(&self, filter: Document) -> Document {
        match filter_read(Shape::Mapping(filter), self.whitelist) {
            Shape::Mapping(doc) => doc,
            _ => Document::new(),
        }
    }

    /// Restrict a projection to the whitelist.
    ///
    /// A missing projection becomes the whitelist projection. A projection
    /// left with no inclusion entries after pruning (including pure exclusion
    /// projections) also falls back to the whitelist, minus any fields the
    /// client explicitly excluded, since stores treat those as "every other
    /// field". When that leaves nothing, only `_id` is selected. Computed
    /// values on whitelisted keys are reduced to a plain inclusion so they
    /// cannot copy other fields in.
    pub fn projection(&self, projection: Option<Document>) -> Option<Document> {
        let Some(whitelist) = self.whitelist else {
            return projection;
        };

        let exclude_id = projection
            .as_ref()
            .and_then(|p| p.get("_id"))
            .is_some_and(|v| is_flag(v) && !flag_value(v));

        let pruned = match filter_read(Shape::from(projection), Some(whitelist)) {
            Shape::Mapping(doc) => doc,
            _ => whitelist.projection(),
        };

        let mut included = Document::new();
        let mut excluded: Vec<String> = Vec::new();
        for (key, value) in pruned {
            if key == "_id" {
                continue;
            }
            if !is_flag(&value) {
                included.insert(key, Bson::Int32(1));
            } else if flag_value(&value) {
                included.insert(key, value);
            } else {
                excluded.push(key);
            }
        }

        let mut out: Document = if included.is_empty() {
            whitelist
                .iter()
                .filter(|f| *f != "_id" && !excluded.iter().any(|e| e == f))
                .map(|f| (f.to_string(), Bson::Int32(1)))
                .collect()
        } else {
            included
        };

        // A projection with no inclusion entry means "every field" to a store,
        // so an empty selection narrows to `_id` alone.
        if out.is_empty() {
            tracing::debug!("no whitelisted field left to project");
            out.insert("_id", Bson::Int32(1));
            return Some(out);
        }

        if exclude_id {
            out.insert("_id", Bson::Int32(0));
        } else if whitelist.contains("_id") {
            out.insert("_id", Bson::Int32(1));
        }
        Some(out)
    }

    /// Drop sort criteria on non-whitelisted fields, keeping the rest in order.
    pub fn sort(&self, sort: Vec<Sort>) -> Vec<Sort> {
        let shape = Shape::Sequence(sort.into_iter().map(Shape::Pair).collect());
        match filter_read(shape, self.whitelist) {
            Shape::Sequence(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Shape::Pair(sort) => Some(sort),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn is_flag(value: &Bson) -> bool {
    matches!(
        value,
        Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)
    )
}

fn flag_value(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => false,
    }
}
