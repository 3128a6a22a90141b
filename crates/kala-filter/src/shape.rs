use bson::{Bson, Document};
use kala_store::Sort;

/// The shapes a query value can take on its way through the read filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Mapping(Document),
    Sequence(Vec<Shape>),
    /// A single sort criterion: field name plus direction.
    Pair(Sort),
    /// No value was supplied (e.g. the client sent no projection).
    Absent,
    Scalar(Bson),
}

impl Shape {
    /// Truthiness used when pruning sequences: empty containers, `null`,
    /// `false`, zero and empty strings are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Shape::Mapping(doc) => !doc.is_empty(),
            Shape::Sequence(items) => !items.is_empty(),
            Shape::Pair(_) => true,
            Shape::Absent => false,
            Shape::Scalar(value) => match value {
                Bson::Null | Bson::Undefined => false,
                Bson::Boolean(b) => *b,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(n) => *n != 0.0,
                Bson::String(s) => !s.is_empty(),
                _ => true,
            },
        }
    }

    /// Convert back into a BSON value. `Absent` has no value.
    pub fn into_bson(self) -> Option<Bson> {
        match self {
            Shape::Mapping(doc) => Some(Bson::Document(doc)),
            Shape::Sequence(items) => Some(Bson::Array(
                items.into_iter().filter_map(Shape::into_bson).collect(),
            )),
            Shape::Pair(sort) => Some(Bson::Array(vec![
                Bson::String(sort.field),
                Bson::Int32(sort.direction.as_i32()),
            ])),
            Shape::Absent => None,
            Shape::Scalar(value) => Some(value),
        }
    }
}

impl From<Bson> for Shape {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Document(doc) => Shape::Mapping(doc),
            Bson::Array(items) => Shape::Sequence(items.into_iter().map(Shape::from).collect()),
            other => Shape::Scalar(other),
        }
    }
}

impl From<Option<Document>> for Shape {
    fn from(value: Option<Document>) -> Self {
        value.map_or(Shape::Absent, Shape::Mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use kala_store::SortDirection;

    #[test]
    fn truthiness() {
        assert!(!Shape::Mapping(doc! {}).is_truthy());
        assert!(Shape::Mapping(doc! { "a": 1 }).is_truthy());
        assert!(!Shape::Sequence(vec![]).is_truthy());
        assert!(!Shape::Absent.is_truthy());
        assert!(!Shape::Scalar(Bson::Boolean(false)).is_truthy());
        assert!(Shape::Pair(Sort::new("a", SortDirection::Asc)).is_truthy());
    }

    #[test]
    fn round_trips_through_bson() {
        let value = Bson::Array(vec![Bson::Document(doc! { "a": 1 }), Bson::Int32(2)]);
        assert_eq!(Shape::from(value.clone()).into_bson(), Some(value));
    }

    #[test]
    fn pair_becomes_two_element_array() {
        let pair = Shape::Pair(Sort::new("name", SortDirection::Desc));
        assert_eq!(
            pair.into_bson(),
            Some(Bson::Array(vec![Bson::String("name".into()), Bson::Int32(-1)]))
        );
    }
}
