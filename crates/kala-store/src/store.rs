use bson::{Bson, Document};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Interprets a sort direction the way document stores accept them:
    /// any positive number is ascending, any negative number descending,
    /// plus the `asc`/`ascending`/`desc`/`descending` spellings.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        let numeric = match value {
            Bson::Int32(n) => Some(*n as f64),
            Bson::Int64(n) => Some(*n as f64),
            Bson::Double(n) => Some(*n),
            Bson::String(s) => {
                return match s.to_ascii_lowercase().as_str() {
                    "asc" | "ascending" => Some(SortDirection::Asc),
                    "desc" | "descending" => Some(SortDirection::Desc),
                    _ => None,
                };
            }
            _ => None,
        }?;

        if numeric > 0.0 {
            Some(SortDirection::Asc)
        } else if numeric < 0.0 {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Options for [`Store::find`]. A `limit` of `None` returns every match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Vec<Sort>,
    pub skip: usize,
    pub limit: Option<usize>,
}

/// The document-store driver contract.
///
/// Implementations hand out whole documents; every call is synchronous and
/// scoped to a single named collection. Missing collections read as empty.
pub trait Store: Send + Sync {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// Inserts one document and returns its `_id`, generating an `ObjectId`
    /// when the document carries none.
    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError>;

    /// Removes every document matching `filter`, returning how many were removed.
    fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64, StoreError>;

    fn aggregate(&self, collection: &str, pipeline: &[Document])
    -> Result<Vec<Document>, StoreError>;

    /// Distinct values of `field` across matching documents, in first-seen order.
    /// Array values contribute each of their elements.
    fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Document,
    ) -> Result<Vec<Bson>, StoreError>;

    fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        (**self).find(collection, filter, options)
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        (**self).insert_one(collection, document)
    }

    fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        (**self).delete_many(collection, filter)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        (**self).aggregate(collection, pipeline)
    }

    fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Document,
    ) -> Result<Vec<Bson>, StoreError> {
        (**self).distinct(collection, field, filter)
    }

    fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        (**self).count(collection, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_from_numbers_and_names() {
        assert_eq!(SortDirection::from_bson(&Bson::Int32(1)), Some(SortDirection::Asc));
        assert_eq!(SortDirection::from_bson(&Bson::Int64(-1)), Some(SortDirection::Desc));
        assert_eq!(SortDirection::from_bson(&Bson::Double(2.0)), Some(SortDirection::Asc));
        assert_eq!(
            SortDirection::from_bson(&Bson::String("DESC".into())),
            Some(SortDirection::Desc)
        );
        assert_eq!(SortDirection::from_bson(&Bson::Int32(0)), None);
        assert_eq!(SortDirection::from_bson(&Bson::Boolean(true)), None);
    }
}
