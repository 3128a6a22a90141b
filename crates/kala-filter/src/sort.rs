use bson::Bson;
use kala_store::{Sort, SortDirection};

use crate::error::FilterError;

/// Normalise a client sort argument into ordered sort pairs.
///
/// Accepted forms:
/// - a list of `[field, direction]` pairs: `[["name", 1], ["age", -1]]`
/// - a document: `{"name": 1, "age": -1}`
/// - a bare field name, sorted ascending: `"name"`
pub fn parse_sort(value: Bson) -> Result<Vec<Sort>, FilterError> {
    match value {
        Bson::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Bson::Array(pair) => out.push(parse_pair(pair)?),
                    Bson::Document(doc) => {
                        for (field, direction) in doc {
                            out.push(sort_entry(field, &direction)?);
                        }
                    }
                    Bson::String(field) => out.push(Sort::new(field, SortDirection::Asc)),
                    other => {
                        return Err(FilterError::InvalidSort(format!(
                            "unexpected sort element: {other}"
                        )));
                    }
                }
            }
            Ok(out)
        }
        Bson::Document(doc) => doc
            .into_iter()
            .map(|(field, direction)| sort_entry(field, &direction))
            .collect(),
        Bson::String(field) => Ok(vec![Sort::new(field, SortDirection::Asc)]),
        other => Err(FilterError::InvalidSort(format!(
            "sort must be a list or a document, got {other}"
        ))),
    }
}

fn parse_pair(pair: Vec<Bson>) -> Result<Sort, FilterError> {
    let mut iter = pair.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(Bson::String(field)), Some(direction), None) => sort_entry(field, &direction),
        _ => Err(FilterError::InvalidSort(
            "sort pairs must be [field, direction]".into(),
        )),
    }
}

fn sort_entry(field: String, direction: &Bson) -> Result<Sort, FilterError> {
    let direction = SortDirection::from_bson(direction).ok_or_else(|| {
        FilterError::InvalidSort(format!("invalid direction {direction} for {field}"))
    })?;
    Ok(Sort::new(field, direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    #[test]
    fn pair_list() {
        let sort = parse_sort(bson!([["name", 1], ["secret", -1]])).unwrap();
        assert_eq!(
            sort,
            vec![
                Sort::new("name", SortDirection::Asc),
                Sort::new("secret", SortDirection::Desc)
            ]
        );
    }

    #[test]
    fn document_form_matches_pair_form() {
        let from_doc = parse_sort(Bson::Document(doc! { "name": 1, "secret": -1 })).unwrap();
        let from_pairs = parse_sort(bson!([["name", 1], ["secret", -1]])).unwrap();
        assert_eq!(from_doc, from_pairs);
    }

    #[test]
    fn bare_field_name() {
        assert_eq!(
            parse_sort(Bson::String("age".into())).unwrap(),
            vec![Sort::new("age", SortDirection::Asc)]
        );
    }

    #[test]
    fn rejects_bad_pairs() {
        assert!(parse_sort(bson!([["name"]])).is_err());
        assert!(parse_sort(bson!([["name", 1, 2]])).is_err());
        assert!(parse_sort(bson!([["name", "sideways"]])).is_err());
        assert!(parse_sort(Bson::Int32(1)).is_err());
    }
}
