use bson::{Bson, Document};

use crate::error::StoreError;
use crate::eval::matches;
use crate::parse_filter::parse_filter;
use crate::projection;
use crate::store::{Sort, SortDirection};

/// Run an aggregation pipeline over an already-loaded set of documents.
///
/// Supports `$match`, `$project`, `$sort`, `$skip`, `$limit` and `$count`.
/// Write-out stages are refused outright.
pub(crate) fn run(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let (op, arg) = single_entry(stage)?;
        docs = match op {
            "$match" => {
                let filter = as_document(op, arg)?;
                let expr = parse_filter(filter)?;
                docs.into_iter().filter(|d| matches(d, &expr)).collect()
            }
            "$project" => {
                let fields = as_document(op, arg)?;
                docs.into_iter()
                    .map(|d| projection::apply(d, fields))
                    .collect::<Result<_, _>>()?
            }
            "$sort" => {
                let sort = parse_sort(as_document(op, arg)?)?;
                sort_documents(&mut docs, &sort);
                docs
            }
            "$skip" => {
                let n = as_count(op, arg)?;
                docs.into_iter().skip(n).collect()
            }
            "$limit" => {
                let n = as_count(op, arg)?;
                if n == 0 {
                    return Err(StoreError::invalid("$limit must be positive"));
                }
                docs.truncate(n);
                docs
            }
            "$count" => {
                let name = match arg {
                    Bson::String(s) if !s.is_empty() && !s.starts_with('$') => s.clone(),
                    _ => return Err(StoreError::invalid("$count needs a field name")),
                };
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(name, docs.len() as i64);
                    vec![out]
                }
            }
            "$out" | "$merge" => {
                return Err(StoreError::invalid(format!("{op} stage is not supported")));
            }
            other => {
                return Err(StoreError::invalid(format!("unsupported pipeline stage: {other}")));
            }
        };
    }

    Ok(docs)
}

fn single_entry(stage: &Document) -> Result<(&str, &Bson), StoreError> {
    let mut iter = stage.iter();
    match (iter.next(), iter.next()) {
        (Some((op, arg)), None) => Ok((op.as_str(), arg)),
        _ => Err(StoreError::invalid(
            "a pipeline stage must have exactly one field",
        )),
    }
}

fn as_document<'a>(op: &str, arg: &'a Bson) -> Result<&'a Document, StoreError> {
    match arg {
        Bson::Document(d) => Ok(d),
        _ => Err(StoreError::invalid(format!("{op} needs a document"))),
    }
}

fn as_count(op: &str, arg: &Bson) -> Result<usize, StoreError> {
    let n = match arg {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => return Err(StoreError::invalid(format!("{op} needs an integer"))),
    };
    usize::try_from(n).map_err(|_| StoreError::invalid(format!("{op} must not be negative")))
}

pub(crate) fn parse_sort(arg: &Document) -> Result<Vec<Sort>, StoreError> {
    arg.iter()
        .map(|(field, value)| {
            SortDirection::from_bson(value)
                .map(|direction| Sort::new(field.as_str(), direction))
                .ok_or_else(|| StoreError::invalid(format!("invalid sort direction for {field}")))
        })
        .collect()
}

/// Stable multi-key sort; missing fields sort as null.
pub(crate) fn sort_documents(docs: &mut [Document], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in sort {
            let left = crate::field::get_path(a, &key.field).unwrap_or(&Bson::Null);
            let right = crate::field::get_path(b, &key.field).unwrap_or(&Bson::Null);
            let ord = crate::order::compare(left, right);
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}
