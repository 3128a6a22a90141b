use bson::{Bson, Document};

/// Resolve a dotted path (`"address.city"`, `"tags.0"`) against a document.
pub(crate) fn get_path<'d>(doc: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;

    for segment in segments {
        current = match current {
            Bson::Document(sub) => sub.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Write `value` at a dotted path, creating intermediate documents.
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                set_path(sub, rest, value);
            }
        }
    }
}

/// Remove the value at a dotted path. Missing paths are ignored.
pub(crate) fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                remove_path(sub, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn nested_lookup() {
        let d = doc! { "address": { "city": "Leeds" }, "tags": ["a", "b"] };
        assert_eq!(get_path(&d, "address.city"), Some(&Bson::String("Leeds".into())));
        assert_eq!(get_path(&d, "tags.1"), Some(&Bson::String("b".into())));
        assert_eq!(get_path(&d, "address.zip"), None);
        assert_eq!(get_path(&d, "tags.x"), None);
    }

    #[test]
    fn set_and_remove_nested() {
        let mut d = doc! {};
        set_path(&mut d, "a.b", Bson::Int32(1));
        assert_eq!(d, doc! { "a": { "b": 1 } });
        remove_path(&mut d, "a.b");
        assert_eq!(d, doc! { "a": {} });
    }
}
