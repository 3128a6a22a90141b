use bson::{Bson, Document};

use crate::error::StoreError;
use crate::field::{get_path, remove_path, set_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Include,
    Exclude,
}

enum Entry<'a> {
    Flag(bool),
    /// `"$path"` in an inclusion projection copies another field's value.
    Reference(&'a str),
}

fn entry<'a>(field: &str, value: &'a Bson) -> Result<Entry<'a>, StoreError> {
    match value {
        Bson::Boolean(b) => Ok(Entry::Flag(*b)),
        Bson::Int32(n) => Ok(Entry::Flag(*n != 0)),
        Bson::Int64(n) => Ok(Entry::Flag(*n != 0)),
        Bson::Double(n) => Ok(Entry::Flag(*n != 0.0)),
        Bson::String(s) if s.starts_with('$') && s.len() > 1 => Ok(Entry::Reference(&s[1..])),
        _ => Err(StoreError::invalid(format!(
            "unsupported projection value for {field}"
        ))),
    }
}

/// Shape a document according to an inclusion or exclusion projection.
///
/// `_id` is kept unless explicitly excluded. `{"_id": 1}` on its own is an
/// inclusion of `_id` alone. An empty projection returns the document
/// unchanged.
pub(crate) fn apply(doc: Document, projection: &Document) -> Result<Document, StoreError> {
    let mut mode = None;
    let mut keep_id = true;
    let mut id_included = false;
    let mut entries = Vec::with_capacity(projection.len());

    for (field, value) in projection {
        let parsed = entry(field, value)?;
        if field == "_id" {
            if let Entry::Flag(flag) = parsed {
                keep_id = flag;
                id_included = flag;
                continue;
            }
        }

        let field_mode = match parsed {
            Entry::Flag(false) => Mode::Exclude,
            Entry::Flag(true) | Entry::Reference(_) => Mode::Include,
        };
        match mode {
            None => mode = Some(field_mode),
            Some(m) if m != field_mode => {
                return Err(StoreError::invalid(
                    "cannot mix inclusion and exclusion in a projection",
                ));
            }
            Some(_) => {}
        }
        entries.push((field.as_str(), parsed));
    }

    if mode.is_none() && id_included {
        mode = Some(Mode::Include);
    }

    match mode {
        Some(Mode::Include) => {
            let mut out = Document::new();
            if keep_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id", id.clone());
                }
            }
            for (field, parsed) in entries {
                let source = match parsed {
                    Entry::Reference(path) => path,
                    Entry::Flag(_) => field,
                };
                if let Some(value) = get_path(&doc, source) {
                    set_path(&mut out, field, value.clone());
                }
            }
            Ok(out)
        }
        Some(Mode::Exclude) => {
            let mut out = doc;
            for (field, _) in entries {
                remove_path(&mut out, field);
            }
            if !keep_id {
                out.remove("_id");
            }
            Ok(out)
        }
        None => {
            let mut out = doc;
            if !keep_id {
                out.remove("_id");
            }
            Ok(out)
        }
    }
}
