use bson::Document;

use crate::error::FilterError;
use crate::whitelist::Whitelist;

/// Keep only the whitelisted top-level fields of an inbound document.
///
/// `Ok(None)` means nothing survived and the write must be rejected.
pub fn filter_write(
    document: Document,
    whitelist: Option<&Whitelist>,
) -> Result<Option<Document>, FilterError> {
    let whitelist = whitelist.ok_or(FilterError::WriteDisabled)?;

    let kept: Document = document
        .into_iter()
        .filter(|(key, _)| {
            let allowed = whitelist.contains(key);
            if !allowed {
                tracing::debug!(field = %key, "dropping non-whitelisted write field");
            }
            allowed
        })
        .collect();

    Ok((!kept.is_empty()).then_some(kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn keeps_only_whitelisted_keys() {
        let w = Whitelist::new(["name", "age"]);
        let out = filter_write(doc! { "name": "a", "age": 3, "admin": true }, Some(&w)).unwrap();
        assert_eq!(out, Some(doc! { "name": "a", "age": 3 }));
    }

    #[test]
    fn nothing_left_is_a_rejection() {
        let w = Whitelist::new(["name"]);
        assert_eq!(filter_write(doc! { "admin": true }, Some(&w)).unwrap(), None);
        assert_eq!(filter_write(doc! {}, Some(&w)).unwrap(), None);
    }

    #[test]
    fn missing_whitelist_disables_writes() {
        let err = filter_write(doc! { "name": "a" }, None).unwrap_err();
        assert!(matches!(err, FilterError::WriteDisabled));
    }
}
