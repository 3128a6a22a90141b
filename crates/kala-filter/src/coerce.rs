use bson::spec::BinarySubtype;
use bson::{Binary, Bson, DateTime, Document};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which BSON binary subtype coerced UUIDs are tagged with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UuidRepresentation {
    /// Subtype 4.
    #[default]
    Standard,
    /// Subtype 3, the pre-standard UUID tag.
    Legacy,
}

impl UuidRepresentation {
    fn subtype(self) -> BinarySubtype {
        match self {
            UuidRepresentation::Standard => BinarySubtype::Uuid,
            UuidRepresentation::Legacy => BinarySubtype::UuidOld,
        }
    }
}

/// A textual-to-rich type conversion applied to string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// `YYYY-MM-DDTHH:MM:SS.ffffffZ` (1 to 6 fractional digits) to a BSON date.
    Timestamp,
    /// Any textual UUID form to 16 bytes of BSON binary.
    UniqueId(UuidRepresentation),
}

impl Coercion {
    /// Try to convert one string. `None` means the string does not have this
    /// type and should be left alone.
    pub fn parse(self, text: &str) -> Option<Bson> {
        match self {
            Coercion::Timestamp => parse_timestamp(text).map(Bson::DateTime),
            Coercion::UniqueId(repr) => Uuid::parse_str(text).ok().map(|uuid| {
                Bson::Binary(Binary {
                    subtype: repr.subtype(),
                    bytes: uuid.as_bytes().to_vec(),
                })
            }),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime> {
    let body = text.strip_suffix('Z')?;
    let (whole, fraction) = body.rsplit_once('.')?;
    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(whole, "%Y-%m-%dT%H:%M:%S").ok()?;
    let micros: i64 = format!("{fraction:0<6}").parse().ok()?;
    let millis = naive.and_utc().timestamp_millis().checked_add(micros / 1000)?;
    Some(DateTime::from_millis(millis))
}

/// Walk a value, converting every string the coercion recognises.
/// Strings that fail to parse are kept as they are.
pub fn coerce(value: Bson, kind: Coercion) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(coerce_with(doc, kind)),
        Bson::Array(items) => Bson::Array(items.into_iter().map(|item| coerce(item, kind)).collect()),
        Bson::String(text) => match kind.parse(&text) {
            Some(converted) => converted,
            None => Bson::String(text),
        },
        other => other,
    }
}

fn coerce_with(doc: Document, kind: Coercion) -> Document {
    doc.into_iter()
        .map(|(key, value)| (key, coerce(value, kind)))
        .collect()
}

/// Apply the timestamp pass, then the unique-id pass, to a whole document.
pub fn coerce_document(doc: Document, uuids: UuidRepresentation) -> Document {
    let doc = coerce_with(doc, Coercion::Timestamp);
    coerce_with(doc, Coercion::UniqueId(uuids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn parses_iso_timestamp_with_millis() {
        let parsed = Coercion::Timestamp.parse("2016-03-01T12:30:45.123Z").unwrap();
        assert_eq!(parsed, Bson::DateTime(DateTime::from_millis(1_456_835_445_123)));
    }

    #[test]
    fn microseconds_truncate_to_millis() {
        let parsed = Coercion::Timestamp.parse("1970-01-01T00:00:01.999999Z").unwrap();
        assert_eq!(parsed, Bson::DateTime(DateTime::from_millis(1_999)));
    }

    #[test]
    fn timestamp_requires_fraction_and_zulu() {
        assert_eq!(Coercion::Timestamp.parse("2016-03-01T12:30:45Z"), None);
        assert_eq!(Coercion::Timestamp.parse("2016-03-01T12:30:45.123"), None);
        assert_eq!(Coercion::Timestamp.parse("2016-03-01T12:30:45.123+01:00"), None);
        assert_eq!(Coercion::Timestamp.parse("2016-13-01T12:30:45.123Z"), None);
        assert_eq!(Coercion::Timestamp.parse("2016-03-01T12:30:45.1234567Z"), None);
    }

    #[test]
    fn parses_uuid_as_binary() {
        let text = "8f1e2b7a-2c4d-4e5f-9a0b-1c2d3e4f5a6b";
        let expected = Uuid::parse_str(text).unwrap().as_bytes().to_vec();

        match Coercion::UniqueId(UuidRepresentation::Standard).parse(text) {
            Some(Bson::Binary(bin)) => {
                assert_eq!(bin.subtype, BinarySubtype::Uuid);
                assert_eq!(bin.bytes, expected);
            }
            other => panic!("expected binary, got {other:?}"),
        }

        match Coercion::UniqueId(UuidRepresentation::Legacy).parse(text) {
            Some(Bson::Binary(bin)) => assert_eq!(bin.subtype, BinarySubtype::UuidOld),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn non_uuid_strings_are_kept() {
        assert_eq!(
            Coercion::UniqueId(UuidRepresentation::Standard).parse("not-a-uuid"),
            None
        );
    }

    #[test]
    fn walks_nested_documents_and_arrays() {
        let doc = doc! {
            "name": "plain",
            "when": "2016-03-01T12:30:45.123Z",
            "nested": { "ids": ["8f1e2b7a-2c4d-4e5f-9a0b-1c2d3e4f5a6b", "nope"] },
            "count": 3,
        };
        let out = coerce_document(doc, UuidRepresentation::Standard);

        assert_eq!(out.get_str("name").unwrap(), "plain");
        assert!(matches!(out.get("when"), Some(Bson::DateTime(_))));
        let ids = out.get_document("nested").unwrap().get_array("ids").unwrap();
        assert!(matches!(ids[0], Bson::Binary(_)));
        assert_eq!(ids[1], Bson::String("nope".into()));
        assert_eq!(out.get_i32("count").unwrap(), 3);
    }

    #[test]
    fn coercion_is_idempotent() {
        let doc = doc! { "when": "2016-03-01T12:30:45.123Z", "other": "text" };
        let once = coerce(Bson::Document(doc), Coercion::Timestamp);
        let twice = coerce(once.clone(), Coercion::Timestamp);
        assert_eq!(once, twice);
    }
}
