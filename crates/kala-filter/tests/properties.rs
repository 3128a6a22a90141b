//! Property tests for the filtering invariants.

use bson::{Bson, Document, doc};
use kala_filter::*;
use kala_store::{FindOptions, MemoryStore, Store};
use proptest::prelude::*;

const FIELDS: [&str; 6] = ["name", "age", "email", "secret", "role", "tags"];

fn whitelist() -> impl Strategy<Value = Whitelist> {
    prop::sample::subsequence(FIELDS.to_vec(), 0..=FIELDS.len()).prop_map(Whitelist::new)
}

fn document() -> impl Strategy<Value = Document> {
    prop::collection::vec((prop::sample::select(FIELDS.to_vec()), any::<i32>()), 0..8)
        .prop_map(|pairs| pairs.into_iter().map(|(k, v)| (k.to_string(), Bson::Int32(v))).collect())
}

fn query() -> impl Strategy<Value = Document> {
    (document(), prop::collection::vec(document(), 1..4)).prop_map(|(mut top, branches)| {
        let branches: Vec<Bson> = branches.into_iter().map(Bson::Document).collect();
        top.insert("$or", branches);
        top
    })
}

fn stage() -> impl Strategy<Value = Document> {
    prop_oneof![
        Just(doc! { "$match": {} }),
        Just(doc! { "$out": "exported" }),
        Just(doc! { "$merge": { "into": "exported" } }),
        (1..50_i64).prop_map(|n| doc! { "$limit": n }),
        document().prop_map(|fields| {
            let selection: Document = fields.keys().map(|k| (k.clone(), Bson::Int32(1))).collect();
            doc! { "$project": selection }
        }),
        prop::sample::select(FIELDS.to_vec()).prop_map(|f| doc! { "$sort": { f: 1 } }),
    ]
}

fn client_projection() -> impl Strategy<Value = Option<Document>> {
    let flag = prop_oneof![Just(Bson::Int32(0)), Just(Bson::Int32(1)), Just(Bson::Boolean(false))];
    let field = prop::sample::select(vec!["_id", "name", "age", "email", "secret", "role", "tags"]);
    prop::option::of(
        prop::collection::vec((field, flag), 0..5)
            .prop_map(|pairs| pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
    )
}

fn full_record() -> Document {
    doc! {
        "_id": 1, "name": "Ann", "age": 30, "email": "a@example.com",
        "secret": "s", "role": "admin", "tags": ["x"]
    }
}

fn timestamp_text() -> impl Strategy<Value = String> {
    (1970..2100_u32, 1..13_u32, 1..29_u32, 0..24_u32, 0..60_u32, 0..60_u32, 0..1_000_000_u32)
        .prop_map(|(y, mo, d, h, mi, s, us)| format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}.{us:06}Z"))
}

fn coercible() -> impl Strategy<Value = Document> {
    let value = prop_oneof![
        timestamp_text().prop_map(Bson::String),
        any::<u128>().prop_map(|n| Bson::String(uuid::Uuid::from_u128(n).to_string())),
        "[a-z0-9 .:-]{0,20}".prop_map(Bson::String),
        any::<i64>().prop_map(Bson::Int64),
    ];
    prop::collection::vec(("[a-z]{1,6}", value), 0..8).prop_map(|pairs| pairs.into_iter().collect())
}

// ── read filter ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn disabled_filter_is_identity(doc in query()) {
        let shape = Shape::Mapping(doc);
        prop_assert_eq!(filter_read(shape.clone(), None), shape);
    }

    #[test]
    fn filtered_keys_are_whitelisted_or_operators(w in whitelist(), doc in query()) {
        let out = ReadFilter::new(Some(&w)).filter(doc);
        for key in out.keys() {
            prop_assert!(w.contains(key) || key.starts_with('$'), "unexpected key {}", key);
        }
    }

    #[test]
    fn absent_projection_is_exactly_the_whitelist(w in whitelist()) {
        match filter_read(Shape::Absent, Some(&w)) {
            Shape::Mapping(doc) => {
                prop_assert_eq!(doc.len(), w.len());
                for field in w.iter() {
                    prop_assert_eq!(doc.get(field), Some(&Bson::Int32(1)));
                }
            }
            other => prop_assert!(false, "expected mapping, got {:?}", other),
        }
    }

    #[test]
    fn pipeline_starts_with_projection_and_ends_with_limit(
        w in whitelist(),
        pipeline in prop::collection::vec(stage(), 0..6),
        limit in 1..500_usize,
    ) {
        let out = append_limit(filter_aggregate(strip_write_out(pipeline), Some(&w)), limit);

        let first = out.first().unwrap();
        let selection = first.get_document("$project").unwrap();
        for (field, _) in selection {
            prop_assert!(w.contains(field) || field == "_id");
        }
        prop_assert!(selection.values().any(|v| v != &Bson::Int32(0)));
        prop_assert_eq!(out.last().unwrap(), &doc! { "$limit": limit as i64 });
        prop_assert!(out.iter().all(|s| !s.contains_key("$out") && !s.contains_key("$merge")));
    }
}

// ── projections applied by a store ──────────────────────────────

proptest! {
    #[test]
    fn found_documents_only_carry_whitelisted_fields(w in whitelist(), projection in client_projection()) {
        let store = MemoryStore::new();
        store.insert_one("people", full_record()).unwrap();
        let options = FindOptions {
            projection: ReadFilter::new(Some(&w)).projection(projection),
            ..FindOptions::default()
        };

        let docs = store.find("people", &doc! {}, &options).unwrap();
        prop_assert_eq!(docs.len(), 1);
        for key in docs[0].keys() {
            prop_assert!(w.contains(key) || key == "_id", "unexpected key {}", key);
        }
    }

    #[test]
    fn aggregated_documents_only_carry_whitelisted_fields(
        w in whitelist(),
        projection in client_projection(),
    ) {
        let store = MemoryStore::new();
        store.insert_one("people", full_record()).unwrap();
        let pipeline: Vec<Document> = projection
            .into_iter()
            .map(|fields| doc! { "$project": fields })
            .collect();
        let pipeline = append_limit(filter_aggregate(pipeline, Some(&w)), DEFAULT_LIMIT);

        let docs = store.aggregate("people", &pipeline).unwrap();
        prop_assert_eq!(docs.len(), 1);
        for key in docs[0].keys() {
            prop_assert!(w.contains(key) || key == "_id", "unexpected key {}", key);
        }
    }
}

// ── coercion ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn timestamp_coercion_is_idempotent(doc in coercible()) {
        let once = coerce(Bson::Document(doc), Coercion::Timestamp);
        let twice = coerce(once.clone(), Coercion::Timestamp);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn document_coercion_is_idempotent(doc in coercible()) {
        let once = coerce_document(doc, UuidRepresentation::Standard);
        let twice = coerce_document(once.clone(), UuidRepresentation::Standard);
        prop_assert_eq!(once, twice);
    }
}

// ── staging probe ───────────────────────────────────────────────

proptest! {
    #[test]
    fn probe_always_cleans_up(age in 0..100_i32, threshold in 0..100_i32, valid in any::<bool>()) {
        let store = MemoryStore::new();
        let probe = StagingProbe::new(&store, "staging");
        let policy = if valid {
            doc! { "age": { "$gt": threshold } }
        } else {
            doc! { "age": { "$between": threshold } }
        };

        let result = probe.accepts(&doc! { "age": age }, Some(&policy));
        prop_assert_eq!(store.count("staging", &doc! {}).unwrap(), 0);

        match result {
            Ok(accepted) => {
                prop_assert!(valid);
                prop_assert_eq!(accepted, age > threshold);
            }
            Err(_) => prop_assert!(!valid),
        }
    }
}
