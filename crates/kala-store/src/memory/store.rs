use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use arc_swap::ArcSwap;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use imbl::OrdMap;

use crate::error::StoreError;
use crate::eval::matches;
use crate::order::value_eq;
use crate::parse_filter::parse_filter;
use crate::pipeline;
use crate::projection;
use crate::store::{FindOptions, Store};

/// Documents of one collection, keyed by insertion sequence so scans come
/// back in natural (insertion) order.
pub(crate) type Collection = OrdMap<u64, Document>;

/// In-memory document store.
///
/// Each collection is an immutable ordered map behind an `ArcSwap`: readers
/// take a snapshot without locking, writers clone the map (cheap, structural
/// sharing), modify it and swap it back in under a single write lock.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<ArcSwap<Collection>>>>,
    write_lock: Mutex<()>,
    next_seq: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Snapshot one collection. Missing collections read as empty.
    pub(crate) fn snapshot(&self, name: &str) -> Result<Arc<Collection>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        Ok(collections
            .get(name)
            .map(|handle| handle.load_full())
            .unwrap_or_default())
    }

    /// Names of every collection that has been written to.
    pub fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }

    fn handle(&self, name: &str) -> Result<Arc<ArcSwap<Collection>>, StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        Ok(collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))))
            .clone())
    }

    /// Matching documents of a collection, in insertion order.
    fn scan(&self, collection: &str, filter: &Document) -> Result<Vec<Document>, StoreError> {
        let expr = parse_filter(filter)?;
        let data = self.snapshot(collection)?;
        Ok(data
            .values()
            .filter(|doc| matches(doc, &expr))
            .cloned()
            .collect())
    }
}

impl Store for MemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut docs = self.scan(collection, filter)?;
        pipeline::sort_documents(&mut docs, &options.sort);

        let page = docs
            .into_iter()
            .skip(options.skip)
            .take(match options.limit {
                Some(0) | None => usize::MAX,
                Some(n) => n,
            });

        match &options.projection {
            Some(fields) => page.map(|doc| projection::apply(doc, fields)).collect(),
            None => Ok(page.collect()),
        }
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let document = match document.get("_id") {
            Some(_) => document,
            None => {
                let mut with_id = Document::new();
                with_id.insert("_id", ObjectId::new());
                with_id.extend(document);
                with_id
            }
        };
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);

        let _guard = self.lock_writes()?;
        let handle = self.handle(collection)?;
        let mut data = (**handle.load()).clone();

        if data
            .values()
            .any(|existing| existing.get("_id").is_some_and(|other| value_eq(other, &id)))
        {
            return Err(StoreError::DuplicateKey(format!("{collection}: {id}")));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        data.insert(seq, document);
        handle.store(Arc::new(data));
        Ok(id)
    }

    fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        let expr = parse_filter(filter)?;

        let _guard = self.lock_writes()?;
        let handle = {
            let collections = self
                .collections
                .read()
                .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
            match collections.get(collection) {
                Some(handle) => Arc::clone(handle),
                None => return Ok(0),
            }
        };

        let mut data = (**handle.load()).clone();
        let doomed: Vec<u64> = data
            .iter()
            .filter(|(_, doc)| matches(doc, &expr))
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &doomed {
            data.remove(seq);
        }
        handle.store(Arc::new(data));
        Ok(doomed.len() as u64)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        let data = self.snapshot(collection)?;
        pipeline::run(data.values().cloned().collect(), pipeline)
    }

    fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Document,
    ) -> Result<Vec<Bson>, StoreError> {
        let mut values: Vec<Bson> = Vec::new();
        for doc in self.scan(collection, filter)? {
            let candidates = match crate::field::get_path(&doc, field) {
                Some(Bson::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => continue,
            };
            for value in candidates {
                if !values.iter().any(|seen| value_eq(seen, &value)) {
                    values.push(value);
                }
            }
        }
        Ok(values)
    }

    fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        let expr = parse_filter(filter)?;
        let data = self.snapshot(collection)?;
        Ok(data.values().filter(|doc| matches(doc, &expr)).count() as u64)
    }
}
