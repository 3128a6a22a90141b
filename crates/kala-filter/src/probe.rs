use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use kala_store::{FindOptions, Store, StoreError};

/// Policy check for writes: stage the candidate document in a side
/// collection, run the policy query there, and accept the write only if the
/// staged record comes back.
///
/// The staged record is always removed again. Concurrent probes sharing a
/// staging collection can see each other's records, but every probe stages
/// under a fresh `ObjectId`, so the acceptance check only ever looks at its
/// own record.
pub struct StagingProbe<'s, S: Store + ?Sized> {
    store: &'s S,
    staging: &'s str,
}

impl<'s, S: Store + ?Sized> StagingProbe<'s, S> {
    pub fn new(store: &'s S, staging: &'s str) -> Self {
        Self { store, staging }
    }

    /// `None` as policy accepts everything without touching the store.
    pub fn accepts(&self, document: &Document, policy: Option<&Document>) -> Result<bool, StoreError> {
        let Some(policy) = policy else {
            return Ok(true);
        };

        let staged = Staged::insert(self.store, self.staging, document)?;
        let id = staged.id.clone();

        let options = FindOptions {
            projection: Some(doc! { "_id": 1 }),
            ..FindOptions::default()
        };
        let matched = self.store.find(self.staging, policy, &options);

        // Cleanup runs whatever the query did; its failure wins.
        let matched = match (matched, staged.release()) {
            (Ok(matched), Ok(())) => matched,
            (Err(err), Ok(())) | (Ok(_), Err(err)) => return Err(err),
            (Err(query), Err(cleanup)) => {
                tracing::warn!(error = %query, "probe query failed");
                return Err(cleanup);
            }
        };

        let accepted = matched.iter().any(|record| record.get("_id") == Some(&id));
        tracing::debug!(staging = self.staging, accepted, "write policy probe");
        Ok(accepted)
    }
}

/// A record sitting in the staging collection. `release` deletes it and
/// reports failure; dropping an unreleased guard still tries the delete.
struct Staged<'s, S: Store + ?Sized> {
    store: &'s S,
    collection: &'s str,
    id: Bson,
    released: bool,
}

impl<'s, S: Store + ?Sized> Staged<'s, S> {
    fn insert(store: &'s S, collection: &'s str, document: &Document) -> Result<Self, StoreError> {
        let mut copy = Document::new();
        copy.insert("_id", ObjectId::new());
        for (key, value) in document {
            if key != "_id" {
                copy.insert(key.clone(), value.clone());
            }
        }

        let id = store.insert_one(collection, copy)?;
        Ok(Self {
            store,
            collection,
            id,
            released: false,
        })
    }

    fn release(mut self) -> Result<(), StoreError> {
        self.released = true;
        self.delete()
    }

    fn delete(&self) -> Result<(), StoreError> {
        self.store
            .delete_many(self.collection, &doc! { "_id": self.id.clone() })
            .map(|_| ())
    }
}

impl<S: Store + ?Sized> Drop for Staged<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.delete() {
            tracing::error!(
                collection = self.collection,
                id = %self.id,
                error = %err,
                "failed to remove staged record"
            );
        }
    }
}
