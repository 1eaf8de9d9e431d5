use super::index_manager::IndexManager;
use super::row_format::{decode_stored, revision_check, write_mutation, StoredDocument};
use crate::collection::Document;
use crate::common::Value;
use crate::condition::Condition;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::fragment::BucketConfig;
use crate::index::key_codec::encode_id;
use crate::mutation::Mutation;
use crate::store::{RowMutation, WideColumnStore};
use std::sync::Arc;

/// What a write does once it has seen the current row.
enum Decision {
    Write(Document),
    Delete,
    Skip,
}

#[derive(Clone)]
pub(crate) struct WriteOperations {
    inner: Arc<WriteOperationsInner>,
}

impl WriteOperations {
    pub fn new(
        collection_name: &str,
        store: WideColumnStore,
        buckets: BucketConfig,
        index_manager: IndexManager,
        max_retries: u32,
    ) -> Self {
        WriteOperations {
            inner: Arc::new(WriteOperationsInner {
                base_table: collection_name.to_string(),
                store,
                buckets,
                index_manager,
                max_retries,
            }),
        }
    }

    /// Inserts `doc`, generating a string `_id` when it has none. Returns the id.
    pub fn insert(&self, mut doc: Document) -> HDocResult<Value> {
        let id = ensure_id(&mut doc);
        self.insert_with_id(id, doc)
    }

    pub fn insert_with_id(&self, id: Value, mut doc: Document) -> HDocResult<Value> {
        doc.set_id(id.clone());
        let table = self.inner.base_table.clone();
        self.inner.commit(&id, |current| match current {
            Some(_) => {
                log::error!("Document {} already exists in {}", id, table);
                Err(HDocError::new(
                    &format!("Document {} already exists in {}", id, table),
                    ErrorKind::DocumentExists,
                ))
            }
            None => Ok(Decision::Write(doc.clone())),
        })?;
        Ok(id)
    }

    pub fn insert_or_replace(&self, mut doc: Document) -> HDocResult<Value> {
        let id = ensure_id(&mut doc);
        self.inner
            .commit(&id, |_| Ok(Decision::Write(doc.clone())))?;
        Ok(id)
    }

    pub fn replace(&self, doc: Document) -> HDocResult<()> {
        let id = require_id(&doc)?;
        let table = self.inner.base_table.clone();
        self.inner.commit(&id, |current| match current {
            Some(_) => Ok(Decision::Write(doc.clone())),
            None => {
                log::error!("Document {} does not exist in {}", id, table);
                Err(HDocError::new(
                    &format!("Document {} does not exist in {}", id, table),
                    ErrorKind::DocumentNotFound,
                ))
            }
        })?;
        Ok(())
    }

    /// Returns whether a document was removed.
    pub fn delete(&self, id: &Value) -> HDocResult<bool> {
        self.inner.commit(id, |current| {
            Ok(match current {
                Some(_) => Decision::Delete,
                None => Decision::Skip,
            })
        })
    }

    /// Applies `mutation` to the stored document, or to an empty one carrying `id`.
    pub fn update(&self, id: &Value, mutation: &Mutation) -> HDocResult<()> {
        self.inner.commit(id, |current| {
            Ok(Decision::Write(mutated(id, current, mutation)?))
        })?;
        Ok(())
    }

    pub fn check_and_mutate(
        &self,
        id: &Value,
        condition: &Condition,
        mutation: &Mutation,
    ) -> HDocResult<bool> {
        self.inner.commit(id, |current| {
            if !holds(condition, current) {
                return Ok(Decision::Skip);
            }
            Ok(Decision::Write(mutated(id, current, mutation)?))
        })
    }

    pub fn check_and_replace(
        &self,
        id: &Value,
        condition: &Condition,
        mut doc: Document,
    ) -> HDocResult<bool> {
        doc.set_id(id.clone());
        self.inner.commit(id, |current| {
            Ok(match holds(condition, current) {
                true => Decision::Write(doc.clone()),
                false => Decision::Skip,
            })
        })
    }

    pub fn check_and_delete(&self, id: &Value, condition: &Condition) -> HDocResult<bool> {
        self.inner.commit(id, |current| {
            Ok(match current {
                Some(doc) if condition.evaluate(doc) => Decision::Delete,
                _ => Decision::Skip,
            })
        })
    }
}

struct WriteOperationsInner {
    base_table: String,
    store: WideColumnStore,
    buckets: BucketConfig,
    index_manager: IndexManager,
    max_retries: u32,
}

impl WriteOperationsInner {
    /// Reads the row of `id`, lets `decide` pick the outcome and commits it under the revision
    /// that was read. A lost race starts over with a fresh read.
    ///
    /// Returns whether anything was written. Index entries are brought in line after the row
    /// itself has changed.
    fn commit<F>(&self, id: &Value, mut decide: F) -> HDocResult<bool>
    where
        F: FnMut(Option<&Document>) -> HDocResult<Decision>,
    {
        let key = encode_id(id)?;
        for attempt in 0..self.max_retries {
            let current = self.read(&key)?;
            let old = current.as_ref().map(|stored| &stored.document);
            let (mutation, new) = match decide(old)? {
                Decision::Skip => return Ok(false),
                Decision::Delete if current.is_none() => return Ok(false),
                Decision::Delete => (RowMutation::new().delete_row(), None),
                Decision::Write(doc) => (write_mutation(&self.buckets, &doc)?, Some(doc)),
            };

            let check = revision_check(current.as_ref());
            if self
                .store
                .check_and_mutate(&self.base_table, &key, check, mutation)?
            {
                self.index_manager.write_entries(id, old, new.as_ref())?;
                return Ok(true);
            }
            log::debug!(
                "Row {} of {} changed during write, retrying (attempt {})",
                id,
                self.base_table,
                attempt + 1
            );
        }

        log::error!(
            "Concurrent modification of {} in {}, gave up after {} attempts",
            id,
            self.base_table,
            self.max_retries
        );
        Err(HDocError::new(
            &format!(
                "Concurrent modification of {} in {}, gave up after {} attempts",
                id, self.base_table, self.max_retries
            ),
            ErrorKind::IOError,
        ))
    }

    fn read(&self, key: &[u8]) -> HDocResult<Option<StoredDocument>> {
        match self.store.get(&self.base_table, key, None)? {
            Some(row) => Ok(Some(decode_stored(&row)?)),
            None => Ok(None),
        }
    }
}

fn ensure_id(doc: &mut Document) -> Value {
    match doc.id() {
        Some(id) => id.clone(),
        None => {
            let id = Value::from(uuid::Uuid::new_v4().to_string());
            doc.set_id(id.clone());
            id
        }
    }
}

fn require_id(doc: &Document) -> HDocResult<Value> {
    match doc.id() {
        Some(id) => Ok(id.clone()),
        None => {
            log::error!("Document has no _id");
            Err(HDocError::new("Document has no _id", ErrorKind::InvalidId))
        }
    }
}

/// A missing document is judged as an empty one.
fn holds(condition: &Condition, current: Option<&Document>) -> bool {
    match current {
        Some(doc) => condition.evaluate(doc),
        None => condition.evaluate(&Document::new()),
    }
}

fn mutated(id: &Value, current: Option<&Document>, mutation: &Mutation) -> HDocResult<Document> {
    let base = match current {
        Some(doc) => doc.clone(),
        None => {
            let mut doc = Document::new();
            doc.set_id(id.clone());
            doc
        }
    };
    let mut updated = mutation.apply(&base)?;
    match updated.id() {
        Some(changed) if changed != id => {
            log::error!("A mutation cannot change _id of {} to {}", id, changed);
            Err(HDocError::new(
                &format!("A mutation cannot change _id of {} to {}", id, changed),
                ErrorKind::InvalidId,
            ))
        }
        Some(_) => Ok(updated),
        None => {
            updated.set_id(id.clone());
            Ok(updated)
        }
    }
}
