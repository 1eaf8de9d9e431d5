use super::operation::{FindOptimizer, IndexManager, ReadOperations, ReadSettings, WriteOperations};
use super::{Document, FindOptions, QueryInfo, TieBreak};
use crate::catalog::Catalog;
use crate::common::stream::DocumentCursor;
use crate::common::{Value, INDEX_TABLE_PREFIX};
use crate::condition::Condition;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::fragment::BucketConfig;
use crate::hdocdb_config::HDocConfig;
use crate::index::{IndexDefinition, IndexDescriptor};
use crate::mutation::Mutation;
use crate::path::PathCompiler;
use crate::store::WideColumnStore;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named set of documents keyed by `_id`.
///
/// Every document lives in one row of the collection's base table, split into one column
/// family per bucket. Secondary index entries live in a separate table. Handles are cheap to
/// clone and share state.
///
/// Single-document operations are atomic: each one reads the row, decides, and commits
/// under the revision it read, retrying when another writer got there first. Index entries
/// are written right after the row, so a concurrent index scan may briefly see an entry that
/// no longer matches; such entries are skipped and reported by [QueryInfo].
#[derive(Clone)]
pub struct DocumentCollection {
    inner: Arc<DocumentCollectionInner>,
}

impl DocumentCollection {
    pub(crate) fn open(
        name: &str,
        store: WideColumnStore,
        config: &HDocConfig,
        compiler: Arc<PathCompiler>,
        buckets: BucketConfig,
        tie_break: TieBreak,
        catalog: Option<Catalog>,
    ) -> HDocResult<Self> {
        let index_table = index_table_name(name);
        store.create_table(name)?;
        store.create_table(&index_table)?;

        let index_manager = IndexManager::new(
            name,
            store.clone(),
            &index_table,
            name,
            buckets.clone(),
            catalog,
        )?;
        let optimizer = FindOptimizer::new(tie_break, config.plan_cache_capacity());
        let read_operations = ReadOperations::new(
            name,
            store.clone(),
            buckets.clone(),
            index_manager.clone(),
            optimizer.clone(),
            compiler,
            ReadSettings {
                scan_batch_hint: config.scan_batch_hint(),
                stale_index_expiry_ms: config.stale_index_expiry_ms(),
            },
        );
        let write_operations = WriteOperations::new(
            name,
            store.clone(),
            buckets.clone(),
            index_manager.clone(),
            config.max_write_retries(),
        );

        Ok(DocumentCollection {
            inner: Arc::new(DocumentCollectionInner {
                name: name.to_string(),
                store,
                buckets,
                tie_break,
                index_manager,
                optimizer,
                read_operations,
                write_operations,
                dropped: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn buckets(&self) -> &BucketConfig {
        &self.inner.buckets
    }

    pub fn tie_break(&self) -> TieBreak {
        self.inner.tie_break
    }

    /// Inserts a document and returns its id. A string id is generated when `_id` is absent.
    pub fn insert(&self, doc: Document) -> HDocResult<Value> {
        self.inner.ensure_opened()?;
        self.inner.write_operations.insert(doc)
    }

    /// Inserts `doc` under `id`, which replaces any `_id` the document carries.
    pub fn insert_with_id<V: Into<Value>>(&self, id: V, doc: Document) -> HDocResult<Value> {
        self.inner.ensure_opened()?;
        self.inner.write_operations.insert_with_id(id.into(), doc)
    }

    pub fn insert_or_replace(&self, doc: Document) -> HDocResult<Value> {
        self.inner.ensure_opened()?;
        self.inner.write_operations.insert_or_replace(doc)
    }

    /// Replaces the stored document with the same `_id`; fails with `DocumentNotFound` when
    /// there is none.
    pub fn replace(&self, doc: Document) -> HDocResult<()> {
        self.inner.ensure_opened()?;
        self.inner.write_operations.replace(doc)
    }

    /// Deletes a document. Returns `false` when there was nothing to delete.
    pub fn delete<V: Into<Value>>(&self, id: V) -> HDocResult<bool> {
        self.inner.ensure_opened()?;
        self.inner.write_operations.delete(&id.into())
    }

    /// Applies `mutation` to a document, creating it when it does not exist.
    pub fn update<V: Into<Value>>(&self, id: V, mutation: &Mutation) -> HDocResult<()> {
        self.inner.ensure_opened()?;
        self.inner.write_operations.update(&id.into(), mutation)
    }

    pub fn find_by_id<V: Into<Value>>(
        &self,
        id: V,
        projection: Option<&[&str]>,
    ) -> HDocResult<Option<Document>> {
        self.inner.ensure_opened()?;
        self.inner.read_operations.find_by_id(&id.into(), projection)
    }

    /// Lazily finds the documents matching `condition`, or every document when it is `None`.
    pub fn find(
        &self,
        condition: Option<Condition>,
        options: FindOptions,
    ) -> HDocResult<DocumentCursor> {
        self.inner.ensure_opened()?;
        self.inner
            .read_operations
            .find(condition.unwrap_or_else(Condition::all), &options)
    }

    pub fn find_one(
        &self,
        condition: Option<Condition>,
        options: FindOptions,
    ) -> HDocResult<Option<Document>> {
        let mut cursor = self.find(condition, options.limit(1))?;
        cursor.next().transpose()
    }

    /// The plan `find` would use, without running it.
    pub fn explain(
        &self,
        condition: Option<Condition>,
        options: FindOptions,
    ) -> HDocResult<QueryInfo> {
        self.inner.ensure_opened()?;
        self.inner
            .read_operations
            .explain(&condition.unwrap_or_else(Condition::all), &options)
    }

    /// Applies `mutation` only if the stored document satisfies `condition`, atomically.
    ///
    /// A missing document is judged as an empty one, and created when the condition holds.
    pub fn check_and_mutate<V: Into<Value>>(
        &self,
        id: V,
        condition: &Condition,
        mutation: &Mutation,
    ) -> HDocResult<bool> {
        self.inner.ensure_opened()?;
        self.inner
            .write_operations
            .check_and_mutate(&id.into(), condition, mutation)
    }

    pub fn check_and_replace<V: Into<Value>>(
        &self,
        id: V,
        condition: &Condition,
        doc: Document,
    ) -> HDocResult<bool> {
        self.inner.ensure_opened()?;
        self.inner
            .write_operations
            .check_and_replace(&id.into(), condition, doc)
    }

    pub fn check_and_delete<V: Into<Value>>(
        &self,
        id: V,
        condition: &Condition,
    ) -> HDocResult<bool> {
        self.inner.ensure_opened()?;
        self.inner
            .write_operations
            .check_and_delete(&id.into(), condition)
    }

    /// Defines an index. Synchronous definitions are built and active on return;
    /// asynchronous ones wait for [DocumentCollection::run_pending_index_tasks].
    pub fn create_index(&self, definition: IndexDefinition) -> HDocResult<IndexDescriptor> {
        self.inner.ensure_opened()?;
        let descriptor = self.inner.index_manager.create_index(definition)?;
        self.inner.optimizer.invalidate_cache();
        Ok(descriptor)
    }

    /// Takes an index out of use. Its entries are purged now when `sync`, otherwise by the
    /// next [DocumentCollection::run_pending_index_tasks].
    pub fn drop_index(&self, name: &str, sync: bool) -> HDocResult<()> {
        self.inner.ensure_opened()?;
        self.inner.index_manager.drop_index(name, sync)?;
        self.inner.optimizer.invalidate_cache();
        Ok(())
    }

    pub fn list_indexes(&self) -> HDocResult<Vec<IndexDescriptor>> {
        self.inner.ensure_opened()?;
        Ok(self.inner.index_manager.descriptors())
    }

    pub fn get_index(&self, name: &str) -> HDocResult<Option<IndexDescriptor>> {
        self.inner.ensure_opened()?;
        Ok(self.inner.index_manager.get(name))
    }

    /// Number of entries currently stored for an index.
    pub fn index_size(&self, name: &str) -> HDocResult<usize> {
        self.inner.ensure_opened()?;
        self.inner.index_manager.index_size(name)
    }

    /// Builds pending indexes and purges dropped ones. Returns how many were processed.
    pub fn run_pending_index_tasks(&self) -> HDocResult<usize> {
        self.inner.ensure_opened()?;
        let processed = self.inner.index_manager.run_pending_tasks()?;
        if processed > 0 {
            self.inner.optimizer.invalidate_cache();
        }
        Ok(processed)
    }

    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_dropped(&self) {
        self.inner.dropped.store(true, Ordering::Relaxed);
    }
}

impl Debug for DocumentCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCollection")
            .field("name", &self.inner.name)
            .field("buckets", &self.inner.buckets)
            .field("dropped", &self.is_dropped())
            .finish()
    }
}

pub(crate) fn index_table_name(collection: &str) -> String {
    format!("{}{}", INDEX_TABLE_PREFIX, collection)
}

struct DocumentCollectionInner {
    name: String,
    store: WideColumnStore,
    buckets: BucketConfig,
    tie_break: TieBreak,
    index_manager: IndexManager,
    optimizer: FindOptimizer,
    read_operations: ReadOperations,
    write_operations: WriteOperations,
    dropped: AtomicBool,
}

impl DocumentCollectionInner {
    fn ensure_opened(&self) -> HDocResult<()> {
        if self.dropped.load(Ordering::Relaxed) {
            log::error!("Collection {} is dropped", self.name);
            return Err(HDocError::new(
                &format!("Collection {} is dropped", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        if self.store.is_closed() {
            log::error!("Store is closed; cannot access collection {}", self.name);
            return Err(HDocError::new(
                &format!("Store is closed; cannot access collection {}", self.name),
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }
}
