use crate::catalog::Catalog;
use super::row_format::decode_document;
use crate::collection::Document;
use crate::common::{current_time_millis, Value, INDEX_FAMILY, INDEX_QUALIFIER};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::fragment::{BucketConfig, Projection};
use crate::index::{
    index_key, index_prefix, index_tuples, IndexDefinition, IndexDescriptor, IndexEntry,
    IndexState,
};
use crate::index::key_codec::encode_id;
use crate::store::{RowCheck, RowMutation, ScanRange, WideColumnStore};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Owns the index registry of one collection and keeps index rows in step with document
/// writes.
///
/// Descriptors are cached in declaration order; the catalog is the source of truth and
/// every lifecycle change is written there first, guarded on the state this manager last
/// saw. `version` moves whenever the cached set changes, which is what the planner keys its
/// cache invalidation on.
#[derive(Clone)]
pub(crate) struct IndexManager {
    inner: Arc<IndexManagerInner>,
}

impl IndexManager {
    pub fn new(
        collection_name: &str,
        store: WideColumnStore,
        index_table: &str,
        base_table: &str,
        buckets: BucketConfig,
        catalog: Option<Catalog>,
    ) -> HDocResult<Self> {
        let inner = IndexManagerInner {
            collection_name: collection_name.to_string(),
            store,
            index_table: index_table.to_string(),
            base_table: base_table.to_string(),
            buckets,
            catalog,
            descriptors: RwLock::new(IndexMap::new()),
            version: AtomicU64::new(0),
            lifecycle: Mutex::new(()),
        };
        inner.reload()?;
        Ok(IndexManager {
            inner: Arc::new(inner),
        })
    }

    pub fn index_table(&self) -> &str {
        &self.inner.index_table
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Every index that is not dropped, in declaration order.
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.inner
            .descriptors
            .read()
            .values()
            .filter(|d| d.state() != IndexState::Dropped)
            .cloned()
            .collect()
    }

    /// Indexes the planner may use, in declaration order.
    pub fn active(&self) -> Vec<IndexDescriptor> {
        self.inner
            .descriptors
            .read()
            .values()
            .filter(|d| d.state() == IndexState::Active)
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<IndexDescriptor> {
        self.inner
            .descriptors
            .read()
            .get(name)
            .filter(|d| d.state() != IndexState::Dropped)
            .cloned()
    }

    pub fn write_entries(
        &self,
        id: &Value,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> HDocResult<()> {
        self.inner.write_entries(id, old, new)
    }

    pub fn create_index(&self, definition: IndexDefinition) -> HDocResult<IndexDescriptor> {
        self.inner.create_index(definition)
    }

    pub fn drop_index(&self, name: &str, sync: bool) -> HDocResult<()> {
        self.inner.drop_index(name, sync)
    }

    pub fn run_pending_tasks(&self) -> HDocResult<usize> {
        self.inner.run_pending_tasks()
    }

    pub fn index_size(&self, name: &str) -> HDocResult<usize> {
        self.inner.index_size(name)
    }

    /// Deletes an index row, provided it still holds exactly `payload`.
    pub fn remove_entry(&self, key: &[u8], payload: &[u8]) -> HDocResult<bool> {
        self.inner.store.check_and_mutate(
            &self.inner.index_table,
            key,
            RowCheck::CellEquals {
                family: INDEX_FAMILY.to_string(),
                qualifier: INDEX_QUALIFIER.to_string(),
                expected: Some(payload.to_vec()),
            },
            RowMutation::new().delete_row(),
        )
    }
}

struct IndexManagerInner {
    collection_name: String,
    store: WideColumnStore,
    index_table: String,
    base_table: String,
    buckets: BucketConfig,
    catalog: Option<Catalog>,
    descriptors: RwLock<IndexMap<String, IndexDescriptor>>,
    version: AtomicU64,
    // serializes lifecycle changes made through this handle
    lifecycle: Mutex<()>,
}

impl IndexManagerInner {
    fn reload(&self) -> HDocResult<()> {
        let Some(catalog) = &self.catalog else {
            return Ok(());
        };
        let loaded = catalog.index_descriptors(&self.collection_name)?;
        let mut descriptors = self.descriptors.write();
        descriptors.clear();
        for descriptor in loaded {
            descriptors.insert(descriptor.name().to_string(), descriptor);
        }
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn install(&self, descriptor: IndexDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.name().to_string(), descriptor);
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Brings the entries of `id` from its `old` state to its `new` one.
    ///
    /// Entries are keyed by value and id only, so a writer that commits first but maintains
    /// its entries last can delete the entry of a newer state. Whenever entries were deleted,
    /// the row is read again and the entries of its current state are put back.
    fn write_entries(
        &self,
        id: &Value,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> HDocResult<()> {
        let maintained: Vec<IndexDescriptor> = self
            .descriptors
            .read()
            .values()
            .filter(|d| d.state().is_maintained())
            .cloned()
            .collect();

        let mut written = Vec::new();
        let mut deleted = false;
        for descriptor in maintained {
            let definition = descriptor.definition();
            let old_entries = entry_keys(definition, id, old)?;
            let new_entries = entry_keys(definition, id, new)?;
            for key in old_entries.keys().filter(|key| !new_entries.contains_key(*key)) {
                self.store.delete(&self.index_table, key, None)?;
                deleted = true;
            }
            for (key, values) in &new_entries {
                if !old_entries.contains_key(key) {
                    self.put_entry(key, id, values.clone())?;
                }
            }
            written.push((descriptor, new_entries));
        }

        if deleted {
            self.restore_entries(id, &written)?;
        }
        Ok(())
    }

    fn restore_entries(
        &self,
        id: &Value,
        written: &[(IndexDescriptor, IndexMap<Vec<u8>, Vec<Value>>)],
    ) -> HDocResult<()> {
        let row = self.store.get(&self.base_table, &encode_id(id)?, None)?;
        let Some(row) = row else {
            return Ok(());
        };
        let current = decode_document(&row)?;
        for (descriptor, new_entries) in written {
            let entries = entry_keys(descriptor.definition(), id, Some(&current))?;
            for (key, values) in entries {
                if !new_entries.contains_key(&key) {
                    log::debug!(
                        "Restoring entry of {} in index {} after a concurrent write",
                        id,
                        descriptor.name()
                    );
                    self.put_entry(&key, id, values)?;
                }
            }
        }
        Ok(())
    }

    fn put_entry(&self, key: &[u8], id: &Value, values: Vec<Value>) -> HDocResult<()> {
        let entry = IndexEntry {
            id: id.clone(),
            values,
            timestamp: current_time_millis(),
        };
        self.store.put(&self.index_table, key, vec![entry.to_cell()?])
    }

    fn create_index(&self, definition: IndexDefinition) -> HDocResult<IndexDescriptor> {
        definition.validate()?;
        let _guard = self.lifecycle.lock();

        if self.is_defined(definition.name()) {
            return Err(already_exists(definition.name(), &self.collection_name));
        }
        let descriptor = IndexDescriptor::new(definition.clone(), IndexState::Created);
        if let Some(catalog) = &self.catalog {
            if !catalog.add_index(&self.collection_name, &descriptor)? {
                // defined through another handle in the meantime
                self.reload()?;
                return Err(already_exists(definition.name(), &self.collection_name));
            }
        }
        self.install(descriptor.clone());
        log::info!("Created index {} on {}", definition, self.collection_name);

        let building = self.transition(&descriptor, IndexState::Building)?;
        if definition.is_async() {
            return Ok(building);
        }
        self.build(&building)
    }

    fn is_defined(&self, name: &str) -> bool {
        self.descriptors
            .read()
            .get(name)
            .is_some_and(|d| d.state() != IndexState::Dropped)
    }

    fn drop_index(&self, name: &str, sync: bool) -> HDocResult<()> {
        let _guard = self.lifecycle.lock();
        let descriptor = self
            .descriptors
            .read()
            .get(name)
            .filter(|d| d.state() != IndexState::Dropped)
            .cloned();
        let Some(descriptor) = descriptor else {
            log::error!("Index {} is not defined on {}", name, self.collection_name);
            return Err(HDocError::new(
                &format!("Index {} is not defined on {}", name, self.collection_name),
                ErrorKind::IndexNotFound,
            ));
        };

        let inactive = match descriptor.state() {
            IndexState::Inactive => descriptor,
            _ => self.transition(&descriptor, IndexState::Inactive)?,
        };
        if sync {
            self.purge(&inactive)?;
        }
        Ok(())
    }

    fn run_pending_tasks(&self) -> HDocResult<usize> {
        let _guard = self.lifecycle.lock();
        let pending: Vec<IndexDescriptor> = self
            .descriptors
            .read()
            .values()
            .filter(|d| matches!(d.state(), IndexState::Building | IndexState::Inactive))
            .cloned()
            .collect();

        for descriptor in &pending {
            match descriptor.state() {
                IndexState::Building => {
                    self.build(descriptor)?;
                }
                _ => self.purge(descriptor)?,
            }
        }
        if !pending.is_empty() {
            log::debug!(
                "Ran {} pending index task(s) on {}",
                pending.len(),
                self.collection_name
            );
        }
        Ok(pending.len())
    }

    /// Backfills a building index from the base table and activates it.
    fn build(&self, descriptor: &IndexDescriptor) -> HDocResult<IndexDescriptor> {
        let definition = descriptor.definition();
        let families = self.buckets.buckets_for(&Projection::new(&definition.paths()));
        let scanner = self
            .store
            .scan(&self.base_table, ScanRange::all(), Some(&families))?;

        let mut count = 0usize;
        for row in scanner {
            let doc = decode_document(&row?)?;
            let Some(id) = doc.id().cloned() else {
                log::warn!("Row without identity in {}, skipping", self.base_table);
                continue;
            };
            for (key, values) in entry_keys(definition, &id, Some(&doc))? {
                self.put_entry(&key, &id, values)?;
            }
            count += 1;
        }
        log::info!(
            "Built index {} on {} from {} document(s)",
            definition.name(),
            self.collection_name,
            count
        );
        self.transition(descriptor, IndexState::Active)
    }

    /// Deletes every entry of an inactive index and marks it dropped.
    fn purge(&self, descriptor: &IndexDescriptor) -> HDocResult<()> {
        let prefix = index_prefix(descriptor.name())?;
        let keys: Vec<Vec<u8>> = self
            .store
            .scan(&self.index_table, ScanRange::prefix(&prefix), None)?
            .map(|row| row.map(|r| r.key().to_vec()))
            .collect::<HDocResult<_>>()?;
        for key in &keys {
            self.store.delete(&self.index_table, key, None)?;
        }
        log::info!(
            "Purged {} entr(ies) of index {} on {}",
            keys.len(),
            descriptor.name(),
            self.collection_name
        );
        self.transition(descriptor, IndexState::Dropped)?;
        Ok(())
    }

    fn index_size(&self, name: &str) -> HDocResult<usize> {
        if !self.is_defined(name) {
            log::error!("Index {} is not defined on {}", name, self.collection_name);
            return Err(HDocError::new(
                &format!("Index {} is not defined on {}", name, self.collection_name),
                ErrorKind::IndexNotFound,
            ));
        }
        let prefix = index_prefix(name)?;
        let mut size = 0;
        for row in self
            .store
            .scan(&self.index_table, ScanRange::prefix(&prefix), None)?
        {
            row?;
            size += 1;
        }
        Ok(size)
    }

    fn transition(
        &self,
        descriptor: &IndexDescriptor,
        next: IndexState,
    ) -> HDocResult<IndexDescriptor> {
        let changed = descriptor.with_state(next)?;
        if let Some(catalog) = &self.catalog {
            if !catalog.replace_index(&self.collection_name, descriptor.state(), &changed)? {
                self.reload()?;
                log::error!(
                    "Index {} on {} changed state concurrently",
                    descriptor.name(),
                    self.collection_name
                );
                return Err(HDocError::new(
                    &format!(
                        "Index {} on {} changed state concurrently",
                        descriptor.name(),
                        self.collection_name
                    ),
                    ErrorKind::InvalidIndexState,
                ));
            }
        }
        self.install(changed.clone());
        log::info!(
            "Index {} on {} moved from {} to {}",
            descriptor.name(),
            self.collection_name,
            descriptor.state(),
            next
        );
        Ok(changed)
    }
}

// Entry row keys of a document state, each with its key tuple.
fn entry_keys(
    definition: &IndexDefinition,
    id: &Value,
    doc: Option<&Document>,
) -> HDocResult<IndexMap<Vec<u8>, Vec<Value>>> {
    let mut keys = IndexMap::new();
    if let Some(doc) = doc {
        for values in index_tuples(definition, doc) {
            keys.insert(index_key(definition, &values, id)?, values);
        }
    }
    Ok(keys)
}

fn already_exists(name: &str, collection: &str) -> HDocError {
    log::error!("Index {} already exists on {}", name, collection);
    HDocError::new(
        &format!("Index {} already exists on {}", name, collection),
        ErrorKind::IndexAlreadyExists,
    )
}
