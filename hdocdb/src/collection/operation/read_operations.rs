use super::find_optimizer::{FindOptimizer, FindPlan};
use super::index_manager::IndexManager;
use super::row_format::decode_document;
use crate::collection::{Document, FindOptions, QueryInfo, ScanStats};
use crate::common::stream::{DocumentCursor, DocumentStream};
use crate::common::{current_time_millis, Value, INDEX_FAMILY, INDEX_QUALIFIER};
use crate::condition::Condition;
use crate::errors::HDocResult;
use crate::fragment::{BucketConfig, Projection};
use crate::index::key_codec::encode_id;
use crate::index::IndexEntry;
use crate::path::{FieldPath, PathCompiler};
use crate::store::{RowScanner, WideColumnStore};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct ReadOperations {
    inner: Arc<ReadOperationsInner>,
}

pub(crate) struct ReadSettings {
    pub scan_batch_hint: usize,
    pub stale_index_expiry_ms: u64,
}

impl ReadOperations {
    pub fn new(
        collection_name: &str,
        store: WideColumnStore,
        buckets: BucketConfig,
        index_manager: IndexManager,
        optimizer: FindOptimizer,
        compiler: Arc<PathCompiler>,
        settings: ReadSettings,
    ) -> Self {
        ReadOperations {
            inner: Arc::new(ReadOperationsInner {
                base_table: collection_name.to_string(),
                store,
                buckets,
                index_manager,
                optimizer,
                compiler,
                settings,
            }),
        }
    }

    pub fn find_by_id(
        &self,
        id: &Value,
        projection: Option<&[&str]>,
    ) -> HDocResult<Option<Document>> {
        let inner = &self.inner;
        let key = encode_id(id)?;
        let paths = match projection {
            Some(paths) => Some(inner.compile_all(paths.iter().copied())?),
            None => None,
        };
        let projection = paths.as_deref().map(Projection::new);
        let families = projection.as_ref().map(|p| inner.buckets.buckets_for(p));

        let Some(row) = inner.store.get(&inner.base_table, &key, families.as_deref())? else {
            return Ok(None);
        };
        let doc = decode_document(&row)?;
        Ok(Some(match &projection {
            Some(projection) => projection.apply(&doc),
            None => doc,
        }))
    }

    pub fn find(&self, condition: Condition, options: &FindOptions) -> HDocResult<DocumentCursor> {
        let plan = self.inner.plan(&condition, options)?;
        let query_info = plan.query_info();
        let (projection, families) = self.inner.fetch_scope(&condition, options)?;
        let stats = ScanStats::new();

        let stream: DocumentStream = match plan.index() {
            None => {
                let scanner = self.inner.store.scan(
                    &self.inner.base_table,
                    crate::store::ScanRange::all(),
                    families.as_deref(),
                )?;
                Box::new(TableScanStream {
                    scanner,
                    condition,
                    projection,
                })
            }
            Some(_) => {
                let entries = self.inner.store.scan(
                    self.inner.index_manager.index_table(),
                    plan.scan_range()?,
                    None,
                )?;
                Box::new(IndexScanStream {
                    ops: self.inner.clone(),
                    bound_leaves: plan.bound_leaves(),
                    plan,
                    entries,
                    condition,
                    projection,
                    families,
                    stats: stats.clone(),
                    seen: HashSet::new(),
                    ready: VecDeque::new(),
                    exhausted: false,
                })
            }
        };
        Ok(DocumentCursor::new(stream, query_info, stats, options.limit))
    }

    pub fn explain(&self, condition: &Condition, options: &FindOptions) -> HDocResult<QueryInfo> {
        Ok(self.inner.plan(condition, options)?.query_info())
    }
}

struct ReadOperationsInner {
    base_table: String,
    store: WideColumnStore,
    buckets: BucketConfig,
    index_manager: IndexManager,
    optimizer: FindOptimizer,
    compiler: Arc<PathCompiler>,
    settings: ReadSettings,
}

impl ReadOperationsInner {
    fn plan(&self, condition: &Condition, options: &FindOptions) -> HDocResult<Arc<FindPlan>> {
        // read the version first so a concurrent change can only make the plan look older
        let version = self.index_manager.version();
        let active = self.index_manager.active();
        self.optimizer
            .create_find_plan(condition, &options.hint, &active, version)
    }

    fn compile_all<'a>(&self, paths: impl Iterator<Item = &'a str>) -> HDocResult<Vec<FieldPath>> {
        paths.map(|p| self.compiler.compile(p)).collect()
    }

    /// The projection to apply and the families to fetch: those of the projection plus
    /// whatever the condition reads.
    fn fetch_scope(
        &self,
        condition: &Condition,
        options: &FindOptions,
    ) -> HDocResult<(Option<Projection>, Option<Vec<String>>)> {
        let Some(paths) = &options.projection else {
            return Ok((None, None));
        };
        let mut requested = self.compile_all(paths.iter().map(String::as_str))?;
        let projection = Projection::new(&requested);
        requested.extend(condition.condition_paths());
        let families = self.buckets.buckets_for(&Projection::new(&requested));
        Ok((Some(projection), Some(families)))
    }
}

fn project(doc: Document, projection: &Option<Projection>) -> Document {
    match projection {
        Some(projection) => projection.apply(&doc),
        None => doc,
    }
}

/// Evaluates the condition against every row of the base table.
struct TableScanStream {
    scanner: RowScanner,
    condition: Condition,
    projection: Option<Projection>,
}

impl Iterator for TableScanStream {
    type Item = HDocResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.scanner.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            let doc = match decode_document(&row) {
                Ok(doc) => doc,
                Err(e) => {
                    self.scanner.close();
                    return Some(Err(e));
                }
            };
            if self.condition.evaluate(&doc) {
                return Some(Ok(project(doc, &self.projection)));
            }
        }
    }
}

/// Walks index entries in key order and fetches their rows a batch at a time.
///
/// Entries whose recorded values fall outside the bounds are skipped. An entry whose row no
/// longer satisfies the bounds is stale: it is counted and removed. An entry whose row is
/// gone is counted, and removed once it is older than the configured expiry, since a
/// concurrent insert may not have written its row yet.
struct IndexScanStream {
    ops: Arc<ReadOperationsInner>,
    plan: Arc<FindPlan>,
    bound_leaves: Vec<Condition>,
    entries: RowScanner,
    condition: Condition,
    projection: Option<Projection>,
    families: Option<Vec<String>>,
    stats: Arc<ScanStats>,
    seen: HashSet<Vec<u8>>,
    ready: VecDeque<Document>,
    exhausted: bool,
}

struct Candidate {
    key: Vec<u8>,
    payload: Vec<u8>,
    entry: IndexEntry,
}

impl IndexScanStream {
    fn fill(&mut self) -> HDocResult<()> {
        let mut batch = Vec::with_capacity(self.ops.settings.scan_batch_hint);
        while batch.len() < self.ops.settings.scan_batch_hint {
            let Some(row) = self.entries.next() else {
                self.exhausted = true;
                break;
            };
            let row = row?;
            let Some(payload) = row.value(INDEX_FAMILY, INDEX_QUALIFIER) else {
                log::warn!("Index row without payload, skipping");
                continue;
            };
            let entry = IndexEntry::decode(payload)?;
            if !self.within_bounds(&entry) {
                continue;
            }
            self.stats.record_scanned();
            batch.push(Candidate {
                key: row.key().to_vec(),
                payload: payload.to_vec(),
                entry,
            });
        }

        for candidate in batch {
            self.resolve(candidate)?;
        }
        Ok(())
    }

    fn within_bounds(&self, entry: &IndexEntry) -> bool {
        let Some(index) = self.plan.index() else {
            return true;
        };
        let mut indexed = Document::new();
        for (field, value) in index.definition().fields().iter().zip(&entry.values) {
            if indexed.set_path(field.path(), value.clone()).is_err() {
                // cannot rebuild the recorded values; let the row decide
                return true;
            }
        }
        self.bound_leaves.iter().all(|leaf| leaf.evaluate(&indexed))
    }

    fn resolve(&mut self, candidate: Candidate) -> HDocResult<()> {
        let ops = &self.ops;
        let id_key = encode_id(&candidate.entry.id)?;
        if !self.seen.insert(id_key.clone()) {
            return Ok(());
        }

        let row = ops
            .store
            .get(&ops.base_table, &id_key, self.families.as_deref())?;
        let Some(row) = row else {
            self.stats.record_stale();
            let age = current_time_millis() - candidate.entry.timestamp;
            log::warn!(
                "Index entry for {} points at a missing row ({} ms old)",
                candidate.entry.id,
                age
            );
            if age > ops.settings.stale_index_expiry_ms as i64 {
                ops.index_manager
                    .remove_entry(&candidate.key, &candidate.payload)?;
            }
            return Ok(());
        };

        let doc = decode_document(&row)?;
        if !self.bound_leaves.iter().all(|leaf| leaf.evaluate(&doc)) {
            self.stats.record_stale();
            log::warn!(
                "Stale index entry for {} no longer matches its bounds",
                candidate.entry.id
            );
            ops.index_manager
                .remove_entry(&candidate.key, &candidate.payload)?;
            return Ok(());
        }
        if self.condition.evaluate(&doc) {
            self.ready.push_back(project(doc, &self.projection));
        }
        Ok(())
    }
}

impl Iterator for IndexScanStream {
    type Item = HDocResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.ready.pop_front() {
                return Some(Ok(doc));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fill() {
                self.exhausted = true;
                self.ready.clear();
                self.entries.close();
                return Some(Err(e));
            }
        }
    }
}
