use crate::collection::Document;
use crate::common::Value;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// How a query reaches its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanType {
    FullTableScan,
    IndexScan,
}

impl Display for PlanType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanType::FullTableScan => write!(f, "full table scan"),
            PlanType::IndexScan => write!(f, "index scan"),
        }
    }
}

/// Explain output of a query.
///
/// For an executed query the counters reflect what the cursor has consumed so far: index
/// entries scanned and entries found stale, meaning they pointed at rows that no longer match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInfo {
    plan_type: PlanType,
    index_name: Option<String>,
    index_bounds: IndexMap<String, String>,
    scanned_index_entries: usize,
    stale_index_entries: usize,
}

impl QueryInfo {
    pub(crate) fn full_table_scan() -> QueryInfo {
        QueryInfo {
            plan_type: PlanType::FullTableScan,
            index_name: None,
            index_bounds: IndexMap::new(),
            scanned_index_entries: 0,
            stale_index_entries: 0,
        }
    }

    pub(crate) fn index_scan(index_name: &str, index_bounds: IndexMap<String, String>) -> QueryInfo {
        QueryInfo {
            plan_type: PlanType::IndexScan,
            index_name: Some(index_name.to_string()),
            index_bounds,
            scanned_index_entries: 0,
            stale_index_entries: 0,
        }
    }

    pub(crate) fn with_counts(mut self, stats: &ScanStats) -> QueryInfo {
        self.scanned_index_entries = stats.scanned();
        self.stale_index_entries = stats.stale();
        self
    }

    pub fn plan_type(&self) -> PlanType {
        self.plan_type
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// Scanned range per index field, e.g. `"a" -> "[2, 2]"`.
    pub fn index_bounds(&self) -> &IndexMap<String, String> {
        &self.index_bounds
    }

    pub fn scanned_index_entries(&self) -> usize {
        self.scanned_index_entries
    }

    pub fn stale_index_entries(&self) -> usize {
        self.stale_index_entries
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert_field("plan", self.plan_type.to_string());
        if let Some(name) = &self.index_name {
            doc.insert_field("indexName", name.as_str());
            let bounds: Document = self
                .index_bounds
                .iter()
                .map(|(path, range)| (path.clone(), Value::from(range.as_str())))
                .collect();
            doc.insert_field("indexBounds", bounds);
            doc.insert_field("scannedIndexEntries", self.scanned_index_entries as i64);
            doc.insert_field("staleIndexEntries", self.stale_index_entries as i64);
        }
        doc
    }
}

impl Display for QueryInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_document())
    }
}

/// Counters shared between a running index scan and the cursor that reports on it.
#[derive(Debug, Default)]
pub(crate) struct ScanStats {
    scanned: AtomicUsize,
    stale: AtomicUsize,
}

impl ScanStats {
    pub fn new() -> Arc<ScanStats> {
        Arc::new(ScanStats::default())
    }

    pub fn record_scanned(&self) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::Relaxed)
    }

    pub fn stale(&self) -> usize {
        self.stale.load(Ordering::Relaxed)
    }
}
