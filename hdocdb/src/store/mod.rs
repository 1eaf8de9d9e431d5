//! The wide-column store contract the engine is written against.
//!
//! A store holds named tables. Each table is a sorted map from byte row keys to rows, and a
//! row is a set of cells addressed by `(family, qualifier)`. The engine needs only per-row
//! reads and writes, forward range scans and one atomic conditional row operation.

mod iters;
pub mod memory;

pub use iters::*;

use crate::errors::HDocResult;
use std::ops::Deref;
use std::sync::Arc;

/// One stored cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub family: String,
    pub qualifier: String,
    pub value: Vec<u8>,
    /// Milliseconds since the unix epoch at which the cell was written.
    pub timestamp: i64,
}

/// A row as returned by a read: its key and cells sorted by family then qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    key: Vec<u8>,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(key: Vec<u8>, mut cells: Vec<Cell>) -> Self {
        cells.sort_by(|a, b| (&a.family, &a.qualifier).cmp(&(&b.family, &b.qualifier)));
        Row { key, cells }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, family: &str, qualifier: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|c| c.family == family && c.qualifier == qualifier)
    }

    pub fn value(&self, family: &str, qualifier: &str) -> Option<&[u8]> {
        self.cell(family, qualifier).map(|c| c.value.as_slice())
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        let mut last: Option<&str> = None;
        self.cells.iter().filter_map(move |c| {
            if last == Some(c.family.as_str()) {
                None
            } else {
                last = Some(c.family.as_str());
                last
            }
        })
    }
}

/// A cell write inside a [RowMutation].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPut {
    pub family: String,
    pub qualifier: String,
    pub value: Vec<u8>,
}

impl CellPut {
    pub fn new(family: &str, qualifier: &str, value: Vec<u8>) -> Self {
        CellPut {
            family: family.to_string(),
            qualifier: qualifier.to_string(),
            value,
        }
    }
}

/// The guard of a [WideColumnStoreProvider::check_and_mutate] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowCheck {
    /// Always passes.
    None,
    /// Passes when the row has no cells at all.
    RowAbsent,
    /// Passes when the cell holds `expected`, or is missing when `expected` is `None`.
    CellEquals {
        family: String,
        qualifier: String,
        expected: Option<Vec<u8>>,
    },
}

/// Changes applied to one row as a unit.
///
/// Application order is fixed: a whole-row delete first, then family deletes, then puts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMutation {
    pub puts: Vec<CellPut>,
    pub delete_families: Vec<String>,
    pub delete_row: bool,
}

impl RowMutation {
    pub fn new() -> Self {
        RowMutation::default()
    }

    pub fn put(mut self, family: &str, qualifier: &str, value: Vec<u8>) -> Self {
        self.puts.push(CellPut::new(family, qualifier, value));
        self
    }

    pub fn delete_family(mut self, family: &str) -> Self {
        self.delete_families.push(family.to_string());
        self
    }

    pub fn delete_row(mut self) -> Self {
        self.delete_row = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.delete_families.is_empty() && !self.delete_row
    }
}

/// Row key bounds of a scan: `start` inclusive, `stop` exclusive, `None` unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRange {
    pub start: Option<Vec<u8>>,
    pub stop: Option<Vec<u8>>,
}

impl ScanRange {
    pub fn all() -> Self {
        ScanRange::default()
    }

    pub fn new(start: Option<Vec<u8>>, stop: Option<Vec<u8>>) -> Self {
        ScanRange { start, stop }
    }

    /// Every key that starts with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        ScanRange {
            start: Some(prefix.to_vec()),
            stop: prefix_successor(prefix),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.as_deref().map_or(true, |start| key >= start)
            && self.stop.as_deref().map_or(true, |stop| key < stop)
    }
}

/// The smallest key greater than every key starting with `prefix`, if one exists.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(last) = successor.pop() {
        if last < u8::MAX {
            successor.push(last + 1);
            return Some(successor);
        }
    }
    None
}

/// Backend contract for wide-column stores.
///
/// Every operation is synchronous and may block on I/O. Implementations must make
/// `check_and_mutate` linearizable per row; nothing else is atomic across calls.
pub trait WideColumnStoreProvider: Send + Sync {
    /// Creates a table; creating an existing table is a no-op.
    fn create_table(&self, table: &str) -> HDocResult<()>;

    fn table_exists(&self, table: &str) -> HDocResult<bool>;

    fn drop_table(&self, table: &str) -> HDocResult<()>;

    fn list_tables(&self) -> HDocResult<Vec<String>>;

    /// Reads a row, keeping only `families` when given. A row without matching cells is `None`.
    fn get(&self, table: &str, key: &[u8], families: Option<&[String]>) -> HDocResult<Option<Row>>;

    fn put(&self, table: &str, key: &[u8], cells: Vec<CellPut>) -> HDocResult<()>;

    /// Deletes the given families of a row, or the whole row when `families` is `None`.
    fn delete(&self, table: &str, key: &[u8], families: Option<&[String]>) -> HDocResult<()>;

    /// Forward scan over `range`, in key order.
    fn scan(
        &self,
        table: &str,
        range: ScanRange,
        families: Option<&[String]>,
    ) -> HDocResult<RowScanner>;

    /// Atomically evaluates `check` against the row and applies `mutation` when it passes.
    fn check_and_mutate(
        &self,
        table: &str,
        key: &[u8],
        check: RowCheck,
        mutation: RowMutation,
    ) -> HDocResult<bool>;

    fn close(&self) -> HDocResult<()>;

    fn is_closed(&self) -> bool;
}

/// Cheap-clone handle over a [WideColumnStoreProvider].
#[derive(Clone)]
pub struct WideColumnStore {
    inner: Arc<dyn WideColumnStoreProvider>,
}

impl WideColumnStore {
    pub fn new<T: WideColumnStoreProvider + 'static>(inner: T) -> Self {
        WideColumnStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for WideColumnStore {
    type Target = Arc<dyn WideColumnStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_skips_saturated_bytes() {
        assert_eq!(prefix_successor(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(prefix_successor(&[1, 0xFF]), Some(vec![2]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(&[]), None);
    }

    #[test]
    fn prefix_range_contains_extensions_only() {
        let range = ScanRange::prefix(b"ab");
        assert!(range.contains(b"ab"));
        assert!(range.contains(b"ab\xFF\xFF"));
        assert!(!range.contains(b"ac"));
        assert!(!range.contains(b"aa\xFF"));
    }

    #[test]
    fn row_sorts_cells_and_lists_families() {
        let cell = |family: &str, qualifier: &str| Cell {
            family: family.to_string(),
            qualifier: qualifier.to_string(),
            value: vec![],
            timestamp: 0,
        };
        let row = Row::new(
            b"k".to_vec(),
            vec![cell("c", "d"), cell("_m", "v"), cell("c", "a")],
        );
        assert_eq!(row.families().collect::<Vec<_>>(), vec!["_m", "c"]);
        assert_eq!(row.cells()[1].qualifier, "a");
        assert!(row.cell("c", "d").is_some());
        assert!(row.value("x", "d").is_none());
    }
}
