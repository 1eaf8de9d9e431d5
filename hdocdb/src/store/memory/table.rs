use crate::common::current_time_millis;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::store::{Cell, CellPut, Row, RowCheck, RowMutation, RowScannerProvider, ScanRange};
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct StoredCell {
    value: Vec<u8>,
    timestamp: i64,
}

type StoredRow = BTreeMap<(String, String), StoredCell>;

/// One table of the in-memory store.
///
/// Rows live in a skip list and are replaced whole on every write, so readers always see a
/// complete row. Writers to the same row are serialized through a striped lock.
pub(crate) struct InMemoryTable {
    name: String,
    rows: SkipMap<Vec<u8>, StoredRow>,
    locks: Vec<Mutex<()>>,
    dropped: AtomicBool,
}

impl InMemoryTable {
    pub(crate) fn new(name: &str, stripes: usize) -> Self {
        InMemoryTable {
            name: name.to_string(),
            rows: SkipMap::new(),
            locks: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            dropped: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Relaxed);
        self.rows.clear();
    }

    fn lock_for(&self, key: &[u8]) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let stripe = (hasher.finish() % self.locks.len() as u64) as usize;
        &self.locks[stripe]
    }

    pub(crate) fn get(&self, key: &[u8], families: Option<&[String]>) -> Option<Row> {
        let entry = self.rows.get(key)?;
        to_row(key, entry.value(), families)
    }

    pub(crate) fn put(&self, key: &[u8], cells: Vec<CellPut>) {
        let _guard = self.lock_for(key).lock();
        let mut row = self.current(key);
        write_cells(&mut row, cells);
        self.store(key, row);
    }

    pub(crate) fn delete(&self, key: &[u8], families: Option<&[String]>) {
        let _guard = self.lock_for(key).lock();
        match families {
            None => {
                self.rows.remove(key);
            }
            Some(families) => {
                let mut row = self.current(key);
                row.retain(|(family, _), _| !families.contains(family));
                self.store(key, row);
            }
        }
    }

    pub(crate) fn check_and_mutate(
        &self,
        key: &[u8],
        check: &RowCheck,
        mutation: RowMutation,
    ) -> bool {
        let _guard = self.lock_for(key).lock();
        let mut row = self.current(key);

        let passed = match check {
            RowCheck::None => true,
            RowCheck::RowAbsent => row.is_empty(),
            RowCheck::CellEquals {
                family,
                qualifier,
                expected,
            } => {
                let actual = row.get(&(family.clone(), qualifier.clone()));
                actual.map(|cell| &cell.value) == expected.as_ref()
            }
        };
        if !passed {
            return false;
        }

        if mutation.delete_row {
            row.clear();
        }
        if !mutation.delete_families.is_empty() {
            row.retain(|(family, _), _| !mutation.delete_families.contains(family));
        }
        write_cells(&mut row, mutation.puts);
        self.store(key, row);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    fn current(&self, key: &[u8]) -> StoredRow {
        self.rows
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn store(&self, key: &[u8], row: StoredRow) {
        if row.is_empty() {
            self.rows.remove(key);
        } else {
            self.rows.insert(key.to_vec(), row);
        }
    }
}

fn write_cells(row: &mut StoredRow, cells: Vec<CellPut>) {
    let timestamp = current_time_millis();
    for cell in cells {
        row.insert(
            (cell.family, cell.qualifier),
            StoredCell {
                value: cell.value,
                timestamp,
            },
        );
    }
}

fn to_row(key: &[u8], stored: &StoredRow, families: Option<&[String]>) -> Option<Row> {
    let cells: Vec<Cell> = stored
        .iter()
        .filter(|((family, _), _)| families.map_or(true, |wanted| wanted.contains(family)))
        .map(|((family, qualifier), cell)| Cell {
            family: family.clone(),
            qualifier: qualifier.clone(),
            value: cell.value.clone(),
            timestamp: cell.timestamp,
        })
        .collect();
    if cells.is_empty() {
        None
    } else {
        Some(Row::new(key.to_vec(), cells))
    }
}

/// Lazy scan over an [InMemoryTable].
///
/// Each step seeks past the last returned key, so rows written during the scan may or may
/// not be seen, but no row is returned twice.
pub(crate) struct TableScanner {
    table: Arc<InMemoryTable>,
    store_closed: Arc<AtomicBool>,
    range: ScanRange,
    families: Option<Vec<String>>,
    last: Option<Vec<u8>>,
    done: bool,
}

impl TableScanner {
    pub(crate) fn new(
        table: Arc<InMemoryTable>,
        store_closed: Arc<AtomicBool>,
        range: ScanRange,
        families: Option<Vec<String>>,
    ) -> Self {
        TableScanner {
            table,
            store_closed,
            range,
            families,
            last: None,
            done: false,
        }
    }
}

impl RowScannerProvider for TableScanner {
    fn next_row(&mut self) -> Option<HDocResult<Row>> {
        loop {
            if self.done || self.table.dropped.load(Ordering::Relaxed) {
                return None;
            }
            if self.store_closed.load(Ordering::Relaxed) {
                self.done = true;
                log::error!("Store is closed, scan of {} aborted", self.table.name);
                return Some(Err(HDocError::new(
                    &format!("Store is closed, scan of {} aborted", self.table.name),
                    ErrorKind::StoreAlreadyClosed,
                )));
            }

            let lower = match (&self.last, &self.range.start) {
                (Some(last), _) => Excluded(last.clone()),
                (None, Some(start)) => Included(start.clone()),
                (None, None) => Unbounded,
            };
            let Some(entry) = self.table.rows.range((lower, Unbounded)).next() else {
                self.done = true;
                return None;
            };

            let key = entry.key().clone();
            if let Some(stop) = &self.range.stop {
                if &key >= stop {
                    self.done = true;
                    return None;
                }
            }
            let row = to_row(&key, entry.value(), self.families.as_deref());
            self.last = Some(key);
            if let Some(row) = row {
                return Some(Ok(row));
            }
        }
    }

    fn close(&mut self) {
        self.done = true;
    }
}
