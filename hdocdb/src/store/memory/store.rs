use super::table::{InMemoryTable, TableScanner};
use crate::common::DEFAULT_ROW_LOCK_STRIPES;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::store::{
    CellPut, Row, RowCheck, RowMutation, RowScanner, ScanRange, WideColumnStoreProvider,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory implementation of [WideColumnStoreProvider].
///
/// # Purpose
/// Backs tests and embedded use where nothing needs to survive the process. Each table is a
/// concurrent skip list of rows and every row write is atomic.
///
/// # Usage
/// ```text
/// let store = WideColumnStore::new(InMemoryStore::new());
/// store.create_table("users")?;
/// store.put("users", b"u1", vec![CellPut::new("c", "d", bytes)])?;
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::with_lock_stripes(DEFAULT_ROW_LOCK_STRIPES)
    }

    /// Number of row locks per table. Rows whose keys hash to the same stripe serialize
    /// their writes against each other.
    pub fn with_lock_stripes(stripes: usize) -> InMemoryStore {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner {
                tables: DashMap::new(),
                closed: Arc::new(AtomicBool::new(false)),
                stripes,
            }),
        }
    }

    /// Number of rows currently held by `table`.
    pub fn row_count(&self, table: &str) -> HDocResult<usize> {
        Ok(self.inner.table(table)?.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::new()
    }
}

impl WideColumnStoreProvider for InMemoryStore {
    fn create_table(&self, table: &str) -> HDocResult<()> {
        self.inner.create_table(table)
    }

    fn table_exists(&self, table: &str) -> HDocResult<bool> {
        self.inner.check_opened()?;
        Ok(self.inner.tables.contains_key(table))
    }

    fn drop_table(&self, table: &str) -> HDocResult<()> {
        self.inner.check_opened()?;
        if let Some((_, dropped)) = self.inner.tables.remove(table) {
            dropped.mark_dropped();
            log::debug!("Dropped table {}", dropped.name());
        }
        Ok(())
    }

    fn list_tables(&self) -> HDocResult<Vec<String>> {
        self.inner.check_opened()?;
        let mut names: Vec<String> = self
            .inner
            .tables
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn get(&self, table: &str, key: &[u8], families: Option<&[String]>) -> HDocResult<Option<Row>> {
        Ok(self.inner.table(table)?.get(key, families))
    }

    fn put(&self, table: &str, key: &[u8], cells: Vec<CellPut>) -> HDocResult<()> {
        self.inner.table(table)?.put(key, cells);
        Ok(())
    }

    fn delete(&self, table: &str, key: &[u8], families: Option<&[String]>) -> HDocResult<()> {
        self.inner.table(table)?.delete(key, families);
        Ok(())
    }

    fn scan(
        &self,
        table: &str,
        range: ScanRange,
        families: Option<&[String]>,
    ) -> HDocResult<RowScanner> {
        let table = self.inner.table(table)?;
        Ok(RowScanner::new(TableScanner::new(
            table,
            self.inner.closed.clone(),
            range,
            families.map(|f| f.to_vec()),
        )))
    }

    fn check_and_mutate(
        &self,
        table: &str,
        key: &[u8],
        check: RowCheck,
        mutation: RowMutation,
    ) -> HDocResult<bool> {
        Ok(self.inner.table(table)?.check_and_mutate(key, &check, mutation))
    }

    fn close(&self) -> HDocResult<()> {
        if !self.inner.closed.swap(true, Ordering::Relaxed) {
            for entry in self.inner.tables.iter() {
                entry.value().mark_dropped();
            }
            self.inner.tables.clear();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

struct InMemoryStoreInner {
    tables: DashMap<String, Arc<InMemoryTable>>,
    closed: Arc<AtomicBool>,
    stripes: usize,
}

impl InMemoryStoreInner {
    fn check_opened(&self) -> HDocResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Store is already closed");
            return Err(HDocError::new(
                "Store is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn create_table(&self, name: &str) -> HDocResult<()> {
        self.check_opened()?;
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryTable::new(name, self.stripes)));
        Ok(())
    }

    fn table(&self, name: &str) -> HDocResult<Arc<InMemoryTable>> {
        self.check_opened()?;
        match self.tables.get(name) {
            Some(table) => Ok(table.value().clone()),
            None => {
                log::error!("Table {} does not exist", name);
                Err(HDocError::new(
                    &format!("Table {} does not exist", name),
                    ErrorKind::IOError,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WideColumnStore;
    use std::thread;

    fn store_with(table: &str) -> WideColumnStore {
        let store = WideColumnStore::new(InMemoryStore::new());
        store.create_table(table).unwrap();
        store
    }

    #[test]
    fn put_get_with_family_filter() {
        let store = store_with("t");
        store
            .put(
                "t",
                b"k",
                vec![CellPut::new("a", "x", vec![1]), CellPut::new("b", "y", vec![2])],
            )
            .unwrap();

        let row = store.get("t", b"k", None).unwrap().unwrap();
        assert_eq!(row.cells().len(), 2);
        let only_b = store
            .get("t", b"k", Some(&["b".to_string()][..]))
            .unwrap()
            .unwrap();
        assert_eq!(only_b.cells().len(), 1);
        assert_eq!(only_b.value("b", "y"), Some(&[2u8][..]));
        assert!(store.get("t", b"k", Some(&["z".to_string()][..])).unwrap().is_none());
    }

    #[test]
    fn deleting_last_family_removes_row() {
        let store = store_with("t");
        store.put("t", b"k", vec![CellPut::new("a", "x", vec![1])]).unwrap();
        store.delete("t", b"k", Some(&["a".to_string()][..])).unwrap();
        assert!(store.get("t", b"k", None).unwrap().is_none());
    }

    #[test]
    fn scan_honours_bounds_and_order() {
        let store = store_with("t");
        for key in [b"a", b"b", b"c", b"d"] {
            store.put("t", key, vec![CellPut::new("f", "q", key.to_vec())]).unwrap();
        }
        let keys: Vec<Vec<u8>> = store
            .scan("t", ScanRange::new(Some(b"b".to_vec()), Some(b"d".to_vec())), None)
            .unwrap()
            .map(|row| row.unwrap().key().to_vec())
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn check_and_mutate_guards() {
        let store = store_with("t");
        let put = RowMutation::new().put("m", "v", vec![1]);
        assert!(store
            .check_and_mutate("t", b"k", RowCheck::RowAbsent, put.clone())
            .unwrap());
        assert!(!store
            .check_and_mutate("t", b"k", RowCheck::RowAbsent, put)
            .unwrap());

        let stale = RowCheck::CellEquals {
            family: "m".to_string(),
            qualifier: "v".to_string(),
            expected: Some(vec![0]),
        };
        let bump = RowMutation::new().put("m", "v", vec![2]);
        assert!(!store.check_and_mutate("t", b"k", stale, bump.clone()).unwrap());

        let current = RowCheck::CellEquals {
            family: "m".to_string(),
            qualifier: "v".to_string(),
            expected: Some(vec![1]),
        };
        assert!(store.check_and_mutate("t", b"k", current, bump).unwrap());
        let row = store.get("t", b"k", None).unwrap().unwrap();
        assert_eq!(row.value("m", "v"), Some(&[2u8][..]));
    }

    #[test]
    fn mutation_applies_row_delete_before_puts() {
        let store = store_with("t");
        store
            .put("t", b"k", vec![CellPut::new("a", "x", vec![1]), CellPut::new("b", "x", vec![1])])
            .unwrap();
        let mutation = RowMutation::new()
            .delete_row()
            .put("c", "x", vec![3]);
        assert!(store.check_and_mutate("t", b"k", RowCheck::None, mutation).unwrap());
        let row = store.get("t", b"k", None).unwrap().unwrap();
        assert_eq!(row.families().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn concurrent_cas_increments_are_not_lost() {
        let store = store_with("t");
        store.put("t", b"n", vec![CellPut::new("m", "v", 0u64.to_be_bytes().to_vec())]).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    let mut done = 0;
                    while done < 50 {
                        let row = store.get("t", b"n", None).unwrap().unwrap();
                        let current = row.value("m", "v").unwrap().to_vec();
                        let next = u64::from_be_bytes(current.clone().try_into().unwrap()) + 1;
                        let check = RowCheck::CellEquals {
                            family: "m".to_string(),
                            qualifier: "v".to_string(),
                            expected: Some(current),
                        };
                        let mutation = RowMutation::new().put("m", "v", next.to_be_bytes().to_vec());
                        if store.check_and_mutate("t", b"n", check, mutation).unwrap() {
                            done += 1;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let row = store.get("t", b"n", None).unwrap().unwrap();
        let value = u64::from_be_bytes(row.value("m", "v").unwrap().try_into().unwrap());
        assert_eq!(value, 200);
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = store_with("t");
        store.put("t", b"a", vec![CellPut::new("f", "q", vec![])]).unwrap();
        let mut scan = store.scan("t", ScanRange::all(), None).unwrap();
        store.close().unwrap();
        assert!(store.is_closed());

        let err = store.get("t", b"a", None).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
        assert!(scan.next().is_none());
    }

    #[test]
    fn missing_table_is_an_io_error() {
        let store = WideColumnStore::new(InMemoryStore::new());
        let err = store.get("nope", b"a", None).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IOError);
    }
}
