use chrono::{DateTime, Utc};
use hdocdb::collection::{Document, DocumentCollection};
use hdocdb::doc;
use hdocdb::errors::{ErrorKind, HDocError, HDocResult};
use hdocdb::hdocdb::HDocDb;
use hdocdb::hdocdb_builder::HDocBuilder;
use hdocdb::store::memory::InMemoryStore;
use hdocdb::store::{CellPut, Row, RowCheck, RowMutation, RowScanner, ScanRange, WideColumnStoreProvider};
use parking_lot::RwLock;
use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Runs a test between `before` and `after`, retrying once on failure and reporting the
/// last error with its backtrace.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> HDocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> HDocResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> HDocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_ATTEMPTS: u32 = 2;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx)
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();
        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e);
                last_backtrace = Some(bt);
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());
            }
        }

        if attempt < MAX_ATTEMPTS {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_ATTEMPTS, elapsed
            );
            eprintln!("{}", last_error.as_deref().unwrap_or("Unknown"));
            thread::sleep(Duration::from_millis(50 * attempt as u64));
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_ATTEMPTS,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    db: HDocDb,
    faults: FaultSwitch,
}

impl TestContext {
    pub fn new(db: HDocDb, faults: FaultSwitch) -> Self {
        Self { db, faults }
    }

    pub fn db(&self) -> HDocDb {
        self.db.clone()
    }

    /// Controls the store under [TestContext::db].
    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }
}

/// A database over an in-memory store wrapped in a [FailingStore].
pub fn create_test_context() -> HDocResult<TestContext> {
    create_test_context_with(|builder| builder)
}

/// Like [create_test_context], with extra builder settings.
pub fn create_test_context_with<F>(configure: F) -> HDocResult<TestContext>
where
    F: FnOnce(HDocBuilder) -> HDocBuilder,
{
    let faults = FaultSwitch::new();
    let store = FailingStore::new(InMemoryStore::new(), faults.clone());
    let db = configure(HDocDb::builder().store(store)).open()?;
    Ok(TestContext::new(db, faults))
}

pub fn cleanup(ctx: TestContext) -> HDocResult<()> {
    ctx.faults().clear();
    ctx.db().close()
}

/// A collection name no other test uses.
pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

pub fn create_test_docs() -> Vec<Document> {
    let joined = |s: &str| s.parse::<DateTime<Utc>>().unwrap_or_default();

    vec![
        doc! {
            _id: "u1",
            first_name: "fn1",
            last_name: "ln1",
            age: 31,
            joined: (joined("2012-07-01T00:15:22Z")),
            address: { city: "Oslo", zip: 1001 },
            tags: ["admin", "ops"],
        },
        doc! {
            _id: "u2",
            first_name: "fn2",
            last_name: "ln2",
            age: 25,
            joined: (joined("2010-06-12T06:35:35Z")),
            address: { city: "Bergen", zip: 5003 },
            tags: ["dev"],
        },
        doc! {
            _id: "u3",
            first_name: "fn3",
            last_name: "ln2",
            age: 47,
            joined: (joined("2014-04-18T02:25:44Z")),
            address: { city: "Oslo", zip: 1005 },
            tags: [],
        },
    ]
}

pub fn insert_test_documents(collection: &DocumentCollection) -> HDocResult<()> {
    for doc in create_test_docs() {
        collection.insert(doc)?;
    }
    Ok(())
}

pub fn is_sorted<T: PartialOrd>(iterable: impl IntoIterator<Item = T>, ascending: bool) -> bool {
    let mut iter = iterable.into_iter();
    if let Some(mut prev) = iter.next() {
        for current in iter {
            let in_order = if ascending {
                prev <= current
            } else {
                prev >= current
            };
            if !in_order {
                return false;
            }
            prev = current;
        }
    }
    true
}

/// Switches shared between a test and its [FailingStore].
#[derive(Clone, Default)]
pub struct FaultSwitch {
    inner: Arc<FaultSwitchInner>,
}

#[derive(Default)]
struct FaultSwitchInner {
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    // only tables starting with this prefix fail, when set
    table_prefix: RwLock<Option<String>>,
    injected: AtomicUsize,
}

impl FaultSwitch {
    pub fn new() -> Self {
        FaultSwitch::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Restricts injected faults to tables whose name starts with `prefix`.
    pub fn only_tables(&self, prefix: &str) {
        *self.inner.table_prefix.write() = Some(prefix.to_string());
    }

    pub fn clear(&self) {
        self.fail_reads(false);
        self.fail_writes(false);
        *self.inner.table_prefix.write() = None;
    }

    /// How many operations failed on purpose so far.
    pub fn injected(&self) -> usize {
        self.inner.injected.load(Ordering::SeqCst)
    }

    fn check(&self, table: &str, write: bool) -> HDocResult<()> {
        let armed = if write {
            self.inner.fail_writes.load(Ordering::SeqCst)
        } else {
            self.inner.fail_reads.load(Ordering::SeqCst)
        };
        let targeted = match &*self.inner.table_prefix.read() {
            Some(prefix) => table.starts_with(prefix.as_str()),
            None => true,
        };
        if armed && targeted {
            self.inner.injected.fetch_add(1, Ordering::SeqCst);
            let kind = if write { "write" } else { "read" };
            log::warn!("Injecting {} fault on {}", kind, table);
            return Err(HDocError::new(
                &format!("Injected {} fault on {}", kind, table),
                ErrorKind::IOError,
            ));
        }
        Ok(())
    }
}

/// Store wrapper that fails reads or writes on demand with `IOError`.
pub struct FailingStore {
    inner: InMemoryStore,
    faults: FaultSwitch,
}

impl FailingStore {
    pub fn new(inner: InMemoryStore, faults: FaultSwitch) -> Self {
        FailingStore { inner, faults }
    }
}

impl WideColumnStoreProvider for FailingStore {
    fn create_table(&self, table: &str) -> HDocResult<()> {
        self.inner.create_table(table)
    }

    fn table_exists(&self, table: &str) -> HDocResult<bool> {
        self.inner.table_exists(table)
    }

    fn drop_table(&self, table: &str) -> HDocResult<()> {
        self.inner.drop_table(table)
    }

    fn list_tables(&self) -> HDocResult<Vec<String>> {
        self.inner.list_tables()
    }

    fn get(&self, table: &str, key: &[u8], families: Option<&[String]>) -> HDocResult<Option<Row>> {
        self.faults.check(table, false)?;
        self.inner.get(table, key, families)
    }

    fn put(&self, table: &str, key: &[u8], cells: Vec<CellPut>) -> HDocResult<()> {
        self.faults.check(table, true)?;
        self.inner.put(table, key, cells)
    }

    fn delete(&self, table: &str, key: &[u8], families: Option<&[String]>) -> HDocResult<()> {
        self.faults.check(table, true)?;
        self.inner.delete(table, key, families)
    }

    fn scan(
        &self,
        table: &str,
        range: ScanRange,
        families: Option<&[String]>,
    ) -> HDocResult<RowScanner> {
        self.faults.check(table, false)?;
        self.inner.scan(table, range, families)
    }

    fn check_and_mutate(
        &self,
        table: &str,
        key: &[u8],
        check: RowCheck,
        mutation: RowMutation,
    ) -> HDocResult<bool> {
        self.faults.check(table, true)?;
        self.inner.check_and_mutate(table, key, check, mutation)
    }

    fn close(&self) -> HDocResult<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
