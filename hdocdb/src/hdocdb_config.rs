//! Database-wide settings.

use crate::collection::TieBreak;
use crate::common::{
    DEFAULT_BUCKET, DEFAULT_MAX_WRITE_RETRIES, DEFAULT_PATH_CACHE_CAPACITY,
    DEFAULT_PLAN_CACHE_CAPACITY, DEFAULT_SCAN_BATCH_HINT, DEFAULT_STALE_INDEX_EXPIRY_MS,
};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::fragment::validate_bucket_name;
use crate::store::memory::InMemoryStore;
use crate::store::WideColumnStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Settings of an [HDocDb](crate::HDocDb).
///
/// A config is filled in through [HDocBuilder](crate::HDocBuilder) and frozen when the
/// database opens; any setter called afterwards fails with `InvalidOperation`. Clones share
/// the same settings.
#[derive(Clone)]
pub struct HDocConfig {
    inner: Arc<HDocConfigInner>,
}

impl Default for HDocConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HDocConfig {
    pub fn new() -> Self {
        HDocConfig {
            inner: Arc::new(HDocConfigInner::new()),
        }
    }

    pub fn path_cache_capacity(&self) -> usize {
        self.inner.path_cache_capacity.load(Ordering::Relaxed)
    }

    pub fn set_path_cache_capacity(&self, capacity: usize) -> HDocResult<()> {
        self.inner.check_mutable("Path cache capacity")?;
        self.inner.path_cache_capacity.store(capacity, Ordering::Relaxed);
        Ok(())
    }

    /// Column family used for fields no bucket prefix claims.
    pub fn default_bucket(&self) -> String {
        self.inner.default_bucket.read().clone()
    }

    pub fn set_default_bucket(&self, bucket: &str) -> HDocResult<()> {
        self.inner.check_mutable("Default bucket")?;
        validate_bucket_name(bucket)?;
        *self.inner.default_bucket.write() = bucket.to_string();
        Ok(())
    }

    /// Age in milliseconds after which an index entry pointing at a missing row is removed.
    pub fn stale_index_expiry_ms(&self) -> u64 {
        self.inner.stale_index_expiry_ms.load(Ordering::Relaxed)
    }

    pub fn set_stale_index_expiry_ms(&self, expiry: u64) -> HDocResult<()> {
        self.inner.check_mutable("Stale index expiry")?;
        self.inner.stale_index_expiry_ms.store(expiry, Ordering::Relaxed);
        Ok(())
    }

    /// How many times a write re-reads its row after losing a race.
    pub fn max_write_retries(&self) -> u32 {
        self.inner.max_write_retries.load(Ordering::Relaxed)
    }

    pub fn set_max_write_retries(&self, retries: u32) -> HDocResult<()> {
        self.inner.check_mutable("Write retry bound")?;
        if retries == 0 {
            log::error!("Write retry bound must be at least 1");
            return Err(HDocError::new(
                "Write retry bound must be at least 1",
                ErrorKind::ValidationError,
            ));
        }
        self.inner.max_write_retries.store(retries, Ordering::Relaxed);
        Ok(())
    }

    pub fn tie_break(&self) -> TieBreak {
        *self.inner.tie_break.read()
    }

    pub fn set_tie_break(&self, tie_break: TieBreak) -> HDocResult<()> {
        self.inner.check_mutable("Planner tie-break")?;
        *self.inner.tie_break.write() = tie_break;
        Ok(())
    }

    /// Index entries read ahead per batch before their rows are fetched.
    pub fn scan_batch_hint(&self) -> usize {
        self.inner.scan_batch_hint.load(Ordering::Relaxed)
    }

    pub fn set_scan_batch_hint(&self, hint: usize) -> HDocResult<()> {
        self.inner.check_mutable("Scan batch hint")?;
        self.inner.scan_batch_hint.store(hint.max(1), Ordering::Relaxed);
        Ok(())
    }

    pub fn plan_cache_capacity(&self) -> usize {
        self.inner.plan_cache_capacity.load(Ordering::Relaxed)
    }

    pub fn set_plan_cache_capacity(&self, capacity: usize) -> HDocResult<()> {
        self.inner.check_mutable("Plan cache capacity")?;
        self.inner.plan_cache_capacity.store(capacity, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_store(&self, store: WideColumnStore) -> HDocResult<()> {
        self.inner.check_mutable("Store")?;
        if self.inner.store.set(store).is_err() {
            log::error!("A store is already configured");
            return Err(HDocError::new(
                "A store is already configured",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    /// The configured store. Fails before the database is opened when none was set.
    pub fn store(&self) -> HDocResult<WideColumnStore> {
        match self.inner.store.get() {
            Some(store) => Ok(store.clone()),
            None => {
                log::error!("No store is configured");
                Err(HDocError::new("No store is configured", ErrorKind::InvalidOperation))
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Fills in an in-memory store when none was set, then freezes the settings.
    pub(crate) fn auto_configure(&self) -> HDocResult<()> {
        if self.is_configured() {
            log::error!("Configuration is already initialized");
            return Err(HDocError::new(
                "Configuration is already initialized",
                ErrorKind::InvalidOperation,
            ));
        }
        if self.inner.store.get().is_none() {
            log::debug!("No store configured, using an in-memory store");
            // a concurrent set_store wins; either way a store is present afterwards
            let _ = self.inner.store.set(WideColumnStore::new(InMemoryStore::new()));
        }
        self.inner.configured.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct HDocConfigInner {
    configured: AtomicBool,
    path_cache_capacity: AtomicUsize,
    default_bucket: RwLock<String>,
    stale_index_expiry_ms: AtomicU64,
    max_write_retries: AtomicU32,
    tie_break: RwLock<TieBreak>,
    scan_batch_hint: AtomicUsize,
    plan_cache_capacity: AtomicUsize,
    store: OnceLock<WideColumnStore>,
}

impl HDocConfigInner {
    fn new() -> Self {
        HDocConfigInner {
            configured: AtomicBool::from(false),
            path_cache_capacity: AtomicUsize::new(DEFAULT_PATH_CACHE_CAPACITY),
            default_bucket: RwLock::new(DEFAULT_BUCKET.to_string()),
            stale_index_expiry_ms: AtomicU64::new(DEFAULT_STALE_INDEX_EXPIRY_MS),
            max_write_retries: AtomicU32::new(DEFAULT_MAX_WRITE_RETRIES),
            tie_break: RwLock::new(TieBreak::default()),
            scan_batch_hint: AtomicUsize::new(DEFAULT_SCAN_BATCH_HINT),
            plan_cache_capacity: AtomicUsize::new(DEFAULT_PLAN_CACHE_CAPACITY),
            store: OnceLock::new(),
        }
    }

    fn check_mutable(&self, setting: &str) -> HDocResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after initialization", setting);
            return Err(HDocError::new(
                &format!("{} cannot be changed after initialization", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
