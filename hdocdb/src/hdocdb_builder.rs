use crate::collection::TieBreak;
use crate::errors::{HDocError, HDocResult};
use crate::hdocdb::HDocDb;
use crate::hdocdb_config::HDocConfig;
use crate::store::{WideColumnStore, WideColumnStoreProvider};

/// Fluent setup of an [HDocDb].
///
/// The first invalid setting is remembered and reported by [HDocBuilder::open]; later
/// settings are ignored once an error is recorded.
///
/// ```ignore
/// let db = HDocDb::builder()
///     .store(InMemoryStore::new())
///     .default_bucket("data")
///     .max_write_retries(8)
///     .open()?;
/// ```
#[derive(Default)]
pub struct HDocBuilder {
    error: Option<HDocError>,
    config: HDocConfig,
}

impl HDocBuilder {
    pub fn new() -> Self {
        HDocBuilder {
            error: None,
            config: HDocConfig::new(),
        }
    }

    fn apply(mut self, setter: impl FnOnce(&HDocConfig) -> HDocResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = setter(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn store<T: WideColumnStoreProvider + 'static>(self, store: T) -> Self {
        self.apply(|config| config.set_store(WideColumnStore::new(store)))
    }

    /// Uses an existing store handle, e.g. one shared with another database.
    pub fn store_handle(self, store: WideColumnStore) -> Self {
        self.apply(|config| config.set_store(store))
    }

    pub fn path_cache_capacity(self, capacity: usize) -> Self {
        self.apply(|config| config.set_path_cache_capacity(capacity))
    }

    pub fn default_bucket(self, bucket: &str) -> Self {
        self.apply(|config| config.set_default_bucket(bucket))
    }

    pub fn stale_index_expiry_ms(self, expiry: u64) -> Self {
        self.apply(|config| config.set_stale_index_expiry_ms(expiry))
    }

    pub fn max_write_retries(self, retries: u32) -> Self {
        self.apply(|config| config.set_max_write_retries(retries))
    }

    pub fn tie_break(self, tie_break: TieBreak) -> Self {
        self.apply(|config| config.set_tie_break(tie_break))
    }

    pub fn scan_batch_hint(self, hint: usize) -> Self {
        self.apply(|config| config.set_scan_batch_hint(hint))
    }

    pub fn plan_cache_capacity(self, capacity: usize) -> Self {
        self.apply(|config| config.set_plan_cache_capacity(capacity))
    }

    pub fn open(self) -> HDocResult<HDocDb> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.auto_configure()?;
        HDocDb::open(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::store::memory::InMemoryStore;

    #[test]
    fn open_with_defaults() {
        let db = HDocBuilder::new().open().unwrap();
        assert_eq!(db.config().default_bucket(), "c");
        assert!(db.config().is_configured());
    }

    #[test]
    fn first_error_is_reported() {
        let result = HDocBuilder::new()
            .default_bucket("")
            .max_write_retries(0)
            .open();
        let err = result.err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(err.message().contains("Bucket name"));
    }

    #[test]
    fn settings_reach_the_database() {
        let db = HDocBuilder::new()
            .store(InMemoryStore::new())
            .tie_break(TieBreak::FewestFields)
            .stale_index_expiry_ms(10)
            .open()
            .unwrap();
        assert_eq!(db.config().tie_break(), TieBreak::FewestFields);
        assert_eq!(db.config().stale_index_expiry_ms(), 10);
        assert!(db.config().set_scan_batch_hint(5).is_err());
    }

    #[test]
    fn two_stores_are_rejected() {
        let result = HDocBuilder::new()
            .store(InMemoryStore::new())
            .store(InMemoryStore::new())
            .open();
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::InvalidOperation);
    }
}
