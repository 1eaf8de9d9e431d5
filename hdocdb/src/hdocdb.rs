use crate::catalog::Catalog;
use crate::collection::{index_table_name, CollectionOptions, DocumentCollection};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::fragment::BucketConfig;
use crate::hdocdb_builder::HDocBuilder;
use crate::hdocdb_config::HDocConfig;
use crate::path::PathCompiler;
use crate::store::WideColumnStore;
use dashmap::DashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The database: a set of document collections stored in one wide-column store.
///
/// `HDocDb` is a cheap-clone handle; every clone shares the same store, configuration,
/// catalog and open collections. Collections are created on first access and their bucket
/// layout and index definitions are kept in a catalog table, so a database reopened over the
/// same store sees them again.
///
/// # Examples
///
/// ```rust,ignore
/// use hdocdb::{doc, HDocDb};
///
/// let db = HDocDb::builder().open()?;
/// let users = db.collection("users")?;
/// let id = users.insert(doc! { name: "ann", age: 31 })?;
/// assert!(users.find_by_id(id, None)?.is_some());
/// db.close()?;
/// ```
#[derive(Clone)]
pub struct HDocDb {
    inner: Arc<HDocDbInner>,
}

impl HDocDb {
    pub fn builder() -> HDocBuilder {
        HDocBuilder::new()
    }

    pub(crate) fn open(config: HDocConfig) -> HDocResult<HDocDb> {
        Ok(HDocDb {
            inner: Arc::new(HDocDbInner::new(config)?),
        })
    }

    /// Gets a collection by name, creating it with default options if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is closed or the name is empty or starts with `_`,
    /// which is reserved for internal tables.
    pub fn collection(&self, name: &str) -> HDocResult<DocumentCollection> {
        self.inner.collection(name, CollectionOptions::new())
    }

    /// Gets or creates a collection with explicit options.
    ///
    /// Buckets given here must equal the layout the collection was created with. A tie-break
    /// override only applies when this call opens the collection.
    pub fn collection_with_options(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> HDocResult<DocumentCollection> {
        self.inner.collection(name, options)
    }

    pub fn has_collection(&self, name: &str) -> HDocResult<bool> {
        self.inner.check_opened()?;
        self.inner.catalog.contains(name)
    }

    /// Names of all collections, in key order.
    pub fn list_collections(&self) -> HDocResult<Vec<String>> {
        self.inner.check_opened()?;
        self.inner.catalog.collection_names()
    }

    /// Drops a collection with its documents and indexes. Handles to it become unusable.
    pub fn drop_collection(&self, name: &str) -> HDocResult<()> {
        self.inner.drop_collection(name)
    }

    /// Closes the underlying store. Later operations fail with `StoreAlreadyClosed`.
    pub fn close(&self) -> HDocResult<()> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed) || self.inner.store.is_closed()
    }

    pub fn config(&self) -> HDocConfig {
        self.inner.config.clone()
    }

    pub fn store(&self) -> WideColumnStore {
        self.inner.store.clone()
    }
}

impl Debug for HDocDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HDocDb")
            .field("open_collections", &self.inner.collections.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct HDocDbInner {
    config: HDocConfig,
    store: WideColumnStore,
    compiler: Arc<PathCompiler>,
    catalog: Catalog,
    collections: DashMap<String, DocumentCollection>,
    closed: AtomicBool,
}

impl HDocDbInner {
    fn new(config: HDocConfig) -> HDocResult<Self> {
        let store = config.store()?;
        if store.is_closed() {
            log::error!("Cannot open a database over a closed store");
            return Err(HDocError::new(
                "Cannot open a database over a closed store",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        let compiler = Arc::new(PathCompiler::new(config.path_cache_capacity()));
        let catalog = Catalog::open(store.clone(), &config, compiler.clone())?;
        log::info!("Database opened with default bucket {}", config.default_bucket());

        Ok(HDocDbInner {
            config,
            store,
            compiler,
            catalog,
            collections: DashMap::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn collection(&self, name: &str, options: CollectionOptions) -> HDocResult<DocumentCollection> {
        self.check_opened()?;
        validate_collection_name(name)?;

        let collection = self
            .collections
            .entry(name.to_string())
            .or_try_insert_with(|| self.open_collection(name, &options))?
            .value()
            .clone();

        if let Some(buckets) = &options.buckets {
            if buckets != collection.buckets() {
                log::error!("Collection {} is open with another bucket layout", name);
                return Err(HDocError::new(
                    &format!("Collection {} is open with another bucket layout", name),
                    ErrorKind::ValidationError,
                ));
            }
        }
        Ok(collection)
    }

    fn open_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> HDocResult<DocumentCollection> {
        let requested = match &options.buckets {
            Some(buckets) => buckets.clone(),
            None => BucketConfig::new(&self.config.default_bucket()),
        };
        let buckets =
            self.catalog
                .register_collection(name, &requested, options.buckets.is_some())?;
        let tie_break = options.tie_break.unwrap_or_else(|| self.config.tie_break());
        log::debug!("Opening collection {} ({} tie-break)", name, tie_break);

        DocumentCollection::open(
            name,
            self.store.clone(),
            &self.config,
            self.compiler.clone(),
            buckets,
            tie_break,
            Some(self.catalog.clone()),
        )
    }

    fn drop_collection(&self, name: &str) -> HDocResult<()> {
        self.check_opened()?;
        if !self.catalog.contains(name)? {
            log::error!("Collection {} does not exist", name);
            return Err(HDocError::new(
                &format!("Collection {} does not exist", name),
                ErrorKind::CollectionNotFound,
            ));
        }

        if let Some((_, collection)) = self.collections.remove(name) {
            collection.mark_dropped();
        }
        self.store.drop_table(name)?;
        self.store.drop_table(&index_table_name(name))?;
        self.catalog.remove_collection(name)?;
        log::info!("Dropped collection {}", name);
        Ok(())
    }

    fn close(&self) -> HDocResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        self.collections.clear();
        if !self.store.is_closed() {
            self.store.close()?;
        }
        log::info!("Database closed");
        Ok(())
    }

    fn check_opened(&self) -> HDocResult<()> {
        if self.closed.load(Ordering::Relaxed) || self.store.is_closed() {
            log::error!("Database is closed");
            return Err(HDocError::new(
                "Database is closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }
}

fn validate_collection_name(name: &str) -> HDocResult<()> {
    if name.is_empty() {
        log::error!("Collection name cannot be empty");
        return Err(HDocError::new(
            "Collection name cannot be empty",
            ErrorKind::ValidationError,
        ));
    }
    // internal tables start with an underscore
    if name.starts_with('_') {
        log::error!("Collection name {} is reserved", name);
        return Err(HDocError::new(
            &format!("Collection name {} is reserved", name),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}
