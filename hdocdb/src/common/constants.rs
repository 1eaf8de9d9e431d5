/// Reserved top-level field holding a document's identity.
pub const DOC_ID: &str = "_id";

/// Default column-family bucket for fields no configured prefix claims.
pub const DEFAULT_BUCKET: &str = "c";

/// Table holding per-collection catalog documents.
pub const CATALOG_TABLE: &str = "_CATALOG_";
/// Prefix of the table holding a collection's index entries.
pub const INDEX_TABLE_PREFIX: &str = "_IDX_";
/// Field of a catalog document listing index definitions.
pub const CATALOG_INDEXES: &str = "indexes";
/// Field of a catalog document holding the bucket configuration.
pub const CATALOG_BUCKETS: &str = "buckets";

// reserved physical column families and qualifiers
pub const META_FAMILY: &str = "_m";
pub const VERSION_QUALIFIER: &str = "v";
pub const FRAGMENT_QUALIFIER: &str = "d";
pub const INDEX_FAMILY: &str = "i";
pub const INDEX_QUALIFIER: &str = "e";

pub const DEFAULT_STALE_INDEX_EXPIRY_MS: u64 = 5_000;
pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 16;
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 1_024;
pub const DEFAULT_PLAN_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_ROW_LOCK_STRIPES: usize = 64;
pub const DEFAULT_SCAN_BATCH_HINT: usize = 64;
