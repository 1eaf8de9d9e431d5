//! Splits documents into per-bucket fragments and rebuilds them.
//!
//! A collection maps field-path prefixes to named buckets, each stored as its own column
//! family. Every leaf of a document (a scalar or an empty container) becomes one
//! [FragmentCell] carrying its full path and its position in document order. A leaf is routed
//! by the field names on its path to the bucket with the longest matching prefix, or to the
//! default bucket when no prefix matches. The identity field always lives in the default
//! bucket.
//!
//! Reassembly replays the cells of whatever buckets were fetched in their original order,
//! which restores field order and array density, then prunes the result to the requested
//! projection.

mod projection;

pub use projection::Projection;

use crate::collection::walker::{self, SetMode};
use crate::collection::Document;
use crate::common::{Value, CATALOG_BUCKETS, DEFAULT_BUCKET, DOC_ID};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::{compile, FieldPath, Segment};
use std::collections::BTreeMap;

/// One step of a stored leaf path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PathStep {
    Field(String),
    Index(u32),
}

/// A single leaf of a document as it is written inside a fragment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FragmentCell {
    /// Position of the leaf in a depth-first walk of the document.
    pub ordinal: u32,
    pub path: Vec<PathStep>,
    pub value: Value,
}

impl FragmentCell {
    fn field_names(&self) -> Vec<&str> {
        self.path
            .iter()
            .filter_map(|step| match step {
                PathStep::Field(name) => Some(name.as_str()),
                PathStep::Index(_) => None,
            })
            .collect()
    }

    fn field_path(&self) -> FieldPath {
        FieldPath::from_segments(self.path.iter().map(|step| match step {
            PathStep::Field(name) => Segment::Field(name.clone()),
            PathStep::Index(index) => Segment::Index(*index as usize),
        }))
    }
}

/// Per-collection routing of field paths to buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    default_bucket: String,
    // (field route, bucket); routes only hold field names
    routes: Vec<(Vec<String>, String)>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig::new(DEFAULT_BUCKET)
    }
}

impl BucketConfig {
    pub fn new(default_bucket: &str) -> Self {
        BucketConfig {
            default_bucket: default_bucket.to_string(),
            routes: Vec::new(),
        }
    }

    /// Routes everything under `prefix` to `bucket`.
    ///
    /// The prefix must be a non-empty path of field names. Bucket names starting with `_` are
    /// reserved.
    pub fn with_bucket(mut self, prefix: &str, bucket: &str) -> HDocResult<Self> {
        validate_bucket_name(bucket)?;
        let path = compile(prefix)?;
        if path.is_root() || path.segments().iter().any(|s| s.as_field().is_none()) {
            return Err(invalid(&format!(
                "Bucket prefix '{}' must be a non-empty path of field names",
                prefix
            )));
        }
        if path.top_field() == Some(DOC_ID) {
            return Err(invalid("The identity field cannot be routed to a bucket"));
        }

        let route: Vec<String> = path.field_names().iter().map(|s| s.to_string()).collect();
        if self.routes.iter().any(|(existing, _)| *existing == route) {
            return Err(invalid(&format!(
                "Bucket prefix '{}' is configured twice",
                prefix
            )));
        }
        self.routes.push((route, bucket.to_string()));
        Ok(self)
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    /// Every bucket name, default first, without duplicates.
    pub fn buckets(&self) -> Vec<String> {
        let mut names = vec![self.default_bucket.clone()];
        for (_, bucket) in &self.routes {
            if !names.contains(bucket) {
                names.push(bucket.clone());
            }
        }
        names
    }

    /// The bucket a leaf with these field names is stored in.
    pub fn bucket_for(&self, field_names: &[&str]) -> &str {
        if field_names.first() == Some(&DOC_ID) {
            return &self.default_bucket;
        }
        self.routes
            .iter()
            .filter(|(route, _)| {
                route.len() <= field_names.len()
                    && route.iter().zip(field_names.iter()).all(|(a, b)| a == b)
            })
            .max_by_key(|(route, _)| route.len())
            .map(|(_, bucket)| bucket.as_str())
            .unwrap_or(&self.default_bucket)
    }

    /// Buckets that may hold data for `projection`. The default bucket is always included.
    pub fn buckets_for(&self, projection: &Projection) -> Vec<String> {
        if projection.is_everything() {
            return self.buckets();
        }
        let mut names = vec![self.default_bucket.clone()];
        for (route, bucket) in &self.routes {
            let route: Vec<&str> = route.iter().map(|s| s.as_str()).collect();
            if !names.contains(bucket) && projection.touches(&route) {
                names.push(bucket.clone());
            }
        }
        names
    }

    /// Splits `doc` into one serialized fragment per bucket that holds data.
    pub fn fragment(&self, doc: &Document) -> HDocResult<BTreeMap<String, Vec<u8>>> {
        let mut leaves = Vec::new();
        let mut path = Vec::new();
        for (key, value) in doc.iter() {
            path.push(PathStep::Field(key.clone()));
            collect_leaves(value, &mut path, &mut leaves)?;
            path.pop();
        }

        let mut grouped: BTreeMap<String, Vec<FragmentCell>> = BTreeMap::new();
        for cell in leaves {
            let bucket = self.bucket_for(&cell.field_names()).to_string();
            grouped.entry(bucket).or_default().push(cell);
        }

        let mut fragments = BTreeMap::new();
        for (bucket, cells) in grouped {
            let bytes = bincode::serde::encode_to_vec(&cells, bincode::config::legacy())?;
            fragments.insert(bucket, bytes);
        }
        Ok(fragments)
    }

    /// Bucket layout as stored in the catalog.
    pub(crate) fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert_field("default", self.default_bucket.as_str());
        let routes: Vec<Value> = self
            .routes
            .iter()
            .map(|(route, bucket)| {
                let mut entry = Document::new();
                entry.insert_field("prefix", route.join("."));
                entry.insert_field("bucket", bucket.as_str());
                Value::Map(entry)
            })
            .collect();
        doc.insert_field(CATALOG_BUCKETS, routes);
        doc
    }

    pub(crate) fn from_document(doc: &Document) -> HDocResult<Self> {
        let default = doc
            .field("default")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("Stored bucket layout has no default bucket"))?;
        let mut config = BucketConfig::new(default);
        if let Some(Value::Array(routes)) = doc.field(CATALOG_BUCKETS) {
            for route in routes {
                let entry = route
                    .as_map()
                    .ok_or_else(|| invalid("Stored bucket route is not a document"))?;
                let prefix = entry.field("prefix").and_then(Value::as_str);
                let bucket = entry.field("bucket").and_then(Value::as_str);
                match (prefix, bucket) {
                    (Some(prefix), Some(bucket)) => config = config.with_bucket(prefix, bucket)?,
                    _ => return Err(invalid("Stored bucket route is incomplete")),
                }
            }
        }
        Ok(config)
    }
}

fn collect_leaves(
    value: &Value,
    path: &mut Vec<PathStep>,
    leaves: &mut Vec<FragmentCell>,
) -> HDocResult<()> {
    match value {
        Value::Map(doc) if !doc.is_empty() => {
            for (key, child) in doc.iter() {
                path.push(PathStep::Field(key.clone()));
                collect_leaves(child, path, leaves)?;
                path.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                path.push(PathStep::Index(cell_number(index, "array index")?));
                collect_leaves(child, path, leaves)?;
                path.pop();
            }
        }
        leaf => leaves.push(FragmentCell {
            ordinal: cell_number(leaves.len(), "leaf count")?,
            path: path.clone(),
            value: leaf.clone(),
        }),
    }
    Ok(())
}

fn cell_number(value: usize, what: &str) -> HDocResult<u32> {
    u32::try_from(value).map_err(|_| {
        log::error!("Document {} {} does not fit a fragment cell", what, value);
        HDocError::new(
            &format!("Document {} {} does not fit a fragment cell", what, value),
            ErrorKind::EncodingError,
        )
    })
}

/// Rebuilds a document from fetched fragments, then applies `projection` when given.
///
/// Fragments may come from any subset of buckets; cells are replayed in their original
/// document order regardless of which fragment carried them.
pub fn assemble<'a, I>(fragments: I, projection: Option<&Projection>) -> HDocResult<Document>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut cells: Vec<FragmentCell> = Vec::new();
    for bytes in fragments {
        let (decoded, _): (Vec<FragmentCell>, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::legacy())?;
        cells.extend(decoded);
    }
    cells.sort_by_key(|cell| cell.ordinal);

    let mut doc = Document::new();
    for cell in cells {
        let path = cell.field_path();
        if path.is_root() {
            log::error!("Fragment cell {} has an empty path", cell.ordinal);
            return Err(HDocError::new(
                &format!("Fragment cell {} has an empty path", cell.ordinal),
                ErrorKind::EncodingError,
            ));
        }
        let (slot, _) = walker::entry(&mut doc, &path, SetMode::Replace)?;
        *slot = cell.value;
    }

    Ok(match projection {
        Some(projection) => projection.apply(&doc),
        None => doc,
    })
}

pub(crate) fn validate_bucket_name(bucket: &str) -> HDocResult<()> {
    if bucket.is_empty() || bucket.starts_with('_') {
        return Err(invalid(&format!(
            "Bucket name '{}' is empty or reserved",
            bucket
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> HDocError {
    log::error!("{}", message);
    HDocError::new(message, ErrorKind::ValidationError)
}
