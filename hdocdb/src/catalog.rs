//! Persistent record of collections, their bucket layouts and their indexes.

use crate::collection::{DocumentCollection, FindOptions, TieBreak};
use crate::common::{Value, CATALOG_BUCKETS, CATALOG_INDEXES, CATALOG_TABLE, DOC_ID};
use crate::condition::{CompareOp, Condition};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::fragment::BucketConfig;
use crate::hdocdb_config::HDocConfig;
use crate::index::{IndexDescriptor, IndexState};
use crate::mutation::{Mutation, MutationOp};
use crate::path::{FieldPath, PathCompiler, Segment};
use crate::store::WideColumnStore;
use crate::doc;
use std::sync::Arc;

/// The catalog is itself a document collection: one document per user collection, keyed by
/// the collection name, holding its bucket layout and a map of index descriptors by name.
/// Index changes are conditional writes on that document, so two handles racing to define
/// or move the same index cannot both succeed.
#[derive(Clone)]
pub(crate) struct Catalog {
    documents: DocumentCollection,
}

impl Catalog {
    pub fn open(
        store: WideColumnStore,
        config: &HDocConfig,
        compiler: Arc<PathCompiler>,
    ) -> HDocResult<Catalog> {
        let documents = DocumentCollection::open(
            CATALOG_TABLE,
            store,
            config,
            compiler,
            BucketConfig::new(&config.default_bucket()),
            TieBreak::DeclarationOrder,
            None,
        )?;
        Ok(Catalog { documents })
    }

    /// Records `collection` with `buckets` if it is new, and returns the layout in effect.
    ///
    /// When the collection is already recorded its stored layout wins; `explicit` layouts
    /// must then be identical to it.
    pub fn register_collection(
        &self,
        collection: &str,
        buckets: &BucketConfig,
        explicit: bool,
    ) -> HDocResult<BucketConfig> {
        loop {
            if let Some(stored) = self.stored_buckets(collection)? {
                if explicit && stored != *buckets {
                    log::error!(
                        "Collection {} is stored with another bucket layout",
                        collection
                    );
                    return Err(HDocError::new(
                        &format!(
                            "Collection {} is stored with another bucket layout",
                            collection
                        ),
                        ErrorKind::ValidationError,
                    ));
                }
                return Ok(stored);
            }

            let entry = doc! {
                _id: collection,
                buckets: (buckets.to_document()),
                indexes: {}
            };
            match self.documents.insert(entry) {
                Ok(_) => {
                    log::info!("Registered collection {}", collection);
                    return Ok(buckets.clone());
                }
                // registered concurrently; read what won
                Err(e) if e.kind() == &ErrorKind::DocumentExists => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn stored_buckets(&self, collection: &str) -> HDocResult<Option<BucketConfig>> {
        let Some(entry) = self.documents.find_by_id(collection, None)? else {
            return Ok(None);
        };
        match entry.field(CATALOG_BUCKETS).and_then(Value::as_map) {
            Some(layout) => Ok(Some(BucketConfig::from_document(layout)?)),
            None => {
                log::error!("Catalog entry of {} has no bucket layout", collection);
                Err(HDocError::new(
                    &format!("Catalog entry of {} has no bucket layout", collection),
                    ErrorKind::EncodingError,
                ))
            }
        }
    }

    pub fn contains(&self, collection: &str) -> HDocResult<bool> {
        Ok(self.documents.find_by_id(collection, Some(&[DOC_ID][..]))?.is_some())
    }

    /// Names of every recorded collection, in key order.
    pub fn collection_names(&self) -> HDocResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in self
            .documents
            .find(None, FindOptions::new().projection(&[DOC_ID]))?
        {
            if let Some(name) = entry?.id().and_then(Value::as_str) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    pub fn remove_collection(&self, collection: &str) -> HDocResult<bool> {
        self.documents.delete(collection)
    }

    /// Index descriptors of `collection` in declaration order, dropped ones included.
    pub fn index_descriptors(&self, collection: &str) -> HDocResult<Vec<IndexDescriptor>> {
        let Some(entry) = self.documents.find_by_id(collection, None)? else {
            return Ok(Vec::new());
        };
        let Some(indexes) = entry.field(CATALOG_INDEXES).and_then(Value::as_map) else {
            return Ok(Vec::new());
        };
        indexes
            .iter()
            .map(|(name, stored)| match stored.as_map() {
                Some(doc) => IndexDescriptor::from_document(doc),
                None => {
                    log::error!("Catalog entry of index {} is not a document", name);
                    Err(HDocError::new(
                        &format!("Catalog entry of index {} is not a document", name),
                        ErrorKind::EncodingError,
                    ))
                }
            })
            .collect()
    }

    /// Records a new index unless one with the same name exists and is not dropped.
    pub fn add_index(&self, collection: &str, descriptor: &IndexDescriptor) -> HDocResult<bool> {
        let path = index_path(descriptor.name());
        let free = Condition::Or(vec![
            Condition::NotExists { path: path.clone() },
            Condition::Compare {
                path: path.child(Segment::Field("state".to_string())),
                op: CompareOp::Eq,
                value: Value::from(IndexState::Dropped.name()),
            },
        ]);
        self.write_index(collection, free, descriptor)
    }

    /// Stores `descriptor` if the index is still in state `expected`.
    pub fn replace_index(
        &self,
        collection: &str,
        expected: IndexState,
        descriptor: &IndexDescriptor,
    ) -> HDocResult<bool> {
        let unchanged = Condition::Compare {
            path: index_path(descriptor.name()).child(Segment::Field("state".to_string())),
            op: CompareOp::Eq,
            value: Value::from(expected.name()),
        };
        self.write_index(collection, unchanged, descriptor)
    }

    fn write_index(
        &self,
        collection: &str,
        condition: Condition,
        descriptor: &IndexDescriptor,
    ) -> HDocResult<bool> {
        let recorded = Condition::And(vec![
            Condition::Exists {
                path: FieldPath::field(CATALOG_BUCKETS),
            },
            condition,
        ]);
        let mutation = Mutation::new().push_op(MutationOp::SetOrReplace {
            path: index_path(descriptor.name()),
            value: Value::Map(descriptor.to_document()),
        });
        self.documents
            .check_and_mutate(collection, &recorded, &mutation)
    }
}

// built from segments so index names are never parsed as paths
fn index_path(name: &str) -> FieldPath {
    FieldPath::from_segments([
        Segment::Field(CATALOG_INDEXES.to_string()),
        Segment::Field(name.to_string()),
    ])
}
