use crate::collection::Document;
use crate::common::{FRAGMENT_QUALIFIER, META_FAMILY, VERSION_QUALIFIER};
use crate::errors::HDocResult;
use crate::fragment::{assemble, BucketConfig};
use crate::store::{Row, RowCheck, RowMutation};

/// A document row as last read, with the revision its next write is guarded on.
#[derive(Debug, Clone)]
pub(crate) struct StoredDocument {
    pub revision: Option<Vec<u8>>,
    pub document: Document,
}

/// Reassembles the fragments carried by `row`. Cells outside fragment qualifiers are ignored.
pub(crate) fn decode_document(row: &Row) -> HDocResult<Document> {
    let fragments = row
        .cells()
        .iter()
        .filter(|cell| cell.family != META_FAMILY && cell.qualifier == FRAGMENT_QUALIFIER)
        .map(|cell| cell.value.as_slice());
    assemble(fragments, None)
}

pub(crate) fn decode_stored(row: &Row) -> HDocResult<StoredDocument> {
    Ok(StoredDocument {
        revision: row.value(META_FAMILY, VERSION_QUALIFIER).map(|v| v.to_vec()),
        document: decode_document(row)?,
    })
}

/// Fresh revision token. Random rather than counted, so a row deleted and written again
/// never reuses a revision an older reader still holds.
pub(crate) fn new_revision() -> Vec<u8> {
    uuid::Uuid::new_v4().as_bytes().to_vec()
}

/// The guard a write commits under, given what it read.
pub(crate) fn revision_check(read: Option<&StoredDocument>) -> RowCheck {
    match read {
        None => RowCheck::RowAbsent,
        Some(stored) => RowCheck::CellEquals {
            family: META_FAMILY.to_string(),
            qualifier: VERSION_QUALIFIER.to_string(),
            expected: stored.revision.clone(),
        },
    }
}

/// Replaces every bucket of the row with the fragments of `doc` and bumps the revision.
pub(crate) fn write_mutation(buckets: &BucketConfig, doc: &Document) -> HDocResult<RowMutation> {
    let fragments = buckets.fragment(doc)?;
    let mut mutation = RowMutation::new();
    for bucket in buckets.buckets() {
        mutation = mutation.delete_family(&bucket);
    }
    for (bucket, bytes) in fragments {
        mutation = mutation.put(&bucket, FRAGMENT_QUALIFIER, bytes);
    }
    Ok(mutation.put(META_FAMILY, VERSION_QUALIFIER, new_revision()))
}
