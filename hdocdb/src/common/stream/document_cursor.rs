use crate::collection::{Document, QueryInfo, ScanStats};
use crate::errors::HDocResult;
use std::sync::Arc;

pub(crate) type DocumentStream = Box<dyn Iterator<Item = HDocResult<Document>> + Send>;

/// Lazy, forward-only result of a query.
///
/// Rows are read from the store as the cursor advances. The store scan behind it is released
/// when the cursor is exhausted, when it yields an error, on [DocumentCursor::close] and on
/// drop, whichever comes first.
///
/// ```ignore
/// let mut cursor = collection.find(Some(condition), FindOptions::new())?;
/// for doc in cursor.by_ref() {
///     println!("{}", doc?);
/// }
/// println!("{}", cursor.query_info());
/// ```
pub struct DocumentCursor {
    underlying: Option<DocumentStream>,
    query_info: QueryInfo,
    stats: Arc<ScanStats>,
    remaining: Option<usize>,
}

impl DocumentCursor {
    pub(crate) fn new(
        stream: DocumentStream,
        query_info: QueryInfo,
        stats: Arc<ScanStats>,
        limit: Option<usize>,
    ) -> Self {
        DocumentCursor {
            underlying: Some(stream),
            query_info,
            stats,
            remaining: limit,
        }
    }

    /// Releases the underlying scan. Further calls to `next` return `None`.
    pub fn close(&mut self) {
        if self.underlying.take().is_some() {
            log::debug!("Document cursor closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.underlying.is_none()
    }

    /// The plan of this query with its counters as of now.
    pub fn query_info(&self) -> QueryInfo {
        self.query_info.clone().with_counts(&self.stats)
    }

    /// Consumes the rest of the cursor into a vector, stopping at the first error.
    pub fn to_vec(&mut self) -> HDocResult<Vec<Document>> {
        self.by_ref().collect()
    }
}

impl Iterator for DocumentCursor {
    type Item = HDocResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            self.close();
            return None;
        }
        let next = self.underlying.as_mut()?.next();
        match &next {
            None | Some(Err(_)) => self.close(),
            Some(Ok(_)) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
            }
        }
        next
    }
}
