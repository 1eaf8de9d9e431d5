//! Documents and the collections that store them.

mod collection_options;
mod document;
mod document_collection;
mod find_options;
pub(crate) mod operation;
mod query_info;
pub(crate) mod walker;

pub use collection_options::*;
pub use document::*;
pub use document_collection::*;
pub use find_options::*;
pub(crate) use query_info::ScanStats;
pub use query_info::{PlanType, QueryInfo};
