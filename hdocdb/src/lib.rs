//! # HDoc - Document Database over a Wide-Column Store
//!
//! HDoc stores schemaless JSON-like documents in a sorted wide-column key-value store. Each
//! document is one row keyed by its `_id`; its fields are split into column families
//! ("buckets") by path prefix, so reads that only need part of a document only fetch the
//! families that hold it.
//!
//! ## Key Features
//!
//! - **Path addressing**: dotted field paths with array subscripts (`a.b[2].c`)
//! - **Atomic mutations**: set, delete, increment, append, push and merge in one row write
//! - **Conditional writes**: check-and-mutate, check-and-replace and check-and-delete
//! - **Secondary indexes**: composite, typed and ordered, kept in a separate table
//! - **Planner**: picks the index covering the most leading fields, honours hints and
//!   reports its choice through `explain`
//! - **Lazy cursors**: results stream in batches and report stale index entries they met
//! - **Pluggable storage**: any [store::WideColumnStoreProvider]; an in-memory store ships
//!   with the crate
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hdocdb::{doc, Condition, FindOptions, HDocDb, Mutation};
//!
//! let db = HDocDb::builder().open()?;
//! let users = db.collection("users")?;
//!
//! users.insert(doc! { _id: "ann", age: 31, tags: ["admin"] })?;
//! users.update("ann", &Mutation::new().increment("age", 1))?;
//!
//! let adults = Condition::builder().ge("age", 18).build()?;
//! for user in users.find(Some(adults), FindOptions::new())? {
//!     println!("{}", user?);
//! }
//! db.close()?;
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, collections and find options
//! - [`common`] - Values, constants and cursors
//! - [`condition`] - Conditions and their builder
//! - [`errors`] - Error types and result definitions
//! - [`fragment`] - Bucket layouts, fragmentation and projection
//! - [`index`] - Index definitions, states and key encoding
//! - [`mutation`] - Mutation operations
//! - [`path`] - Field paths and the path compiler
//! - [`store`] - Wide-column store contract and the in-memory store
//! - [`hdocdb`] - The database handle
//! - [`hdocdb_builder`] - Database builder
//! - [`hdocdb_config`] - Database configuration

pub(crate) mod catalog;
pub mod collection;
pub mod common;
pub mod condition;
pub mod errors;
pub mod fragment;
pub mod hdocdb;
pub mod hdocdb_builder;
pub mod hdocdb_config;
pub mod index;
pub mod mutation;
pub mod path;
pub mod store;

pub use crate::collection::{
    CollectionOptions, Document, DocumentCollection, FindOptions, PlanType, QueryInfo, TieBreak,
};
pub use crate::common::stream::DocumentCursor;
pub use crate::common::{SortOrder, Value, ValueType};
pub use crate::condition::Condition;
pub use crate::errors::{ErrorKind, HDocError, HDocResult};
pub use crate::hdocdb::HDocDb;
pub use crate::hdocdb_builder::HDocBuilder;
pub use crate::hdocdb_config::HDocConfig;
pub use crate::index::{IndexDefinition, IndexDescriptor, IndexField, IndexState};
pub use crate::mutation::Mutation;
