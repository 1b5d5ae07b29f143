//! Ordered index keys, record metadata and the record store
//!
//! The planner consults metadata to find usable indexes; the executor scans
//! records and index ranges through the `RecordStore` trait.
//!
//! # Invariants
//!
//! - Index entries order by (column values, primary key)
//! - Record scans order by primary key
//! - Scans are lazy and resumable strictly after a given entry

mod errors;
mod key;
mod metadata;
mod store;

pub use errors::{IndexError, IndexErrorCode, IndexResult};
pub use key::{compare_json, IndexEntry, IndexKey, IndexTree, TupleRange};
pub use metadata::{IndexColumn, IndexDefinition, RecordMetadata, RecordType};
pub use store::{IndexIter, MemoryRecordStore, RecordIter, RecordStore, StoredRecord};
