//! Memex Core
//!
//! Shared data model and storage primitives for the Memex fleet: the
//! record type captured on the edge, the record store contract, and the
//! abstract vector index every instance is built on.

pub mod error;
pub mod metadata;
pub mod record;
pub mod record_store;
pub mod vector_index;

pub use error::CoreError;
pub use metadata::MetadataValue;
pub use record::Record;
pub use record_store::RecordStore;
pub use vector_index::{MemoryVectorIndex, VectorHit, VectorIndex, WhereClause};
