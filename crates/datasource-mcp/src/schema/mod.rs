//! Durable schema snapshots with freshness tracking

mod fingerprint;
mod snapshot;
mod store;

pub use fingerprint::{canonical_json, fingerprint};
pub use snapshot::{CachedSchemaInfo, SchemaMetadata, SchemaSnapshot, SnapshotHeader};
pub use store::SchemaStore;
