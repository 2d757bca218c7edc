//! Schema snapshot and sidecar types

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::fingerprint::fingerprint;
use crate::constants::{DEFAULT_SCHEMA_TTL_SECS, SCHEMA_FORMAT_VERSION};

const fn default_cache_ttl() -> u64 {
    DEFAULT_SCHEMA_TTL_SECS
}

/// Header of a [`SchemaSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub data_source: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub total_entities: usize,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Connector-specific header fields (`database_name`, `base_url`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structural description of a data source.
///
/// `entities` maps a table name or endpoint path to its description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub metadata: SnapshotHeader,
    #[serde(default)]
    pub entities: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaSnapshot {
    #[must_use]
    pub fn new(data_source: impl Into<String>, cache_ttl: u64) -> Self {
        Self {
            metadata: SnapshotHeader {
                data_source: data_source.into(),
                generated_at: Utc::now(),
                total_entities: 0,
                cache_ttl,
                extra: Map::new(),
            },
            entities: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Add or replace an entity, keeping `total_entities` in sync
    pub fn insert_entity(&mut self, name: impl Into<String>, description: Value) {
        self.entities.insert(name.into(), description);
        self.metadata.total_entities = self.entities.len();
    }

    #[must_use]
    pub fn with_entity(mut self, name: impl Into<String>, description: Value) -> Self {
        self.insert_entity(name, description);
        self
    }

    #[must_use]
    pub fn with_header_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.metadata.data_source
    }

    /// Fingerprint of the structure only; `data_source`, `generated_at`,
    /// counts and TTL do not contribute. Used for change tracking on refresh.
    #[must_use]
    pub fn structure_fingerprint(&self) -> String {
        fingerprint(&json!({
            "header": self.metadata.extra,
            "entities": self.entities,
            "extra": self.extra,
        }))
    }

    /// Hash of the whole snapshot, header included
    pub fn snapshot_hash(&self) -> serde_json::Result<String> {
        Ok(fingerprint(&serde_json::to_value(self)?))
    }
}

/// Sidecar persisted next to every snapshot payload.
///
/// Freshness is decided from the sidecar alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub data_source: String,
    pub generated_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub schema_size: usize,
    pub version: String,
}

impl SchemaMetadata {
    #[must_use]
    pub fn new(data_source: impl Into<String>, ttl_seconds: u64, schema_size: usize) -> Self {
        Self {
            data_source: data_source.into(),
            generated_at: Utc::now(),
            ttl_seconds,
            schema_size,
            version: SCHEMA_FORMAT_VERSION.to_string(),
        }
    }

    /// Fresh while `now - generated_at <= ttl_seconds`
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.generated_at) <= ttl
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Listing entry returned by `SchemaStore::list_cached_schemas`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedSchemaInfo {
    #[serde(flatten)]
    pub metadata: SchemaMetadata,
    pub is_fresh: bool,
    pub schema_file_exists: bool,
}
