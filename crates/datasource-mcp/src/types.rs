//! Request and response types exchanged with data sources and the server

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_QUERY_LIMIT;

/// One normalized result record
pub type Record = Map<String, Value>;

const fn default_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

fn default_method() -> String {
    "GET".to_string()
}

/// Arguments of a `query_<source>` tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// SQL statement or REST endpoint path
    #[serde(alias = "endpoint")]
    #[schemars(
        description = "SQL SELECT statement for database sources, or endpoint path for REST sources. Example: 'SELECT * FROM USERS', '/users'"
    )]
    pub query: String,
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    #[schemars(description = "Maximum number of records to return", range(min = 1))]
    pub limit: u32,
    /// HTTP method for REST sources
    #[serde(default = "default_method")]
    #[schemars(description = "HTTP method for REST sources: GET, HEAD or OPTIONS")]
    pub method: String,
    /// Query string parameters for REST sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional query string parameters for REST sources")]
    pub params: Option<Value>,
}

impl QueryParams {
    pub fn new(query: impl Into<String>, limit: u32) -> Self {
        Self {
            query: query.into(),
            limit,
            method: default_method(),
            params: None,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Tool derived from a registered data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Resource derived from a registered data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Result of a data source health probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub data_source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub connected: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl HealthStatus {
    pub fn healthy(data_source: &str, kind: &str, details: Map<String, Value>) -> Self {
        Self {
            status: HealthState::Healthy,
            data_source: data_source.to_string(),
            kind: kind.to_string(),
            connected: true,
            timestamp: Utc::now(),
            error: None,
            details,
        }
    }

    pub fn unhealthy(
        data_source: &str,
        kind: &str,
        connected: bool,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: HealthState::Unhealthy,
            data_source: data_source.to_string(),
            kind: kind.to_string(),
            connected,
            timestamp: Utc::now(),
            error: Some(error.into()),
            details: Map::new(),
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// HANA table information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    /// Table name
    #[schemars(description = "Table name")]
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub row_count: Option<i64>,
    /// Table size in bytes
    #[serde(default)]
    pub data_size: Option<i64>,
}

/// Table column information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    /// Column name
    #[schemars(description = "Column name")]
    pub name: String,
    /// Data type (VARCHAR, INTEGER, DECIMAL, etc.)
    #[schemars(description = "Data type: VARCHAR, INTEGER, DECIMAL, TIMESTAMP, etc.")]
    pub data_type: String,
    /// Whether column accepts NULL values
    #[schemars(description = "Whether column accepts NULL values")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Key role: `PRI` or `UNI`
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub index_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Entry of `list_data_sources`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub connected: bool,
    pub config: Value,
}

/// Payload of the `server://info` resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub data_sources: Vec<String>,
    pub version: String,
}

/// Outcome of connecting or disconnecting every source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub succeeded: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

impl LifecycleReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Success,
    Error,
}

/// Result of refreshing one source's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub status: RefreshStatus,
    pub data_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_entities: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResult {
    pub fn failed(data_source: &str, error: impl Into<String>) -> Self {
        Self {
            status: RefreshStatus::Error,
            data_source: data_source.to_string(),
            generated_at: None,
            total_entities: None,
            fingerprint: None,
            changed: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RefreshStatus::Success
    }
}

/// Result of `refresh_schema`: one source, or every source by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefreshOutcome {
    Single(RefreshResult),
    All(BTreeMap<String, RefreshResult>),
}
