//! SAP HANA backend

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value, json};
use url::Url;

use super::redact_url;
use super::sql::SqlBackend;
use crate::config::HanaSourceConfig;
use crate::constants::{
    CURRENT_SCHEMA_QUERY, DESCRIBE_COLUMNS_TEMPLATE, FOREIGN_KEYS_TEMPLATE, HEALTH_CHECK_QUERY,
    INDEXES_TEMPLATE, KEY_CONSTRAINTS_TEMPLATE, LIST_TABLES_TEMPLATE, SQL_TRUE,
};
use crate::helpers::hdb_value_to_json;
use crate::pool::{Pool, create_pool, get_connection};
use crate::types::{ColumnInfo, ForeignKeyInfo, IndexInfo, Record, TableInfo};
use crate::validation::{quote_identifier, validate_identifier};
use crate::{Error, Result};

/// Pooled `hdbconnect_async` access to one HANA schema
pub struct HanaBackend {
    url: String,
    schema: Option<String>,
    pool_size: usize,
    connect_timeout: Duration,
    pool: RwLock<Option<Pool>>,
}

impl fmt::Debug for HanaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HanaBackend")
            .field("url", &redact_url(&self.url))
            .field("schema", &self.schema)
            .field("pool_size", &self.pool_size)
            .field("open", &self.pool.read().is_some())
            .finish()
    }
}

impl HanaBackend {
    pub fn new(config: &HanaSourceConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid HANA URL for '{}': {e}", config.name)))?;
        if !matches!(url.scheme(), "hdbsql" | "hdbsqls") {
            return Err(Error::Config(format!(
                "HANA URL for '{}' must use hdbsql:// or hdbsqls://",
                config.name
            )));
        }
        if let Some(ref schema) = config.schema {
            validate_identifier(schema, "schema name")?;
        }
        if config.pool_size == 0 {
            return Err(Error::Config("pool_size must be greater than 0".into()));
        }

        Ok(Self {
            url: config.url.clone(),
            schema: config.schema.clone(),
            pool_size: config.pool_size,
            connect_timeout: config.connect_timeout(),
            pool: RwLock::new(None),
        })
    }

    fn current_pool(&self) -> Result<Pool> {
        self.pool
            .read()
            .clone()
            .ok_or_else(|| Error::Connection("HANA connection pool is not open".to_string()))
    }

    fn schema_clause(&self) -> String {
        self.schema
            .as_ref()
            .map_or_else(|| "CURRENT_SCHEMA".to_string(), |s| format!("'{s}'"))
    }

    fn catalog_query(&self, template: &str, table: &str) -> String {
        template
            .replace("{SCHEMA}", &self.schema_clause())
            .replace("{TABLE}", &table.replace('\'', "''"))
    }

    fn qualified_table(&self, table: &str) -> String {
        self.schema.as_ref().map_or_else(
            || quote_identifier(table),
            |s| format!("{}.{}", quote_identifier(s), quote_identifier(table)),
        )
    }
}

#[async_trait]
impl SqlBackend for HanaBackend {
    fn kind(&self) -> &'static str {
        "hana"
    }

    async fn open(&self) -> Result<()> {
        if self.pool.read().is_some() {
            return Ok(());
        }
        let pool = create_pool(self.url.clone(), self.pool_size, self.connect_timeout)?;
        // Fail fast on bad credentials instead of on the first query.
        let conn = get_connection(&pool).await?;
        drop(conn);
        *self.pool.write() = Some(pool);
        Ok(())
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.write().take() {
            pool.close();
        }
    }

    async fn ping(&self) -> Result<()> {
        let pool = self.current_pool()?;
        let conn = get_connection(&pool).await?;
        conn.query(HEALTH_CHECK_QUERY).await?;
        Ok(())
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<Record>> {
        let pool = self.current_pool()?;
        let conn = get_connection(&pool).await?;

        let result_set = conn.query(sql).await?;
        let columns: Vec<String> = result_set
            .metadata()
            .iter()
            .map(|col| col.columnname().to_string())
            .collect();
        let rows = result_set.into_rows().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(|v| hdb_value_to_json(&v)))
                    .collect()
            })
            .collect())
    }

    async fn database_name(&self) -> Result<String> {
        if let Some(ref schema) = self.schema {
            return Ok(schema.clone());
        }
        let rows = self.fetch(CURRENT_SCHEMA_QUERY).await?;
        rows.first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| Error::backend("CURRENT_SCHEMA returned no value"))
    }

    async fn tables(&self) -> Result<Vec<TableInfo>> {
        let rows = self
            .fetch(&self.catalog_query(LIST_TABLES_TEMPLATE, ""))
            .await?;
        Ok(parse_tables(&rows))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let columns = self
            .fetch(&self.catalog_query(DESCRIBE_COLUMNS_TEMPLATE, table))
            .await?;
        let keys = self
            .fetch(&self.catalog_query(KEY_CONSTRAINTS_TEMPLATE, table))
            .await?;
        Ok(parse_columns(&columns, &keys))
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let rows = self
            .fetch(&self.catalog_query(INDEXES_TEMPLATE, table))
            .await?;
        Ok(parse_indexes(&rows))
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let rows = self
            .fetch(&self.catalog_query(FOREIGN_KEYS_TEMPLATE, table))
            .await?;
        Ok(parse_foreign_keys(&rows))
    }

    async fn sample(&self, table: &str, rows: usize) -> Result<Vec<Record>> {
        let sql = format!("SELECT * FROM {} LIMIT {rows}", self.qualified_table(table));
        self.fetch(&sql).await
    }

    fn describe(&self) -> Value {
        let host = Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string));
        json!({
            "url": self.url,
            "host": host,
            "database": self.schema,
            "pool_size": self.pool_size,
        })
    }
}

fn text(row: &Record, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn integer(row: &Record, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn flag(row: &Record, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case(SQL_TRUE),
        _ => false,
    }
}

fn parse_tables(rows: &[Record]) -> Vec<TableInfo> {
    rows.iter()
        .filter_map(|row| {
            Some(TableInfo {
                name: text(row, "TABLE_NAME")?,
                comment: text(row, "COMMENTS"),
                row_count: integer(row, "RECORD_COUNT"),
                data_size: integer(row, "TABLE_SIZE"),
            })
        })
        .collect()
}

fn parse_columns(columns: &[Record], keys: &[Record]) -> Vec<ColumnInfo> {
    let mut key_roles: BTreeMap<String, &'static str> = BTreeMap::new();
    for row in keys {
        let Some(column) = text(row, "COLUMN_NAME") else {
            continue;
        };
        if flag(row, "IS_PRIMARY_KEY") {
            key_roles.insert(column, "PRI");
        } else if flag(row, "IS_UNIQUE_KEY") {
            key_roles.entry(column).or_insert("UNI");
        }
    }

    columns
        .iter()
        .filter_map(|row| {
            let name = text(row, "COLUMN_NAME")?;
            Some(ColumnInfo {
                key: key_roles.get(&name).map(|k| (*k).to_string()),
                data_type: text(row, "DATA_TYPE_NAME").unwrap_or_default(),
                nullable: flag(row, "IS_NULLABLE"),
                default: text(row, "DEFAULT_VALUE"),
                comment: text(row, "COMMENTS"),
                name,
            })
        })
        .collect()
}

fn parse_indexes(rows: &[Record]) -> Vec<IndexInfo> {
    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in rows {
        let (Some(name), Some(column)) = (text(row, "INDEX_NAME"), text(row, "COLUMN_NAME")) else {
            continue;
        };
        if let Some(index) = indexes.iter_mut().find(|i| i.name == name) {
            index.columns.push(column);
            continue;
        }
        let constraint = text(row, "CONSTRAINT").unwrap_or_default();
        indexes.push(IndexInfo {
            name,
            columns: vec![column],
            unique: constraint.contains("UNIQUE") || constraint.contains("PRIMARY"),
            index_type: text(row, "INDEX_TYPE").unwrap_or_default(),
        });
    }
    indexes
}

fn parse_foreign_keys(rows: &[Record]) -> Vec<ForeignKeyInfo> {
    rows.iter()
        .filter_map(|row| {
            Some(ForeignKeyInfo {
                column: text(row, "COLUMN_NAME")?,
                referenced_table: text(row, "REFERENCED_TABLE_NAME")?,
                referenced_column: text(row, "REFERENCED_COLUMN_NAME")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommonSourceConfig;

    fn config(url: &str, schema: Option<&str>) -> HanaSourceConfig {
        HanaSourceConfig {
            name: "erp".to_string(),
            url: url.to_string(),
            schema: schema.map(ToString::to_string),
            pool_size: 2,
            connect_timeout_secs: 30,
            query_timeout_secs: 30,
            common: CommonSourceConfig::default(),
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_new_rejects_bad_urls() {
        assert!(HanaBackend::new(&config("not a url", None)).is_err());
        assert!(
            HanaBackend::new(&config("postgres://u:p@h:5432", None))
                .unwrap_err()
                .is_config()
        );
        assert!(HanaBackend::new(&config("hdbsql://u:p@h:30015", Some("1BAD"))).is_err());
        assert!(HanaBackend::new(&config("hdbsqls://u:p@h:30015", Some("APP"))).is_ok());
    }

    #[test]
    fn test_debug_hides_password() {
        let backend = HanaBackend::new(&config("hdbsql://u:hunter2@h:30015", None)).unwrap();
        let debug = format!("{backend:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("HanaBackend"));
    }

    #[test]
    fn test_catalog_query_substitution() {
        let backend = HanaBackend::new(&config("hdbsql://u:p@h:30015", None)).unwrap();
        let sql = backend.catalog_query(DESCRIBE_COLUMNS_TEMPLATE, "O'BRIEN");
        assert!(sql.contains("SCHEMA_NAME = CURRENT_SCHEMA"));
        assert!(sql.contains("TABLE_NAME = 'O''BRIEN'"));

        let backend = HanaBackend::new(&config("hdbsql://u:p@h:30015", Some("APP"))).unwrap();
        let sql = backend.catalog_query(LIST_TABLES_TEMPLATE, "");
        assert!(sql.contains("T.SCHEMA_NAME = 'APP'"));
    }

    #[test]
    fn test_qualified_table() {
        let backend = HanaBackend::new(&config("hdbsql://u:p@h:30015", Some("APP"))).unwrap();
        assert_eq!(backend.qualified_table("USERS"), "\"APP\".\"USERS\"");

        let backend = HanaBackend::new(&config("hdbsql://u:p@h:30015", None)).unwrap();
        assert_eq!(backend.qualified_table("A\"B"), "\"A\"\"B\"");
    }

    #[test]
    fn test_describe_includes_host() {
        let backend = HanaBackend::new(&config("hdbsql://u:p@hana.local:30015", Some("APP"))).unwrap();
        let describe = backend.describe();
        assert_eq!(describe["host"], "hana.local");
        assert_eq!(describe["database"], "APP");
    }

    #[tokio::test]
    async fn test_ping_without_pool_fails() {
        let backend = HanaBackend::new(&config("hdbsql://u:p@h:30015", None)).unwrap();
        assert!(backend.ping().await.unwrap_err().is_connection());
    }

    #[test]
    fn test_parse_tables() {
        let rows = vec![
            record(json!({"TABLE_NAME": "USERS", "COMMENTS": null, "RECORD_COUNT": 12, "TABLE_SIZE": "2048"})),
            record(json!({"COMMENTS": "no name"})),
        ];
        let tables = parse_tables(&rows);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count, Some(12));
        assert_eq!(tables[0].data_size, Some(2048));
        assert!(tables[0].comment.is_none());
    }

    #[test]
    fn test_parse_columns_with_keys() {
        let columns = vec![
            record(json!({"COLUMN_NAME": "ID", "DATA_TYPE_NAME": "INTEGER", "IS_NULLABLE": "FALSE"})),
            record(json!({"COLUMN_NAME": "EMAIL", "DATA_TYPE_NAME": "NVARCHAR", "IS_NULLABLE": "TRUE", "DEFAULT_VALUE": "n/a"})),
            record(json!({"COLUMN_NAME": "NAME", "DATA_TYPE_NAME": "NVARCHAR", "IS_NULLABLE": "TRUE"})),
        ];
        let keys = vec![
            record(json!({"COLUMN_NAME": "ID", "IS_PRIMARY_KEY": "TRUE", "IS_UNIQUE_KEY": "TRUE"})),
            record(json!({"COLUMN_NAME": "EMAIL", "IS_PRIMARY_KEY": "FALSE", "IS_UNIQUE_KEY": "TRUE"})),
        ];

        let parsed = parse_columns(&columns, &keys);
        assert_eq!(parsed[0].key.as_deref(), Some("PRI"));
        assert!(!parsed[0].nullable);
        assert_eq!(parsed[1].key.as_deref(), Some("UNI"));
        assert_eq!(parsed[1].default.as_deref(), Some("n/a"));
        assert!(parsed[2].key.is_none());
    }

    #[test]
    fn test_parse_indexes_groups_columns() {
        let rows = vec![
            record(json!({"INDEX_NAME": "PK", "INDEX_TYPE": "CPBTREE", "CONSTRAINT": "PRIMARY KEY", "COLUMN_NAME": "A"})),
            record(json!({"INDEX_NAME": "PK", "INDEX_TYPE": "CPBTREE", "CONSTRAINT": "PRIMARY KEY", "COLUMN_NAME": "B"})),
            record(json!({"INDEX_NAME": "IX", "INDEX_TYPE": "INVERTED", "CONSTRAINT": null, "COLUMN_NAME": "C"})),
        ];
        let indexes = parse_indexes(&rows);
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].columns, vec!["A", "B"]);
        assert!(indexes[0].unique);
        assert!(!indexes[1].unique);
        assert_eq!(indexes[1].index_type, "INVERTED");
    }

    #[test]
    fn test_parse_foreign_keys() {
        let rows = vec![record(json!({
            "COLUMN_NAME": "USER_ID",
            "REFERENCED_TABLE_NAME": "USERS",
            "REFERENCED_COLUMN_NAME": "ID"
        }))];
        let fks = parse_foreign_keys(&rows);
        assert_eq!(fks[0].referenced_table, "USERS");
    }
}
