//! Constants shared by connectors and the server

/// Version written into every schema sidecar
pub const SCHEMA_FORMAT_VERSION: &str = "1.0";

/// Default schema snapshot TTL in seconds
pub const DEFAULT_SCHEMA_TTL_SECS: u64 = 3600;

/// Default query result TTL in seconds
pub const DEFAULT_QUERY_TTL_SECS: u64 = 300;

/// Default upper bound for a query's row limit
pub const DEFAULT_MAX_QUERY_LIMIT: u32 = 1000;

/// Default row limit when a caller omits one
pub const DEFAULT_QUERY_LIMIT: u32 = 100;

/// Number of sample rows or items attached to each schema entity
pub const SCHEMA_SAMPLE_SIZE: usize = 3;

/// Default directory for persisted schema snapshots
pub const DEFAULT_SCHEMA_DIR: &str = "resources";

/// Default server name
pub const DEFAULT_SERVER_NAME: &str = "datasource-mcp";

/// SQL query to check database connection health
pub const HEALTH_CHECK_QUERY: &str = "SELECT 1 FROM DUMMY";

/// Tables with comment, record count and size.
///
/// Catalog templates take `{SCHEMA}` (`CURRENT_SCHEMA` or a quoted literal)
/// and `{TABLE}` (an escaped string literal body).
pub const LIST_TABLES_TEMPLATE: &str = "SELECT T.TABLE_NAME, T.COMMENTS, M.RECORD_COUNT, M.TABLE_SIZE \
     FROM SYS.TABLES T LEFT JOIN SYS.M_TABLES M \
     ON M.SCHEMA_NAME = T.SCHEMA_NAME AND M.TABLE_NAME = T.TABLE_NAME \
     WHERE T.SCHEMA_NAME = {SCHEMA} ORDER BY T.TABLE_NAME";

/// Columns of one table
pub const DESCRIBE_COLUMNS_TEMPLATE: &str = "SELECT COLUMN_NAME, DATA_TYPE_NAME, IS_NULLABLE, DEFAULT_VALUE, COMMENTS \
     FROM SYS.TABLE_COLUMNS WHERE SCHEMA_NAME = {SCHEMA} AND TABLE_NAME = '{TABLE}' \
     ORDER BY POSITION";

/// Primary and unique key membership of one table's columns
pub const KEY_CONSTRAINTS_TEMPLATE: &str = "SELECT COLUMN_NAME, IS_PRIMARY_KEY, IS_UNIQUE_KEY \
     FROM SYS.CONSTRAINTS WHERE SCHEMA_NAME = {SCHEMA} AND TABLE_NAME = '{TABLE}'";

/// Indexes of one table, one row per indexed column
pub const INDEXES_TEMPLATE: &str = "SELECT I.INDEX_NAME, I.INDEX_TYPE, I.\"CONSTRAINT\", C.COLUMN_NAME \
     FROM SYS.INDEXES I JOIN SYS.INDEX_COLUMNS C \
     ON C.SCHEMA_NAME = I.SCHEMA_NAME AND C.INDEX_NAME = I.INDEX_NAME \
     WHERE I.SCHEMA_NAME = {SCHEMA} AND I.TABLE_NAME = '{TABLE}' \
     ORDER BY I.INDEX_NAME, C.POSITION";

/// Foreign keys of one table
pub const FOREIGN_KEYS_TEMPLATE: &str = "SELECT COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME \
     FROM SYS.REFERENTIAL_CONSTRAINTS WHERE SCHEMA_NAME = {SCHEMA} AND TABLE_NAME = '{TABLE}'";

/// Name of the current schema
pub const CURRENT_SCHEMA_QUERY: &str = "SELECT CURRENT_SCHEMA FROM DUMMY";

/// SQL boolean value: TRUE
pub const SQL_TRUE: &str = "TRUE";

/// Conventional REST paths probed when no discovery endpoint answers
pub const COMMON_REST_PATHS: &[&str] = &[
    "/users",
    "/products",
    "/orders",
    "/items",
    "/data",
    "/api/v1/users",
    "/api/v1/products",
    "/api/v1/orders",
];

/// Keys under which REST responses conventionally nest their records
pub const RECORD_CONTAINER_KEYS: &[&str] = &["data", "items", "results", "records"];

/// REST limit parameter is only forwarded below this value
pub const REST_LIMIT_PARAM_CEILING: u32 = 1000;
