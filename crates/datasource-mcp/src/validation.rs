//! Read-only request policy and identifier validation
//!
//! The checks here are syntactic. Keywords are matched as substrings of the
//! upper-cased statement, without understanding string literals, comments
//! or encodings, so a benign statement such as
//! `SELECT * FROM t WHERE note = 'dropped'` is rejected while crafted input
//! may still slip through. Connectors must treat a pass as "not obviously
//! harmful", never as proof that a statement is read-only.

use crate::{Error, Result};

/// Keywords rejected anywhere in a SQL statement
const SQL_DENY_LIST: &[&str] = &[
    "DROP",
    "DELETE",
    "INSERT",
    "UPDATE",
    "ALTER",
    "CREATE",
    "TRUNCATE",
    "REPLACE",
    "LOAD_FILE",
    "INTO OUTFILE",
    "INTO DUMPFILE",
    "EXEC",
    "EXECUTE",
    "CALL",
    "PROCEDURE",
    "MERGE",
    "UPSERT",
    "GRANT",
    "REVOKE",
];

/// HTTP methods allowed for REST queries
pub const SAFE_HTTP_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];

/// Maximum length for SQL identifiers (HANA limit is 127)
const MAX_IDENTIFIER_LENGTH: usize = 127;

/// Maximum length for data source names
const MAX_SOURCE_NAME_LENGTH: usize = 64;

/// Validate SQL identifier (schema/table name) to prevent injection
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#')
}

/// Validate identifier and return error if invalid
pub fn validate_identifier(name: &str, context: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid {context}: '{name}'. \
             Must be 1-127 alphanumeric characters (a-z, A-Z, 0-9, _, $, #), \
             cannot start with a digit."
        )))
    }
}

/// Data source names end up in tool names, resource URIs and file names
pub fn is_valid_source_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_SOURCE_NAME_LENGTH {
        return false;
    }

    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn validate_source_name(name: &str) -> Result<()> {
    if is_valid_source_name(name) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Invalid data source name '{name}': must start with a letter and contain \
             only letters, digits, '_' or '-' (max {MAX_SOURCE_NAME_LENGTH} characters)"
        )))
    }
}

/// Reject limits above the source's maximum
pub fn check_limit(limit: u32, max_query_limit: u32) -> Result<()> {
    if limit > max_query_limit {
        return Err(Error::validation(format!(
            "Limit {limit} exceeds maximum {max_query_limit}"
        )));
    }
    Ok(())
}

/// Validate a SQL statement for the read-only query path.
///
/// The statement must start with `SELECT` and must not contain any
/// deny-listed keyword, even inside literals or identifiers.
pub fn check_sql_query(sql: &str, limit: u32, max_query_limit: u32) -> Result<()> {
    let upper = sql.trim().to_uppercase();

    if !upper.starts_with("SELECT") {
        return Err(Error::validation("Only SELECT statements are allowed"));
    }

    if let Some(keyword) = SQL_DENY_LIST.iter().find(|kw| upper.contains(*kw)) {
        return Err(Error::validation(format!(
            "Statement contains forbidden keyword: {keyword}"
        )));
    }

    check_limit(limit, max_query_limit)
}

/// Prefix an endpoint with `/` when missing
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

/// Validate a REST request, returning the normalized endpoint
pub fn check_rest_request(
    endpoint: &str,
    method: &str,
    limit: u32,
    max_query_limit: u32,
) -> Result<String> {
    if endpoint.trim().is_empty() {
        return Err(Error::validation("Endpoint must not be empty"));
    }

    let method = method.trim().to_uppercase();
    if !SAFE_HTTP_METHODS.contains(&method.as_str()) {
        return Err(Error::validation(format!(
            "HTTP method {method} is not allowed"
        )));
    }

    check_limit(limit, max_query_limit)?;

    let normalized = normalize_endpoint(endpoint);
    if normalized.contains("..") || normalized.contains("//") {
        return Err(Error::validation(format!(
            "Endpoint path is not allowed: {normalized}"
        )));
    }

    Ok(normalized)
}

/// Quote an identifier for HANA, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifier_simple() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("USERS"));
        assert!(is_valid_identifier("user_table"));
    }

    #[test]
    fn test_valid_identifier_special_chars() {
        assert!(is_valid_identifier("SYS$TABLES"));
        assert!(is_valid_identifier("table#1"));
    }

    #[test]
    fn test_invalid_identifier() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1table"));
        assert!(!is_valid_identifier("user-table"));
        assert!(!is_valid_identifier("users; DROP"));
        assert!(!is_valid_identifier(&"a".repeat(128)));
    }

    #[test]
    fn test_validate_identifier_error() {
        let err = validate_identifier("1bad", "schema").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Invalid schema"));
    }

    #[test]
    fn test_source_names() {
        assert!(is_valid_source_name("sales"));
        assert!(is_valid_source_name("crm-api_v2"));
        assert!(!is_valid_source_name(""));
        assert!(!is_valid_source_name("2fast"));
        assert!(!is_valid_source_name("_hidden"));
        assert!(!is_valid_source_name("../etc"));
        assert!(!is_valid_source_name("a b"));
        assert!(!is_valid_source_name(&"a".repeat(65)));
        assert!(validate_source_name("x/y").unwrap_err().is_validation());
    }

    #[test]
    fn test_allows_select() {
        assert!(check_sql_query("SELECT * FROM t", 10, 1000).is_ok());
        assert!(check_sql_query("  select id from users  ", 10, 1000).is_ok());
    }

    #[test]
    fn test_blocks_drop() {
        assert!(
            check_sql_query("DROP TABLE t", 10, 1000)
                .unwrap_err()
                .is_validation()
        );
    }

    #[test]
    fn test_blocks_stacked_statement() {
        let err = check_sql_query("select 1; DROP TABLE t", 10, 1000).unwrap_err();
        assert!(err.to_string().contains("DROP"));
    }

    #[test]
    fn test_blocks_limit_over_maximum() {
        let err = check_sql_query("SELECT 1", 5000, 1000).unwrap_err();
        assert!(err.to_string().contains("5000"));
        assert!(check_sql_query("SELECT 1", 1000, 1000).is_ok());
    }

    #[test]
    fn test_blocks_non_select_verbs() {
        for sql in ["WITH x AS (SELECT 1) SELECT * FROM x", "SHOW TABLES", ""] {
            assert!(check_sql_query(sql, 1, 10).is_err(), "{sql}");
        }
    }

    #[test]
    fn test_blocks_deny_listed_keywords() {
        for sql in [
            "SELECT * FROM t INTO OUTFILE '/tmp/x'",
            "SELECT LOAD_FILE('/etc/passwd')",
            "SELECT 1; CALL proc()",
            "SELECT 1; MERGE INTO t USING s ON 1=1",
            "SELECT 1; GRANT SELECT ON t TO u",
        ] {
            assert!(check_sql_query(sql, 1, 10).is_err(), "{sql}");
        }
    }

    #[test]
    fn test_substring_match_rejects_benign_literal() {
        assert!(check_sql_query("SELECT * FROM t WHERE note = 'updated'", 1, 10).is_err());
        assert!(check_sql_query("SELECT created_at FROM t", 1, 10).is_err());
    }

    #[test]
    fn test_rest_request_allowed() {
        assert_eq!(check_rest_request("users", "get", 10, 100).unwrap(), "/users");
        assert_eq!(
            check_rest_request("/api/v1/orders", "HEAD", 10, 100).unwrap(),
            "/api/v1/orders"
        );
        assert!(check_rest_request("/users", "OPTIONS", 100, 100).is_ok());
    }

    #[test]
    fn test_rest_request_rejected() {
        assert!(check_rest_request("", "GET", 1, 10).is_err());
        assert!(check_rest_request("  ", "GET", 1, 10).is_err());
        assert!(check_rest_request("/users", "POST", 1, 10).is_err());
        assert!(check_rest_request("/users", "DELETE", 1, 10).is_err());
        assert!(check_rest_request("/users", "GET", 11, 10).is_err());
        assert!(check_rest_request("/../secrets", "GET", 1, 10).is_err());
        assert!(check_rest_request("/a//b", "GET", 1, 10).is_err());
        assert!(check_rest_request("//evil.example.com/x", "GET", 1, 10).is_err());
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("users"), "/users");
        assert_eq!(normalize_endpoint(" /users "), "/users");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("USERS"), "\"USERS\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
