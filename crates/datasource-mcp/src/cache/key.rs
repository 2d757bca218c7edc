//! Cache key types and factory methods

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::config::CacheTier;
use crate::schema::canonical_json;

/// Cache key namespace, one per kind of cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Serialized query results
    QueryResult,
    /// Serialized schema snapshots
    SchemaSnapshot,
    /// Last observed schema fingerprint
    SchemaFingerprint,
}

impl CacheNamespace {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QueryResult => "query",
            Self::SchemaSnapshot => "schema",
            Self::SchemaFingerprint => "fingerprint",
        }
    }

    /// Tier holding values of this namespace
    #[must_use]
    pub const fn tier(&self) -> CacheTier {
        match self {
            Self::QueryResult => CacheTier::Query,
            Self::SchemaSnapshot => CacheTier::Schema,
            Self::SchemaFingerprint => CacheTier::Metadata,
        }
    }
}

/// Structured cache key scoped to one data source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    source: String,
    identifier: String,
    variant: Option<String>,
}

impl CacheKey {
    /// Create key for a query result.
    ///
    /// The statement is trimmed and whitespace runs outside quoted segments
    /// are collapsed before hashing, so layout differences map to the same
    /// entry while literal contents stay significant. Method and parameters
    /// are hashed along with it.
    #[must_use]
    pub fn query_result(
        source: &str,
        query: &str,
        method: &str,
        params: Option<&Value>,
        limit: u32,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_statement(query).as_bytes());
        hasher.update(b"\n");
        hasher.update(method.to_uppercase().as_bytes());
        if let Some(params) = params.filter(|p| !p.is_null()) {
            hasher.update(b"\n");
            hasher.update(canonical_json(params).as_bytes());
        }

        Self {
            namespace: CacheNamespace::QueryResult,
            source: source.to_string(),
            identifier: hex::encode(hasher.finalize()),
            variant: Some(limit.to_string()),
        }
    }

    /// Create key for a source's schema snapshot
    #[must_use]
    pub fn schema(source: &str) -> Self {
        Self {
            namespace: CacheNamespace::SchemaSnapshot,
            source: source.to_string(),
            identifier: CacheNamespace::SchemaSnapshot.as_str().to_string(),
            variant: None,
        }
    }

    /// Create key for a source's last schema fingerprint
    #[must_use]
    pub fn schema_fingerprint(source: &str) -> Self {
        Self {
            namespace: CacheNamespace::SchemaFingerprint,
            source: source.to_string(),
            identifier: CacheNamespace::SchemaFingerprint.as_str().to_string(),
            variant: None,
        }
    }

    #[must_use]
    pub const fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    #[must_use]
    pub const fn tier(&self) -> CacheTier {
        self.namespace.tier()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Convert to string key for storage
    #[must_use]
    pub fn to_key_string(&self) -> String {
        let mut key = format!("{}:{}", self.source, self.identifier);
        if let Some(ref variant) = self.variant {
            key.push(':');
            key.push_str(variant);
        }
        key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

/// Trim a statement and collapse whitespace runs into single spaces.
///
/// Text between single or double quotes is copied verbatim. A doubled quote
/// inside a literal closes and reopens it, which leaves the contents intact.
#[must_use]
pub fn normalize_statement(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for ch in query.trim().chars() {
        if let Some(open) = quote {
            out.push(ch);
            if ch == open {
                quote = None;
            }
        } else if ch.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            if ch == '\'' || ch == '"' {
                quote = Some(ch);
            }
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_query_result_key_format() {
        let key = CacheKey::query_result("sales", "SELECT * FROM users", "GET", None, 100);
        let key_str = key.to_key_string();

        let parts: Vec<&str> = key_str.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sales");
        assert_eq!(parts[1].len(), 64);
        assert_eq!(parts[2], "100");
    }

    #[test]
    fn test_query_result_deterministic() {
        let key1 = CacheKey::query_result("s", "SELECT * FROM users", "GET", None, 10);
        let key2 = CacheKey::query_result("s", "SELECT * FROM users", "GET", None, 10);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_query_result_ignores_whitespace_layout() {
        let key1 = CacheKey::query_result("s", "SELECT *\n  FROM   users ", "GET", None, 10);
        let key2 = CacheKey::query_result("s", "SELECT * FROM users", "GET", None, 10);
        assert_eq!(key1.to_key_string(), key2.to_key_string());
    }

    #[test]
    fn test_query_result_different_inputs() {
        let base = CacheKey::query_result("s", "SELECT * FROM users", "GET", None, 10);

        let other_sql = CacheKey::query_result("s", "SELECT * FROM orders", "GET", None, 10);
        let other_limit = CacheKey::query_result("s", "SELECT * FROM users", "GET", None, 20);
        let other_source = CacheKey::query_result("t", "SELECT * FROM users", "GET", None, 10);
        let other_method = CacheKey::query_result("s", "SELECT * FROM users", "HEAD", None, 10);

        assert_ne!(base, other_sql);
        assert_ne!(base, other_limit);
        assert_ne!(base, other_source);
        assert_ne!(base, other_method);
    }

    #[test]
    fn test_query_result_params_order_insensitive() {
        let a = json!({"page": 2, "sort": "name"});
        let b = json!({"sort": "name", "page": 2});
        let key1 = CacheKey::query_result("api", "/users", "GET", Some(&a), 10);
        let key2 = CacheKey::query_result("api", "/users", "GET", Some(&b), 10);
        assert_eq!(key1, key2);

        let c = json!({"page": 3});
        let key3 = CacheKey::query_result("api", "/users", "GET", Some(&c), 10);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_null_params_same_as_none() {
        let key1 = CacheKey::query_result("api", "/users", "GET", Some(&Value::Null), 10);
        let key2 = CacheKey::query_result("api", "/users", "GET", None, 10);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_schema_keys() {
        let key = CacheKey::schema("sales");
        assert_eq!(key.to_key_string(), "sales:schema");
        assert_eq!(key.tier(), CacheTier::Schema);

        let key = CacheKey::schema_fingerprint("sales");
        assert_eq!(format!("{key}"), "sales:fingerprint");
        assert_eq!(key.tier(), CacheTier::Metadata);
        assert_eq!(key.source(), "sales");
    }

    #[test]
    fn test_namespace_tiers() {
        assert_eq!(CacheNamespace::QueryResult.tier(), CacheTier::Query);
        assert_eq!(CacheNamespace::QueryResult.as_str(), "query");
        assert_eq!(CacheNamespace::SchemaSnapshot.as_str(), "schema");
    }

    #[test]
    fn test_normalize_statement() {
        assert_eq!(
            normalize_statement("  SELECT\t1\n FROM   DUMMY  "),
            "SELECT 1 FROM DUMMY"
        );
        assert_eq!(normalize_statement(""), "");
    }

    #[test]
    fn test_normalize_statement_keeps_quoted_text() {
        assert_eq!(
            normalize_statement("SELECT *  FROM t WHERE n = 'a  b'"),
            "SELECT * FROM t WHERE n = 'a  b'"
        );
        assert_eq!(
            normalize_statement("SELECT  \"my   col\"\nFROM t"),
            "SELECT \"my   col\" FROM t"
        );
        assert_eq!(
            normalize_statement("SELECT 'it''s  here'   FROM t"),
            "SELECT 'it''s  here' FROM t"
        );
    }

    #[test]
    fn test_query_result_literal_whitespace_significant() {
        let spaced = "SELECT * FROM t WHERE n = 'a  b'";
        let single = "SELECT * FROM t WHERE n = 'a b'";
        let key1 = CacheKey::query_result("s", spaced, "GET", None, 10);
        let key2 = CacheKey::query_result("s", single, "GET", None, 10);
        assert_ne!(key1, key2);
    }
}
