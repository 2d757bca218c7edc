//! Value conversion and cache helpers

use std::future::Future;
use std::time::Duration;

use hdbconnect_async::HdbValue;
use serde::Serialize;

use crate::Result;
use crate::cache::{CacheKey, CacheManager};

/// Convert `HdbValue` to `serde_json::Value`
pub fn hdb_value_to_json(value: &HdbValue) -> serde_json::Value {
    match value {
        HdbValue::NULL => serde_json::Value::Null,
        HdbValue::TINYINT(v) => serde_json::json!(v),
        HdbValue::SMALLINT(v) => serde_json::json!(v),
        HdbValue::INT(v) => serde_json::json!(v),
        HdbValue::BIGINT(v) => serde_json::json!(v),
        HdbValue::DECIMAL(v) => serde_json::json!(v.to_string()),
        HdbValue::REAL(v) => serde_json::json!(v),
        HdbValue::DOUBLE(v) => serde_json::json!(v),
        HdbValue::STRING(v) => serde_json::json!(v),
        HdbValue::BOOLEAN(v) => serde_json::json!(v),
        _ => serde_json::json!(format!("{value:?}")),
    }
}

/// Return the cached payload under `key`, or run `fetch`, serialize its
/// result and store it for `ttl`. Fetch errors are returned and never cached.
pub async fn cached_or_fetch<T, F, Fut>(
    cache: &CacheManager,
    key: &CacheKey,
    ttl: Option<Duration>,
    fetch: F,
) -> Result<String>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let key_string = key.to_key_string();
    if let Some(payload) = cache.get(&key_string, key.tier()) {
        return Ok(payload);
    }

    let value = fetch().await?;
    let payload = serde_json::to_string(&value)?;
    cache.set(key_string, payload.clone(), ttl, key.tier());
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_hdb_value_to_json_null() {
        let result = hdb_value_to_json(&HdbValue::NULL);
        assert!(result.is_null());
    }

    #[test]
    fn test_hdb_value_to_json_tinyint() {
        let result = hdb_value_to_json(&HdbValue::TINYINT(42));
        assert_eq!(result.as_u64(), Some(42));
    }

    #[test]
    fn test_hdb_value_to_json_smallint() {
        let result = hdb_value_to_json(&HdbValue::SMALLINT(1234));
        assert_eq!(result.as_i64(), Some(1234));
    }

    #[test]
    fn test_hdb_value_to_json_int() {
        let result = hdb_value_to_json(&HdbValue::INT(123456));
        assert_eq!(result.as_i64(), Some(123456));
    }

    #[test]
    fn test_hdb_value_to_json_bigint() {
        let result = hdb_value_to_json(&HdbValue::BIGINT(9_876_543_210));
        assert_eq!(result.as_i64(), Some(9_876_543_210));
    }

    #[test]
    fn test_hdb_value_to_json_real() {
        let result = hdb_value_to_json(&HdbValue::REAL(3.14));
        assert!(result.is_number());
    }

    #[test]
    fn test_hdb_value_to_json_double() {
        let result = hdb_value_to_json(&HdbValue::DOUBLE(2.71828));
        assert_eq!(result.as_f64(), Some(2.71828));
    }

    #[test]
    fn test_hdb_value_to_json_string() {
        let result = hdb_value_to_json(&HdbValue::STRING("hello world".to_string()));
        assert_eq!(result.as_str(), Some("hello world"));
    }

    #[test]
    fn test_hdb_value_to_json_boolean_true() {
        let result = hdb_value_to_json(&HdbValue::BOOLEAN(true));
        assert_eq!(result.as_bool(), Some(true));
    }

    #[test]
    fn test_hdb_value_to_json_boolean_false() {
        let result = hdb_value_to_json(&HdbValue::BOOLEAN(false));
        assert_eq!(result.as_bool(), Some(false));
    }

    #[test]
    fn test_hdb_value_to_json_binary_fallback() {
        let result = hdb_value_to_json(&HdbValue::BINARY(vec![1, 2, 3]));
        assert!(result.is_string());
        assert!(result.as_str().unwrap().contains("BINARY"));
    }

    #[tokio::test]
    async fn test_cached_or_fetch_miss_then_hit() {
        let cache = CacheManager::default();
        let key = CacheKey::query_result("app", "SELECT 1", "GET", None, 10);
        let fetches = &AtomicU32::new(0);

        for _ in 0..2 {
            let payload = cached_or_fetch(&cache, &key, None, || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(vec![serde_json::json!({"ID": 1})])
            })
            .await
            .unwrap();
            assert_eq!(payload, r#"[{"ID":1}]"#);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        let stats = cache.get_stats();
        assert_eq!(stats.tiers["query"].hits, 1);
        assert_eq!(stats.tiers["query"].misses, 1);
    }

    #[tokio::test]
    async fn test_cached_or_fetch_error_not_cached() {
        let cache = CacheManager::default();
        let key = CacheKey::schema("app");

        let result: Result<String> = cached_or_fetch(&cache, &key, None, || async {
            Err::<Vec<u8>, _>(crate::Error::backend("unavailable"))
        })
        .await;

        assert!(result.unwrap_err().is_backend());
        assert_eq!(cache.get_stats().tiers["schema"].size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_or_fetch_respects_ttl() {
        let cache = CacheManager::default();
        let key = CacheKey::query_result("app", "SELECT 1", "GET", None, 10);
        let fetches = &AtomicU32::new(0);
        let fetch = || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(1u8)
        };

        cached_or_fetch(&cache, &key, Some(Duration::from_secs(5)), fetch)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cached_or_fetch(&cache, &key, Some(Duration::from_secs(5)), fetch)
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
