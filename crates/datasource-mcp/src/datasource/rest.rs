//! JSON HTTP API data source

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use super::{
    ConnectionState, DataSource, RateLimiter, RetryPolicy, SourceSettings, normalize_records,
    redact,
};
use crate::config::RestSourceConfig;
use crate::constants::{COMMON_REST_PATHS, REST_LIMIT_PARAM_CEILING, SCHEMA_SAMPLE_SIZE};
use crate::schema::SchemaSnapshot;
use crate::types::{HealthStatus, QueryParams, Record};
use crate::validation::{check_rest_request, normalize_endpoint};
use crate::{Error, Result};

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// Credentials attached to every request
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        api_key: String,
        #[serde(default = "default_api_key_header")]
        header: String,
    },
}

impl RestAuth {
    pub const fn auth_type(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::ApiKey { .. } => "api_key",
        }
    }

    pub const fn is_required(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Debug for RestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::ApiKey { header, .. } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .finish_non_exhaustive(),
        }
    }
}

fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("Invalid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn build_headers(auth: &RestAuth, extra: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    match auth {
        RestAuth::Bearer { token } => {
            headers.insert(AUTHORIZATION, sensitive_value(&format!("Bearer {token}"))?);
        }
        RestAuth::ApiKey { api_key, header } => {
            let name = HeaderName::from_bytes(header.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid API key header '{header}': {e}")))?;
            headers.insert(name, sensitive_value(api_key)?);
        }
        RestAuth::None | RestAuth::Basic { .. } => {}
    }

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name '{name}': {e}")))?;
        headers.insert(name, sensitive_value(value)?);
    }

    Ok(headers)
}

/// Flatten query string parameters; only a JSON object (or nothing) is accepted
fn query_pairs(params: Option<&Value>) -> Result<Vec<(String, String)>> {
    match params {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()),
        Some(_) => Err(Error::validation("params must be a JSON object")),
    }
}

/// Read-only [`DataSource`] over a JSON HTTP API
pub struct RestDataSource {
    name: String,
    base_url: Url,
    auth: RestAuth,
    headers: HeaderMap,
    header_names: Vec<String>,
    timeout: Duration,
    schema_endpoint: String,
    discovery_endpoint: String,
    health_endpoint: String,
    limit_param: String,
    settings: SourceSettings,
    retry: RetryPolicy,
    limiter: RateLimiter,
    client: RwLock<Option<reqwest::Client>>,
    state: ConnectionState,
    connect_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for RestDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestDataSource")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("rate_limit", &self.limiter.limit())
            .field("connected", &self.state.is_connected())
            .finish_non_exhaustive()
    }
}

impl RestDataSource {
    /// Validate `config` and build a disconnected source
    pub fn new(config: &RestSourceConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid base_url '{}': {e}", config.base_url)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base_url must use http or https: {}",
                config.base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let headers = build_headers(&config.auth, &config.headers)?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            auth: config.auth.clone(),
            headers,
            header_names: config.headers.keys().cloned().collect(),
            timeout: config.timeout(),
            schema_endpoint: config.schema_endpoint.clone(),
            discovery_endpoint: config.discovery_endpoint.clone(),
            health_endpoint: config.health_endpoint.clone(),
            limit_param: config.limit_param.clone(),
            settings: config.common.settings(),
            retry: config.common.retry_policy(),
            limiter: RateLimiter::per_minute(NonZeroU32::new(config.rate_limit)),
            client: RwLock::new(None),
            state: ConnectionState::default(),
            connect_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint path below the base URL
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint.trim().trim_start_matches('/'))
            .map_err(|e| Error::validation(format!("Invalid endpoint '{endpoint}': {e}")))
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .build()?)
    }

    async fn ensure_client(&self) -> Result<reqwest::Client> {
        if let Some(client) = self.client.read().clone() {
            return Ok(client);
        }
        if self.connect().await
            && let Some(client) = self.client.read().clone()
        {
            return Ok(client);
        }
        Err(Error::Connection(self.last_error().unwrap_or_else(|| {
            format!("data source '{}' is not connected", self.name)
        })))
    }

    async fn send_once(&self, client: &reqwest::Client, method: Method, url: Url) -> Result<Value> {
        self.limiter.acquire().await;

        let mut request = client.request(method, url);
        if let RestAuth::Basic { username, password } = &self.auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::backend(format!("HTTP {}: {body}", status.as_u16())));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        retry: RetryPolicy,
    ) -> Result<Value> {
        let client = self.ensure_client().await?;
        let mut url = self.endpoint_url(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        tracing::debug!(source = %self.name, %method, url = %url, "Sending request");
        retry
            .run(endpoint, || self.send_once(&client, method.clone(), url.clone()))
            .await
    }

    /// Probe the conventional collection paths, one attempt each
    async fn discover_common_endpoints(&self) -> Vec<(String, Value)> {
        let mut discovered = Vec::new();
        for &path in COMMON_REST_PATHS {
            let response = match self
                .request(Method::GET, path, &[], RetryPolicy::single())
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(source = %self.name, path, error = %e, "Probe failed");
                    continue;
                }
            };

            let (response_type, sample) = match response {
                Value::Array(items) => (
                    "array",
                    Value::Array(items.into_iter().take(SCHEMA_SAMPLE_SIZE).collect()),
                ),
                Value::Object(map) => ("object", Value::Object(map)),
                _ => continue,
            };
            let resource = path.rsplit('/').next().unwrap_or(path);
            discovered.push((
                path.to_string(),
                json!({
                    "path": path,
                    "method": "GET",
                    "description": format!("Get {resource} data"),
                    "response_type": response_type,
                    "sample_response": sample,
                }),
            ));
        }
        discovered
    }
}

/// Key endpoint descriptions by their `path`, falling back to the position
fn endpoint_entities(body: &Value) -> Vec<(String, Value)> {
    body.get("endpoints")
        .and_then(Value::as_array)
        .map(|endpoints| {
            endpoints
                .iter()
                .enumerate()
                .map(|(i, endpoint)| {
                    let key = endpoint
                        .get("path")
                        .and_then(Value::as_str)
                        .map_or_else(|| format!("endpoint_{i}"), str::to_string);
                    (key, endpoint.clone())
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DataSource for RestDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "rest_api"
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn last_error(&self) -> Option<String> {
        self.state.last_error()
    }

    async fn connect(&self) -> bool {
        let _guard = self.connect_lock.lock().await;
        if self.state.is_connected() {
            return true;
        }

        match self.build_client() {
            Ok(client) => {
                *self.client.write() = Some(client);
                self.state.mark_connected();
                tracing::info!(source = %self.name, base_url = %self.base_url, "Connected to REST API");
                true
            }
            Err(e) => {
                tracing::error!(source = %self.name, error = %e, "Failed to build HTTP client");
                self.state.mark_failed(&e);
                false
            }
        }
    }

    async fn disconnect(&self) -> bool {
        let _guard = self.connect_lock.lock().await;
        if self.client.write().take().is_some() {
            tracing::info!(source = %self.name, "Disconnected from REST API");
        }
        self.state.mark_disconnected();
        true
    }

    async fn get_schema(&self) -> Result<SchemaSnapshot> {
        let mut snapshot =
            SchemaSnapshot::new(&self.name, self.settings.schema_cache_ttl.as_secs())
                .with_header_field("api_name", json!(self.name))
                .with_header_field("base_url", json!(self.base_url.as_str()))
                .with_extra(
                    "authentication",
                    json!({
                        "type": self.auth.auth_type(),
                        "required": self.auth.is_required(),
                    }),
                );

        let (method, entities) = match self
            .request(Method::GET, &self.schema_endpoint, &[], self.retry)
            .await
        {
            Ok(body) => {
                let models = body.get("models").cloned().unwrap_or_else(|| json!({}));
                snapshot = snapshot.with_extra("models", models);
                ("schema_endpoint", endpoint_entities(&body))
            }
            Err(e) => {
                tracing::debug!(source = %self.name, error = %e, "Schema endpoint unavailable");
                match self
                    .request(Method::GET, &self.discovery_endpoint, &[], self.retry)
                    .await
                {
                    Ok(body) => ("discovery_endpoint", endpoint_entities(&body)),
                    Err(e) => {
                        tracing::debug!(source = %self.name, error = %e, "Discovery endpoint unavailable");
                        ("auto", self.discover_common_endpoints().await)
                    }
                }
            }
        };

        snapshot = snapshot.with_header_field("discovery_method", json!(method));
        for (key, description) in entities {
            snapshot.insert_entity(key, description);
        }

        tracing::info!(
            source = %self.name,
            endpoints = snapshot.metadata.total_entities,
            discovery_method = method,
            "API schema generated"
        );
        Ok(snapshot)
    }

    async fn query(&self, params: &QueryParams) -> Result<Vec<Record>> {
        self.check_query(params)?;
        let endpoint = normalize_endpoint(&params.query);
        let method = Method::from_bytes(params.method.trim().to_uppercase().as_bytes())
            .map_err(|e| Error::validation(format!("Invalid HTTP method: {e}")))?;

        let limit = self.settings.effective_limit(params.limit);
        let mut query = query_pairs(params.params.as_ref())?;
        if limit < REST_LIMIT_PARAM_CEILING && !query.iter().any(|(k, _)| *k == self.limit_param) {
            query.push((self.limit_param.clone(), limit.to_string()));
        }

        let body = self.request(method, &endpoint, &query, self.retry).await?;
        let records = normalize_records(body, limit as usize);

        tracing::debug!(source = %self.name, records = records.len(), "API query completed");
        Ok(records)
    }

    fn check_query(&self, params: &QueryParams) -> Result<()> {
        check_rest_request(
            &params.query,
            &params.method,
            params.limit,
            self.settings.max_query_limit,
        )?;
        query_pairs(params.params.as_ref()).map(|_| ())
    }

    async fn health_check(&self) -> HealthStatus {
        if !self.is_connected() && !self.connect().await {
            let error = self
                .last_error()
                .unwrap_or_else(|| "not connected".to_string());
            return HealthStatus::unhealthy(&self.name, self.kind(), false, error);
        }

        match self
            .request(Method::GET, &self.health_endpoint, &[], self.retry)
            .await
        {
            Ok(_) => {
                let mut details = Map::new();
                details.insert("base_url".to_string(), json!(self.base_url.as_str()));
                details.insert("auth_type".to_string(), json!(self.auth.auth_type()));
                HealthStatus::healthy(&self.name, self.kind(), details)
            }
            Err(e) => {
                HealthStatus::unhealthy(&self.name, self.kind(), self.is_connected(), e.to_string())
            }
        }
    }

    fn config_metadata(&self) -> Value {
        redact(json!({
            "type": self.kind(),
            "base_url": self.base_url.as_str(),
            "auth": self.auth,
            "headers": self.header_names,
            "timeout": self.timeout.as_secs(),
            "rate_limit": self.limiter.limit().map(NonZeroU32::get),
            "max_query_limit": self.settings.max_query_limit,
            "query_cache_ttl": self.settings.query_cache_ttl.as_secs(),
            "schema_cache_ttl": self.settings.schema_cache_ttl.as_secs(),
            "schema_endpoint": self.schema_endpoint,
            "discovery_endpoint": self.discovery_endpoint,
            "health_endpoint": self.health_endpoint,
            "limit_param": self.limit_param,
        }))
    }
}
