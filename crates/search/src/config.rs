//! Client configuration.
//!
//! Configuration is plain serde data so it can come from a file, environment,
//! or code. [`ClientConfig`] is tagged by `backend`:
//!
//! ```json
//! { "backend": "meilisearch", "url": "http://localhost:7700", "api_key": "masterKey" }
//! ```
//!
//! Durations use humantime strings (`"50ms"`, `"2m"`).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backends::elasticsearch::ElasticsearchClient;
use crate::backends::meilisearch::MeilisearchClient;
use crate::core::{BackendKind, SearchClient};
use crate::error::{ClientError, ClientResult};
use crate::transport::HttpSender;

/// Retry policy for transport failures and retryable statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `backoff * n`.
    #[serde(with = "humantime_serde", default = "default_backoff")]
    pub backoff: Duration,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_millis(100)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: default_backoff(),
        }
    }
}

/// Elasticsearch credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElasticsearchAuth {
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// API key; with `id` the pair is encoded, otherwise `key` is sent as-is.
    ApiKey {
        /// Key id, when the key was issued as an id/secret pair.
        #[serde(default)]
        id: Option<String>,
        /// The key, or the secret half of the pair.
        key: String,
    },
}

/// Configuration for the Elasticsearch/OpenSearch adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Node URLs, used round-robin.
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Credentials; none for an open cluster.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Accept any TLS certificate. Development only.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_nodes() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            auth: None,
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            disable_certificate_validation: false,
        }
    }
}

impl ElasticsearchConfig {
    /// `request_timeout_ms` as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.nodes.is_empty() {
            errors.push("at least one node is required".to_string());
        }
        for node in &self.nodes {
            validate_url(node, &mut errors);
        }
        if self.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be greater than zero".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Configuration for the Meilisearch adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeilisearchConfig {
    /// Base URL of the instance.
    #[serde(default = "default_meilisearch_url")]
    pub url: String,

    /// Sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Primary key attribute used for documents.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Delay between task status polls.
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Upper bound on waiting for one task; `None` waits until the context ends.
    #[serde(with = "humantime_serde::option", default = "default_task_timeout")]
    pub task_timeout: Option<Duration>,

    /// Reject queries and options that cannot be translated instead of
    /// dropping them with a warning.
    #[serde(default)]
    pub strict: bool,

    /// Wait for each bulk group's task so failures land on the right items.
    #[serde(default = "default_wait_for_bulk_tasks")]
    pub wait_for_bulk_tasks: bool,

    /// Accept any TLS certificate. Development only.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_meilisearch_url() -> String {
    "http://localhost:7700".to_string()
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_task_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_wait_for_bulk_tasks() -> bool {
    true
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: default_meilisearch_url(),
            api_key: None,
            primary_key: default_primary_key(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            poll_interval: default_poll_interval(),
            task_timeout: default_task_timeout(),
            strict: false,
            wait_for_bulk_tasks: default_wait_for_bulk_tasks(),
            disable_certificate_validation: false,
        }
    }
}

impl MeilisearchConfig {
    /// `request_timeout_ms` as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        validate_url(&self.url, &mut errors);
        if self.primary_key.is_empty() {
            errors.push("primary_key cannot be empty".to_string());
        }
        if self.poll_interval.is_zero() {
            errors.push("poll_interval must be greater than zero".to_string());
        }
        if self.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be greater than zero".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn validate_url(raw: &str, errors: &mut Vec<String>) {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!("unsupported scheme {:?} in {}", url.scheme(), raw)),
        Err(e) => errors.push(format!("invalid URL {:?}: {}", raw, e)),
    }
}

/// Selects a backend and its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ClientConfig {
    /// Elasticsearch cluster settings.
    Elasticsearch(ElasticsearchConfig),
    /// Meilisearch instance settings.
    Meilisearch(MeilisearchConfig),
}

impl ClientConfig {
    /// Selects the Elasticsearch adapter.
    pub fn elasticsearch(config: ElasticsearchConfig) -> Self {
        ClientConfig::Elasticsearch(config)
    }

    /// Selects the Meilisearch adapter.
    pub fn meilisearch(config: MeilisearchConfig) -> Self {
        ClientConfig::Meilisearch(config)
    }

    /// The selected backend.
    pub fn backend(&self) -> BackendKind {
        match self {
            ClientConfig::Elasticsearch(_) => BackendKind::Elasticsearch,
            ClientConfig::Meilisearch(_) => BackendKind::Meilisearch,
        }
    }

    /// Validates the selected backend's configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        match self {
            ClientConfig::Elasticsearch(config) => config.validate(),
            ClientConfig::Meilisearch(config) => config.validate(),
        }
    }
}

/// Builds a client for the configured backend.
pub fn connect(config: ClientConfig) -> ClientResult<Arc<dyn SearchClient>> {
    check(&config)?;
    Ok(match config {
        ClientConfig::Elasticsearch(config) => Arc::new(ElasticsearchClient::new(config)?),
        ClientConfig::Meilisearch(config) => Arc::new(MeilisearchClient::new(config)?),
    })
}

/// Builds a client that sends through `sender` instead of the default HTTP client.
pub fn connect_with_sender(
    config: ClientConfig,
    sender: Arc<dyn HttpSender>,
) -> ClientResult<Arc<dyn SearchClient>> {
    check(&config)?;
    Ok(match config {
        ClientConfig::Elasticsearch(config) => {
            Arc::new(ElasticsearchClient::with_sender(config, sender)?)
        }
        ClientConfig::Meilisearch(config) => {
            Arc::new(MeilisearchClient::with_sender(config, sender)?)
        }
    })
}

fn check(config: &ClientConfig) -> ClientResult<()> {
    config
        .validate()
        .map_err(|errors| ClientError::Configuration {
            message: errors.join("; "),
        })
}

/// Serde helpers for humantime duration strings.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meilisearch_defaults() {
        let config = MeilisearchConfig::default();
        assert_eq!(config.primary_key, "id");
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert!(config.wait_for_bulk_tasks);
        assert!(!config.strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tagged_config_from_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "backend": "meilisearch",
                "url": "http://search:7700",
                "api_key": "masterKey",
                "poll_interval": "20ms",
                "task_timeout": "2m",
                "strict": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend(), BackendKind::Meilisearch);
        let ClientConfig::Meilisearch(meili) = config else {
            panic!("expected meilisearch config");
        };
        assert_eq!(meili.url, "http://search:7700");
        assert_eq!(meili.poll_interval, Duration::from_millis(20));
        assert_eq!(meili.task_timeout, Some(Duration::from_secs(120)));
        assert!(meili.strict);
        assert_eq!(meili.primary_key, "id");
    }

    #[test]
    fn test_elasticsearch_config_from_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "backend": "elasticsearch",
                "nodes": ["http://es1:9200", "http://es2:9200"],
                "auth": { "type": "basic", "username": "elastic", "password": "secret" },
                "retry": { "max_retries": 5, "backoff": "250ms" }
            }"#,
        )
        .unwrap();
        let ClientConfig::Elasticsearch(es) = config else {
            panic!("expected elasticsearch config");
        };
        assert_eq!(es.nodes.len(), 2);
        assert_eq!(es.retry.max_retries, 5);
        assert_eq!(es.retry.backoff, Duration::from_millis(250));
        assert_eq!(es.request_timeout_ms, 30000);
        assert!(matches!(es.auth, Some(ElasticsearchAuth::Basic { .. })));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = ElasticsearchConfig {
            nodes: vec!["ftp://es:9200".to_string(), "not a url".to_string()],
            request_timeout_ms: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_connect_rejects_invalid_config() {
        let config = ClientConfig::elasticsearch(ElasticsearchConfig {
            nodes: vec![],
            ..Default::default()
        });
        let err = connect(config).unwrap_err();
        assert!(matches!(err, ClientError::Configuration { .. }));
    }

    #[test]
    fn test_retry_config_roundtrip() {
        let json = serde_json::to_value(RetryConfig::default()).unwrap();
        assert_eq!(json["backoff"], "100ms");
        assert_eq!(json["max_retries"], 3);
    }
}
