//! Configuration management for Pestwise services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values
//!
//! Every field has a default, so an empty environment yields a runnable
//! configuration pointing at a local generation backend.

use crate::errors::{AppError, Result};
use crate::intent::IntentClass;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Retrieval index configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Knowledge source configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Query classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Performance monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Backend base URL
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    /// Model used when an intent has no specialized model
    #[serde(default = "default_generation_model")]
    pub default_model: String,

    /// Intent name -> specialized model id
    #[serde(default)]
    pub intent_models: HashMap<String, String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub request_timeout_secs: u64,

    /// Startup probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// How long a request waits for a pending probe, in milliseconds
    #[serde(default = "default_probe_wait")]
    pub probe_wait_ms: u64,

    /// Minimum gap between re-probes of an unavailable backend, in seconds
    #[serde(default = "default_probe_retry")]
    pub probe_retry_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ask the backend for a newline-delimited stream
    #[serde(default)]
    pub stream: bool,

    /// Cleaned responses shorter than this are rejected
    #[serde(default = "default_min_response_chars")]
    pub min_response_chars: usize,

    /// Memoized responses kept
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,

    #[serde(default = "default_memo_ttl")]
    pub memo_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Maximum cached answers
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Time to live in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Also cache canned fallback answers
    #[serde(default)]
    pub cache_fallbacks: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Minimum score for a passage to be appended
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,

    /// Results considered by enhancement
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Chunk window in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunk windows in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Smaller chunks are dropped unless they are a document's only chunk
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Content prefix compared against the query, in characters
    #[serde(default = "default_content_prefix")]
    pub content_prefix_chars: usize,

    /// JSON corpus replacing the built-in document list
    pub corpus_path: Option<String>,

    #[serde(default)]
    pub weights: ScoringWeights,
}

/// Weights of the four relevance signals
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScoringWeights {
    /// Per query keyword found in the chunk
    #[serde(default = "default_chunk_keyword_weight")]
    pub chunk_keyword: f64,

    /// Per query keyword found in the title
    #[serde(default = "default_title_keyword_weight")]
    pub title_keyword: f64,

    /// Normalized query/title similarity
    #[serde(default = "default_title_similarity_weight")]
    pub title_similarity: f64,

    /// Normalized query/content-prefix similarity
    #[serde(default = "default_content_similarity_weight")]
    pub content_similarity: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    /// Directory of `*.kb` frame files
    #[serde(default = "default_knowledge_dir")]
    pub source_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Shorter queries classify as general
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// Intent name -> ordered keyword list, replacing the built-in list
    #[serde(default)]
    pub keywords: HashMap<String, Vec<String>>,

    /// Extra surface term -> canonical term pairs
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Snapshot file (empty disables persistence)
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Periodic snapshot interval in seconds
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_generation_url() -> String { "http://localhost:11434".to_string() }
fn default_generation_model() -> String { "llama3.2".to_string() }
fn default_generation_timeout() -> u64 { 30 }
fn default_probe_timeout() -> u64 { 5 }
fn default_probe_wait() -> u64 { 250 }
fn default_probe_retry() -> u64 { 30 }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 512 }
fn default_min_response_chars() -> usize { 12 }
fn default_memo_capacity() -> usize { 256 }
fn default_memo_ttl() -> u64 { 3600 }
fn default_cache_capacity() -> usize { 1000 }
fn default_cache_ttl() -> u64 { 600 }
fn default_relevance_threshold() -> f64 { 4.0 }
fn default_top_n() -> usize { 3 }
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_min_chunk_size() -> usize { 40 }
fn default_content_prefix() -> usize { 200 }
fn default_chunk_keyword_weight() -> f64 { 1.0 }
fn default_title_keyword_weight() -> f64 { 3.0 }
fn default_title_similarity_weight() -> f64 { 5.0 }
fn default_content_similarity_weight() -> f64 { 1.0 }
fn default_knowledge_dir() -> String { "data/knowledge".to_string() }
fn default_min_query_chars() -> usize { 3 }
fn default_snapshot_path() -> String { "data/monitor_snapshot.json".to_string() }
fn default_snapshot_interval() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "pestwise".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            default_model: default_generation_model(),
            intent_models: HashMap::new(),
            request_timeout_secs: default_generation_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            probe_wait_ms: default_probe_wait(),
            probe_retry_secs: default_probe_retry(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stream: false,
            min_response_chars: default_min_response_chars(),
            memo_capacity: default_memo_capacity(),
            memo_ttl_secs: default_memo_ttl(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
            cache_fallbacks: false,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            top_n: default_top_n(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
            content_prefix_chars: default_content_prefix(),
            corpus_path: None,
            weights: ScoringWeights::default(),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            chunk_keyword: default_chunk_keyword_weight(),
            title_keyword: default_title_keyword_weight(),
            title_similarity: default_title_similarity_weight(),
            content_similarity: default_content_similarity_weight(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source_dir: default_knowledge_dir(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_query_chars: default_min_query_chars(),
            keywords: HashMap::new(),
            synonyms: HashMap::new(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl GenerationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }

    pub fn probe_retry(&self) -> Duration {
        Duration::from_secs(self.probe_retry_secs)
    }

    /// Specialized models keyed by intent
    pub fn intent_model_map(&self) -> Result<HashMap<IntentClass, String>> {
        self.intent_models
            .iter()
            .map(|(name, model)| {
                let intent = name.parse::<IntentClass>().map_err(|e| AppError::Configuration {
                    message: format!("generation.intent_models: {}", e),
                })?;
                Ok((intent, model.clone()))
            })
            .collect()
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__GENERATION__BASE_URL=http://ollama:11434
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values that make the pipeline unusable
    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| {
            Err(AppError::Configuration {
                message: message.to_string(),
            })
        };

        if self.cache.capacity == 0 {
            return fail("cache.capacity must be greater than zero");
        }
        if self.generation.memo_capacity == 0 {
            return fail("generation.memo_capacity must be greater than zero");
        }
        if self.retrieval.chunk_size == 0 {
            return fail("retrieval.chunk_size must be greater than zero");
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return fail("retrieval.chunk_overlap must be smaller than retrieval.chunk_size");
        }
        if self.retrieval.relevance_threshold < 0.0 {
            return fail("retrieval.relevance_threshold must not be negative");
        }
        if self.generation.base_url.trim().is_empty() {
            return fail("generation.base_url must not be empty");
        }
        self.generation.intent_model_map()?;
        for name in self.classifier.keywords.keys() {
            name.parse::<IntentClass>().map_err(|e| AppError::Configuration {
                message: format!("classifier.keywords: {}", e),
            })?;
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}
