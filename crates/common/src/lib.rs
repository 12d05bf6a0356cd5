//! Pestwise Common Library
//!
//! Shared code for all Pestwise crates including:
//! - Error types and handling
//! - Configuration management
//! - Intent classes and the synonym/keyword vocabulary
//! - Text normalization
//! - In-process response cache
//! - Performance monitoring and metrics

pub mod cache;
pub mod config;
pub mod errors;
pub mod intent;
pub mod metrics;
pub mod monitor;
pub mod text;
pub mod vocabulary;

// Re-export commonly used types
pub use cache::ResponseCache;
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use intent::IntentClass;
pub use monitor::PerformanceMonitor;
pub use vocabulary::{IntentKeywords, SynonymMap};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
