//! Pestwise Context Engine
//!
//! Turns a farmer's question into an answer:
//! - Intent classification
//! - Intent-scoped knowledge lookup
//! - Generation with per-intent models and canned fallbacks
//! - Retrieval enhancement and answer caching

pub mod classifier;
pub mod generation;
pub mod lookup;
pub mod orchestrator;

pub use classifier::{Classification, QueryClassifier};
pub use generation::{
    AdapterSettings, GenerationAdapter, GenerationOptions, GenerationOutcome, OutcomeOrigin,
    ProbeState,
};
pub use orchestrator::{Answer, AnswerMetadata, Orchestrator, OrchestratorBuilder, SourceTag};
