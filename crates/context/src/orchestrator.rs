//! Answer pipeline
//!
//! One `ask` runs an explicit state machine:
//!
//! ```text
//! Classifying -> KnowledgeLookup -> Done
//!                                -> Generating -> RetrievalEnhance -> Done
//! any state -> ErrorFallback
//! ```
//!
//! Components are composed once through [`OrchestratorBuilder`] and shared
//! by reference across concurrent requests. Answers go through the response
//! cache, and every component touched records a performance sample.

use crate::classifier::QueryClassifier;
use crate::generation::{prompts, GenerationAdapter, GenerationOptions};
use crate::lookup;
use pestwise_common::cache::keys;
use pestwise_common::errors::{AppError, Result};
use pestwise_common::metrics;
use pestwise_common::monitor::PerformanceSample;
use pestwise_common::{text, IntentClass, PerformanceMonitor, ResponseCache};
use pestwise_knowledge::KnowledgeBase;
use pestwise_search::Retriever;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Frames embedded in a generation prompt
const MAX_PROMPT_FACTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Classifying,
    KnowledgeLookup,
    Generating,
    RetrievalEnhance,
    Done,
    ErrorFallback,
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "kb")]
    Kb,
    #[serde(rename = "generation")]
    Generation,
    #[serde(rename = "generation+retrieval")]
    GenerationRetrieval,
    #[serde(rename = "fallback")]
    Fallback,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Kb => "kb",
            SourceTag::Generation => "generation",
            SourceTag::GenerationRetrieval => "generation+retrieval",
            SourceTag::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_frame_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_sources: Option<Vec<String>>,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub elapsed_ms: u64,
}

/// Result of [`Orchestrator::ask`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub source: SourceTag,
    pub intent: IntentClass,
    pub metadata: AnswerMetadata,
}

/// Best answer produced so far in a run
struct Draft {
    text: String,
    source: SourceTag,
}

#[derive(Default)]
pub struct OrchestratorBuilder {
    classifier: Option<QueryClassifier>,
    knowledge: Option<Arc<KnowledgeBase>>,
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<Arc<GenerationAdapter>>,
    cache: Option<Arc<ResponseCache>>,
    monitor: Option<Arc<PerformanceMonitor>>,
    generation_options: GenerationOptions,
    cache_fallbacks: bool,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classifier(mut self, classifier: QueryClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<GenerationAdapter>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn generation_options(mut self, options: GenerationOptions) -> Self {
        self.generation_options = options;
        self
    }

    /// Also cache answers that came from a canned fallback
    pub fn cache_fallbacks(mut self, enabled: bool) -> Self {
        self.cache_fallbacks = enabled;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        Ok(Orchestrator {
            classifier: required(self.classifier, "classifier")?,
            knowledge: required(self.knowledge, "knowledge base")?,
            retriever: required(self.retriever, "retriever")?,
            generator: required(self.generator, "generation adapter")?,
            cache: required(self.cache, "response cache")?,
            monitor: required(self.monitor, "performance monitor")?,
            generation_options: self.generation_options,
            cache_fallbacks: self.cache_fallbacks,
        })
    }
}

fn required<T>(component: Option<T>, name: &str) -> Result<T> {
    component.ok_or_else(|| AppError::Configuration {
        message: format!("orchestrator is missing its {}", name),
    })
}

pub struct Orchestrator {
    classifier: QueryClassifier,
    knowledge: Arc<KnowledgeBase>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<GenerationAdapter>,
    cache: Arc<ResponseCache>,
    monitor: Arc<PerformanceMonitor>,
    generation_options: GenerationOptions,
    cache_fallbacks: bool,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn retriever(&self) -> &Arc<dyn Retriever> {
        &self.retriever
    }

    pub fn generator(&self) -> &Arc<GenerationAdapter> {
        &self.generator
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Answer a query. Never fails; the worst case is a canned fallback.
    pub async fn ask(&self, query: &str, context: Option<&str>) -> Answer {
        let started = Instant::now();
        let normalized = text::normalize(query);
        let context = context.map(str::trim).filter(|c| !c.is_empty());

        if normalized.is_empty() {
            debug!("Empty query, answering with fallback");
            let answer = self.finish(
                started,
                IntentClass::GeneralQuery,
                None,
                AnswerMetadata::default(),
                PipelineState::ErrorFallback,
            );
            return answer;
        }

        // One snapshot per request; the key ties cached answers to it
        let snapshot = self.knowledge.current();
        let cache_key = keys::answer(&normalized, context, snapshot.version);
        let cache_started = Instant::now();
        let cached = self.cache.get::<Answer>(&cache_key);
        self.monitor.record("cache", "lookup", cache_started.elapsed(), true);

        if let Some(mut answer) = cached {
            answer.metadata.cache_hit = true;
            answer.metadata.elapsed_ms = started.elapsed().as_millis() as u64;
            self.record_request(answer.intent, started.elapsed(), true);
            metrics::record_answer(answer.source.as_str());
            debug!(intent = %answer.intent, source = %answer.source, "Answer served from cache");
            return answer;
        }

        let mut state = PipelineState::Classifying;
        let mut intent = IntentClass::GeneralQuery;
        let mut knowledge = lookup::KnowledgeMatch::default();
        let mut draft: Option<Draft> = None;
        let mut metadata = AnswerMetadata::default();

        loop {
            debug!(state = ?state, "Pipeline step");
            state = match state {
                PipelineState::Classifying => {
                    let stage = Instant::now();
                    intent = self.classifier.classify(query);
                    self.monitor.record("classifier", "classify", stage.elapsed(), true);
                    PipelineState::KnowledgeLookup
                }
                PipelineState::KnowledgeLookup => {
                    let stage = Instant::now();
                    knowledge = lookup::lookup(&snapshot.store, query, intent);
                    self.monitor.record("knowledge", "lookup", stage.elapsed(), true);

                    match &knowledge.complete {
                        Some((frame, attribute)) => {
                            debug!(frame = %frame.id, intent = %intent, "Knowledge fast path");
                            metadata.matched_frame_id = Some(frame.id.clone());
                            draft = Some(Draft {
                                text: lookup::render(frame, attribute, intent),
                                source: SourceTag::Kb,
                            });
                            PipelineState::Done
                        }
                        None => {
                            metadata.matched_frame_id =
                                knowledge.frames.first().map(|f| f.id.clone());
                            PipelineState::Generating
                        }
                    }
                }
                PipelineState::Generating => {
                    let facts = lookup::facts(&knowledge.frames, MAX_PROMPT_FACTS);
                    let prompt = prompts::build_prompt(query, &facts, context);
                    let outcome = self
                        .generator
                        .generate(&prompt, intent, &self.generation_options)
                        .await;

                    metadata.model = Some(outcome.model.clone());
                    let source = if outcome.is_fallback() {
                        SourceTag::Fallback
                    } else {
                        SourceTag::Generation
                    };
                    draft = Some(Draft {
                        text: outcome.text,
                        source,
                    });
                    PipelineState::RetrievalEnhance
                }
                PipelineState::RetrievalEnhance => {
                    let stage = Instant::now();
                    let current = draft.as_ref().map(|d| d.text.as_str()).unwrap_or_default();
                    match self.retriever.enhance(query, current).await {
                        Ok(enhancement) => {
                            self.monitor.record("retrieval", "enhance", stage.elapsed(), true);
                            if enhancement.applied {
                                metadata.rag_sources = Some(enhancement.sources);
                                if let Some(d) = draft.as_mut() {
                                    d.text = enhancement.text;
                                    if d.source == SourceTag::Generation {
                                        d.source = SourceTag::GenerationRetrieval;
                                    }
                                }
                            }
                            PipelineState::Done
                        }
                        Err(e) => {
                            self.monitor.record("retrieval", "enhance", stage.elapsed(), false);
                            warn!(error = %e, "Retrieval enhancement failed");
                            PipelineState::ErrorFallback
                        }
                    }
                }
                PipelineState::Done | PipelineState::ErrorFallback => break,
            };
        }

        let answer = self.finish(started, intent, draft, metadata, state);

        let cacheable = state == PipelineState::Done
            && (answer.source != SourceTag::Fallback || self.cache_fallbacks);
        if cacheable {
            self.cache.put(&cache_key, &answer);
        }

        answer
    }

    /// Assemble the answer for the final state and record the request
    fn finish(
        &self,
        started: Instant,
        intent: IntentClass,
        draft: Option<Draft>,
        mut metadata: AnswerMetadata,
        state: PipelineState,
    ) -> Answer {
        let draft = draft.unwrap_or_else(|| Draft {
            text: prompts::fallback_response(intent).to_string(),
            source: SourceTag::Fallback,
        });

        let elapsed = started.elapsed();
        metadata.elapsed_ms = elapsed.as_millis() as u64;
        let success = state == PipelineState::Done && draft.source != SourceTag::Fallback;

        self.record_request(intent, elapsed, success);
        metrics::record_answer(draft.source.as_str());
        info!(
            intent = %intent,
            source = %draft.source,
            elapsed_ms = metadata.elapsed_ms,
            "Query answered"
        );

        Answer {
            answer: draft.text,
            source: draft.source,
            intent,
            metadata,
        }
    }

    fn record_request(&self, intent: IntentClass, elapsed: Duration, success: bool) {
        self.monitor.record_sample(
            PerformanceSample::new("orchestrator", "ask", elapsed, success).with_intent(intent.as_str()),
        );
    }
}
