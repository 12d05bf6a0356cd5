//! Generation adapter
//!
//! Wraps the external text generation backend:
//! - background availability probe published through a watch channel,
//!   re-run from `generate` while the backend stays unavailable
//! - per-intent model selection
//! - request timeout, output cleaning and validation
//! - memoization of validated completions
//!
//! `generate` never fails. Every backend problem becomes an intent-aware
//! canned answer, recorded as a failure for monitoring.

pub mod backend;
pub mod models;
pub mod output;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;

use pestwise_common::cache::{keys, CacheConfig};
use pestwise_common::config::GenerationConfig;
use pestwise_common::errors::{AppError, Result};
use pestwise_common::metrics;
use pestwise_common::monitor::PerformanceSample;
use pestwise_common::{IntentClass, PerformanceMonitor, ResponseCache};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use backend::{GenerationBackend, GenerationRequest};
use models::ModelRouter;
use output::OutputCleaner;

/// Backend availability as last observed by the probe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeState {
    Pending,
    Ready { models: Vec<String> },
    Unavailable { reason: String },
}

impl ProbeState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeState::Ready { .. })
    }

    fn models(&self) -> Option<&[String]> {
        match self {
            ProbeState::Ready { models } => Some(models),
            _ => None,
        }
    }
}

/// Adapter tuning
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    /// Longest a request waits on a pending probe
    pub probe_wait: Duration,
    /// Minimum gap between re-probes of an unavailable backend
    pub probe_retry: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub min_response_chars: usize,
    pub memo_capacity: usize,
    pub memo_ttl: Duration,
}

impl AdapterSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            probe_timeout: config.probe_timeout(),
            probe_wait: config.probe_wait(),
            probe_retry: config.probe_retry(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: config.stream,
            min_response_chars: config.min_response_chars,
            memo_capacity: config.memo_capacity,
            memo_ttl: Duration::from_secs(config.memo_ttl_secs),
        }
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Why a canned answer was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    Timeout,
    Unavailable,
    InvalidOutput,
    NotReady,
}

impl From<&AppError> for FallbackKind {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::GenerationTimeout { .. } => FallbackKind::Timeout,
            AppError::GenerationInvalidOutput { .. } => FallbackKind::InvalidOutput,
            _ => FallbackKind::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum OutcomeOrigin {
    Backend,
    Memoized,
    Fallback { kind: FallbackKind },
}

/// Text returned by [`GenerationAdapter::generate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub text: String,
    pub model: String,
    pub origin: OutcomeOrigin,
}

impl GenerationOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, OutcomeOrigin::Fallback { .. })
    }
}

pub struct GenerationAdapter {
    settings: AdapterSettings,
    router: ModelRouter,
    backend: Arc<dyn GenerationBackend>,
    cleaner: OutputCleaner,
    memo: ResponseCache,
    monitor: Arc<PerformanceMonitor>,
    probe: watch::Sender<ProbeState>,
    last_probe: Mutex<Option<Instant>>,
}

impl GenerationAdapter {
    /// Build the adapter and start the availability probe in the background
    pub fn spawn(
        settings: AdapterSettings,
        router: ModelRouter,
        backend: Arc<dyn GenerationBackend>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Result<Arc<Self>> {
        let cleaner = OutputCleaner::new(settings.min_response_chars)?;
        let memo = ResponseCache::new(CacheConfig {
            capacity: settings.memo_capacity,
            ttl: settings.memo_ttl,
            name: "generation".to_string(),
        });
        let (probe, _) = watch::channel(ProbeState::Pending);

        let adapter = Arc::new(Self {
            settings,
            router,
            backend,
            cleaner,
            memo,
            monitor,
            probe,
            last_probe: Mutex::new(None),
        });

        let task = Arc::clone(&adapter);
        tokio::spawn(async move {
            task.refresh_availability().await;
        });

        Ok(adapter)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn probe_state(&self) -> ProbeState {
        self.probe.borrow().clone()
    }

    /// Wait up to `timeout` for the probe to settle, returning the state seen
    pub async fn wait_ready(&self, timeout: Duration) -> ProbeState {
        let mut rx = self.probe.subscribe();
        let settled = tokio::time::timeout(timeout, rx.wait_for(|s| *s != ProbeState::Pending))
            .await
            .ok()
            .and_then(|seen| seen.ok().map(|state| state.clone()));
        settled.unwrap_or_else(|| self.probe_state())
    }

    /// Re-run the probe and publish the result
    pub async fn refresh_availability(&self) -> ProbeState {
        *self.last_probe.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        let timeout = self.settings.probe_timeout;
        let state = match tokio::time::timeout(timeout, self.backend.list_models()).await {
            Ok(Ok(models)) => ProbeState::Ready { models },
            Ok(Err(e)) => ProbeState::Unavailable {
                reason: e.to_string(),
            },
            Err(_) => ProbeState::Unavailable {
                reason: format!("probe timed out after {}ms", timeout.as_millis()),
            },
        };

        match &state {
            ProbeState::Ready { models } => info!(
                backend = %self.backend.name(),
                models = models.len(),
                "Generation backend available"
            ),
            ProbeState::Unavailable { reason } => warn!(
                backend = %self.backend.name(),
                reason = %reason,
                "Generation backend unavailable"
            ),
            ProbeState::Pending => {}
        }

        self.probe.send_replace(state.clone());
        state
    }

    /// Claim the next re-probe slot. Only one caller per `probe_retry`
    /// window gets it.
    fn claim_reprobe(&self) -> bool {
        let mut last = self.last_probe.lock().unwrap_or_else(PoisonError::into_inner);
        let due = last.map_or(true, |at| at.elapsed() >= self.settings.probe_retry);
        if due {
            *last = Some(Instant::now());
        }
        due
    }

    /// Generate a cleaned answer, or the canned fallback for `intent`
    pub async fn generate(
        &self,
        prompt: &str,
        intent: IntentClass,
        options: &GenerationOptions,
    ) -> GenerationOutcome {
        let started = Instant::now();

        let mut state = self.probe_state();
        if state == ProbeState::Pending {
            state = self.wait_ready(self.settings.probe_wait).await;
        }
        if matches!(state, ProbeState::Unavailable { .. }) && self.claim_reprobe() {
            debug!(backend = %self.backend.name(), "Re-probing unavailable generation backend");
            state = self.refresh_availability().await;
        }

        let model = self.router.select(intent, state.models());
        let temperature = options.temperature.unwrap_or(self.settings.temperature);
        let max_tokens = options.max_tokens.unwrap_or(self.settings.max_tokens);

        let memo_key = keys::generation(prompt, &model, temperature, max_tokens);
        if let Some(text) = self.memo.get::<String>(&memo_key) {
            debug!(model = %model, intent = %intent, "Generation memo hit");
            self.record("memo", &model, intent, started.elapsed(), true);
            return GenerationOutcome {
                text,
                model,
                origin: OutcomeOrigin::Memoized,
            };
        }

        let result = if state.is_ready() {
            self.invoke(prompt, intent, &model, temperature, max_tokens)
                .await
                .map_err(|e| {
                    warn!(model = %model, intent = %intent, error = %e, "Generation failed, using fallback");
                    FallbackKind::from(&e)
                })
        } else {
            warn!(model = %model, intent = %intent, "Generation backend not ready, using fallback");
            Err(FallbackKind::NotReady)
        };

        let elapsed = started.elapsed();
        match result {
            Ok(text) => {
                self.record("generate", &model, intent, elapsed, true);
                self.memo.put(&memo_key, &text);
                GenerationOutcome {
                    text,
                    model,
                    origin: OutcomeOrigin::Backend,
                }
            }
            Err(kind) => {
                self.record("generate", &model, intent, elapsed, false);
                GenerationOutcome {
                    text: prompts::fallback_response(intent).to_string(),
                    model,
                    origin: OutcomeOrigin::Fallback { kind },
                }
            }
        }
    }

    async fn invoke(
        &self,
        prompt: &str,
        intent: IntentClass,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = GenerationRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            system: Some(prompts::system_preamble(intent).to_string()),
            temperature,
            max_tokens,
            stream: self.settings.stream,
        };

        let timeout = self.settings.request_timeout;
        let raw = match tokio::time::timeout(timeout, self.backend.generate(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AppError::GenerationTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        self.cleaner.process(&raw)
    }

    fn record(&self, operation: &str, model: &str, intent: IntentClass, elapsed: Duration, success: bool) {
        metrics::record_generation(elapsed.as_secs_f64(), model, intent.as_str(), success);
        self.monitor.record_sample(
            PerformanceSample::new("generation", operation, elapsed, success)
                .with_model(model)
                .with_intent(intent.as_str()),
        );
    }
}
