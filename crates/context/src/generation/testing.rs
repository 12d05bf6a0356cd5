//! Test doubles for the generation backend and the metrics facade

use super::backend::{GenerationBackend, GenerationRequest};
use async_trait::async_trait;
use metrics::{Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use pestwise_common::errors::{AppError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_mock(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// In-memory backend with a fixed reply
pub struct StaticBackend {
    reply: std::result::Result<String, String>,
    models: Vec<String>,
    calls: AtomicUsize,
    failing_probes: usize,
    probes: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl StaticBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            models: vec!["llama3.2:latest".to_string()],
            calls: AtomicUsize::new(0),
            failing_probes: 0,
            probes: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Fail the first `count` model listings
    pub fn probe_failures(mut self, count: usize) -> Self {
        self.failing_probes = count;
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for StaticBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(AppError::GenerationUnavailable {
                message: message.clone(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let seen = self.probes.fetch_add(1, Ordering::SeqCst);
        if seen < self.failing_probes {
            return Err(AppError::GenerationUnavailable {
                message: "connection refused".to_string(),
            });
        }
        Ok(self.models.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// `metrics` recorder that tallies counter increments by name and labels
#[derive(Default)]
pub struct CountingRecorder {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl CountingRecorder {
    /// Total for counter `name` carrying the label `cache=<cache>`
    pub fn count(&self, name: &str, cache: &str) -> u64 {
        let key = format!("{}{{cache={}}}", name, cache);
        self.counts.lock().unwrap().get(&key).copied().unwrap_or(0)
    }
}

struct Tally {
    key: String,
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl CounterFn for Tally {
    fn increment(&self, value: u64) {
        *self.counts.lock().unwrap().entry(self.key.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        self.counts.lock().unwrap().insert(self.key.clone(), value);
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        let labels = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect::<Vec<_>>()
            .join(",");
        Counter::from_arc(Arc::new(Tally {
            key: format!("{}{{{}}}", key.name(), labels),
            counts: self.counts.clone(),
        }))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
