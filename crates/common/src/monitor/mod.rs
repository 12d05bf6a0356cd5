//! Performance monitor
//!
//! Streaming latency/success aggregates per component, per
//! `component.operation`, per generation model and per intent. Each record
//! is O(1); raw samples are never retained or re-scanned.
//!
//! Snapshots are cloned under the lock and written to disk after it is
//! released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// One measured stage execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub component: String,
    pub operation: String,
    pub duration_ms: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl PerformanceSample {
    pub fn new(component: &str, operation: &str, duration: Duration, success: bool) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
            timestamp: Utc::now(),
            model: None,
            intent: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }
}

/// Additive latency/success aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatAggregate {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_ms: f64,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatAggregate {
    fn add(&mut self, duration_ms: f64, success: bool, at: DateTime<Utc>) {
        self.count += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_ms += duration_ms;
        self.min_ms = Some(self.min_ms.map_or(duration_ms, |m| m.min(duration_ms)));
        self.max_ms = Some(self.max_ms.map_or(duration_ms, |m| m.max(duration_ms)));
        self.last_updated = Some(at);
    }

    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }
}

/// Aggregates for one component and its operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentStats {
    pub overall: StatAggregate,
    pub operations: BTreeMap<String, StatAggregate>,
}

/// Serializable view of everything recorded so far
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub taken_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub total_samples: u64,
    pub components: BTreeMap<String, ComponentStats>,
    pub models: BTreeMap<String, StatAggregate>,
    pub intents: BTreeMap<String, StatAggregate>,
}

#[derive(Default)]
struct MonitorState {
    total_samples: u64,
    components: BTreeMap<String, ComponentStats>,
    models: BTreeMap<String, StatAggregate>,
    intents: BTreeMap<String, StatAggregate>,
}

/// Thread-safe performance monitor, shared by reference
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
    started_at: DateTime<Utc>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            started_at: Utc::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a stage execution
    pub fn record(&self, component: &str, operation: &str, duration: Duration, success: bool) {
        self.record_sample(PerformanceSample::new(component, operation, duration, success));
    }

    /// Record a fully tagged sample
    pub fn record_sample(&self, sample: PerformanceSample) {
        crate::metrics::record_stage(
            &sample.component,
            &sample.operation,
            sample.duration_ms / 1000.0,
            sample.success,
        );

        let mut state = self.lock();
        state.total_samples += 1;

        let component = state.components.entry(sample.component.clone()).or_default();
        component.overall.add(sample.duration_ms, sample.success, sample.timestamp);
        component
            .operations
            .entry(sample.operation.clone())
            .or_default()
            .add(sample.duration_ms, sample.success, sample.timestamp);

        if let Some(model) = &sample.model {
            state
                .models
                .entry(model.clone())
                .or_default()
                .add(sample.duration_ms, sample.success, sample.timestamp);
        }
        if let Some(intent) = &sample.intent {
            state
                .intents
                .entry(intent.clone())
                .or_default()
                .add(sample.duration_ms, sample.success, sample.timestamp);
        }
    }

    /// Aggregates for one component
    pub fn component_stats(&self, component: &str) -> Option<ComponentStats> {
        self.lock().components.get(component).cloned()
    }

    /// Aggregates for one component, or everything when `None`
    pub fn stats(&self, component: Option<&str>) -> MonitorSnapshot {
        let mut snapshot = self.snapshot();
        if let Some(name) = component {
            snapshot.components.retain(|key, _| key == name);
            if name != "generation" {
                snapshot.models.clear();
            }
            if name != "orchestrator" {
                snapshot.intents.clear();
            }
        }
        snapshot
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.lock();
        MonitorSnapshot {
            taken_at: Some(Utc::now()),
            started_at: Some(self.started_at),
            total_samples: state.total_samples,
            components: state.components.clone(),
            models: state.models.clone(),
            intents: state.intents.clone(),
        }
    }

    /// Write a JSON snapshot, atomically replacing the previous file
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), samples = snapshot.total_samples, "Monitor snapshot written");
        Ok(())
    }

    /// Persist every `interval` and once more when `shutdown` flips to true
    pub fn spawn_snapshots(
        self: std::sync::Arc<Self>,
        path: PathBuf,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.persist(&path).await {
                            warn!(error = %e, path = %path.display(), "Periodic monitor snapshot failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            match self.persist(&path).await {
                Ok(()) => info!(path = %path.display(), "Final monitor snapshot written"),
                Err(e) => warn!(error = %e, path = %path.display(), "Final monitor snapshot failed"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_streaming_aggregates() {
        let monitor = PerformanceMonitor::new();
        monitor.record("knowledge", "lookup", Duration::from_millis(2), true);
        monitor.record("knowledge", "lookup", Duration::from_millis(6), false);
        monitor.record("knowledge", "reload", Duration::from_millis(10), true);

        let stats = monitor.component_stats("knowledge").unwrap();
        assert_eq!(stats.overall.count, 3);
        assert_eq!(stats.overall.failures, 1);
        assert!((stats.overall.avg_ms() - 6.0).abs() < 0.5);
        assert!((stats.overall.min_ms.unwrap() - 2.0).abs() < 0.5);
        assert!((stats.overall.max_ms.unwrap() - 10.0).abs() < 0.5);

        let lookup = &stats.operations["lookup"];
        assert_eq!(lookup.count, 2);
        assert!((lookup.success_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_model_and_intent_tags() {
        let monitor = PerformanceMonitor::new();
        monitor.record_sample(
            PerformanceSample::new("generation", "generate", Duration::from_millis(40), true)
                .with_model("llama3.2")
                .with_intent("pest_management"),
        );
        monitor.record_sample(
            PerformanceSample::new("generation", "generate", Duration::from_millis(5), false)
                .with_model("llama3.2"),
        );

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.total_samples, 2);
        assert_eq!(snapshot.models["llama3.2"].count, 2);
        assert_eq!(snapshot.models["llama3.2"].failures, 1);
        assert_eq!(snapshot.intents["pest_management"].count, 1);
    }

    #[test]
    fn test_stats_filter_by_component() {
        let monitor = PerformanceMonitor::new();
        monitor.record("cache", "get", Duration::from_micros(20), true);
        monitor.record("retrieval", "enhance", Duration::from_millis(1), true);

        let filtered = monitor.stats(Some("cache"));
        assert_eq!(filtered.components.len(), 1);
        assert!(filtered.components.contains_key("cache"));
        assert_eq!(monitor.stats(None).components.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_writes_snapshot() {
        let dir = std::env::temp_dir().join(format!("pestwise-monitor-{}", std::process::id()));
        let path = dir.join("snapshot.json");

        let monitor = PerformanceMonitor::new();
        monitor.record("orchestrator", "ask", Duration::from_millis(3), true);
        monitor.persist(&path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let snapshot: MonitorSnapshot = serde_json::from_str(&written).unwrap();
        assert_eq!(snapshot.total_samples, 1);
        assert!(snapshot.components.contains_key("orchestrator"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_snapshot_written_on_shutdown() {
        let dir = std::env::temp_dir().join(format!("pestwise-shutdown-{}", std::process::id()));
        let path = dir.join("snapshot.json");

        let monitor = Arc::new(PerformanceMonitor::new());
        monitor.record("cache", "get", Duration::from_micros(5), true);

        let (tx, rx) = watch::channel(false);
        let handle = monitor
            .clone()
            .spawn_snapshots(path.clone(), Duration::from_secs(3600), rx);
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(tokio::fs::metadata(&path).await.is_ok());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
