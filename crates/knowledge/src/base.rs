//! Swappable knowledge base handle
//!
//! Readers take an `Arc<FrameStore>` snapshot and keep it for the whole
//! request. A reload builds a complete new store and swaps the pointer;
//! snapshots already handed out stay valid. Each installed store carries
//! its version, so a reader never sees a version paired with another
//! reload's frames.

use crate::store::{FrameStore, KnowledgeSource, LoadReport};
use arc_swap::ArcSwap;
use pestwise_common::errors::{AppError, Result};
use pestwise_common::vocabulary::SynonymMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// File extension of frame sources
pub const SOURCE_EXTENSION: &str = "kb";

/// Read every `*.kb` file in `dir`, in lexical file name order
pub fn load_dir(dir: &Path) -> Result<Vec<KnowledgeSource>> {
    let entries = std::fs::read_dir(dir).map_err(|e| AppError::Configuration {
        message: format!("cannot read knowledge directory {}: {}", dir.display(), e),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path).map_err(|e| AppError::Configuration {
            message: format!("cannot read knowledge file {}: {}", path.display(), e),
        })?;
        let origin = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sources.push(KnowledgeSource { origin, text });
    }
    Ok(sources)
}

/// A store together with the load that produced it
#[derive(Debug, Clone)]
pub struct Versioned {
    pub version: u64,
    pub store: Arc<FrameStore>,
}

/// Shared knowledge base with atomic reload
pub struct KnowledgeBase {
    current: ArcSwap<Versioned>,
    synonyms: Arc<SynonymMap>,
    /// Serializes swaps so versions are installed in order
    reload_lock: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(store: FrameStore) -> Self {
        let synonyms = store.synonyms().clone();
        Self {
            current: ArcSwap::from_pointee(Versioned {
                version: 1,
                store: Arc::new(store),
            }),
            synonyms,
            reload_lock: Mutex::new(()),
        }
    }

    /// Build from sources, failing if they cannot produce a usable store
    pub fn from_sources(
        sources: &[KnowledgeSource],
        synonyms: Arc<SynonymMap>,
    ) -> Result<(Self, LoadReport)> {
        let (store, report) = Self::build(sources, synonyms)?;
        Ok((Self::new(store), report))
    }

    /// Build from a directory of `*.kb` files
    pub fn open(dir: &Path, synonyms: Arc<SynonymMap>) -> Result<(Self, LoadReport)> {
        let sources = load_dir(dir)?;
        Self::from_sources(&sources, synonyms)
    }

    fn build(
        sources: &[KnowledgeSource],
        synonyms: Arc<SynonymMap>,
    ) -> Result<(FrameStore, LoadReport)> {
        if sources.iter().all(|s| s.text.trim().is_empty()) {
            return Err(AppError::Configuration {
                message: "no knowledge sources to load".to_string(),
            });
        }
        FrameStore::from_sources(sources, synonyms)
    }

    /// Current store. Lock-free; the snapshot outlives any later reload.
    pub fn snapshot(&self) -> Arc<FrameStore> {
        self.current.load().store.clone()
    }

    /// Current store and its version, read together
    pub fn current(&self) -> Arc<Versioned> {
        self.current.load_full()
    }

    /// Number of successful loads, starting at 1
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn len(&self) -> usize {
        self.current.load().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn synonyms(&self) -> &Arc<SynonymMap> {
        &self.synonyms
    }

    /// Replace the whole store and return the version installed. On error
    /// the current store is kept.
    pub fn reload(&self, sources: &[KnowledgeSource]) -> Result<(u64, LoadReport)> {
        match Self::build(sources, self.synonyms.clone()) {
            Ok((store, report)) => {
                let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
                let version = self.current.load().version + 1;
                self.current.store(Arc::new(Versioned {
                    version,
                    store: Arc::new(store),
                }));
                info!(version, frames = report.frames, "Knowledge base reloaded");
                Ok((version, report))
            }
            Err(e) => {
                warn!(error = %e, "Knowledge reload rejected, keeping current store");
                Err(e)
            }
        }
    }

    /// Reload from a directory of `*.kb` files
    pub fn reload_dir(&self, dir: &Path) -> Result<(u64, LoadReport)> {
        let sources = load_dir(dir)?;
        self.reload(&sources)
    }
}
