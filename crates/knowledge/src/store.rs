//! Immutable frame store
//!
//! Built once from parsed frames and never mutated afterwards. Names and
//! list values are indexed by their synonym-normalized key so lookups are
//! case-insensitive and alias-aware.

use crate::frame::{AttributeValue, Frame, FrameType, Scalar};
use crate::parser::parse_frames;
use pestwise_common::errors::{AppError, Result};
use pestwise_common::vocabulary::SynonymMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Query filter, combined with AND semantics
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact normalized name
    Name(String),
    /// Scalar attribute equal to a value
    AttributeEquals { key: String, value: String },
    /// List attribute containing a value
    Contains { key: String, value: String },
    /// Attribute present and non-empty
    HasAttribute(String),
}

impl Filter {
    pub fn name(name: impl Into<String>) -> Self {
        Filter::Name(name.into())
    }

    pub fn contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Result of a single-frame lookup. A miss is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Frame),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Frame> {
        match self {
            Lookup::Found(frame) => Some(frame),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Named frame source text
#[derive(Debug, Clone)]
pub struct KnowledgeSource {
    pub origin: String,
    pub text: String,
}

impl KnowledgeSource {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }
}

/// Summary of a store build
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub sources: usize,
    pub frames: usize,
    pub skipped: usize,
    pub duplicates: usize,
    /// `origin:line: message` for every skipped block
    pub errors: Vec<String>,
}

/// Frame counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeStats {
    pub total_frames: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Read-only frame store
#[derive(Debug)]
pub struct FrameStore {
    frames: Vec<Frame>,
    by_type: HashMap<FrameType, Vec<usize>>,
    by_name: HashMap<(FrameType, String), usize>,
    by_key: HashMap<String, Vec<usize>>,
    /// (list attribute, value key) -> frames
    members: HashMap<(String, String), Vec<usize>>,
    max_name_tokens: usize,
    synonyms: Arc<SynonymMap>,
}

impl FrameStore {
    pub fn empty(synonyms: Arc<SynonymMap>) -> Self {
        Self {
            frames: Vec::new(),
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            by_key: HashMap::new(),
            members: HashMap::new(),
            max_name_tokens: 1,
            synonyms,
        }
    }

    /// Index frames in order. A later frame with the same type and
    /// normalized name is skipped and returned with its input position.
    pub fn build(frames: Vec<Frame>, synonyms: Arc<SynonymMap>) -> (Self, Vec<(usize, Frame)>) {
        let mut store = Self::empty(synonyms);
        let mut duplicates = Vec::new();

        for (position, frame) in frames.into_iter().enumerate() {
            let key = store.synonyms.key(&frame.name);
            let name_slot = (frame.frame_type.clone(), key.clone());
            if store.by_name.contains_key(&name_slot) {
                duplicates.push((position, frame));
                continue;
            }

            let idx = store.frames.len();
            store.by_name.insert(name_slot, idx);
            store.by_type.entry(frame.frame_type.clone()).or_default().push(idx);
            store.by_key.entry(key).or_default().push(idx);
            store.max_name_tokens = store
                .max_name_tokens
                .max(store.synonyms.normalize_phrase(&frame.name).len());

            for attribute in &frame.attributes {
                if let AttributeValue::List(items) = &attribute.value {
                    for item in items {
                        let entry = store
                            .members
                            .entry((attribute.name.clone(), store.synonyms.key(item)))
                            .or_default();
                        if entry.last() != Some(&idx) {
                            entry.push(idx);
                        }
                    }
                }
            }

            store.frames.push(frame);
        }

        (store, duplicates)
    }

    /// Parse and index every source. Fails only when the input held blocks
    /// but none of them produced a frame.
    pub fn from_sources(
        sources: &[KnowledgeSource],
        synonyms: Arc<SynonymMap>,
    ) -> Result<(Self, LoadReport)> {
        let mut report = LoadReport {
            sources: sources.len(),
            ..LoadReport::default()
        };
        let mut frames = Vec::new();
        let mut origins = Vec::new();
        let mut blocks = 0;

        for source in sources {
            let parsed = parse_frames(&source.text, &synonyms);
            blocks += parsed.blocks();
            for err in &parsed.errors {
                if let AppError::Parse { line, message } = err {
                    report.errors.push(format!("{}:{}: {}", source.origin, line, message));
                }
            }
            report.skipped += parsed.errors.len();
            origins.extend(std::iter::repeat(source.origin.clone()).take(parsed.frames.len()));
            frames.extend(parsed.frames);
        }

        let (store, duplicates) = Self::build(frames, synonyms);
        for (position, dup) in &duplicates {
            let origin = origins.get(*position).map(String::as_str).unwrap_or("?");
            warn!(
                origin = %origin,
                line = dup.line,
                frame_type = %dup.frame_type,
                name = %dup.name,
                "Duplicate frame name, keeping the first definition"
            );
            report.errors.push(format!(
                "{}:{}: duplicate {} '{}'",
                origin, dup.line, dup.frame_type, dup.name
            ));
        }
        report.duplicates = duplicates.len();
        report.frames = store.len();

        if store.is_empty() && blocks > 0 {
            return Err(AppError::Configuration {
                message: format!(
                    "knowledge sources contained {} blocks but none could be parsed",
                    blocks
                ),
            });
        }

        info!(
            sources = report.sources,
            frames = report.frames,
            skipped = report.skipped,
            duplicates = report.duplicates,
            "Frame store built"
        );
        Ok((store, report))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// All frames in load order
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn synonyms(&self) -> &Arc<SynonymMap> {
        &self.synonyms
    }

    /// Frames of `frame_type` matching every filter, in load order
    pub fn query(&self, frame_type: &FrameType, filters: &[Filter]) -> Vec<&Frame> {
        let name_filter = filters.iter().find_map(|f| match f {
            Filter::Name(name) => Some(name),
            _ => None,
        });

        let candidates: Vec<usize> = match name_filter {
            Some(name) => self
                .by_name
                .get(&(frame_type.clone(), self.synonyms.key(name)))
                .map(|&idx| vec![idx])
                .unwrap_or_default(),
            None => self.by_type.get(frame_type).cloned().unwrap_or_default(),
        };

        candidates
            .into_iter()
            .map(|idx| &self.frames[idx])
            .filter(|frame| filters.iter().all(|f| self.matches(frame, f)))
            .collect()
    }

    /// Exact name lookup
    pub fn get(&self, frame_type: &FrameType, name: &str) -> Lookup<'_> {
        match self.by_name.get(&(frame_type.clone(), self.synonyms.key(name))) {
            Some(&idx) => Lookup::Found(&self.frames[idx]),
            None => Lookup::NotFound,
        }
    }

    pub fn attribute<'f>(&self, frame: &'f Frame, key: &str) -> Option<&'f AttributeValue> {
        frame.get(key)
    }

    /// Frames of the given types whose normalized name occurs in `text`,
    /// ordered by first occurrence. An empty `types` slice means any type.
    pub fn mentioned_in(&self, text: &str, types: &[FrameType]) -> Vec<&Frame> {
        let tokens = self.synonyms.normalize_phrase(text);
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for start in 0..tokens.len() {
            let widest = self.max_name_tokens.min(tokens.len() - start);
            for width in (1..=widest).rev() {
                let key = tokens[start..start + width].join("_");
                let Some(indices) = self.by_key.get(&key) else {
                    continue;
                };
                for &idx in indices {
                    let frame = &self.frames[idx];
                    let in_scope = types.is_empty() || types.contains(&frame.frame_type);
                    if in_scope && seen.insert(idx) {
                        found.push(frame);
                    }
                }
            }
        }

        found
    }

    /// Frames whose list attribute `key` contains `value`
    pub fn members_of(&self, key: &str, value: &str) -> Vec<&Frame> {
        self.members
            .get(&(key.to_lowercase(), self.synonyms.key(value)))
            .map(|indices| indices.iter().map(|&idx| &self.frames[idx]).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> KnowledgeStats {
        let mut by_type = BTreeMap::new();
        for frame in &self.frames {
            *by_type.entry(frame.frame_type.to_string()).or_insert(0) += 1;
        }
        KnowledgeStats {
            total_frames: self.frames.len(),
            by_type,
        }
    }

    fn matches(&self, frame: &Frame, filter: &Filter) -> bool {
        match filter {
            Filter::Name(name) => self.synonyms.key(&frame.name) == self.synonyms.key(name),
            Filter::AttributeEquals { key, value } => match frame.get(key) {
                Some(AttributeValue::Scalar(scalar)) => self.scalar_equals(scalar, value),
                _ => false,
            },
            Filter::Contains { key, value } => {
                let wanted = self.synonyms.key(value);
                frame
                    .list(key)
                    .is_some_and(|items| items.iter().any(|i| self.synonyms.key(i) == wanted))
            }
            Filter::HasAttribute(key) => frame.has_value(key),
        }
    }

    fn scalar_equals(&self, scalar: &Scalar, value: &str) -> bool {
        match scalar {
            Scalar::Text(text) => self.synonyms.key(text) == self.synonyms.key(value),
            Scalar::Int(i) => value.trim().parse::<i64>().is_ok_and(|v| v == *i),
            Scalar::Bool(b) => match value.trim().to_lowercase().as_str() {
                "true" | "yes" => *b,
                "false" | "no" => !*b,
                _ => false,
            },
        }
    }
}
