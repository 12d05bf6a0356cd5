//! Retrieval index
//!
//! One parameterized scorer over chunked documents. A chunk's score is
//!
//! ```text
//! chunk_keyword      * |query keywords ∩ chunk keywords|
//! + title_keyword    * |query keywords ∩ document keywords|
//! + title_similarity * sim(query, title)
//! + content_similarity * sim(query, content prefix)
//! ```
//!
//! where `sim` is normalized Levenshtein similarity. A document scores as
//! its best chunk. Enhancement appends the top passage only when its score
//! is strictly above the relevance threshold.

use crate::chunker::{Chunker, ChunkingConfig};
use crate::corpus::{builtin_corpus, load_corpus, Document};
use crate::similarity::similarity;
use async_trait::async_trait;
use pestwise_common::config::{RetrievalConfig, ScoringWeights};
use pestwise_common::errors::Result;
use pestwise_common::text;
use pestwise_common::vocabulary::SynonymMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Ranked document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    /// Best-scoring chunk of the document
    pub passage: String,
    pub score: f64,
    /// Position in the corpus
    pub position: usize,
}

/// Result of [`RetrievalIndex::enhance_detailed`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    pub text: String,
    /// Whether a passage was appended
    pub applied: bool,
    /// Titles of appended documents
    pub sources: Vec<String>,
    pub top_score: Option<f64>,
}

/// Retrieval contract, so a persisted store can stand in for the
/// in-memory index
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Documents ordered by descending relevance
    async fn search(&self, query: &str, top_n: usize) -> Result<Vec<SearchHit>>;

    /// `text` with the top passage appended when it is relevant enough
    async fn enhance(&self, query: &str, text: &str) -> Result<Enhancement>;

    /// Number of documents
    fn corpus_size(&self) -> usize;
}

struct IndexedDocument {
    document: Document,
    keywords: HashSet<String>,
    title_plain: String,
    prefix_plain: String,
}

struct IndexedChunk {
    doc: usize,
    content: String,
    keywords: HashSet<String>,
}

/// In-memory retrieval index
pub struct RetrievalIndex {
    docs: Vec<IndexedDocument>,
    chunks: Vec<IndexedChunk>,
    weights: ScoringWeights,
    threshold: f64,
    top_n: usize,
    synonyms: Arc<SynonymMap>,
}

impl RetrievalIndex {
    pub fn new(
        documents: Vec<Document>,
        config: &RetrievalConfig,
        synonyms: Arc<SynonymMap>,
    ) -> Result<Self> {
        let chunker = Chunker::new(&ChunkingConfig {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_chunk_size: config.min_chunk_size,
        })?;

        let mut docs = Vec::with_capacity(documents.len());
        let mut chunks = Vec::new();

        for (doc_idx, document) in documents.into_iter().enumerate() {
            for chunk in chunker.chunk(&document.content) {
                chunks.push(IndexedChunk {
                    doc: doc_idx,
                    keywords: keyword_set(&synonyms, &chunk.content),
                    content: chunk.content,
                });
            }

            let mut keywords = keyword_set(&synonyms, &document.title);
            keywords.extend(document.keywords.iter().map(|k| synonyms.key(k)));
            let prefix: String = document
                .content
                .chars()
                .take(config.content_prefix_chars)
                .collect();

            docs.push(IndexedDocument {
                keywords,
                title_plain: text::plain(&document.title),
                prefix_plain: text::plain(&prefix),
                document,
            });
        }

        info!(
            documents = docs.len(),
            chunks = chunks.len(),
            threshold = config.relevance_threshold,
            "Retrieval index built"
        );

        Ok(Self {
            docs,
            chunks,
            weights: config.weights,
            threshold: config.relevance_threshold,
            top_n: config.top_n.max(1),
            synonyms,
        })
    }

    /// Index the configured JSON corpus, or the built-in documents
    pub fn from_config(config: &RetrievalConfig, synonyms: Arc<SynonymMap>) -> Result<Self> {
        let documents = match &config.corpus_path {
            Some(path) => load_corpus(Path::new(path))?,
            None => builtin_corpus(),
        };
        Self::new(documents, config, synonyms)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Documents with a positive score, best first; ties keep corpus order
    pub fn search(&self, query: &str, top_n: usize) -> Vec<SearchHit> {
        let query_plain = text::plain(query);
        if query_plain.is_empty() {
            return Vec::new();
        }
        let query_keywords = keyword_set(&self.synonyms, query);

        // Document-level signals, computed once per document
        let doc_scores: Vec<f64> = self
            .docs
            .iter()
            .map(|doc| {
                let title_overlap = query_keywords.intersection(&doc.keywords).count() as f64;
                self.weights.title_keyword * title_overlap
                    + self.weights.title_similarity * similarity(&query_plain, &doc.title_plain)
                    + self.weights.content_similarity
                        * similarity(&query_plain, &doc.prefix_plain)
            })
            .collect();

        let mut best: Vec<Option<(f64, usize)>> = vec![None; self.docs.len()];
        for (chunk_idx, chunk) in self.chunks.iter().enumerate() {
            let overlap = query_keywords.intersection(&chunk.keywords).count() as f64;
            let score = doc_scores[chunk.doc] + self.weights.chunk_keyword * overlap;
            let improves = best[chunk.doc].map_or(true, |(current, _)| score > current);
            if improves {
                best[chunk.doc] = Some((score, chunk_idx));
            }
        }

        let mut hits: Vec<SearchHit> = best
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let (score, chunk_idx) = entry?;
                if score <= 0.0 {
                    return None;
                }
                let document = &self.docs[position].document;
                Some(SearchHit {
                    title: document.title.clone(),
                    content: document.content.clone(),
                    passage: self.chunks[chunk_idx].content.clone(),
                    score,
                    position,
                })
            })
            .collect();

        // Stable sort: equal scores stay in corpus order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_n);

        debug!(
            query_len = query.len(),
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "Retrieval search"
        );
        hits
    }

    /// Append the top passage when it clears the threshold
    pub fn enhance_detailed(&self, query: &str, text: &str) -> Enhancement {
        let hits = self.search(query, self.top_n);
        let top_score = hits.first().map(|h| h.score);

        match hits.into_iter().next() {
            Some(top) if top.score > self.threshold => {
                let enhanced = if text.trim().is_empty() {
                    top.passage.clone()
                } else {
                    format!("{}\n\nFrom \"{}\": {}", text.trim_end(), top.title, top.passage)
                };
                debug!(title = %top.title, score = top.score, "Passage appended");
                Enhancement {
                    text: enhanced,
                    applied: true,
                    sources: vec![top.title],
                    top_score,
                }
            }
            _ => {
                debug!(top_score, threshold = self.threshold, "No passage above threshold");
                Enhancement {
                    text: text.to_string(),
                    applied: false,
                    sources: Vec::new(),
                    top_score,
                }
            }
        }
    }

    pub fn enhance(&self, query: &str, text: &str) -> String {
        self.enhance_detailed(query, text).text
    }
}

#[async_trait]
impl Retriever for RetrievalIndex {
    async fn search(&self, query: &str, top_n: usize) -> Result<Vec<SearchHit>> {
        Ok(RetrievalIndex::search(self, query, top_n))
    }

    async fn enhance(&self, query: &str, text: &str) -> Result<Enhancement> {
        Ok(self.enhance_detailed(query, text))
    }

    fn corpus_size(&self) -> usize {
        self.len()
    }
}

/// Synonym-normalized tokens minus stop words
fn keyword_set(synonyms: &SynonymMap, input: &str) -> HashSet<String> {
    synonyms
        .normalize_phrase(input)
        .into_iter()
        .filter(|t| !text::is_stop_word(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "Keep the field clean.";

    fn index() -> RetrievalIndex {
        RetrievalIndex::new(
            builtin_corpus(),
            &RetrievalConfig::default(),
            Arc::new(SynonymMap::default()),
        )
        .unwrap()
    }

    fn aphid_doc() -> Document {
        builtin_corpus()
            .into_iter()
            .find(|d| d.title == "Aphid Control on Tomatoes")
            .unwrap()
    }

    #[test]
    fn test_irrelevant_query_leaves_text_unchanged() {
        let index = index();
        assert_eq!(index.enhance("asdkjasd random text", ORIGINAL), ORIGINAL);

        let detail = index.enhance_detailed("asdkjasd random text", ORIGINAL);
        assert!(!detail.applied);
        assert!(detail.sources.is_empty());
        assert!(detail.top_score.unwrap_or(0.0) <= index.threshold());
    }

    #[test]
    fn test_exact_title_appends_document_content() {
        let index = index();
        let enhanced = index.enhance("Aphid Control on Tomatoes", ORIGINAL);
        assert!(enhanced.starts_with(ORIGINAL));
        assert!(enhanced.ends_with(&aphid_doc().content));
        assert!(enhanced.len() > ORIGINAL.len());
    }

    #[test]
    fn test_search_ranks_title_match_first() {
        let index = index();
        let hits = index.search("How do I control aphids on my tomato plants?", 3);
        assert_eq!(hits[0].title, "Aphid Control on Tomatoes");
        assert!(hits[0].score > index.threshold());
        assert!(hits.len() <= 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let docs = vec![
            Document::new("Mulch", "Straw mulch keeps soil moist."),
            Document::new("Mulch", "Straw mulch keeps soil moist."),
        ];
        let index = RetrievalIndex::new(
            docs,
            &RetrievalConfig::default(),
            Arc::new(SynonymMap::default()),
        )
        .unwrap();
        let hits = index.search("mulch", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_empty_query_has_no_hits() {
        assert!(index().search("  ?! ", 3).is_empty());
    }

    #[test]
    fn test_threshold_from_config() {
        let config = RetrievalConfig {
            relevance_threshold: 1000.0,
            ..RetrievalConfig::default()
        };
        let index =
            RetrievalIndex::new(builtin_corpus(), &config, Arc::new(SynonymMap::default()))
                .unwrap();
        assert_eq!(index.enhance("Aphid Control on Tomatoes", ORIGINAL), ORIGINAL);
    }

    #[test]
    fn test_retriever_trait() {
        let index = index();
        let retriever: &dyn Retriever = &index;
        let hits = tokio_test::block_on(retriever.search("fall armyworm in maize", 2)).unwrap();
        assert_eq!(hits[0].title, "Fall Armyworm Management in Maize");

        let enhancement =
            tokio_test::block_on(retriever.enhance("Aphid Control on Tomatoes", ORIGINAL)).unwrap();
        assert!(enhancement.applied);
        assert_eq!(enhancement.sources, vec!["Aphid Control on Tomatoes".to_string()]);
        assert_eq!(retriever.corpus_size(), builtin_corpus().len());
    }
}
