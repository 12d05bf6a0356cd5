//! Pestwise Retrieval Index
//!
//! Chunked keyword/similarity scoring over a static document corpus, and
//! threshold-gated enhancement of draft answers with the best passage.

pub mod chunker;
pub mod corpus;
pub mod index;
pub mod similarity;

pub use chunker::{chunk_text, Chunker, ChunkingConfig, TextChunk};
pub use corpus::{builtin_corpus, load_corpus, Document};
pub use index::{Enhancement, RetrievalIndex, Retriever, SearchHit};
