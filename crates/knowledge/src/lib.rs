//! Pestwise Knowledge Base
//!
//! Frame-based symbolic knowledge: parsing of `type(Name, [key: value])`
//! sources, an immutable indexed store, and a handle that swaps in a
//! rebuilt store atomically on reload.

pub mod base;
pub mod frame;
pub mod parser;
pub mod store;

pub use base::{load_dir, KnowledgeBase, Versioned};
pub use frame::{Attribute, AttributeValue, Frame, FrameType, Scalar};
pub use parser::{parse_frames, ParseReport};
pub use store::{Filter, FrameStore, KnowledgeSource, KnowledgeStats, LoadReport, Lookup};
