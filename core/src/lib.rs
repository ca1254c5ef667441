//! Fielded retrieval over line-tagged corpora: parsing, an inverted index
//! with per-field statistics, five similarity models, and TREC run output.

pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod results;
pub mod run;
pub mod search;
pub mod similarity;
pub mod tokenizer;

pub use config::{FieldBoosts, SearchConfig};
pub use corpus::CorpusParser;
pub use document::{Document, DocumentBuilder, Field};
pub use error::{Error, Result};
pub use index::{BuildMode, BuildReport, DocId, DocMeta, InvertedIndex, Posting};
pub use query::{QueryParser, QueryRecord};
pub use search::{Hit, QueryEvaluator};
pub use similarity::{Bm25Params, Similarity};
pub use tokenizer::Analyzer;
