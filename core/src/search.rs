//! Multi-field query evaluation.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::{FieldBoosts, SearchConfig};
use crate::document::Field;
use crate::error::Result;
use crate::index::{DocId, InvertedIndex};
use crate::similarity::{Similarity, TermStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub external_id: String,
    pub score: f32,
}

/// Analyzed query: each distinct term with its count. All fields share the
/// analyzer, so one term multiset serves every field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub terms: BTreeMap<String, u32>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopHits {
    /// Documents matching at least one query term.
    pub total_hits: usize,
    /// Best hits, at most the requested depth.
    pub hits: Vec<Hit>,
}

#[derive(Default)]
struct Accumulator {
    weighted: f32,
    matched: HashSet<usize>,
}

/// Scores queries against one index with one similarity model. Build it
/// once per session; it holds no state between queries.
pub struct QueryEvaluator<'a> {
    index: &'a InvertedIndex,
    similarity: Similarity,
    boosts: FieldBoosts,
}

impl<'a> QueryEvaluator<'a> {
    /// Fails with a configuration error for invalid settings, or when the
    /// configured analyzer differs from the one the index was built with.
    pub fn new(index: &'a InvertedIndex, config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        config.analyzer_for(*index.analyzer())?;
        Ok(Self { index, similarity: config.similarity()?, boosts: config.boosts })
    }

    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    pub fn parse(&self, text: &str) -> ParsedQuery {
        let mut terms = BTreeMap::new();
        for term in self.index.analyzer().tokenize(text) {
            *terms.entry(term).or_insert(0) += 1;
        }
        ParsedQuery { terms }
    }

    /// Every matching document, best first.
    pub fn evaluate(&self, text: &str) -> Vec<Hit> {
        self.search(text, usize::MAX).hits
    }

    /// The `depth` best documents plus the total number of matches.
    pub fn search(&self, text: &str, depth: usize) -> TopHits {
        let query = self.parse(text);
        let mut acc: HashMap<DocId, Accumulator> = HashMap::new();
        for field in Field::ALL {
            self.score_field(field, &query, &mut acc);
        }

        let mut hits: Vec<Hit> = acc
            .into_iter()
            .filter_map(|(doc_id, a)| {
                let meta = self.index.doc(doc_id)?;
                let score = match self.similarity {
                    Similarity::Boolean => a.matched.len() as f32,
                    _ => a.weighted,
                };
                Some(Hit { doc_id, external_id: meta.external_id.clone(), score })
            })
            .collect();
        let total_hits = hits.len();
        if total_hits == 0 {
            tracing::info!(query = text, "query matched no documents");
        }

        if depth < hits.len() {
            hits.select_nth_unstable_by(depth, rank_order);
            hits.truncate(depth);
        }
        hits.sort_by(rank_order);
        TopHits { total_hits, hits }
    }

    fn score_field(&self, field: Field, query: &ParsedQuery, acc: &mut HashMap<DocId, Accumulator>) {
        let boost = self.boosts.get(field);
        let fstats = self.index.field_stats(field);
        for (term_idx, (term, &count)) in query.terms.iter().enumerate() {
            let postings = self.index.postings(field, term);
            if postings.is_empty() {
                continue;
            }
            let collection_probability = if fstats.total_tokens == 0 {
                0.0
            } else {
                self.index.collection_frequency(field, term) as f32 / fstats.total_tokens as f32
            };
            let stats = TermStats {
                document_frequency: postings.len() as u32,
                document_count: fstats.doc_count,
                average_field_length: fstats.average_length,
                collection_probability,
            };
            let weight = self.similarity.query_weight(count);
            for p in postings {
                let len = self.index.field_length(p.doc_id, field);
                let s = self.similarity.score(p.term_frequency, len, &stats) * weight;
                let a = acc.entry(p.doc_id).or_default();
                a.weighted += boost * s;
                a.matched.insert(term_idx);
            }
        }
    }
}

/// Score descending, then document id ascending.
pub fn rank_order(a: &Hit, b: &Hit) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| compare_doc_ids(&a.external_id, &b.external_id))
}

/// Unsigned integer ids first, in numeric order, then every other id in
/// lexical order. Equal numbers fall back to the raw text ("01" vs "1").
pub fn compare_doc_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>().ok(), b.parse::<u64>().ok()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
