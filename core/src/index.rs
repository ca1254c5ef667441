use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::document::{Document, Field};
use crate::error::Result;
use crate::tokenizer::Analyzer;

pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Identifier taken from the record-start line; this is what run files print.
    pub external_id: String,
    pub title: String,
}

/// Postings and lengths for one field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldIndex {
    postings: HashMap<String, Vec<Posting>>, // insertion order
    lengths: HashMap<DocId, u32>,            // documents carrying this field
    total_tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub doc_count: u32,
    pub total_tokens: u64,
    pub average_length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildMode {
    /// Discard whatever the index held before.
    Create,
    /// Replace documents whose identifier is already indexed, add the rest.
    Update,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub added: usize,
    pub replaced: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added(DocId),
    Replaced(DocId),
}

/// Term statistics of one document, computed before the index is touched so
/// that a document is applied whole or not at all.
struct PreparedDocument {
    meta: DocMeta,
    fields: Vec<(Field, u32, BTreeMap<String, u32>)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub(crate) fields: [FieldIndex; 4],
    pub(crate) docs: HashMap<DocId, DocMeta>,
    pub(crate) ids: HashMap<String, DocId>,
    pub(crate) next_doc_id: DocId,
    pub(crate) analyzer: Analyzer,
}

impl InvertedIndex {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer, ..Self::default() }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Feed documents into the index. `Create` starts from an empty index;
    /// both modes upsert by identifier so no identifier is ever indexed twice.
    pub fn build<I>(&mut self, documents: I, mode: BuildMode) -> Result<BuildReport>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        if mode == BuildMode::Create {
            *self = InvertedIndex::new(self.analyzer);
        }
        let mut report = BuildReport::default();
        for doc in documents {
            let doc = doc?;
            match self.upsert(&doc) {
                Upsert::Added(_) => report.added += 1,
                Upsert::Replaced(doc_id) => {
                    if mode == BuildMode::Create {
                        tracing::warn!(id = doc.id(), doc_id, "duplicate identifier in corpus, keeping the later record");
                    } else {
                        tracing::debug!(id = doc.id(), doc_id, "updated document");
                    }
                    report.replaced += 1;
                }
            }
        }
        tracing::info!(
            added = report.added,
            replaced = report.replaced,
            num_docs = self.document_count(),
            num_terms = self.term_count(),
            "indexed documents"
        );
        Ok(report)
    }

    /// Index a document, first dropping every posting of an earlier document
    /// with the same identifier.
    pub fn upsert(&mut self, doc: &Document) -> Upsert {
        let prepared = self.prepare(doc);
        let outcome = match self.ids.get(doc.id()).copied() {
            Some(doc_id) => {
                self.purge(doc_id);
                Upsert::Replaced(doc_id)
            }
            None => {
                let doc_id = self.next_doc_id;
                self.next_doc_id += 1;
                self.ids.insert(doc.id().to_string(), doc_id);
                Upsert::Added(doc_id)
            }
        };
        let doc_id = match outcome {
            Upsert::Added(id) | Upsert::Replaced(id) => id,
        };
        self.apply(doc_id, prepared);
        outcome
    }

    fn prepare(&self, doc: &Document) -> PreparedDocument {
        let fields = doc
            .fields()
            .map(|(field, text)| {
                let terms = self.analyzer.tokenize(text);
                let mut tf: BTreeMap<String, u32> = BTreeMap::new();
                for term in &terms {
                    *tf.entry(term.clone()).or_insert(0) += 1;
                }
                (field, terms.len() as u32, tf)
            })
            .collect();
        let title = doc.field(Field::Title).unwrap_or("").split_whitespace().collect::<Vec<_>>().join(" ");
        PreparedDocument { meta: DocMeta { external_id: doc.id().to_string(), title }, fields }
    }

    fn apply(&mut self, doc_id: DocId, prepared: PreparedDocument) {
        for (field, length, tf) in prepared.fields {
            let fi = &mut self.fields[field.slot()];
            fi.lengths.insert(doc_id, length);
            fi.total_tokens += length as u64;
            for (term, term_frequency) in tf {
                fi.postings.entry(term).or_default().push(Posting { doc_id, term_frequency });
            }
        }
        self.docs.insert(doc_id, prepared.meta);
    }

    fn purge(&mut self, doc_id: DocId) {
        for fi in self.fields.iter_mut() {
            if let Some(len) = fi.lengths.remove(&doc_id) {
                fi.total_tokens -= len as u64;
                fi.postings.retain(|_, list| {
                    list.retain(|p| p.doc_id != doc_id);
                    !list.is_empty()
                });
            }
        }
    }

    /// Postings for `(field, term)` in insertion order; empty when absent.
    pub fn postings(&self, field: Field, term: &str) -> &[Posting] {
        self.fields[field.slot()].postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document_frequency(&self, field: Field, term: &str) -> u32 {
        self.postings(field, term).len() as u32
    }

    /// Total occurrences of `term` in `field` across the collection.
    pub fn collection_frequency(&self, field: Field, term: &str) -> u64 {
        self.postings(field, term).iter().map(|p| p.term_frequency as u64).sum()
    }

    /// Token count of `field` in a document, 0 when the document lacks it.
    pub fn field_length(&self, doc_id: DocId, field: Field) -> u32 {
        self.fields[field.slot()].lengths.get(&doc_id).copied().unwrap_or(0)
    }

    pub fn field_stats(&self, field: Field) -> FieldStats {
        let fi = &self.fields[field.slot()];
        let doc_count = fi.lengths.len() as u32;
        let average_length = if doc_count == 0 { 0.0 } else { fi.total_tokens as f32 / doc_count as f32 };
        FieldStats { doc_count, total_tokens: fi.total_tokens, average_length }
    }

    pub fn average_field_length(&self, field: Field) -> f32 {
        self.field_stats(field).average_length
    }

    pub fn document_count(&self) -> u32 {
        self.docs.len() as u32
    }

    /// Distinct (field, term) keys.
    pub fn term_count(&self) -> usize {
        self.fields.iter().map(|fi| fi.postings.len()).sum()
    }

    pub fn terms(&self, field: Field) -> impl Iterator<Item = &str> {
        self.fields[field.slot()].postings.keys().map(String::as_str)
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> {
        self.docs.get(&doc_id)
    }

    pub fn doc_id(&self, external_id: &str) -> Option<DocId> {
        self.ids.get(external_id).copied()
    }

    pub fn docs(&self) -> impl Iterator<Item = (DocId, &DocMeta)> {
        self.docs.iter().map(|(id, meta)| (*id, meta))
    }
}
