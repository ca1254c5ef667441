use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::tokenizer::Analyzer;

/// The four searchable fields of a corpus record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Title,
    Author,
    Bibliography,
    Words,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::Author, Field::Bibliography, Field::Words];

    /// Map a tag character (`T`, `A`, `B`, `W`) to its field.
    pub fn from_tag(tag: char) -> Option<Field> {
        match tag {
            'T' => Some(Field::Title),
            'A' => Some(Field::Author),
            'B' => Some(Field::Bibliography),
            'W' => Some(Field::Words),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            Field::Title => 'T',
            Field::Author => 'A',
            Field::Bibliography => 'B',
            Field::Words => 'W',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Author => "Author",
            Field::Bibliography => "Bibliography",
            Field::Words => "Words",
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed corpus record. Immutable once built; see [`DocumentBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: String,
    fields: BTreeMap<Field, String>,
}

impl Document {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw text of a field, `None` when the record never carried the tag.
    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Fields present on the record, in `Field` order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields.iter().map(|(f, t)| (*f, t.as_str()))
    }

    pub fn token_count(&self, field: Field, analyzer: &Analyzer) -> usize {
        self.field(field).map(|t| analyzer.token_count(t)).unwrap_or(0)
    }
}

/// Accumulates lines for one record; `finish` freezes it into a [`Document`].
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    id: String,
    fields: BTreeMap<Field, Vec<String>>,
}

impl DocumentBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), fields: BTreeMap::new() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mark a field as present, even if no text follows its tag.
    pub fn open(&mut self, field: Field) -> &mut Self {
        self.fields.entry(field).or_default();
        self
    }

    pub fn push_line(&mut self, field: Field, line: impl Into<String>) -> &mut Self {
        self.fields.entry(field).or_default().push(line.into());
        self
    }

    /// Multi-line field bodies are joined with `\n`.
    pub fn finish(self) -> Document {
        let fields = self.fields.into_iter().map(|(f, lines)| (f, lines.join("\n"))).collect();
        Document { id: self.id, fields }
    }
}
