//! Line-oriented corpus reader.
//!
//! A record opens with `.I <id>`; the single-letter tags `.T`, `.A`, `.B`
//! and `.W` switch the field that following lines are appended to. Lines
//! before the first record, and lines under an unknown tag, are ignored.

use std::io::{self, BufRead};

use crate::document::{Document, DocumentBuilder, Field};
use crate::error::{Error, Result};

/// One physical input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Bytes that are not valid UTF-8.
    Malformed,
}

/// What a line means to the record grammar.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Marker<'a> {
    RecordStart(&'a str),
    Tag(char, &'a str),
    Body(&'a str),
}

pub(crate) fn classify(line: &str) -> Marker<'_> {
    let trimmed = line.trim_end();
    let mut chars = trimmed.chars();
    if chars.next() == Some('.') {
        if let Some(tag) = chars.next().filter(char::is_ascii_uppercase) {
            let rest = chars.as_str();
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                let rest = rest.trim();
                return if tag == 'I' { Marker::RecordStart(rest) } else { Marker::Tag(tag, rest) };
            }
        }
    }
    Marker::Body(trimmed)
}

/// Read one line, stripping the terminator. `Ok(None)` at end of stream.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<Line>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(match std::str::from_utf8(buf) {
        Ok(s) => Line::Text(s.to_string()),
        Err(_) => Line::Malformed,
    }))
}

/// Parser state between lines.
#[derive(Debug, Default)]
pub enum ParseState {
    #[default]
    Idle,
    InRecord {
        doc: DocumentBuilder,
        field: Option<Field>,
        /// First reason the record cannot be indexed.
        defect: Option<String>,
    },
}

/// Outcome of closing a record.
pub type Flushed = std::result::Result<Document, Error>;

impl ParseState {
    /// Consume one line and return the next state, plus the record that the
    /// line closed, if any.
    pub fn step(self, line: &Line) -> (ParseState, Option<Flushed>) {
        let text = match line {
            Line::Text(t) => t.as_str(),
            Line::Malformed => {
                return match self {
                    ParseState::Idle => (ParseState::Idle, None),
                    ParseState::InRecord { doc, field, defect } => {
                        let defect = defect.or_else(|| Some("line is not valid UTF-8".into()));
                        (ParseState::InRecord { doc, field, defect }, None)
                    }
                };
            }
        };

        match (self, classify(text)) {
            (state, Marker::RecordStart(id)) => {
                let defect = id.is_empty().then(|| "record start without identifier".to_string());
                let next = ParseState::InRecord { doc: DocumentBuilder::new(id), field: None, defect };
                (next, state.finish())
            }
            (ParseState::Idle, _) => (ParseState::Idle, None),
            (ParseState::InRecord { mut doc, defect, .. }, Marker::Tag(tag, rest)) => {
                let field = Field::from_tag(tag);
                if let Some(f) = field {
                    doc.open(f);
                    if !rest.is_empty() {
                        doc.push_line(f, rest);
                    }
                }
                (ParseState::InRecord { doc, field, defect }, None)
            }
            (ParseState::InRecord { mut doc, field, defect }, Marker::Body(body)) => {
                if let Some(f) = field {
                    doc.push_line(f, body);
                }
                (ParseState::InRecord { doc, field, defect }, None)
            }
        }
    }

    /// Close the open record at end of stream or at the next record start.
    pub fn finish(self) -> Option<Flushed> {
        match self {
            ParseState::Idle => None,
            ParseState::InRecord { doc, defect: Some(reason), .. } => {
                let record = if doc.id().is_empty() { "<unnamed>".to_string() } else { doc.id().to_string() };
                Some(Err(Error::Parse { record, reason }))
            }
            ParseState::InRecord { doc, defect: None, .. } => Some(Ok(doc.finish())),
        }
    }
}

/// Lazy, single-pass sequence of documents read from a line source.
/// Malformed records are logged and skipped; only I/O failures are yielded
/// as errors.
pub struct CorpusParser<R> {
    reader: R,
    buf: Vec<u8>,
    state: ParseState,
    done: bool,
    skipped: usize,
}

impl<R: BufRead> CorpusParser<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new(), state: ParseState::Idle, done: false, skipped: 0 }
    }

    /// Number of malformed records skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn accept(&mut self, flushed: Flushed) -> Option<Document> {
        match flushed {
            Ok(doc) => Some(doc),
            Err(err) => {
                tracing::warn!(error = %err, "skipping corpus record");
                self.skipped += 1;
                None
            }
        }
    }
}

impl<R: BufRead> Iterator for CorpusParser<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match read_line(&mut self.reader, &mut self.buf) {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::Io(e)));
                }
            };
            let flushed = match line {
                Some(line) => {
                    let (next, flushed) = std::mem::take(&mut self.state).step(&line);
                    self.state = next;
                    flushed
                }
                None => {
                    self.done = true;
                    std::mem::take(&mut self.state).finish()
                }
            };
            if let Some(doc) = flushed.and_then(|f| self.accept(f)) {
                return Some(Ok(doc));
            }
        }
        None
    }
}

/// Parse an in-memory corpus, discarding I/O errors (there are none for slices).
pub fn parse_str(text: &str) -> Vec<Document> {
    CorpusParser::new(text.as_bytes()).filter_map(|d| d.ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "\
stray preface line
.I 1
.T
experimental investigation of the aerodynamics of a
wing in a slipstream .
.A
brenckman,m.
.B
j. ae. scs. 25, 1958, 324.
.W
experimental investigation of the aerodynamics of a
wing in a slipstream .
.I 2
.T
simple shear flow past a flat plate
.X
ignored body
.W
the problem of shear flow
";

    #[test]
    fn parses_records_and_fields() {
        let docs = parse_str(CORPUS);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id(), "1");
        assert_eq!(docs[0].field(Field::Author), Some("brenckman,m."));
        assert_eq!(
            docs[0].field(Field::Title),
            Some("experimental investigation of the aerodynamics of a\nwing in a slipstream .")
        );
        assert_eq!(docs[1].id(), "2");
        assert_eq!(docs[1].field(Field::Words), Some("the problem of shear flow"));
        assert_eq!(docs[1].field(Field::Author), None);
    }

    #[test]
    fn unknown_tag_stops_accumulation() {
        let docs = parse_str(CORPUS);
        assert!(!docs[1].field(Field::Title).unwrap_or("").contains("ignored"));
    }

    #[test]
    fn lines_before_any_tag_are_ignored() {
        let docs = parse_str(".I 9\nloose text\n.W\nbody\n");
        assert_eq!(docs[0].field(Field::Words), Some("body"));
        assert_eq!(docs[0].fields().count(), 1);
    }

    #[test]
    fn truncated_trailing_record_is_flushed() {
        let docs = parse_str(".I 1\n.W\nfull\n.I 2\n.T\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].field(Field::Title), Some(""));
    }

    #[test]
    fn record_without_identifier_is_skipped() {
        let mut parser = CorpusParser::new(".I\n.W\norphan\n.I 3\n.W\nkept\n".as_bytes());
        let docs: Vec<_> = parser.by_ref().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), "3");
        assert_eq!(parser.skipped(), 1);
    }

    #[test]
    fn invalid_utf8_poisons_only_its_record() {
        let mut bytes = b".I 1\n.W\nbad ".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\n.I 2\n.W\ngood\n");
        let mut parser = CorpusParser::new(bytes.as_slice());
        let ids: Vec<String> = parser.by_ref().map(|d| d.unwrap().id().to_string()).collect();
        assert_eq!(ids, vec!["2"]);
        assert_eq!(parser.skipped(), 1);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let docs = parse_str(".I 4\r\n.T\r\nwing\r\n");
        assert_eq!(docs[0].id(), "4");
        assert_eq!(docs[0].field(Field::Title), Some("wing"));
    }

    #[test]
    fn classify_requires_tag_boundary() {
        assert_eq!(classify(".I 12"), Marker::RecordStart("12"));
        assert_eq!(classify(".W"), Marker::Tag('W', ""));
        assert_eq!(classify(".Whatever"), Marker::Body(".Whatever"));
        assert_eq!(classify("..."), Marker::Body("..."));
    }

    #[test]
    fn fields_round_trip_modulo_whitespace() {
        let docs = parse_str(CORPUS);
        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        let words = docs[0].field(Field::Words).unwrap();
        assert_eq!(
            squash(words),
            "experimental investigation of the aerodynamics of a wing in a slipstream ."
        );
    }
}
