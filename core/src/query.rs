//! Query-file reader. Same record shape as the corpus: `.I` opens a query,
//! an optional `.W` marker may follow, and every other line up to the next
//! `.I` is joined with single spaces into the query text.

use std::io::BufRead;

use crate::corpus::{classify, read_line, Line, Marker};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    /// 1-based position of the record in the file.
    pub number: usize,
    /// Identifier from the record-start line.
    pub id: String,
    pub text: String,
}

struct OpenQuery {
    number: usize,
    id: String,
    parts: Vec<String>,
    defect: Option<&'static str>,
}

impl OpenQuery {
    fn close(self) -> std::result::Result<QueryRecord, Error> {
        match self.defect {
            Some(reason) => Err(Error::Parse { record: format!("query {}", self.number), reason: reason.into() }),
            None => Ok(QueryRecord { number: self.number, id: self.id, text: self.parts.join(" ") }),
        }
    }
}

/// Lazy sequence of queries. A malformed query is logged and skipped but
/// still consumes its number, so numbering stays aligned with the file.
pub struct QueryParser<R> {
    reader: R,
    buf: Vec<u8>,
    open: Option<OpenQuery>,
    seen: usize,
    skipped: usize,
    done: bool,
}

impl<R: BufRead> QueryParser<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new(), open: None, seen: 0, skipped: 0, done: false }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn settle(&mut self, open: OpenQuery) -> Option<QueryRecord> {
        match open.close() {
            Ok(q) => Some(q),
            Err(err) => {
                tracing::warn!(error = %err, "skipping query");
                self.skipped += 1;
                None
            }
        }
    }
}

impl<R: BufRead> Iterator for QueryParser<R> {
    type Item = Result<QueryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match read_line(&mut self.reader, &mut self.buf) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.done = true;
                    let last = self.open.take()?;
                    return self.settle(last).map(Ok);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::Io(e)));
                }
            };
            let text = match line {
                Line::Text(text) => text,
                Line::Malformed => {
                    if let Some(open) = self.open.as_mut() {
                        open.defect.get_or_insert("line is not valid UTF-8");
                    }
                    continue;
                }
            };
            let open = match classify(&text) {
                Marker::RecordStart(id) => {
                    self.seen += 1;
                    let next = OpenQuery { number: self.seen, id: id.to_string(), parts: Vec::new(), defect: None };
                    if let Some(previous) = self.open.replace(next) {
                        if let Some(q) = self.settle(previous) {
                            return Some(Ok(q));
                        }
                    }
                    continue;
                }
                _ if self.open.is_none() => continue,
                marker => (marker, self.open.as_mut()),
            };
            if let (Marker::Tag(_, part) | Marker::Body(part), Some(open)) = open {
                let part = part.trim();
                if !part.is_empty() {
                    open.parts.push(part.to_string());
                }
            }
        }
        None
    }
}

/// Parse an in-memory query file.
pub fn parse_queries(text: &str) -> Vec<QueryRecord> {
    QueryParser::new(text.as_bytes()).filter_map(|q| q.ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_lines_and_skips_marker() {
        let qs = parse_queries(".I 001\n.W\nwhat similarity laws must be obeyed\nwhen constructing aeroelastic models\n.I 002\n.W\nwhat are the structural problems\n");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].number, 1);
        assert_eq!(qs[0].id, "001");
        assert_eq!(qs[0].text, "what similarity laws must be obeyed when constructing aeroelastic models");
        assert_eq!(qs[1].number, 2);
        assert_eq!(qs[1].text, "what are the structural problems");
    }

    #[test]
    fn marker_is_optional_and_preface_ignored() {
        let qs = parse_queries("header\n.I 5\nshear flow\n");
        assert_eq!(qs, vec![QueryRecord { number: 1, id: "5".into(), text: "shear flow".into() }]);
    }

    #[test]
    fn empty_query_is_kept() {
        let qs = parse_queries(".I 1\n.W\n.I 2\n.W\nflow\n");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].text, "");
    }

    #[test]
    fn malformed_query_keeps_numbering() {
        let mut bytes = b".I 1\n.W\n".to_vec();
        bytes.extend_from_slice(&[0xc3, 0x28, b'\n']);
        bytes.extend_from_slice(b".I 2\n.W\nflow\n");
        let mut parser = QueryParser::new(bytes.as_slice());
        let qs: Vec<_> = parser.by_ref().map(|q| q.unwrap()).collect();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].number, 2);
        assert_eq!(parser.skipped(), 1);
    }
}
