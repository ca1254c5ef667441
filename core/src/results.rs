//! Page slicing and TREC run-file output.

use std::io::Write;

use crate::error::Result;
use crate::search::Hit;

/// A contiguous slice of a ranked list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page<'a> {
    /// 1-based page number.
    pub number: usize,
    /// Rank of the first hit on the page (1-based).
    pub first_rank: usize,
    pub hits: &'a [Hit],
}

impl<'a> Page<'a> {
    /// Hits paired with their global rank.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &'a Hit)> {
        let first = self.first_rank;
        self.hits.iter().enumerate().map(move |(i, h)| (first + i, h))
    }
}

/// Walks a ranked list `page_size` hits at a time, from offset 0.
pub struct Pages<'a> {
    hits: &'a [Hit],
    page_size: usize,
    start: usize,
}

pub fn paginate(hits: &[Hit], page_size: usize) -> Pages<'_> {
    Pages { hits, page_size: page_size.max(1), start: 0 }
}

impl<'a> Iterator for Pages<'a> {
    type Item = Page<'a>;

    fn next(&mut self) -> Option<Page<'a>> {
        if self.start >= self.hits.len() {
            return None;
        }
        let end = (self.start + self.page_size).min(self.hits.len());
        let page = Page { number: self.start / self.page_size + 1, first_rank: self.start + 1, hits: &self.hits[self.start..end] };
        self.start = end;
        Some(page)
    }
}

/// `<query> 0 <doc> <rank> <score> <tag>`
pub fn format_line(query_number: usize, doc_id: &str, rank: usize, score: f32, tag: &str) -> String {
    format!("{query_number} 0 {doc_id} {rank} {score} {tag}")
}

/// Writes run lines in query order, then rank order.
pub struct RunWriter<W: Write> {
    out: W,
    tag: String,
    lines: usize,
}

impl<W: Write> RunWriter<W> {
    pub fn new(out: W, tag: impl Into<String>) -> Self {
        Self { out, tag: tag.into(), lines: 0 }
    }

    pub fn write_page(&mut self, query_number: usize, page: &Page<'_>) -> Result<()> {
        for (rank, hit) in page.ranked() {
            writeln!(self.out, "{}", format_line(query_number, &hit.external_id, rank, hit.score, &self.tag))?;
            self.lines += 1;
        }
        Ok(())
    }

    /// Write every page of one query's ranked list. Returns lines written.
    pub fn write_query(&mut self, query_number: usize, hits: &[Hit], page_size: usize) -> Result<usize> {
        let before = self.lines;
        for page in paginate(hits, page_size) {
            self.write_page(query_number, &page)?;
        }
        Ok(self.lines - before)
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
