//! Batch runs: a query file in, a TREC run file out.

use std::io::{BufRead, Write};

use crate::config::SearchConfig;
use crate::corpus::CorpusParser;
use crate::error::Result;
use crate::index::{BuildMode, BuildReport, InvertedIndex};
use crate::query::QueryParser;
use crate::results::RunWriter;
use crate::search::QueryEvaluator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub queries: usize,
    pub skipped: usize,
    /// Queries that produced no hits.
    pub empty: usize,
    pub lines: usize,
}

/// Evaluate every query in `queries` and write the ranked pages to `out`.
/// Each query contributes at most `5 * hits_per_page` lines.
pub fn search_run<R: BufRead, W: Write>(
    index: &InvertedIndex,
    config: &SearchConfig,
    queries: R,
    out: W,
) -> Result<RunReport> {
    let evaluator = QueryEvaluator::new(index, config)?;
    tracing::info!(similarity = %evaluator.similarity(), num_docs = index.document_count(), "searching");

    let mut parser = QueryParser::new(queries);
    let mut writer = RunWriter::new(out, config.run_tag.clone());
    let mut report = RunReport::default();
    for query in parser.by_ref() {
        let query = query?;
        let top = evaluator.search(&query.text, config.retrieval_depth());
        let written = writer.write_query(query.number, &top.hits, config.hits_per_page)?;
        tracing::debug!(number = query.number, id = %query.id, total_hits = top.total_hits, written, "query done");
        report.queries += 1;
        if top.hits.is_empty() {
            report.empty += 1;
        }
    }
    report.skipped = parser.skipped();
    report.lines = writer.lines_written();
    writer.finish()?;
    Ok(report)
}

/// Index `corpus` into `index`, then run `queries` against it. The
/// configuration is checked before the corpus is read.
pub fn build_and_search<C: BufRead, Q: BufRead, W: Write>(
    index: &mut InvertedIndex,
    mode: BuildMode,
    config: &SearchConfig,
    corpus: C,
    queries: Q,
    out: W,
) -> Result<(BuildReport, RunReport)> {
    config.validate()?;
    config.analyzer_for(*index.analyzer())?;
    let built = index.build(CorpusParser::new(corpus), mode)?;
    let run = search_run(index, config, queries, out)?;
    Ok((built, run))
}
