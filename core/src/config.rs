use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::document::Field;
use crate::error::{Error, Result};
use crate::similarity::{Bm25Params, Similarity};
use crate::tokenizer::Analyzer;

/// Per-field multipliers used when field scores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBoosts {
    pub title: f32,
    pub author: f32,
    pub bibliography: f32,
    pub words: f32,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self { title: 0.65, author: 0.04, bibliography: 0.02, words: 0.35 }
    }
}

impl FieldBoosts {
    pub fn get(&self, field: Field) -> f32 {
        match field {
            Field::Title => self.title,
            Field::Author => self.author,
            Field::Bibliography => self.bibliography,
            Field::Words => self.words,
        }
    }
}

/// Everything a search run can be tuned with. Missing keys in a JSON file
/// fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 0 classic, 1 BM25, 2 boolean, 3 LM Dirichlet, 4 LM Jelinek-Mercer.
    pub similarity: u32,
    pub bm25: Bm25Params,
    pub dirichlet_mu: f32,
    pub jelinek_mercer_lambda: f32,
    pub boosts: FieldBoosts,
    pub hits_per_page: usize,
    pub run_tag: String,
    /// Stopword removal for queries. Unset follows the index; a value that
    /// disagrees with the index is rejected.
    pub stopwords: Option<bool>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity: 1,
            bm25: Bm25Params::default(),
            dirichlet_mu: 2000.0,
            jelinek_mercer_lambda: 0.7,
            boosts: FieldBoosts::default(),
            hits_per_page: 10,
            run_tag: "Any".into(),
            stopwords: None,
        }
    }
}

impl SearchConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .map_err(|e| Error::config(format!("cannot read config {}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(f))
            .map_err(|e| Error::config(format!("invalid config {}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        self.similarity()?;
        if self.hits_per_page == 0 {
            return Err(Error::config("hits_per_page must be at least 1"));
        }
        for field in Field::ALL {
            let boost = self.boosts.get(field);
            if !boost.is_finite() || boost < 0.0 {
                return Err(Error::config(format!("boost for {field} must be a non-negative number")));
            }
        }
        if !(self.bm25.k1 >= 0.0) || !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::config("bm25 needs k1 >= 0 and 0 <= b <= 1"));
        }
        if !(self.dirichlet_mu > 0.0) {
            return Err(Error::config("dirichlet_mu must be positive"));
        }
        if !(self.jelinek_mercer_lambda > 0.0 && self.jelinek_mercer_lambda < 1.0) {
            return Err(Error::config("jelinek_mercer_lambda must lie strictly between 0 and 1"));
        }
        if self.run_tag.is_empty() || self.run_tag.contains(char::is_whitespace) {
            return Err(Error::config("run_tag must be a single non-empty word"));
        }
        Ok(())
    }

    pub fn similarity(&self) -> Result<Similarity> {
        Similarity::from_selector(self.similarity, self.bm25, self.dirichlet_mu, self.jelinek_mercer_lambda)
    }

    /// The analyzer queries must use against an index built with `indexed`.
    pub fn analyzer_for(&self, indexed: Analyzer) -> Result<Analyzer> {
        match self.stopwords {
            Some(s) if s != indexed.remove_stopwords => Err(Error::config(format!(
                "stopwords = {s} but the index was built with stopwords = {}",
                indexed.remove_stopwords
            ))),
            _ => Ok(indexed),
        }
    }

    /// How many hits a query materializes: five pages.
    pub fn retrieval_depth(&self) -> usize {
        self.hits_per_page.saturating_mul(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SearchConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.retrieval_depth(), 50);
        assert_eq!(cfg.boosts.get(Field::Title), 0.65);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: SearchConfig = serde_json::from_str(r#"{"similarity": 3, "boosts": {"title": 1.0}}"#).unwrap();
        assert_eq!(cfg.similarity, 3);
        assert_eq!(cfg.boosts.title, 1.0);
        assert_eq!(cfg.boosts.words, 0.35);
        assert_eq!(cfg.dirichlet_mu, 2000.0);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            SearchConfig { similarity: 5, ..Default::default() },
            SearchConfig { hits_per_page: 0, ..Default::default() },
            SearchConfig { jelinek_mercer_lambda: 1.0, ..Default::default() },
            SearchConfig { dirichlet_mu: f32::NAN, ..Default::default() },
            SearchConfig { boosts: FieldBoosts { author: -1.0, ..Default::default() }, ..Default::default() },
            SearchConfig { run_tag: "two words".into(), ..Default::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(Error::Configuration(_))), "{cfg:?}");
        }
    }

    #[test]
    fn stopwords_follow_index_unless_contradicted() {
        let indexed = Analyzer::new(true);
        assert_eq!(SearchConfig::default().analyzer_for(indexed).unwrap(), indexed);
        let agree = SearchConfig { stopwords: Some(true), ..Default::default() };
        assert_eq!(agree.analyzer_for(indexed).unwrap(), indexed);
        let clash = SearchConfig { stopwords: Some(false), ..Default::default() };
        assert!(matches!(clash.analyzer_for(indexed), Err(Error::Configuration(_))));

        let from_file: SearchConfig = serde_json::from_str(r#"{"stopwords": false}"#).unwrap();
        assert!(from_file.analyzer_for(indexed).is_err());
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = SearchConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
