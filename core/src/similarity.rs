//! Term-level scoring functions. Every model is computed from index
//! statistics alone; selectors 0..=4 pick the model.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Collection-side statistics for one (field, term) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    pub document_frequency: u32,
    /// Documents carrying the field.
    pub document_count: u32,
    pub average_field_length: f32,
    /// `P(term | collection)` for the field.
    pub collection_probability: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
    /// `sqrt(tf) * (1 + ln(N / (df + 1)))`
    Classic,
    Bm25(Bm25Params),
    /// One point per matching term.
    Boolean,
    LmDirichlet { mu: f32 },
    LmJelinekMercer { lambda: f32 },
}

impl Similarity {
    /// Resolve a numeric selector into a model with the given parameters.
    pub fn from_selector(selector: u32, bm25: Bm25Params, mu: f32, lambda: f32) -> Result<Self> {
        let sim = match selector {
            0 => Similarity::Classic,
            1 => Similarity::Bm25(bm25),
            2 => Similarity::Boolean,
            3 => Similarity::LmDirichlet { mu },
            4 => Similarity::LmJelinekMercer { lambda },
            other => return Err(Error::config(format!("similarity selector {other} is not one of 0..=4"))),
        };
        Ok(sim)
    }

    pub fn selector(&self) -> u32 {
        match self {
            Similarity::Classic => 0,
            Similarity::Bm25(_) => 1,
            Similarity::Boolean => 2,
            Similarity::LmDirichlet { .. } => 3,
            Similarity::LmJelinekMercer { .. } => 4,
        }
    }

    /// Score of one term in one document field. Zero when the term does not
    /// occur; never divides by zero.
    pub fn score(&self, term_frequency: u32, field_length: u32, stats: &TermStats) -> f32 {
        if term_frequency == 0 {
            return 0.0;
        }
        let tf = term_frequency as f32;
        let len = field_length as f32;
        match *self {
            Similarity::Classic => {
                let n = stats.document_count as f32;
                let idf = 1.0 + (n / (stats.document_frequency as f32 + 1.0)).ln();
                tf.sqrt() * idf
            }
            Similarity::Bm25(Bm25Params { k1, b }) => {
                let n = stats.document_count as f32;
                let df = stats.document_frequency as f32;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let norm = if stats.average_field_length > 0.0 { len / stats.average_field_length } else { 1.0 };
                idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm))
            }
            Similarity::Boolean => 1.0,
            Similarity::LmDirichlet { mu } => {
                let p = stats.collection_probability;
                if p <= 0.0 {
                    return 0.0;
                }
                let s = (1.0 + tf / (mu * p)).ln() + (mu / (len + mu)).ln();
                s.max(0.0)
            }
            Similarity::LmJelinekMercer { lambda } => {
                let p = stats.collection_probability;
                if p <= 0.0 || len == 0.0 {
                    return 0.0;
                }
                let s = (1.0 + ((1.0 - lambda) * tf / len) / (lambda * p)).ln();
                s.max(0.0)
            }
        }
    }

    /// Multiplier for a term that appears `count` times in the query.
    pub fn query_weight(&self, count: u32) -> f32 {
        match self {
            Similarity::Boolean => 1.0,
            _ => count as f32,
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Classic => write!(f, "classic"),
            Similarity::Bm25(p) => write!(f, "bm25(k1={}, b={})", p.k1, p.b),
            Similarity::Boolean => write!(f, "boolean"),
            Similarity::LmDirichlet { mu } => write!(f, "lm-dirichlet(mu={mu})"),
            Similarity::LmJelinekMercer { lambda } => write!(f, "lm-jelinek-mercer(lambda={lambda})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(df: u32, n: u32, avg: f32) -> TermStats {
        TermStats { document_frequency: df, document_count: n, average_field_length: avg, collection_probability: 0.01 }
    }

    fn all() -> Vec<Similarity> {
        (0..5).map(|s| Similarity::from_selector(s, Bm25Params::default(), 2000.0, 0.7).unwrap()).collect()
    }

    #[test]
    fn selector_out_of_range_is_configuration_error() {
        let err = Similarity::from_selector(5, Bm25Params::default(), 2000.0, 0.7).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn selectors_round_trip() {
        for (i, sim) in all().into_iter().enumerate() {
            assert_eq!(sim.selector(), i as u32);
        }
    }

    #[test]
    fn classic_matches_formula() {
        let s = Similarity::Classic.score(4, 10, &stats(1, 10, 10.0));
        let expected = 2.0 * (1.0 + (10.0f32 / 2.0).ln());
        assert!((s - expected).abs() < 1e-5);
    }

    #[test]
    fn bm25_matches_formula_at_average_length() {
        let s = Similarity::Bm25(Bm25Params::default()).score(1, 10, &stats(1, 10, 10.0));
        let idf = (1.0f32 + 9.5 / 1.5).ln();
        assert!((s - idf).abs() < 1e-5);
    }

    #[test]
    fn bm25_monotone_in_tf_and_length() {
        let sim = Similarity::Bm25(Bm25Params::default());
        let st = stats(3, 50, 20.0);
        let mut prev = 0.0;
        for tf in 1..30 {
            let s = sim.score(tf, 20, &st);
            assert!(s >= prev);
            prev = s;
        }
        let mut prev = f32::INFINITY;
        for len in 1..200 {
            let s = sim.score(3, len, &st);
            assert!(s <= prev);
            prev = s;
        }
    }

    #[test]
    fn boolean_ignores_frequency_and_length() {
        assert_eq!(Similarity::Boolean.score(7, 1000, &stats(1, 2, 3.0)), 1.0);
        assert_eq!(Similarity::Boolean.query_weight(3), 1.0);
    }

    #[test]
    fn zero_frequency_and_empty_fields_are_safe() {
        for sim in all() {
            assert_eq!(sim.score(0, 0, &stats(0, 0, 0.0)), 0.0);
            let s = sim.score(1, 0, &stats(1, 1, 0.0));
            assert!(s.is_finite(), "{sim} produced {s}");
        }
    }

    #[test]
    fn dirichlet_matches_formula() {
        // mu * p = 20
        let s = Similarity::LmDirichlet { mu: 2000.0 }.score(2, 10, &stats(2, 10, 10.0));
        let expected = (1.0f32 + 2.0 / 20.0).ln() + (2000.0f32 / 2010.0).ln();
        assert!((s - expected).abs() < 1e-6, "{s} vs {expected}");
    }

    #[test]
    fn jelinek_mercer_matches_formula() {
        let s = Similarity::LmJelinekMercer { lambda: 0.7 }.score(2, 10, &stats(2, 10, 10.0));
        let expected = (1.0f32 + (0.3 * 2.0 / 10.0) / (0.7 * 0.01)).ln();
        assert!((s - expected).abs() < 1e-5, "{s} vs {expected}");
    }

    #[test]
    fn dirichlet_clamps_long_fields_with_common_terms() {
        let common = TermStats { collection_probability: 0.5, ..stats(9, 10, 500.0) };
        // ln(1 + 1/1000) + ln(2000/3000) < 0
        assert_eq!(Similarity::LmDirichlet { mu: 2000.0 }.score(1, 1000, &common), 0.0);
    }

    #[test]
    fn language_models_prefer_denser_matches() {
        let st = stats(2, 10, 10.0);
        for sim in [Similarity::LmDirichlet { mu: 2000.0 }, Similarity::LmJelinekMercer { lambda: 0.7 }] {
            assert!(sim.score(3, 10, &st) > sim.score(1, 10, &st));
            assert!(sim.score(1, 10, &st) >= 0.0);
        }
    }
}
