//! TF-IDF weighting.

use serde::{Deserialize, Serialize};

/// How inverse document frequency is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdfMode {
    /// `log10(N / df)`; a term present in every document weighs zero.
    Plain,
    /// `log10(1 + N / df)`; always positive for `df <= N`.
    #[default]
    Smoothed,
}

impl IdfMode {
    pub fn idf(self, corpus_size: usize, doc_freq: usize) -> f64 {
        match self {
            IdfMode::Plain => idf(corpus_size, doc_freq),
            IdfMode::Smoothed => smoothed_idf(corpus_size, doc_freq),
        }
    }
}

/// `1 + log10(freq)`, zero for a term that does not occur.
pub fn tf(freq: usize) -> f64 {
    if freq == 0 {
        0.0
    } else {
        1.0 + (freq as f64).log10()
    }
}

/// `log10(N / df)`, zero when `df` is zero.
pub fn idf(corpus_size: usize, doc_freq: usize) -> f64 {
    if doc_freq == 0 || corpus_size == 0 {
        return 0.0;
    }
    (corpus_size as f64 / doc_freq as f64).log10()
}

pub fn smoothed_idf(corpus_size: usize, doc_freq: usize) -> f64 {
    if doc_freq == 0 {
        return 0.0;
    }
    (1.0 + corpus_size as f64 / doc_freq as f64).log10()
}

pub fn tfidf(freq: usize, corpus_size: usize, doc_freq: usize, mode: IdfMode) -> f64 {
    tf(freq) * mode.idf(corpus_size, doc_freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn formulas() {
        assert_eq!(tf(0), 0.0);
        assert!((tf(1) - 1.0).abs() < EPS);
        assert!((tf(10) - 2.0).abs() < EPS);
        assert!((idf(100, 10) - 1.0).abs() < EPS);
        assert_eq!(idf(5, 5), 0.0);
        assert_eq!(idf(5, 0), 0.0);
        assert!((smoothed_idf(9, 1) - 1.0).abs() < EPS);
        assert!((tfidf(10, 100, 10, IdfMode::Plain) - 2.0).abs() < EPS);
    }

    #[test]
    fn tf_never_decreases_with_frequency() {
        let mut last = 0.0;
        for f in 0..200 {
            let w = tfidf(f, 50, 7, IdfMode::Plain);
            assert!(w >= last, "tf-idf dropped at freq {f}");
            last = w;
        }
    }

    #[test]
    fn idf_never_increases_with_doc_frequency() {
        for mode in [IdfMode::Plain, IdfMode::Smoothed] {
            let mut last = f64::INFINITY;
            for df in 1..=100 {
                let w = mode.idf(100, df);
                assert!(w <= last, "{mode:?} idf rose at df {df}");
                assert!(w.is_finite());
                last = w;
            }
        }
    }

    #[test]
    fn smoothed_stays_positive_for_ubiquitous_terms() {
        assert!(smoothed_idf(2, 2) > 0.0);
    }
}
