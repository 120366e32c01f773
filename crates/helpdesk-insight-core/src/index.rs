//! Inverted index and IDF table over a corpus snapshot.
//!
//! # Construction
//!
//! For every ticket, `description + " " + category` is tokenized and
//! deduplicated. Each unique term gets the ticket's position appended to its
//! postings list and its document frequency incremented. After the pass:
//!
//! ```text
//! idf(term) = ln(1 + (N + 1) / (df + 1))
//! ```
//!
//! Postings follow corpus order. Nothing outside this module may rely on
//! them being sorted.

use std::collections::{HashMap, HashSet};

use crate::models::Corpus;
use crate::tokenize::tokenize;

/// Term → positions of the tickets containing it.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<usize>>,
}

impl InvertedIndex {
    pub fn postings(&self, term: &str) -> &[usize] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.postings.iter().map(|(t, p)| (t.as_str(), p.as_slice()))
    }

    /// Union of the postings of `terms`, in ascending position order.
    pub fn candidates<S: AsRef<str>>(&self, terms: &[S]) -> Vec<usize> {
        let mut seen: HashSet<usize> = HashSet::new();
        for term in terms {
            seen.extend(self.postings(term.as_ref()).iter().copied());
        }
        let mut out: Vec<usize> = seen.into_iter().collect();
        out.sort_unstable();
        out
    }
}

/// Term → smoothed inverse document frequency.
#[derive(Debug, Clone, Default)]
pub struct IdfTable {
    weights: HashMap<String, f64>,
    doc_count: usize,
}

impl IdfTable {
    /// Weight for `term`; terms never seen in training are treated as
    /// maximally rare: `ln(1 + N)`.
    pub fn weight(&self, term: &str) -> f64 {
        self.weights
            .get(term)
            .copied()
            .unwrap_or_else(|| unseen_idf(self.doc_count))
    }

    pub fn get(&self, term: &str) -> Option<f64> {
        self.weights.get(term).copied()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// `ln(1 + (N + 1) / (df + 1))`.
pub fn smoothed_idf(doc_count: usize, doc_freq: usize) -> f64 {
    (1.0 + (doc_count as f64 + 1.0) / (doc_freq as f64 + 1.0)).ln()
}

/// `ln(1 + N / 1)`.
pub fn unseen_idf(doc_count: usize) -> f64 {
    (1.0 + doc_count as f64).ln()
}

/// An [`InvertedIndex`] and [`IdfTable`] built together from one corpus.
///
/// Carries the fingerprint of the corpus it was built from; see
/// [`TrainedIndex::assert_matches`].
#[derive(Debug, Clone)]
pub struct TrainedIndex {
    pub index: InvertedIndex,
    pub idf: IdfTable,
    fingerprint: String,
}

impl TrainedIndex {
    pub fn build(corpus: &Corpus) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for (pos, ticket) in corpus.tickets().iter().enumerate() {
            let text = format!("{} {}", ticket.description, ticket.category);
            let mut seen: HashSet<String> = HashSet::new();
            for term in tokenize(&text) {
                if !seen.insert(term.clone()) {
                    continue;
                }
                postings.entry(term.clone()).or_default().push(pos);
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n = corpus.len();
        let weights = doc_freq
            .into_iter()
            .map(|(term, df)| (term, smoothed_idf(n, df)))
            .collect();

        Self {
            index: InvertedIndex { postings },
            idf: IdfTable {
                weights,
                doc_count: n,
            },
            fingerprint: corpus.fingerprint().to_string(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn matches(&self, corpus: &Corpus) -> bool {
        self.fingerprint == corpus.fingerprint()
    }

    /// Panics if this index was built from a different corpus snapshot.
    ///
    /// Pairing an index with the wrong snapshot is a programming error: its
    /// postings would point at unrelated or nonexistent tickets.
    pub fn assert_matches(&self, corpus: &Corpus) {
        assert!(
            self.matches(corpus),
            "index built from corpus {} used with corpus {}",
            self.fingerprint,
            corpus.fingerprint()
        );
    }
}
