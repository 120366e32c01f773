//! Query-to-ticket similarity scoring.
//!
//! The scorer ranks tickets in a [`Corpus`] against a free-text query. It
//! runs in one of two modes:
//!
//! * **Trained**: a [`TrainedIndex`] for the same corpus is supplied. The
//!   inverted index prunes candidates and the IDF table weights terms.
//!   Tickets whose category the query names are always candidates, since
//!   the category name alone can earn points without any posting.
//! * **Bootstrap**: no index yet. Terms are scored by whole-word or
//!   substring presence.
//!
//! # Scoring
//!
//! | Signal | Points |
//! |--------|--------|
//! | trained term match | `(1 + ln tf) × idf(term)` |
//! | bootstrap whole-word match | 15 |
//! | bootstrap substring match | 5 |
//! | adjacent query bigram, verbatim in lowercased description | 30 each |
//! | category shares a query term | 40 |
//! | query names the ticket's category | 50 (stacks with the 40) |
//!
//! Every query token counts, so a repeated query word scores once per
//! occurrence. Tickets scoring `<= 0` are dropped. Results are sorted by score
//! descending; ties keep corpus order.
//!
//! The weights are fixed heuristics, not calibrated probabilities. An
//! explicit category mention can outrank a much stronger text match.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::index::TrainedIndex;
use crate::models::{Corpus, Ticket};
use crate::tokenize::tokenize;

pub const WHOLE_WORD_POINTS: f64 = 15.0;
pub const SUBSTRING_POINTS: f64 = 5.0;
pub const PHRASE_POINTS: f64 = 30.0;
pub const CATEGORY_TERM_POINTS: f64 = 40.0;
pub const CATEGORY_NAME_POINTS: f64 = 50.0;

/// A ticket with its score for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTicket<'a> {
    pub ticket: &'a Ticket,
    /// Position of the ticket within the scored corpus.
    pub position: usize,
    pub score: f64,
    pub explain: ScoreExplanation,
}

/// Per-signal breakdown of a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreExplanation {
    /// Term score: TF-IDF in trained mode, presence points in bootstrap mode.
    pub term_score: f64,
    pub phrase_bonus: f64,
    pub category_bonus: f64,
    /// `true` if an IDF table was used.
    pub trained: bool,
}

/// Rank `corpus` against `query`.
///
/// # Panics
///
/// If `trained` was built from a different corpus snapshot.
pub fn score<'a>(
    query: &str,
    corpus: &'a Corpus,
    trained: Option<&TrainedIndex>,
) -> Vec<ScoredTicket<'a>> {
    let terms = tokenize(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let context = QueryContext::new(query, &terms, corpus);

    let positions: Vec<usize> = match trained {
        Some(t) => {
            t.assert_matches(corpus);
            let candidates = context.candidates(corpus, t);
            if !candidates.is_empty() && candidates.len() < corpus.len() {
                candidates
            } else {
                (0..corpus.len()).collect()
            }
        }
        None => (0..corpus.len()).collect(),
    };

    rank_positions(&context, corpus, trained, &positions)
}

/// Score the tickets at `positions` (ascending) and return the ranking.
fn rank_positions<'a>(
    query: &QueryContext<'_>,
    corpus: &'a Corpus,
    trained: Option<&TrainedIndex>,
    positions: &[usize],
) -> Vec<ScoredTicket<'a>> {
    let tickets = corpus.tickets();

    let mut results: Vec<ScoredTicket<'a>> = positions
        .iter()
        .filter_map(|&pos| {
            let ticket = &tickets[pos];
            let explain = query.explain(ticket, trained);
            let total = explain.term_score + explain.phrase_bonus + explain.category_bonus;
            (total > 0.0).then_some(ScoredTicket {
                ticket,
                position: pos,
                score: total,
                explain,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// Query-side state computed once and reused for every candidate.
struct QueryContext<'q> {
    /// Query tokens in order, duplicates kept.
    terms: &'q [String],
    term_set: HashSet<&'q str>,
    bigrams: Vec<String>,
    /// Lowercased names of corpus categories the query mentions.
    named_categories: HashSet<String>,
}

impl<'q> QueryContext<'q> {
    fn new(query: &str, terms: &'q [String], corpus: &Corpus) -> Self {
        let term_set = terms.iter().map(String::as_str).collect();
        let bigrams = terms
            .windows(2)
            .map(|w| format!("{} {}", w[0], w[1]))
            .collect();

        let query_lower = query.to_lowercase();
        let named_categories = corpus
            .categories()
            .into_iter()
            .map(|c| c.to_lowercase())
            .filter(|c| !c.trim().is_empty() && query_lower.contains(c.as_str()))
            .collect();

        Self {
            terms,
            term_set,
            bigrams,
            named_categories,
        }
    }

    /// Postings of every query term plus the tickets of named categories,
    /// in ascending position order.
    fn candidates(&self, corpus: &Corpus, trained: &TrainedIndex) -> Vec<usize> {
        let mut positions = trained.index.candidates(self.terms);
        if !self.named_categories.is_empty() {
            positions.extend(
                corpus
                    .tickets()
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| self.named_categories.contains(&t.category.to_lowercase()))
                    .map(|(pos, _)| pos),
            );
            positions.sort_unstable();
            positions.dedup();
        }
        positions
    }

    fn explain(&self, ticket: &Ticket, trained: Option<&TrainedIndex>) -> ScoreExplanation {
        let term_score = match trained {
            Some(t) => self.tfidf_score(ticket, t),
            None => self.presence_score(ticket),
        };

        let lower = ticket.description.to_lowercase();
        let phrase_bonus = self
            .bigrams
            .iter()
            .filter(|b| lower.contains(b.as_str()))
            .count() as f64
            * PHRASE_POINTS;

        let mut category_bonus = 0.0;
        if tokenize(&ticket.category)
            .iter()
            .any(|t| self.term_set.contains(t.as_str()))
        {
            category_bonus += CATEGORY_TERM_POINTS;
        }
        if self
            .named_categories
            .contains(&ticket.category.to_lowercase())
        {
            category_bonus += CATEGORY_NAME_POINTS;
        }

        ScoreExplanation {
            term_score,
            phrase_bonus,
            category_bonus,
            trained: trained.is_some(),
        }
    }

    fn tfidf_score(&self, ticket: &Ticket, trained: &TrainedIndex) -> f64 {
        let mut tf: HashMap<String, usize> = HashMap::new();
        for term in tokenize(&ticket.description) {
            *tf.entry(term).or_insert(0) += 1;
        }
        self.terms
            .iter()
            .filter_map(|term| {
                let count = *tf.get(term)?;
                (count > 0).then(|| (1.0 + (count as f64).ln()) * trained.idf.weight(term))
            })
            .sum()
    }

    fn presence_score(&self, ticket: &Ticket) -> f64 {
        let lower = ticket.description.to_lowercase();
        let words: HashSet<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.terms
            .iter()
            .map(|term| {
                if words.contains(term.as_str()) {
                    WHOLE_WORD_POINTS
                } else if lower.contains(term.as_str()) {
                    SUBSTRING_POINTS
                } else {
                    0.0
                }
            })
            .sum()
    }
}
