//! Hold-out evaluation of the similarity model.
//!
//! The corpus is shuffled and split into a training partition
//! (`floor(N × train_ratio)` tickets) and a held-out partition (the rest).
//! An index is built on the training partition only; every held-out
//! ticket's description is then used as a query and the top match's
//! category and priority are taken as the prediction.
//!
//! ```text
//! overall = 0.6 × category_accuracy + 0.4 × priority_accuracy
//! ```
//!
//! Shuffling uses the caller's random source. Pass a seeded RNG for
//! reproducible reports; an entropy-seeded one gives a fresh split on
//! every training cycle.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::index::TrainedIndex;
use crate::models::{Corpus, EmptyReason, Outcome, Ticket, DEFAULT_PRIORITY, UNCATEGORIZED};
use crate::similarity;

/// Corpora smaller than this are not evaluated.
pub const MIN_EVAL_TICKETS: usize = 10;
pub const TRAIN_RATIO: f64 = 0.8;
pub const CATEGORY_WEIGHT: f64 = 0.6;
pub const PRIORITY_WEIGHT: f64 = 0.4;
/// Categories above this accuracy are called out as strong.
pub const STRONG_THRESHOLD: f64 = 0.85;
/// Categories below this accuracy are called out as weak.
pub const WEAK_THRESHOLD: f64 = 0.60;

#[derive(Debug, Clone, Copy)]
pub struct EvalParams {
    pub min_tickets: usize,
    pub train_ratio: f64,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            min_tickets: MIN_EVAL_TICKETS,
            train_ratio: TRAIN_RATIO,
        }
    }
}

/// Accuracy of the model on one held-out split. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub category_accuracy: f64,
    pub priority_accuracy: f64,
    pub overall_score: f64,
    pub notes: Vec<String>,
    pub train_size: usize,
    pub test_size: usize,
    pub per_category: Vec<CategoryAccuracy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAccuracy {
    pub category: String,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

/// `(train, test)` partition sizes for a corpus of `n` tickets.
///
/// Both partitions are non-empty whenever `n >= 2`.
pub fn split_sizes(n: usize, train_ratio: f64) -> (usize, usize) {
    if n < 2 {
        return (n, 0);
    }
    let train = ((n as f64 * train_ratio) + 1e-9).floor() as usize;
    let train = train.clamp(1, n - 1);
    (train, n - train)
}

/// Shuffle `corpus` and split it into training and held-out tickets.
pub fn split<R: Rng + ?Sized>(
    corpus: &Corpus,
    train_ratio: f64,
    rng: &mut R,
) -> (Vec<Ticket>, Vec<Ticket>) {
    let mut shuffled: Vec<Ticket> = corpus.tickets().to_vec();
    shuffled.shuffle(rng);
    let (train_len, _) = split_sizes(shuffled.len(), train_ratio);
    let test = shuffled.split_off(train_len);
    (shuffled, test)
}

/// Evaluate the model on a random hold-out split of `corpus`.
///
/// Returns [`EmptyReason::InsufficientData`] when the corpus has fewer than
/// `params.min_tickets` tickets.
pub fn evaluate<R: Rng + ?Sized>(
    corpus: &Corpus,
    params: &EvalParams,
    rng: &mut R,
) -> Outcome<AccuracyReport> {
    if corpus.len() < params.min_tickets.max(2) {
        return Outcome::empty(EmptyReason::InsufficientData);
    }

    let (train, test) = split(corpus, params.train_ratio, rng);
    let train = Corpus::new(train);
    let trained = TrainedIndex::build(&train);

    let mut category_correct = 0usize;
    let mut priority_correct = 0usize;
    let mut per_category: Vec<CategoryAccuracy> = Vec::new();

    for ticket in &test {
        let results = similarity::score(&ticket.description, &train, Some(&trained));
        let (category, priority) = match results.first() {
            Some(top) => (top.ticket.category.as_str(), top.ticket.priority.as_str()),
            None => (UNCATEGORIZED, DEFAULT_PRIORITY),
        };

        let category_hit = category == ticket.category;
        if category_hit {
            category_correct += 1;
        }
        if priority == ticket.priority {
            priority_correct += 1;
        }

        let idx = match per_category
            .iter()
            .position(|c| c.category == ticket.category)
        {
            Some(i) => i,
            None => {
                per_category.push(CategoryAccuracy {
                    category: ticket.category.clone(),
                    correct: 0,
                    total: 0,
                    accuracy: 0.0,
                });
                per_category.len() - 1
            }
        };
        let entry = &mut per_category[idx];
        entry.total += 1;
        if category_hit {
            entry.correct += 1;
        }
    }

    for c in &mut per_category {
        c.accuracy = c.correct as f64 / c.total as f64;
    }

    let total = test.len() as f64;
    let category_accuracy = category_correct as f64 / total;
    let priority_accuracy = priority_correct as f64 / total;

    Outcome::ready(AccuracyReport {
        category_accuracy,
        priority_accuracy,
        overall_score: CATEGORY_WEIGHT * category_accuracy + PRIORITY_WEIGHT * priority_accuracy,
        notes: accuracy_notes(&per_category),
        train_size: train.len(),
        test_size: test.len(),
        per_category,
    })
}

fn accuracy_notes(per_category: &[CategoryAccuracy]) -> Vec<String> {
    let strong: Vec<&str> = per_category
        .iter()
        .filter(|c| c.accuracy > STRONG_THRESHOLD)
        .map(|c| c.category.as_str())
        .collect();
    let weak: Vec<&str> = per_category
        .iter()
        .filter(|c| c.accuracy < WEAK_THRESHOLD)
        .map(|c| c.category.as_str())
        .collect();

    let mut notes = Vec::new();
    if !strong.is_empty() {
        notes.push(format!("Strong performance in: {}.", strong.join(", ")));
    }
    if !weak.is_empty() {
        notes.push(format!("Needs improvement in: {}.", weak.join(", ")));
    }
    notes
}
