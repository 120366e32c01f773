//! SLA breach risk scoring.
//!
//! ```text
//! time_factor       = 1 − clamp(due − now, 0, horizon) / horizon
//! complexity_factor = complexity / 10
//! risk              = 0.7 × time_factor + 0.3 × complexity_factor
//! ```
//!
//! Only open tickets with a due date are scored; everything else is left
//! out of the ranking rather than scored as zero.
//!
//! Complexity comes from an external estimator and can be expensive to
//! obtain, so [`RiskRanker`] visits candidates most-urgent first and stops
//! asking once no remaining ticket can reach the top `n`. The best a ticket
//! can score is `0.7 × time_factor + 0.3`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Corpus, Ticket};

pub const TIME_WEIGHT: f64 = 0.7;
pub const COMPLEXITY_WEIGHT: f64 = 0.3;
pub const MAX_COMPLEXITY: u8 = 10;
pub const DEFAULT_TOP_N: usize = 8;
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy)]
pub struct SlaParams {
    pub top_n: usize,
    pub horizon: Duration,
}

impl Default for SlaParams {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            horizon: Duration::days(DEFAULT_HORIZON_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaRiskEntry {
    pub ticket_id: String,
    pub risk_score: f64,
    /// `"2d 3h"`, `"5h 12m"`, `"42m"`; prefixed with `-` when overdue.
    pub remaining: String,
    pub time_factor: f64,
    pub complexity: u8,
    pub due_at: DateTime<Utc>,
    pub category: String,
    pub priority: String,
}

/// Urgency in `[0, 1]`: 1 when due now or overdue, 0 when due a full
/// horizon or more away.
pub fn time_factor(due: DateTime<Utc>, now: DateTime<Utc>, horizon: Duration) -> f64 {
    let horizon_secs = horizon.num_seconds().max(1) as f64;
    let remaining = (due - now).num_seconds() as f64;
    1.0 - remaining.clamp(0.0, horizon_secs) / horizon_secs
}

/// Combined risk in `[0, 1]`. Complexity above 10 is clamped.
pub fn risk_score(time_factor: f64, complexity: u8) -> f64 {
    let complexity_factor = complexity.min(MAX_COMPLEXITY) as f64 / MAX_COMPLEXITY as f64;
    let score = TIME_WEIGHT * time_factor.clamp(0.0, 1.0) + COMPLEXITY_WEIGHT * complexity_factor;
    score.clamp(0.0, 1.0)
}

/// Highest risk a ticket with this time factor can reach.
pub fn risk_upper_bound(time_factor: f64) -> f64 {
    risk_score(time_factor, MAX_COMPLEXITY)
}

/// Format the distance between `due` and `now` using its two coarsest units.
pub fn format_remaining(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = due - now;
    let minutes = diff.num_minutes().abs();
    let days = minutes / (24 * 60);
    let hours = (minutes % (24 * 60)) / 60;
    let mins = minutes % 60;

    let body = if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    };

    if diff < Duration::zero() && minutes > 0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Open tickets with a due date.
pub fn eligible(corpus: &Corpus) -> impl Iterator<Item = &Ticket> {
    corpus
        .tickets()
        .iter()
        .filter(|t| t.is_open() && t.due_at.is_some())
}

/// Incremental top-`n` selection over eligible tickets.
///
/// Feed tickets from [`RiskRanker::candidates`] in order. Before fetching a
/// ticket's complexity, ask [`RiskRanker::is_settled`]; once it returns
/// `true` no later candidate can enter the result and the loop can stop.
pub struct RiskRanker {
    now: DateTime<Utc>,
    params: SlaParams,
    entries: Vec<SlaRiskEntry>,
}

/// An eligible ticket and its time factor.
#[derive(Debug, Clone, Copy)]
pub struct RiskCandidate<'a> {
    pub ticket: &'a Ticket,
    pub due_at: DateTime<Utc>,
    pub time_factor: f64,
}

impl RiskRanker {
    pub fn new(now: DateTime<Utc>, params: SlaParams) -> Self {
        Self {
            now,
            params,
            entries: Vec::new(),
        }
    }

    /// Eligible tickets, most urgent first; ties keep corpus order.
    pub fn candidates<'a>(&self, corpus: &'a Corpus) -> Vec<RiskCandidate<'a>> {
        let mut out: Vec<RiskCandidate<'a>> = eligible(corpus)
            .filter_map(|ticket| {
                let due_at = ticket.due_at?;
                Some(RiskCandidate {
                    ticket,
                    due_at,
                    time_factor: time_factor(due_at, self.now, self.params.horizon),
                })
            })
            .collect();
        out.sort_by(|a, b| {
            b.time_factor
                .partial_cmp(&a.time_factor)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// `true` once the current top `n` cannot be displaced by `next`.
    pub fn is_settled(&self, next: &RiskCandidate<'_>) -> bool {
        if self.entries.len() < self.params.top_n {
            return false;
        }
        let mut scores: Vec<f64> = self.entries.iter().map(|e| e.risk_score).collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        scores[self.params.top_n - 1] >= risk_upper_bound(next.time_factor)
    }

    pub fn push(&mut self, candidate: &RiskCandidate<'_>, complexity: u8) {
        let complexity = complexity.min(MAX_COMPLEXITY);
        self.entries.push(SlaRiskEntry {
            ticket_id: candidate.ticket.id.clone(),
            risk_score: risk_score(candidate.time_factor, complexity),
            remaining: format_remaining(candidate.due_at, self.now),
            time_factor: candidate.time_factor,
            complexity,
            due_at: candidate.due_at,
            category: candidate.ticket.category.clone(),
            priority: candidate.ticket.priority.clone(),
        });
    }

    /// The top `n` entries by risk, highest first.
    pub fn finish(mut self) -> Vec<SlaRiskEntry> {
        self.entries.sort_by(|a, b| {
            b.risk_score
                .partial_cmp(&a.risk_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.entries.truncate(self.params.top_n);
        self.entries
    }
}

/// Rank SLA risks with a synchronous complexity source.
pub fn rank_risks(
    corpus: &Corpus,
    now: DateTime<Utc>,
    params: SlaParams,
    mut complexity: impl FnMut(&Ticket) -> u8,
) -> Vec<SlaRiskEntry> {
    let mut ranker = RiskRanker::new(now, params);
    for candidate in ranker.candidates(corpus) {
        if ranker.is_settled(&candidate) {
            break;
        }
        let c = complexity(candidate.ticket);
        ranker.push(&candidate, c);
    }
    ranker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn week() -> Duration {
        Duration::days(7)
    }

    #[test]
    fn test_due_now_max_complexity_is_one() {
        let tf = time_factor(now(), now(), week());
        assert_eq!(tf, 1.0);
        assert!((risk_score(tf, 10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_far_future_zero_complexity_is_zero() {
        let tf = time_factor(now() + Duration::days(14), now(), week());
        assert_eq!(tf, 0.0);
        assert_eq!(risk_score(tf, 0), 0.0);
    }

    #[test]
    fn test_overdue_saturates() {
        assert_eq!(time_factor(now() - Duration::days(3), now(), week()), 1.0);
    }

    #[test]
    fn test_halfway() {
        let tf = time_factor(now() + Duration::hours(84), now(), week());
        assert!((tf - 0.5).abs() < 1e-12);
        assert!((risk_score(tf, 5) - (0.35 + 0.15)).abs() < 1e-12);
    }

    #[test]
    fn test_risk_always_bounded() {
        for hours in [-500i64, -1, 0, 1, 24, 100, 168, 169, 10_000] {
            for complexity in [0u8, 3, 10, 200] {
                let tf = time_factor(now() + Duration::hours(hours), now(), week());
                let r = risk_score(tf, complexity);
                assert!((0.0..=1.0).contains(&r), "risk {} for {}h/{}", r, hours, complexity);
            }
        }
    }

    #[test]
    fn test_format_remaining() {
        let n = now();
        assert_eq!(format_remaining(n + Duration::hours(51), n), "2d 3h");
        assert_eq!(format_remaining(n + Duration::minutes(5 * 60 + 12), n), "5h 12m");
        assert_eq!(format_remaining(n + Duration::minutes(42), n), "42m");
        assert_eq!(format_remaining(n - Duration::minutes(42), n), "-42m");
        assert_eq!(format_remaining(n - Duration::hours(26), n), "-1d 2h");
        assert_eq!(format_remaining(n, n), "0m");
    }

    fn open(id: &str, due_in_hours: i64) -> Ticket {
        Ticket::new(id, "x", "Network", "High").with_due(now() + Duration::hours(due_in_hours))
    }

    #[test]
    fn test_ineligible_tickets_excluded() {
        let corpus = Corpus::new(vec![
            open("due", 10),
            Ticket::new("no-due", "x", "Network", "High"),
            open("closed", 1).with_status("Closed"),
        ]);
        let ranked = rank_risks(&corpus, now(), SlaParams::default(), |_| 5);
        let ids: Vec<&str> = ranked.iter().map(|e| e.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["due"]);
    }

    #[test]
    fn test_top_n_and_ordering() {
        let tickets: Vec<Ticket> = (0..20).map(|i| open(&format!("t{}", i), i * 8)).collect();
        let corpus = Corpus::new(tickets);
        let ranked = rank_risks(&corpus, now(), SlaParams::default(), |_| 0);
        assert_eq!(ranked.len(), 8);
        assert_eq!(ranked[0].ticket_id, "t0");
        for pair in ranked.windows(2) {
            assert!(pair[0].risk_score >= pair[1].risk_score);
        }
    }

    #[test]
    fn test_pruned_ranking_matches_exhaustive() {
        let complexity = |t: &Ticket| -> u8 {
            let n: u8 = t.id.trim_start_matches('t').parse().unwrap();
            (n * 7) % 11
        };
        let tickets: Vec<Ticket> = (0..30u8)
            .map(|i| open(&format!("t{}", i), (i as i64 * 13) % 200 - 20))
            .collect();
        let corpus = Corpus::new(tickets);

        let mut calls = 0;
        let pruned = rank_risks(&corpus, now(), SlaParams::default(), |t| {
            calls += 1;
            complexity(t)
        });

        let mut exhaustive = RiskRanker::new(now(), SlaParams::default());
        for c in exhaustive.candidates(&corpus) {
            exhaustive.push(&c, complexity(c.ticket));
        }
        let exhaustive = exhaustive.finish();

        assert_eq!(pruned, exhaustive);
        assert!(calls < 30, "expected pruning, made {} calls", calls);
    }
}
