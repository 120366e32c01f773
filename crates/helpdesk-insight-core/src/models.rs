//! Core data models used throughout Helpdesk Insight.
//!
//! These types represent the tickets and corpus snapshots that flow through
//! the training and query pipeline, plus the [`Outcome`] wrapper used by
//! every read model to distinguish "empty for a reason" from failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category assigned when an upload row carries none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Priority assigned when an upload row carries none.
pub const DEFAULT_PRIORITY: &str = "Medium";

/// Statuses (lowercased) that take a ticket out of SLA tracking.
const CLOSED_STATUSES: &[&str] = &["closed", "resolved", "cancelled", "canceled", "done"];

/// One support request.
///
/// `description` is never empty for a ticket that made it into a
/// [`Corpus`]; ingestion rejects rows without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a ticket with the four required fields and nothing else.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category: category.into(),
            priority: priority.into(),
            solution: None,
            technician: None,
            status: None,
            created_at: None,
            due_at: None,
            responded_at: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    /// A ticket without a status is treated as newly opened.
    pub fn is_open(&self) -> bool {
        match &self.status {
            None => true,
            Some(s) => {
                let s = s.trim().to_lowercase();
                !CLOSED_STATUSES.contains(&s.as_str())
            }
        }
    }
}

/// An immutable, ordered snapshot of the ticket knowledge base.
///
/// The fingerprint identifies the snapshot's content. Structures derived
/// from a corpus (see [`crate::index::TrainedIndex`]) record it so they can
/// never be paired with a different snapshot.
#[derive(Debug, Clone)]
pub struct Corpus {
    tickets: Vec<Ticket>,
    fingerprint: String,
}

impl Corpus {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        let mut hasher = Sha256::new();
        for t in &tickets {
            hasher.update(t.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(t.description.as_bytes());
            hasher.update([0u8]);
            hasher.update(t.category.as_bytes());
            hasher.update([0u8]);
            hasher.update(t.priority.as_bytes());
            hasher.update([0xffu8]);
        }
        let fingerprint = format!("{:x}", hasher.finalize());
        Self {
            tickets,
            fingerprint,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn find(&self, id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    /// Distinct category labels in first-appearance order.
    pub fn categories(&self) -> Vec<String> {
        distinct(self.tickets.iter().map(|t| t.category.as_str()))
    }

    /// Distinct priority labels in first-appearance order.
    pub fn priorities(&self) -> Vec<String> {
        distinct(self.tickets.iter().map(|t| t.priority.as_str()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|o| o == v) {
            out.push(v.to_string());
        }
    }
    out
}

/// Why a read model has nothing to show.
///
/// These are data-quality conditions, not errors: callers render an empty
/// state for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// No training cycle has completed yet.
    NotTrained,
    /// The corpus is too small to evaluate.
    InsufficientData,
    /// Classification produced no root causes.
    NoRootCauses,
    /// No open ticket has a usable due date.
    NoEligibleTickets,
    /// The requested root cause does not exist in this snapshot.
    UnknownRootCause,
}

impl EmptyReason {
    pub fn code(&self) -> &'static str {
        match self {
            EmptyReason::NotTrained => "not_trained",
            EmptyReason::InsufficientData => "insufficient_data",
            EmptyReason::NoRootCauses => "no_root_causes",
            EmptyReason::NoEligibleTickets => "no_eligible_tickets",
            EmptyReason::UnknownRootCause => "unknown_root_cause",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            EmptyReason::NotTrained => "no training cycle has completed",
            EmptyReason::InsufficientData => "not enough tickets to evaluate the model",
            EmptyReason::NoRootCauses => "no root causes found",
            EmptyReason::NoEligibleTickets => "no open tickets with a due date",
            EmptyReason::UnknownRootCause => "root cause not present in the current corpus",
        }
    }
}

/// A read-model value, or the reason it is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ready { value: T },
    Empty { reason: EmptyReason },
}

impl<T> Outcome<T> {
    pub fn ready(value: T) -> Self {
        Outcome::Ready { value }
    }

    pub fn empty(reason: EmptyReason) -> Self {
        Outcome::Empty { reason }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Ready { value } => Some(value),
            Outcome::Empty { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<EmptyReason> {
        match self {
            Outcome::Ready { .. } => None,
            Outcome::Empty { reason } => Some(*reason),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Ready { value } => Some(value),
            Outcome::Empty { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_statuses() {
        let t = Ticket::new("1", "desk phone dead", "Hardware", "Low");
        assert!(t.is_open());
        assert!(t.clone().with_status("In Progress").is_open());
        assert!(!t.clone().with_status(" Resolved ").is_open());
        assert!(!t.with_status("CLOSED").is_open());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Corpus::new(vec![Ticket::new("1", "vpn drops", "Network", "High")]);
        let b = Corpus::new(vec![Ticket::new("1", "vpn drops", "Network", "High")]);
        let c = Corpus::new(vec![Ticket::new("1", "vpn drops daily", "Network", "High")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), Corpus::empty().fingerprint());
    }

    #[test]
    fn test_distinct_labels_keep_first_appearance() {
        let corpus = Corpus::new(vec![
            Ticket::new("1", "a", "Network", "High"),
            Ticket::new("2", "b", "Hardware", "Low"),
            Ticket::new("3", "c", "Network", "Low"),
        ]);
        assert_eq!(corpus.categories(), vec!["Network", "Hardware"]);
        assert_eq!(corpus.priorities(), vec!["High", "Low"]);
    }

    #[test]
    fn test_outcome_serializes_with_reason_code() {
        let empty: Outcome<u32> = Outcome::empty(EmptyReason::InsufficientData);
        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["status"], "empty");
        assert_eq!(json["reason"], EmptyReason::InsufficientData.code());

        let ready = Outcome::ready(3u32);
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["value"], 3);
    }
}
