//! Reporting aggregates: root causes, the category × priority heatmap, and
//! per-cause keyword extraction.
//!
//! # Root-cause classification
//!
//! A fixed, ordered table maps category names to characteristic keywords.
//! Only entries whose category exists in the corpus take part. Each ticket
//! is claimed by the first participating entry with a keyword in its
//! description (whole words, after normalization). Unclaimed tickets fall
//! back to their own category, or to [`OTHER_CAUSE`] when that category is
//! [`UNCATEGORIZED`].

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::models::{Corpus, UNCATEGORIZED};
use crate::tokenize::{is_wordcloud_stop_word, normalize_spaced, tokenize_with};

/// Bucket for tickets no rule or category claims.
pub const OTHER_CAUSE: &str = "Other";
/// Descriptions sampled per root cause for keyword extraction.
pub const KEYWORD_SAMPLE_SIZE: usize = 50;
/// Terms kept per root cause.
pub const KEYWORD_TOP_TERMS: usize = 30;

/// Ordered root-cause table. Earlier entries win ties.
pub const ROOT_CAUSE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Network",
        &[
            "network", "vpn", "wifi", "wireless", "internet", "dns", "dhcp", "firewall",
            "proxy", "ethernet", "latency", "packet loss", "connection",
        ],
    ),
    (
        "Security",
        &[
            "virus", "malware", "phishing", "ransomware", "breach", "suspicious", "security",
            "certificate", "antivirus",
        ],
    ),
    (
        "Account",
        &[
            "password", "login", "locked", "account", "mfa", "2fa", "sso", "permission",
            "credentials", "authentication",
        ],
    ),
    (
        "Email",
        &[
            "email", "mailbox", "outlook", "inbox", "calendar", "smtp", "spam", "attachment",
        ],
    ),
    (
        "Hardware",
        &[
            "printer", "laptop", "monitor", "keyboard", "mouse", "battery", "screen", "dock",
            "headset", "scanner", "hardware",
        ],
    ),
    (
        "Software",
        &[
            "install", "installation", "update", "crash", "crashes", "license", "application",
            "software", "excel", "teams", "browser", "bug",
        ],
    ),
    (
        "Database",
        &["database", "sql", "query", "table", "backup", "replication", "deadlock"],
    ),
    (
        "Performance",
        &["slow", "performance", "freeze", "freezes", "lag", "memory", "cpu", "timeout"],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootCauseAggregate {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub category: String,
    pub priority: String,
    pub count: usize,
}

/// A complete category × priority grid.
///
/// `cells` is row-major: every priority for the first category, then the
/// next category. It always holds `categories.len() × priorities.len()`
/// cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub categories: Vec<String>,
    pub priorities: Vec<String>,
    pub cells: Vec<HeatmapCell>,
}

impl Heatmap {
    pub fn count(&self, category: &str, priority: &str) -> Option<usize> {
        self.cells
            .iter()
            .find(|c| c.category == category && c.priority == priority)
            .map(|c| c.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub term: String,
    pub count: usize,
}

/// Classifies tickets against the root-cause rules active for one corpus.
pub struct RootCauseClassifier<'a> {
    /// (corpus spelling of the category, keywords) in table order.
    rules: Vec<(String, &'static [&'static str])>,
    known: &'a [String],
}

impl<'a> RootCauseClassifier<'a> {
    /// Build the rule set for a corpus whose distinct categories are `known`.
    pub fn new(known: &'a [String]) -> Self {
        let rules = ROOT_CAUSE_KEYWORDS
            .iter()
            .filter_map(|(name, keywords)| {
                known
                    .iter()
                    .find(|k| k.eq_ignore_ascii_case(name))
                    .map(|k| (k.clone(), *keywords))
            })
            .collect();
        Self { rules, known }
    }

    /// Root cause for one ticket description and its recorded category.
    pub fn classify(&self, description: &str, category: &str) -> String {
        let padded = format!(" {} ", normalize_spaced(description));
        for (name, keywords) in &self.rules {
            if keywords
                .iter()
                .any(|kw| padded.contains(&format!(" {} ", kw)))
            {
                return name.clone();
            }
        }

        let known = self.known.iter().any(|k| k == category);
        if known && !category.eq_ignore_ascii_case(UNCATEGORIZED) {
            category.to_string()
        } else {
            OTHER_CAUSE.to_string()
        }
    }

    /// Number of table entries active for this corpus.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Root cause of every ticket, in corpus order.
pub fn assign_root_causes(corpus: &Corpus) -> Vec<String> {
    let known = corpus.categories();
    let classifier = RootCauseClassifier::new(&known);
    corpus
        .tickets()
        .iter()
        .map(|t| classifier.classify(&t.description, &t.category))
        .collect()
}

/// Ticket counts per root cause, largest first; ties keep first appearance.
pub fn root_causes(corpus: &Corpus) -> Vec<RootCauseAggregate> {
    count_root_causes(&assign_root_causes(corpus))
}

/// Ticket counts per root cause from precomputed assignments.
pub fn count_root_causes(assignments: &[String]) -> Vec<RootCauseAggregate> {
    let mut out: Vec<RootCauseAggregate> = Vec::new();
    for cause in assignments {
        match out.iter_mut().find(|a| &a.name == cause) {
            Some(a) => a.count += 1,
            None => out.push(RootCauseAggregate {
                name: cause.clone(),
                count: 1,
            }),
        }
    }
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// Category × priority counts over the whole corpus, zeros included.
pub fn heatmap(corpus: &Corpus) -> Heatmap {
    let categories = corpus.categories();
    let priorities = corpus.priorities();

    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for t in corpus.tickets() {
        *counts
            .entry((t.category.as_str(), t.priority.as_str()))
            .or_insert(0) += 1;
    }

    let mut cells = Vec::with_capacity(categories.len() * priorities.len());
    for c in &categories {
        for p in &priorities {
            cells.push(HeatmapCell {
                category: c.clone(),
                priority: p.clone(),
                count: counts.get(&(c.as_str(), p.as_str())).copied().unwrap_or(0),
            });
        }
    }

    Heatmap {
        categories,
        priorities,
        cells,
    }
}

/// Random sample of up to `limit` descriptions assigned to `cause`.
pub fn sample_descriptions<'a, R: Rng + ?Sized>(
    corpus: &'a Corpus,
    assignments: &[String],
    cause: &str,
    limit: usize,
    rng: &mut R,
) -> Vec<&'a str> {
    let pool: Vec<&str> = corpus
        .tickets()
        .iter()
        .zip(assignments)
        .filter(|(_, c)| c.as_str() == cause)
        .map(|(t, _)| t.description.as_str())
        .collect();
    pool.choose_multiple(rng, limit).copied().collect()
}

/// Most frequent terms across `descriptions`, highest count first, ties
/// alphabetical.
pub fn extract_keywords<S: AsRef<str>>(descriptions: &[S], top: usize) -> Vec<KeywordCount> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for d in descriptions {
        for term in tokenize_with(d.as_ref(), is_wordcloud_stop_word) {
            *freq.entry(term).or_insert(0) += 1;
        }
    }
    let mut terms: Vec<KeywordCount> = freq
        .into_iter()
        .map(|(term, count)| KeywordCount { term, count })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(top);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ticket;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corpus() -> Corpus {
        Corpus::new(vec![
            Ticket::new("1", "VPN drops every hour", "Network", "p1"),
            Ticket::new("2", "Printer shows offline", "Hardware", "p2"),
            Ticket::new("3", "Laptop cannot join the wifi", "Hardware", "p1"),
            Ticket::new("4", "Forgot my password", "Hardware", "p2"),
            Ticket::new("5", "Something odd happened", "Uncategorized", "p2"),
            Ticket::new("6", "Desk is wobbly", "Facilities", "p1"),
        ])
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let causes = assign_root_causes(&corpus());
        // Ticket 3 mentions both laptop and wifi; Network is earlier in the table.
        assert_eq!(causes[2], "Network");
        assert_eq!(causes[1], "Hardware");
    }

    #[test]
    fn test_absent_categories_contribute_no_rules() {
        let causes = assign_root_causes(&corpus());
        // "password" is an Account keyword, but Account is not in this corpus.
        assert_eq!(causes[3], "Hardware");
    }

    #[test]
    fn test_fallbacks() {
        let causes = assign_root_causes(&corpus());
        assert_eq!(causes[4], OTHER_CAUSE);
        assert_eq!(causes[5], "Facilities");
    }

    #[test]
    fn test_rules_use_corpus_spelling() {
        let corpus = Corpus::new(vec![Ticket::new("1", "dns lookup fails", "NETWORK", "Low")]);
        assert_eq!(root_causes(&corpus)[0].name, "NETWORK");
    }

    #[test]
    fn test_keywords_match_whole_words() {
        let known = vec!["Software".to_string()];
        let classifier = RootCauseClassifier::new(&known);
        assert_eq!(classifier.rule_count(), 1);
        // "bug" must not match inside "debugging".
        assert_eq!(classifier.classify("debugging session", "Misc"), OTHER_CAUSE);
        assert_eq!(classifier.classify("found a bug!", "Misc"), "Software");
    }

    #[test]
    fn test_root_causes_sorted_by_count() {
        let aggregates = root_causes(&corpus());
        assert_eq!(
            aggregates,
            vec![
                RootCauseAggregate { name: "Network".into(), count: 2 },
                RootCauseAggregate { name: "Hardware".into(), count: 2 },
                RootCauseAggregate { name: OTHER_CAUSE.into(), count: 1 },
                RootCauseAggregate { name: "Facilities".into(), count: 1 },
            ]
        );
        let total: usize = aggregates.iter().map(|a| a.count).sum();
        assert_eq!(total, corpus().len());
    }

    #[test]
    fn test_heatmap_is_complete() {
        let corpus = Corpus::new(vec![
            Ticket::new("1", "a", "Network", "p1"),
            Ticket::new("2", "b", "Network", "p1"),
            Ticket::new("3", "c", "Hardware", "p2"),
        ]);
        let map = heatmap(&corpus);
        assert_eq!(map.cells.len(), 4);
        assert_eq!(map.count("Network", "p1"), Some(2));
        assert_eq!(map.count("Network", "p2"), Some(0));
        assert_eq!(map.count("Hardware", "p1"), Some(0));
        assert_eq!(map.count("Hardware", "p2"), Some(1));
    }

    #[test]
    fn test_aggregates_idempotent() {
        let c = corpus();
        assert_eq!(root_causes(&c), root_causes(&c));
        assert_eq!(heatmap(&c), heatmap(&c));
    }

    #[test]
    fn test_sample_limits_and_filters() {
        let c = corpus();
        let assignments = assign_root_causes(&c);
        let mut rng = StdRng::seed_from_u64(5);
        let sample = sample_descriptions(&c, &assignments, "Network", 50, &mut rng);
        assert_eq!(sample.len(), 2);
        let sample = sample_descriptions(&c, &assignments, "Network", 1, &mut rng);
        assert_eq!(sample.len(), 1);
        assert!(sample_descriptions(&c, &assignments, "Nope", 50, &mut rng).is_empty());
    }

    #[test]
    fn test_extract_keywords_ranking() {
        let descriptions = [
            "printer jam again",
            "printer toner empty",
            "toner smudges on printer output",
        ];
        let keywords = extract_keywords(&descriptions, 2);
        assert_eq!(
            keywords,
            vec![
                KeywordCount { term: "printer".into(), count: 3 },
                KeywordCount { term: "toner".into(), count: 2 },
            ]
        );
    }
}
