//! Training orchestrator.
//!
//! [`Engine`] owns the corpus lifecycle and is the only writer of shared
//! state. A training cycle runs:
//!
//! ```text
//! ingest → begin cycle → index → evaluate → aggregate → keywords → publish
//! ```
//!
//! Ingestion happens first so a rejected upload leaves the current snapshot
//! untouched. Beginning a cycle bumps the generation counter, swaps in an
//! empty snapshot and clears the complexity cache. The finished snapshot is
//! swapped in as one `Arc` only if no newer cycle has begun meanwhile.
//!
//! Readers take a clone of the current `Arc<Snapshot>` and keep a consistent
//! view for as long as they hold it.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use helpdesk_insight_core::aggregate::{
    self, assign_root_causes, count_root_causes, extract_keywords, sample_descriptions, Heatmap,
    KeywordCount, RootCauseAggregate,
};
use helpdesk_insight_core::evaluate::{evaluate, AccuracyReport};
use helpdesk_insight_core::index::TrainedIndex;
use helpdesk_insight_core::models::{Corpus, EmptyReason, Outcome, Ticket};
use helpdesk_insight_core::oracle::{SuggestionRequest, TextOracle};
use helpdesk_insight_core::similarity::{self, ScoreExplanation};
use helpdesk_insight_core::sla::{RiskRanker, SlaRiskEntry, MAX_COMPLEXITY};

use crate::config::Config;
use crate::ingest::{ingest_rows, IngestError, IngestReport, Row};
use crate::oracle::{create_oracle, suggest_with_retry, RETRY_BASE_DELAY};
use crate::pacing::PacedQueue;

/// Returned when neither the oracle nor a past ticket can help.
pub const STATIC_SUGGESTION: &str = "No automated suggestion is available right now. \
     Check the knowledge base or escalate the ticket to a technician.";

/// Everything derived from one corpus, published together.
pub struct Snapshot {
    pub generation: u64,
    pub corpus: Corpus,
    /// `None` until a cycle completes.
    pub trained: Option<TrainedIndex>,
    pub accuracy: Outcome<AccuracyReport>,
    /// Root cause per ticket, in corpus order.
    pub assignments: Vec<String>,
    pub root_causes: Vec<RootCauseAggregate>,
    pub heatmap: Heatmap,
    pub keywords: HashMap<String, Vec<KeywordCount>>,
    pub trained_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            corpus: Corpus::empty(),
            trained: None,
            accuracy: Outcome::empty(EmptyReason::NotTrained),
            assignments: Vec::new(),
            root_causes: Vec::new(),
            heatmap: aggregate::heatmap(&Corpus::empty()),
            keywords: HashMap::new(),
            trained_at: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }
}

/// Outcome of one training cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub generation: u64,
    pub accepted: usize,
    pub rejected: usize,
    pub terms: usize,
    pub root_causes: usize,
    /// Overall accuracy score, if the corpus was large enough to evaluate.
    pub accuracy: Option<f64>,
    pub fingerprint: String,
    /// `false` when a newer cycle superseded this one before it finished.
    pub published: bool,
}

/// A similarity result detached from the snapshot it was scored against.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub ticket_id: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    pub score: f64,
    pub explain: ScoreExplanation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionSource {
    Oracle,
    SimilarTicket { ticket_id: String },
    Static,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub source: SuggestionSource,
}

struct ComplexityCache {
    generation: u64,
    values: HashMap<String, u8>,
}

pub struct Engine {
    config: Config,
    oracle: Arc<dyn TextOracle>,
    queue: PacedQueue,
    current: RwLock<Arc<Snapshot>>,
    generation: AtomicU64,
    complexity: Mutex<ComplexityCache>,
}

impl Engine {
    pub fn new(config: Config, oracle: Arc<dyn TextOracle>) -> Self {
        let queue = PacedQueue::new(config.oracle.max_concurrency, config.oracle.min_interval());
        Self {
            config,
            oracle,
            queue,
            current: RwLock::new(Arc::new(Snapshot::empty(0))),
            generation: AtomicU64::new(0),
            complexity: Mutex::new(ComplexityCache {
                generation: 0,
                values: HashMap::new(),
            }),
        }
    }

    /// Engine with the oracle provider named in `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let oracle = create_oracle(&config.oracle)?;
        Ok(Self::new(config, oracle))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    // ============ Training ============

    /// Ingest `rows` and run a full training cycle.
    ///
    /// Ingestion errors are returned before any state changes.
    pub async fn train(&self, rows: &[Row]) -> Result<CycleSummary, IngestError> {
        let report = ingest_rows(rows, &self.config.ingest)?;
        Ok(self.train_ingested(report).await)
    }

    pub async fn train_ingested(&self, report: IngestReport) -> CycleSummary {
        let generation = self.begin_cycle().await;
        info!(
            generation,
            tickets = report.accepted,
            rejected = report.rejected,
            "training cycle started"
        );

        let fingerprint = report.corpus.fingerprint().to_string();
        let mut summary = CycleSummary {
            generation,
            accepted: report.accepted,
            rejected: report.rejected,
            terms: 0,
            root_causes: 0,
            accuracy: None,
            fingerprint,
            published: false,
        };

        let Some(snapshot) = self.build_snapshot(generation, report.corpus).await else {
            info!(generation, "training cycle superseded");
            return summary;
        };

        summary.terms = snapshot
            .trained
            .as_ref()
            .map(|t| t.index.term_count())
            .unwrap_or(0);
        summary.root_causes = snapshot.root_causes.len();
        summary.accuracy = snapshot.accuracy.value().map(|r| r.overall_score);
        summary.published = self.publish(snapshot).await;

        if summary.published {
            info!(
                generation,
                terms = summary.terms,
                root_causes = summary.root_causes,
                accuracy = ?summary.accuracy,
                "training cycle published"
            );
        } else {
            info!(generation, "training cycle superseded");
        }
        summary
    }

    async fn begin_cycle(&self) -> u64 {
        let mut current = self.current.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *current = Arc::new(Snapshot::empty(generation));
        drop(current);

        let mut cache = self.complexity.lock().await;
        cache.generation = generation;
        cache.values.clear();
        generation
    }

    async fn publish(&self, snapshot: Snapshot) -> bool {
        let mut current = self.current.write().await;
        if !self.is_current(snapshot.generation) {
            return false;
        }
        *current = Arc::new(snapshot);
        true
    }

    fn cycle_rng(&self) -> StdRng {
        match self.config.engine.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Build every derived structure for `corpus`. `None` if superseded.
    async fn build_snapshot(&self, generation: u64, corpus: Corpus) -> Option<Snapshot> {
        let mut rng = self.cycle_rng();

        let trained = TrainedIndex::build(&corpus);
        debug!(generation, terms = trained.index.term_count(), "index built");

        let accuracy = evaluate(&corpus, &self.config.engine.eval_params(), &mut rng);
        if let Some(reason) = accuracy.reason() {
            info!(generation, reason = reason.code(), "accuracy not evaluated");
        }

        let assignments = assign_root_causes(&corpus);
        let root_causes = count_root_causes(&assignments);
        let heatmap = aggregate::heatmap(&corpus);

        let mut keywords = HashMap::new();
        for cause in &root_causes {
            if !self.is_current(generation) {
                return None;
            }
            let samples: Vec<String> = sample_descriptions(
                &corpus,
                &assignments,
                &cause.name,
                self.config.wordcloud.sample_size,
                &mut rng,
            )
            .into_iter()
            .map(str::to_string)
            .collect();
            let terms = self.cause_keywords(&cause.name, &samples).await;
            keywords.insert(cause.name.clone(), terms);
        }

        if !self.is_current(generation) {
            return None;
        }

        Some(Snapshot {
            generation,
            corpus,
            trained: Some(trained),
            accuracy,
            assignments,
            root_causes,
            heatmap,
            keywords,
            trained_at: Some(Utc::now()),
        })
    }

    /// Oracle keywords for one cause, or local frequency counts.
    async fn cause_keywords(&self, cause: &str, samples: &[String]) -> Vec<KeywordCount> {
        let top = self.config.wordcloud.top_terms;
        if self.oracle.is_enabled() {
            let result = self
                .queue
                .run("keywords", self.oracle.extract_keywords(samples, cause))
                .await;
            match result {
                Ok(mut terms) if !terms.is_empty() => {
                    terms.truncate(top);
                    return terms;
                }
                Ok(_) => warn!(cause, "oracle returned no keywords, using local extraction"),
                Err(e) => warn!(cause, error = %e, "keyword oracle failed, using local extraction"),
            }
        }
        extract_keywords(samples, top)
    }

    // ============ Read models ============

    pub async fn root_causes(&self) -> Outcome<Vec<RootCauseAggregate>> {
        let snap = self.snapshot().await;
        if !snap.is_trained() {
            return Outcome::empty(EmptyReason::NotTrained);
        }
        if snap.root_causes.is_empty() {
            return Outcome::empty(EmptyReason::NoRootCauses);
        }
        Outcome::ready(snap.root_causes.clone())
    }

    pub async fn heatmap(&self) -> Outcome<Heatmap> {
        let snap = self.snapshot().await;
        if !snap.is_trained() {
            return Outcome::empty(EmptyReason::NotTrained);
        }
        Outcome::ready(snap.heatmap.clone())
    }

    pub async fn accuracy(&self) -> Outcome<AccuracyReport> {
        self.snapshot().await.accuracy.clone()
    }

    /// Keywords for `cause`; the name is matched case-insensitively.
    pub async fn keywords(&self, cause: &str) -> Outcome<Vec<KeywordCount>> {
        let snap = self.snapshot().await;
        if !snap.is_trained() {
            return Outcome::empty(EmptyReason::NotTrained);
        }
        let found = snap.keywords.get(cause).or_else(|| {
            snap.keywords
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(cause))
                .map(|(_, terms)| terms)
        });
        match found {
            Some(terms) => Outcome::ready(terms.clone()),
            None => Outcome::empty(EmptyReason::UnknownRootCause),
        }
    }

    /// Tickets most similar to `query`, best first.
    pub async fn search(&self, query: &str, limit: usize) -> Outcome<Vec<SearchHit>> {
        let snap = self.snapshot().await;
        if !snap.is_trained() {
            return Outcome::empty(EmptyReason::NotTrained);
        }
        Outcome::ready(search_snapshot(&snap, query, limit))
    }

    /// Top SLA risks at `now`.
    ///
    /// Complexity is fetched from the oracle only for tickets that can still
    /// reach the top of the list, and cached per ticket for the current
    /// generation.
    pub async fn sla_risks(&self, now: DateTime<Utc>) -> Outcome<Vec<SlaRiskEntry>> {
        let snap = self.snapshot().await;
        if !snap.is_trained() {
            return Outcome::empty(EmptyReason::NotTrained);
        }

        let mut ranker = RiskRanker::new(now, self.config.sla.params());
        let candidates = ranker.candidates(&snap.corpus);
        if candidates.is_empty() {
            return Outcome::empty(EmptyReason::NoEligibleTickets);
        }

        for (visited, candidate) in candidates.iter().enumerate() {
            if ranker.is_settled(candidate) {
                debug!(
                    scored = visited,
                    eligible = candidates.len(),
                    "risk ranking settled early"
                );
                break;
            }
            let complexity = self.complexity_for(snap.generation, candidate.ticket).await;
            ranker.push(candidate, complexity);
        }

        Outcome::ready(ranker.finish())
    }

    async fn complexity_for(&self, generation: u64, ticket: &Ticket) -> u8 {
        {
            let cache = self.complexity.lock().await;
            if cache.generation == generation {
                if let Some(value) = cache.values.get(&ticket.id) {
                    return *value;
                }
            }
        }

        let default = self.config.sla.default_complexity;
        if !self.oracle.is_enabled() {
            return default;
        }

        let result = self
            .queue
            .run("complexity", self.oracle.estimate_complexity(&ticket.description))
            .await;
        match result {
            Ok(value) => {
                let value = value.min(MAX_COMPLEXITY);
                let mut cache = self.complexity.lock().await;
                if cache.generation == generation {
                    cache.values.insert(ticket.id.clone(), value);
                }
                value
            }
            Err(e) => {
                warn!(ticket = %ticket.id, error = %e, "complexity oracle failed, using default");
                default
            }
        }
    }

    /// Suggested solution for a new problem.
    ///
    /// Falls back to the recorded solution of the most similar past ticket,
    /// then to [`STATIC_SUGGESTION`], when the oracle is disabled or keeps
    /// failing.
    pub async fn suggest(&self, req: &SuggestionRequest<'_>) -> Suggestion {
        if self.oracle.is_enabled() {
            match suggest_with_retry(
                self.oracle.as_ref(),
                req,
                self.config.oracle.max_retries,
                RETRY_BASE_DELAY,
            )
            .await
            {
                Ok(text) => {
                    return Suggestion {
                        text,
                        source: SuggestionSource::Oracle,
                    }
                }
                Err(e) => warn!(error = %e, "suggestion oracle exhausted retries"),
            }
        }

        let snap = self.snapshot().await;
        let similar = search_snapshot(&snap, req.description, self.config.engine.search_limit)
            .into_iter()
            .find_map(|hit| hit.solution.map(|s| (hit.ticket_id, s)));

        match similar {
            Some((ticket_id, solution)) => Suggestion {
                text: format!(
                    "A similar past ticket ({}) was resolved with: {}",
                    ticket_id, solution
                ),
                source: SuggestionSource::SimilarTicket { ticket_id },
            },
            None => Suggestion {
                text: STATIC_SUGGESTION.to_string(),
                source: SuggestionSource::Static,
            },
        }
    }
}

fn search_snapshot(snap: &Snapshot, query: &str, limit: usize) -> Vec<SearchHit> {
    similarity::score(query, &snap.corpus, snap.trained.as_ref())
        .into_iter()
        .take(limit)
        .map(|s| SearchHit {
            ticket_id: s.ticket.id.clone(),
            description: s.ticket.description.clone(),
            category: s.ticket.category.clone(),
            priority: s.ticket.priority.clone(),
            solution: s.ticket.solution.clone().filter(|x| !x.trim().is_empty()),
            score: s.score,
            explain: s.explain,
        })
        .collect()
}
