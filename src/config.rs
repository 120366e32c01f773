//! TOML configuration.
//!
//! Every section is optional; a missing key takes the default shown in
//! `config/hdi.example.toml`. [`load_config`] validates the result eagerly so
//! a bad value fails at startup rather than halfway through a training cycle.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use helpdesk_insight_core::evaluate::EvalParams;
use helpdesk_insight_core::sla::SlaParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sla: SlaConfig,
    #[serde(default)]
    pub wordcloud: WordcloudConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_min_eval_tickets")]
    pub min_eval_tickets: usize,
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Seed for evaluation shuffles and keyword sampling. Unset means a
    /// fresh random split on every training cycle.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_eval_tickets: default_min_eval_tickets(),
            train_ratio: default_train_ratio(),
            search_limit: default_search_limit(),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn eval_params(&self) -> EvalParams {
        EvalParams {
            min_tickets: self.min_eval_tickets,
            train_ratio: self.train_ratio,
        }
    }
}

fn default_min_eval_tickets() -> usize {
    10
}
fn default_train_ratio() -> f64 {
    0.8
}
fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlaConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,
    /// Complexity used when the oracle is disabled or fails.
    #[serde(default = "default_complexity")]
    pub default_complexity: u8,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            horizon_days: default_horizon_days(),
            default_complexity: default_complexity(),
        }
    }
}

impl SlaConfig {
    pub fn params(&self) -> SlaParams {
        SlaParams {
            top_n: self.top_n,
            horizon: chrono::Duration::days(self.horizon_days),
        }
    }
}

fn default_top_n() -> usize {
    8
}
fn default_horizon_days() -> i64 {
    7
}
fn default_complexity() -> u8 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct WordcloudConfig {
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_top_terms")]
    pub top_terms: usize,
}

impl Default for WordcloudConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            top_terms: default_top_terms(),
        }
    }
}

fn default_sample_size() -> usize {
    50
}
fn default_top_terms() -> usize {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_oracle_url")]
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum spacing between the starts of two paced oracle calls.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: default_oracle_url(),
            model: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            min_interval_ms: default_min_interval_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl OracleConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_oracle_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_interval_ms() -> u64 {
    1000
}
fn default_max_concurrency() -> usize {
    1
}

/// Upload column mapping: engine field name → column header in the upload.
///
/// Fields that are not listed use their own name as the header.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub columns: HashMap<String, String>,
}

impl IngestConfig {
    pub fn column<'a>(&'a self, field: &'a str) -> &'a str {
        self.columns.get(field).map(String::as_str).unwrap_or(field)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Engine fields an upload column can be mapped to.
pub const KNOWN_FIELDS: &[&str] = &[
    "ticket_id",
    "problem_description",
    "category",
    "priority",
    "solution",
    "technician",
    "status",
    "created_at",
    "due_date",
    "responded_at",
];

impl Config {
    /// All defaults, oracle disabled. Used by tests and when running
    /// without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate engine
    if !(config.engine.train_ratio > 0.0 && config.engine.train_ratio < 1.0) {
        anyhow::bail!("engine.train_ratio must be in (0.0, 1.0)");
    }
    if config.engine.min_eval_tickets < 2 {
        anyhow::bail!("engine.min_eval_tickets must be >= 2");
    }
    if config.engine.search_limit < 1 {
        anyhow::bail!("engine.search_limit must be >= 1");
    }

    // Validate sla
    if config.sla.top_n < 1 {
        anyhow::bail!("sla.top_n must be >= 1");
    }
    if config.sla.horizon_days < 1 {
        anyhow::bail!("sla.horizon_days must be >= 1");
    }
    if config.sla.default_complexity > 10 {
        anyhow::bail!("sla.default_complexity must be in 0..=10");
    }

    // Validate wordcloud
    if config.wordcloud.sample_size < 1 || config.wordcloud.top_terms < 1 {
        anyhow::bail!("wordcloud.sample_size and wordcloud.top_terms must be >= 1");
    }

    // Validate oracle
    if config.oracle.max_concurrency < 1 {
        anyhow::bail!("oracle.max_concurrency must be >= 1");
    }
    match config.oracle.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.oracle.model.is_none() {
                anyhow::bail!("oracle.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown oracle provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate ingest
    for field in config.ingest.columns.keys() {
        if !KNOWN_FIELDS.contains(&field.as_str()) {
            anyhow::bail!(
                "ingest.columns: unknown field '{}'. Known fields: {}",
                field,
                KNOWN_FIELDS.join(", ")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = write_config("");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.engine.min_eval_tickets, 10);
        assert_eq!(cfg.sla.top_n, 8);
        assert_eq!(cfg.wordcloud.sample_size, 50);
        assert_eq!(cfg.wordcloud.top_terms, 30);
        assert!(!cfg.oracle.is_enabled());
        assert_eq!(cfg.ingest.column("problem_description"), "problem_description");
    }

    #[test]
    fn test_column_mapping() {
        let f = write_config(
            r#"
[ingest.columns]
problem_description = "Description"
due_date = "SLA Due"
"#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.ingest.column("problem_description"), "Description");
        assert_eq!(cfg.ingest.column("due_date"), "SLA Due");
        assert_eq!(cfg.ingest.column("category"), "category");
    }

    #[test]
    fn test_rejects_unknown_column_field() {
        let f = write_config("[ingest.columns]\nsummary = \"Summary\"\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let f = write_config("[engine]\ntrain_ratio = 1.0\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_openai_requires_model() {
        let f = write_config("[oracle]\nprovider = \"openai\"\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("oracle.model"));

        let f = write_config("[oracle]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n");
        assert!(load_config(f.path()).unwrap().oracle.is_enabled());
    }

    #[test]
    fn test_unknown_provider() {
        let f = write_config("[oracle]\nprovider = \"magic\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/hdi.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
