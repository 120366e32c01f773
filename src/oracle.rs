//! Text oracle providers.
//!
//! | Provider | Description |
//! |----------|-------------|
//! | `disabled` | Every call fails immediately; callers use their defaults. |
//! | `openai` | Any OpenAI-compatible `/chat/completions` endpoint. |
//!
//! The HTTP provider makes a single attempt per call. Retry policy is the
//! caller's: [`suggest_with_retry`] retries suggestions with exponential
//! backoff and jitter, while complexity and keyword calls fall back to a
//! default on the first failure.
//!
//! The API key is read from `HDI_ORACLE_API_KEY` and sent as a bearer token
//! when present.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use helpdesk_insight_core::aggregate::KeywordCount;
use helpdesk_insight_core::oracle::{SuggestionRequest, TextOracle};
use helpdesk_insight_core::sla::MAX_COMPLEXITY;

use crate::config::OracleConfig;

pub const API_KEY_ENV: &str = "HDI_ORACLE_API_KEY";

/// Base delay for suggestion retries; doubles per attempt up to 32×.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Build the oracle described by `config`.
pub fn create_oracle(config: &OracleConfig) -> Result<Arc<dyn TextOracle>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledOracle)),
        "openai" => Ok(Arc::new(HttpOracle::new(config)?)),
        other => bail!("Unknown oracle provider: {}", other),
    }
}

/// Oracle that refuses every call.
pub struct DisabledOracle;

#[async_trait]
impl TextOracle for DisabledOracle {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn suggest_solution(&self, _req: &SuggestionRequest<'_>) -> Result<String> {
        bail!("text oracle is disabled")
    }

    async fn estimate_complexity(&self, _description: &str) -> Result<u8> {
        bail!("text oracle is disabled")
    }

    async fn extract_keywords(
        &self,
        _samples: &[String],
        _label_hint: &str,
    ) -> Result<Vec<KeywordCount>> {
        bail!("text oracle is disabled")
    }
}

/// OpenAI-compatible chat completions client.
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("oracle.model required for the openai provider")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());

        Ok(Self {
            client,
            url: config.url.clone(),
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        chat_endpoint(&self.url)
    }

    async fn chat(&self, system: &str, user: serde_json::Value) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.2,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.context("Oracle request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Oracle API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse oracle response")?;
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if content.is_empty() {
            bail!("Oracle returned an empty completion");
        }
        Ok(content)
    }
}

#[async_trait]
impl TextOracle for HttpOracle {
    fn name(&self) -> &str {
        "openai"
    }

    async fn suggest_solution(&self, req: &SuggestionRequest<'_>) -> Result<String> {
        let mut prompt = format!("Problem description: {}", req.description);
        if let Some(category) = req.category {
            prompt.push_str(&format!("\nCategory: {}", category));
        }
        if let Some(priority) = req.priority {
            prompt.push_str(&format!("\nPriority: {}", priority));
        }

        let user = match req.image {
            Some(image) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
                serde_json::json!([
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", image.mime_type, encoded) }
                    },
                ])
            }
            None => serde_json::Value::String(prompt),
        };

        self.chat(
            "You are a helpdesk technician. Suggest a concise, step-by-step solution \
             for the reported problem.",
            user,
        )
        .await
    }

    async fn estimate_complexity(&self, description: &str) -> Result<u8> {
        let answer = self
            .chat(
                "Rate how complex the following helpdesk ticket is to resolve on a \
                 scale from 0 (trivial) to 10 (very complex). Reply with the number only.",
                serde_json::Value::String(description.to_string()),
            )
            .await?;
        parse_complexity(&answer)
    }

    async fn extract_keywords(
        &self,
        samples: &[String],
        label_hint: &str,
    ) -> Result<Vec<KeywordCount>> {
        let prompt = format!(
            "Root cause: {}\n\nTicket descriptions:\n- {}",
            label_hint,
            samples.join("\n- ")
        );
        let answer = self
            .chat(
                "Extract the most characteristic keywords from these helpdesk tickets. \
                 Reply with a JSON array of objects {\"term\": string, \"count\": integer}, \
                 most important first.",
                serde_json::Value::String(prompt),
            )
            .await?;
        parse_keywords(&answer)
    }
}

/// Resolve the chat completions endpoint from a base URL.
pub fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// First integer in `answer`, clamped to the complexity scale.
pub fn parse_complexity(answer: &str) -> Result<u8> {
    let digits: String = answer
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        bail!("no complexity rating in oracle answer: {:?}", answer);
    }
    let value: u64 = digits.parse().unwrap_or(u64::MAX);
    Ok(value.min(MAX_COMPLEXITY as u64) as u8)
}

#[derive(Deserialize)]
struct RawKeyword {
    term: String,
    #[serde(default)]
    count: usize,
}

/// Keyword list from the first JSON array in `answer`.
pub fn parse_keywords(answer: &str) -> Result<Vec<KeywordCount>> {
    let start = answer.find('[');
    let end = answer.rfind(']');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &answer[s..=e],
        _ => bail!("no keyword list in oracle answer"),
    };
    let raw: Vec<RawKeyword> =
        serde_json::from_str(json).context("Failed to parse oracle keyword list")?;
    Ok(raw
        .into_iter()
        .filter(|k| !k.term.trim().is_empty())
        .map(|k| KeywordCount {
            term: k.term.trim().to_lowercase(),
            count: k.count,
        })
        .collect())
}

/// Backoff before retry `attempt` (1-based): `base × 2^(attempt-1)`, capped at
/// `base × 32`, plus up to a quarter of that in random jitter.
pub fn backoff_delay<R: Rng + ?Sized>(attempt: u32, base: Duration, rng: &mut R) -> Duration {
    let exp = base * (1u32 << attempt.saturating_sub(1).min(5));
    let jitter_ms = (exp.as_millis() as u64 / 4).max(1);
    exp + Duration::from_millis(rng.gen_range(0..jitter_ms))
}

/// Ask for a suggestion, retrying failures up to `max_retries` times.
///
/// Returns the last error once attempts are exhausted.
pub async fn suggest_with_retry(
    oracle: &dyn TextOracle,
    req: &SuggestionRequest<'_>,
    max_retries: u32,
    base_delay: Duration,
) -> Result<String> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt, base_delay, &mut rand::thread_rng());
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying suggestion");
            tokio::time::sleep(delay).await;
        }

        match oracle.suggest_solution(req).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(oracle = oracle.name(), attempt, error = %e, "suggestion failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("suggestion failed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_chat_endpoint() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:1234/"),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://host/v1/chat/completions"),
            "http://host/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_complexity() {
        assert_eq!(parse_complexity("7").unwrap(), 7);
        assert_eq!(parse_complexity("Complexity: 4/10").unwrap(), 4);
        assert_eq!(parse_complexity("42").unwrap(), 10);
        assert!(parse_complexity("hard to say").is_err());
    }

    #[test]
    fn test_parse_keywords() {
        let answer = "Sure:\n[{\"term\": \"VPN\", \"count\": 12}, {\"term\": \"timeout\"}]\n";
        let kws = parse_keywords(answer).unwrap();
        assert_eq!(kws.len(), 2);
        assert_eq!(kws[0].term, "vpn");
        assert_eq!(kws[0].count, 12);
        assert_eq!(kws[1].count, 0);
        assert!(parse_keywords("nothing here").is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_millis(100);
        let first = backoff_delay(1, base, &mut rng);
        assert!(first >= base && first < base + Duration::from_millis(25));
        let third = backoff_delay(3, base, &mut rng);
        assert!(third >= Duration::from_millis(400));
        let capped = backoff_delay(20, base, &mut rng);
        assert!(capped >= Duration::from_millis(3200));
        assert!(capped < Duration::from_millis(4000));
    }

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextOracle for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn suggest_solution(&self, _req: &SuggestionRequest<'_>) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                bail!("rate limited")
            }
            Ok("restart the router".to_string())
        }
        async fn estimate_complexity(&self, _d: &str) -> Result<u8> {
            Ok(0)
        }
        async fn extract_keywords(&self, _s: &[String], _l: &str) -> Result<Vec<KeywordCount>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let oracle = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let req = SuggestionRequest {
            description: "router down",
            ..Default::default()
        };
        let text = suggest_with_retry(&oracle, &req, 5, RETRY_BASE_DELAY)
            .await
            .unwrap();
        assert_eq!(text, "restart the router");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling() {
        let oracle = Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let req = SuggestionRequest {
            description: "router down",
            ..Default::default()
        };
        let err = suggest_with_retry(&oracle, &req, 3, RETRY_BASE_DELAY)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_disabled_oracle() {
        let oracle = create_oracle(&OracleConfig::default()).unwrap();
        assert!(!oracle.is_enabled());
        assert_eq!(oracle.name(), "disabled");
        assert!(oracle.estimate_complexity("x").await.is_err());
    }
}
