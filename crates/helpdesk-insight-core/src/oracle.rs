//! Text oracle trait.
//!
//! The oracle is an external natural-language service the engine asks for
//! suggested solutions, complexity estimates, and keyword lists. Calls may
//! be slow, rate limited, or fail; the engine decides how to retry or
//! substitute defaults.
//!
//! Concrete implementations (HTTP chat completions, disabled) live in the
//! `helpdesk-insight` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::aggregate::KeywordCount;

/// An image attached to a suggestion request.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Inputs for [`TextOracle::suggest_solution`].
#[derive(Debug, Clone, Default)]
pub struct SuggestionRequest<'a> {
    pub description: &'a str,
    pub category: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub image: Option<&'a ImageAttachment>,
}

#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Returns the provider identifier (e.g. `"openai"`, `"disabled"`).
    fn name(&self) -> &str;

    /// `false` when every call is known to fail without trying.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Free-text suggested fix for a problem description.
    async fn suggest_solution(&self, req: &SuggestionRequest<'_>) -> Result<String>;

    /// Estimated resolution complexity in `0..=10`.
    async fn estimate_complexity(&self, description: &str) -> Result<u8>;

    /// Ranked keywords for a sample of descriptions sharing one label.
    async fn extract_keywords(
        &self,
        samples: &[String],
        label_hint: &str,
    ) -> Result<Vec<KeywordCount>>;
}
