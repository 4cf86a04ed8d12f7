//! AI-assisted archive category suggestions
//!
//! The text-generation collaborator is unreliable by nature: timeouts,
//! non-2xx responses and malformed JSON are all normal and surface as
//! [`NoSignal`], never as a pipeline failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelfsync_common::models::ArchiveCategory;
use std::time::Duration;
use thiserror::Error;

/// What the classifier sends to the collaborator
#[derive(Debug, Clone, Serialize)]
pub struct AiProductSnapshot {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub price: i64,
}

/// Parsed collaborator answer
#[derive(Debug, Clone, PartialEq)]
pub struct AiSuggestion {
    pub category: ArchiveCategory,
    /// 0-100 as reported by the collaborator
    pub confidence: u8,
    pub reason: Option<String>,
}

/// Why no suggestion was produced
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NoSignal {
    #[error("AI classification is disabled")]
    Disabled,

    #[error("AI request timed out")]
    Timeout,

    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI returned status {0}")]
    Status(u16),

    #[error("AI response malformed: {0}")]
    Malformed(String),
}

impl NoSignal {
    /// Timeouts, transport errors, 429 and 5xx are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            NoSignal::Timeout | NoSignal::Transport(_) => true,
            NoSignal::Status(code) => *code == 429 || *code >= 500,
            NoSignal::Disabled | NoSignal::Malformed(_) => false,
        }
    }
}

/// Optional collaborator injected into the archive classifier
#[async_trait]
pub trait AiClassifier: Send + Sync {
    async fn suggest(&self, product: &AiProductSnapshot) -> Result<AiSuggestion, NoSignal>;
}

/// `[ai]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// Text-generation endpoint; AI is off when unset
    pub endpoint: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Lowest priority source for the API key (database and environment win)
    pub api_key: Option<String>,
    /// Concurrent AI calls during a refresh
    pub fan_out: usize,
    /// Attempts per product, including the first
    pub max_attempts: u32,
    /// Doubled after every transient failure
    pub initial_backoff_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "archive-classifier".to_string(),
            timeout_secs: 15,
            api_key: None,
            fan_out: 4,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(alias = "output", alias = "response")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP text-generation client
pub struct HttpAiClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl HttpAiClassifier {
    pub fn new(config: &AiConfig, endpoint: String, api_key: String) -> Result<Self, NoSignal> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NoSignal::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            model: config.model.clone(),
            api_key,
            timeout,
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        })
    }

    async fn attempt(&self, request: &GenerateRequest<'_>) -> Result<AiSuggestion, NoSignal> {
        let send = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| NoSignal::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    NoSignal::Timeout
                } else {
                    NoSignal::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NoSignal::Status(status.as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NoSignal::Malformed(e.to_string()))?;

        parse_suggestion(&body.text)
    }
}

#[async_trait]
impl AiClassifier for HttpAiClassifier {
    async fn suggest(&self, product: &AiProductSnapshot) -> Result<AiSuggestion, NoSignal> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(product),
        };

        tracing::debug!(product_id = %product.product_id, "Requesting AI archive classification");

        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.attempt(&request).await {
                Ok(suggestion) => return Ok(suggestion),
                Err(e) => e,
            };

            if attempt >= self.max_attempts || !error.is_transient() {
                return Err(error);
            }

            tracing::warn!(
                product_id = %product.product_id,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "AI request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }
}

/// Prompt for one product
pub fn build_prompt(product: &AiProductSnapshot) -> String {
    let categories = ArchiveCategory::CLASSIFIED
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a vintage and archive fashion specialist. Classify the product into exactly one \
         archive category.\n\
         Product name: {}\n\
         Brand: {}\n\
         Price: {}\n\
         Categories: {}\n\
         Prefer the brand when it is known, otherwise judge by style and details.\n\
         Answer with JSON only: {{\"category\": \"<category>\", \"confidence\": 0-100, \"reason\": \"<one sentence>\"}}",
        product.name,
        product.brand.as_deref().unwrap_or("unknown"),
        product.price,
        categories,
    )
}

/// Extract and validate the first JSON object in a free-text answer
pub fn parse_suggestion(text: &str) -> Result<AiSuggestion, NoSignal> {
    let start = text
        .find('{')
        .ok_or_else(|| NoSignal::Malformed("no JSON object in response".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| NoSignal::Malformed("unterminated JSON object".to_string()))?;

    let raw: RawSuggestion = serde_json::from_str(&text[start..=end])
        .map_err(|e| NoSignal::Malformed(e.to_string()))?;

    let category = raw
        .category
        .parse::<ArchiveCategory>()
        .ok()
        .filter(|c| c.is_classified())
        .ok_or_else(|| NoSignal::Malformed(format!("unknown category '{}'", raw.category)))?;

    if !raw.confidence.is_finite() {
        return Err(NoSignal::Malformed("non-numeric confidence".to_string()));
    }

    Ok(AiSuggestion {
        category,
        confidence: raw.confidence.clamp(0.0, 100.0).round() as u8,
        reason: raw.reason,
    })
}
