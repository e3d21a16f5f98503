//! Completion-service client
//!
//! Thin JSON client for the generative text service used for AI-assisted
//! metadata. The service gives no determinism or format guarantees, so
//! callers strip code fences before parsing JSON and treat anything
//! unusable as an upstream failure carrying the raw message.

use lectary_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const RATE_LIMIT_MS: u64 = 1000; // 1 request per second

/// Completion response envelope
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Client for the text/JSON completion service
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    limiter: RateLimiter,
}

impl CompletionClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "Completion API key is empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: DEFAULT_MODEL.to_string(),
            api_key,
            limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }

    /// Run one completion and return the raw text
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.limiter.wait().await;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Completion service returned {}: {}",
                status, detail
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Unparseable completion response: {}", e)))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Upstream(
                "Completion service returned no text".to_string(),
            ));
        }

        Ok(text)
    }

    /// Run one completion and parse the output as JSON, stripping a fenced
    /// code block first if the model wrapped its answer in one
    pub async fn complete_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let text = self.complete(prompt).await?;
        let cleaned = strip_code_fences(&text);

        serde_json::from_str(cleaned).map_err(|e| {
            Error::Upstream(format!(
                "Completion output is not valid JSON ({}): {}",
                e, text
            ))
        })
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if present
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the language tag on the opening fence line
    match body.split_once('\n') {
        Some((_, content)) => content.trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_text_untouched() {
        assert_eq!(strip_code_fences("  hello world "), "hello world");
    }

    #[test]
    fn test_strip_json_fence() {
        let fenced = "```json\n{\"name\": \"Tarkovsky\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"name\": \"Tarkovsky\"}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let fenced = "```\n[1, 2, 3]\n```";
        assert_eq!(strip_code_fences(fenced), "[1, 2, 3]");
    }

    #[test]
    fn test_unterminated_fence_left_alone() {
        let broken = "```json\n{\"a\": 1}";
        assert_eq!(strip_code_fences(broken), broken.trim());
    }

    #[test]
    fn test_new_rejects_empty_key() {
        assert!(CompletionClient::new("  ".to_string(), None).is_err());
        assert!(CompletionClient::new("key".to_string(), None).is_ok());
    }
}
