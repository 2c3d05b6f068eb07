//! AI page generation.
//!
//! Defines the [`PageGenerator`] trait and its implementations:
//! - **[`DisabledGenerator`]**: always fails; used when `generation.provider = "disabled"`.
//! - **[`OpenAIGenerator`]**: calls an OpenAI-compatible `/chat/completions` endpoint.
//!
//! Provider, model, base URL and key all come from [`GenerationConfig`],
//! which is handed to the generator at construction.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::models::SourceRecord;

/// Turns a query and its aggregated sources into page HTML.
#[async_trait]
pub trait PageGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, normalized_query: &str, sources: &[SourceRecord]) -> Result<String>;
}

pub struct DisabledGenerator;

#[async_trait]
impl PageGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _normalized_query: &str, _sources: &[SourceRecord]) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

pub struct OpenAIGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl OpenAIGenerator {
    /// # Errors
    ///
    /// Returns an error if no API key was resolved into `config.api_key`.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let api_key = match config.api_key.clone() {
            Some(key) if !key.is_empty() => key,
            _ => bail!(
                "generation API key missing: set {} or generation.api_key",
                config.api_key_env
            ),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

const SYSTEM_PROMPT: &str = "You write concise, well-structured HTML landing pages about a search topic. \
Use only the provided sources. Return an HTML fragment (no <html> or <body>), starting with an <h1> \
followed by an introductory <p> paragraph, then sections with <h2> headings. Do not wrap the answer in code fences.";

/// User prompt listing every source in aggregation order.
pub fn build_prompt(normalized_query: &str, sources: &[SourceRecord]) -> String {
    let mut prompt = format!("Topic: {}\n\nSources:\n", normalized_query);
    for (i, s) in sources.iter().enumerate() {
        prompt.push_str(&format!("[{}] {} ({})\n", i + 1, s.title, s.source));
        if let Some(url) = &s.url {
            prompt.push_str(&format!("URL: {}\n", url));
        }
        if !s.snippet.is_empty() {
            prompt.push_str(&format!("{}\n", s.snippet));
        }
        prompt.push('\n');
    }
    prompt
}

/// Drops a surrounding Markdown code fence if the model added one anyway.
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid chat completion response: missing content"))?;
    Ok(strip_code_fence(content))
}

#[async_trait]
impl PageGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, normalized_query: &str, sources: &[SourceRecord]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(normalized_query, sources) },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            debug!(model = %self.config.model, attempt, "calling generation API");
            let resp = self
                .client
                .post(self.endpoint())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "generation API error, retrying");
                        last_err = Some(anyhow::anyhow!(
                            "Generation API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("Generation API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "generation request failed, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

/// Builds the generator described by `[generation]`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn PageGenerator>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIGenerator::new(config.clone())?)),
        "disabled" => Ok(Box::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_keeps_source_order() {
        let sources = vec![
            SourceRecord {
                source: "web".into(),
                title: "First".into(),
                url: Some("https://one".into()),
                snippet: "alpha".into(),
                image_url: None,
            },
            SourceRecord {
                source: "news".into(),
                title: "Second".into(),
                url: None,
                snippet: String::new(),
                image_url: None,
            },
        ];
        let prompt = build_prompt("gpu prices", &sources);
        assert!(prompt.starts_with("Topic: gpu prices"));
        let first = prompt.find("[1] First (web)").unwrap();
        let second = prompt.find("[2] Second (news)").unwrap();
        assert!(first < second);
        assert!(prompt.contains("URL: https://one"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fence("  <p>x</p> "), "<p>x</p>");
        assert_eq!(strip_code_fence("```\n<h1>t</h1>```"), "<h1>t</h1>");
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "<p>hi</p>" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "<p>hi</p>");
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_openai_requires_key() {
        let config = GenerationConfig::default();
        assert!(OpenAIGenerator::new(config).is_err());

        let config = GenerationConfig {
            api_key: Some("sk-test".into()),
            ..GenerationConfig::default()
        };
        let generator = OpenAIGenerator::new(config).unwrap();
        assert_eq!(generator.model_name(), "gpt-4o-mini");
        assert_eq!(generator.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_disabled_generator_fails() {
        let config = GenerationConfig {
            provider: "disabled".into(),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        assert!(generator.generate("q", &[]).await.is_err());
    }
}
