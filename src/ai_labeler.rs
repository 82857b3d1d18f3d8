//! Anthropic Claude-backed label synthesizer.
//!
//! One concrete [`LabelSynthesizer`] that phrases topic labels via the
//! Anthropic Messages API. The prompt is depth-aware (broad category names
//! near the root, specific ones at the bottom) and carries sibling labels
//! so the model differentiates names within a parent group.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::label::{LabelError, LabelRequest, LabelSynthesizer};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Prompt caps: the request is bounded regardless of aggregation output.
const MAX_PROMPT_DOCUMENTS: usize = 12;
const MAX_PROMPT_KEYWORDS: usize = 15;
const MAX_DOCUMENT_CHARS: usize = 80;
const MAX_SIBLING_LABELS: usize = 20;

/// Accepted label length bounds; anything outside is an unusable response.
const MIN_LABEL_LEN: usize = 3;
const MAX_LABEL_LEN: usize = 50;

#[derive(Debug, Clone)]
pub struct AnthropicLabelerConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl AnthropicLabelerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 50,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Anthropic API message format.
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

pub struct AnthropicLabeler {
    config: AnthropicLabelerConfig,
    client: reqwest::Client,
}

impl AnthropicLabeler {
    pub fn new(config: AnthropicLabelerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_prompt(&self, request: &LabelRequest) -> String {
        let documents_list = request
            .documents
            .iter()
            .take(MAX_PROMPT_DOCUMENTS)
            .map(|d| format!("- {}", d.chars().take(MAX_DOCUMENT_CHARS).collect::<String>()))
            .collect::<Vec<_>>()
            .join("\n");

        let keywords_list = request
            .keywords
            .iter()
            .take(MAX_PROMPT_KEYWORDS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        let siblings_str = if request.sibling_labels.is_empty() {
            "None".to_string()
        } else {
            request
                .sibling_labels
                .iter()
                .take(MAX_SIBLING_LABELS)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };

        let specificity_hint = if request.depth == 0 {
            "This is a TOP-LEVEL category: prefer a broad domain name (e.g. \"Machine Learning\", \"Career\", \"Web Development\")."
        } else if request.depth >= request.max_depth.saturating_sub(1) {
            "This is a BOTTOM-LEVEL topic: be as specific as the content allows (e.g. \"BERT Fine-tuning\", \"Borrow Checker Errors\")."
        } else {
            "This is a MID-LEVEL category: more specific than a domain, broader than a single topic."
        };

        format!(
            r#"These documents belong to the same topic cluster. Generate a 2-4 word category name.

Documents:
{documents_list}

Keywords: {keywords_list}

Hierarchy position: depth {depth} of {max_depth}. {specificity_hint}

Sibling category names already used (your name must be clearly different): {siblings_str}

RULES:
1. Be specific and descriptive for the content shown
2. Avoid generic names like "General", "Various", "Miscellaneous", "Other", "Mixed"
3. Do not duplicate or nearly duplicate any sibling name
4. Respond with ONLY the category name, nothing else"#,
            documents_list = documents_list,
            keywords_list = keywords_list,
            depth = request.depth,
            max_depth = request.max_depth,
            specificity_hint = specificity_hint,
            siblings_str = siblings_str,
        )
    }
}

#[async_trait]
impl LabelSynthesizer for AnthropicLabeler {
    async fn synthesize(&self, request: &LabelRequest) -> Result<String, LabelError> {
        let prompt = self.build_prompt(request);
        debug!("requesting label for node {}", request.node_id);

        let body = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    LabelError::Transient(format!("HTTP request failed: {}", e))
                } else {
                    LabelError::Permanent(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, body);
            // 429 and 5xx (notably 529 overloaded) are retryable.
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(LabelError::Transient(message))
            } else {
                Err(LabelError::Permanent(message))
            };
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LabelError::Permanent(format!("failed to parse response: {}", e)))?;

        let text = api_response
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        let label = clean_label_text(&text);
        if label.len() < MIN_LABEL_LEN || label.len() > MAX_LABEL_LEN {
            return Err(LabelError::Permanent(format!(
                "invalid label length: {} chars",
                label.len()
            )));
        }

        Ok(label)
    }
}

/// Strip markdown fences and surrounding quotes the model sometimes wraps
/// the name in, then trim to a single line.
fn clean_label_text(text: &str) -> String {
    let unfenced = if text.trim_start().starts_with("```") {
        text.lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    };

    unfenced
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_plain_response() {
        assert_eq!(clean_label_text("Rust Development\n"), "Rust Development");
    }

    #[test]
    fn strips_markdown_fences_and_quotes() {
        assert_eq!(
            clean_label_text("```\n\"API Design\"\n```"),
            "API Design"
        );
    }

    #[test]
    fn takes_first_non_empty_line() {
        assert_eq!(
            clean_label_text("\nDatabase Migrations\nextra commentary"),
            "Database Migrations"
        );
    }

    #[test]
    fn prompt_carries_position_and_siblings() {
        let labeler = AnthropicLabeler::new(AnthropicLabelerConfig::new("test-key"));
        let request = LabelRequest {
            node_id: 100,
            documents: vec!["How to tune hyperparameters".to_string()],
            keywords: vec!["training".to_string(), "models".to_string()],
            depth: 1,
            max_depth: 3,
            sibling_labels: vec!["Data Pipelines".to_string()],
        };

        let prompt = labeler.build_prompt(&request);
        assert!(prompt.contains("depth 1 of 3"));
        assert!(prompt.contains("Data Pipelines"));
        assert!(prompt.contains("How to tune hyperparameters"));
        assert!(prompt.contains("training, models"));
        assert!(prompt.contains("MID-LEVEL"));
    }

    #[test]
    fn depth_zero_prompts_for_broad_names() {
        let labeler = AnthropicLabeler::new(AnthropicLabelerConfig::new("test-key"));
        let request = LabelRequest {
            node_id: 1,
            documents: vec![],
            keywords: vec![],
            depth: 0,
            max_depth: 3,
            sibling_labels: vec![],
        };

        assert!(labeler.build_prompt(&request).contains("TOP-LEVEL"));
    }
}
