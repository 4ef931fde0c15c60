//! HTTP-backed fix generator.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. The prompt
//! carries the error, the code, optional context, and the full history of
//! prior attempts so the model can avoid repeating a failed approach.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parse;
use super::FixGenerator;
use crate::domain::{Attempt, FixRequest, GeneratedFix, GenerationError};

const SYSTEM_PROMPT: &str = "\
You are an elite autonomous debugging agent. Analyze runtime errors, \
identify their root cause, and produce a minimal, surgical fix.

When a previous fix failed verification you will receive the prior \
attempts with their errors. Identify why each failed, do not repeat the \
same approach, and produce a more robust solution.

Respond with: 1. Root Cause Analysis (2-3 sentences). 2. The complete \
fixed code in a fenced code block. 3. Explanation of the changes. \
4. On retries, what was wrong with the previous attempt.";

/// Configuration for the HTTP fix generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpGeneratorConfig {
    /// Base URL of the chat-completions API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Bearer token (optional for local endpoints).
    pub api_key: Option<String>,
    /// Sampling temperature. Low values keep fixes focused.
    pub temperature: f64,
    /// Response token budget.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("REMEDY_GENERATOR_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("REMEDY_GENERATOR_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            temperature: 0.2,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }
}

impl HttpGeneratorConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Fix generator backed by an OpenAI-style HTTP API.
pub struct HttpFixGenerator {
    config: HttpGeneratorConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpFixGenerator {
    /// Create a generator with the given configuration.
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("remedy/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Create a generator from environment variables.
    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(HttpGeneratorConfig::from_env())
    }

    /// Assemble the user prompt, including the retry history when present.
    fn build_prompt(request: &FixRequest, history: &[Attempt]) -> String {
        let mut prompt = format!(
            "Analyze and fix this bug:\n\n**Error Message:**\n```\n{}\n```\n\n**Original Code:**\n```\n{}\n```\n",
            request.error_message, request.code
        );

        if let Some(path) = &request.file_path {
            prompt.push_str(&format!("\n**File Path:** `{path}`\n"));
        }

        if let Some(context) = &request.context {
            prompt.push_str(&format!(
                "\n**Additional Context:**\n{}\n(referenced files: {})\n",
                context.summary,
                context.referenced_files.join(", ")
            ));
        }

        if !history.is_empty() {
            prompt.push_str(&format!(
                "\n**RETRY ATTEMPT #{}**\n**Previous attempts have failed. Learn from these mistakes:**\n\n",
                history.len() + 1
            ));
            for attempt in history {
                prompt.push_str(&format!(
                    "--- Attempt {} ---\n**Fix Attempted:**\n```\n{}\n```\n**Result:** {:?}\n",
                    attempt.number, attempt.fix.fixed_code, attempt.verdict
                ));
                if let Some(new_error) = &attempt.new_error {
                    prompt.push_str(&format!("**New Error:** {new_error}\n"));
                }
                prompt.push('\n');
            }
            prompt.push_str(
                "**IMPORTANT:** Analyze why the previous fix(es) failed. Do NOT repeat the \
                 same approach. Generate a MORE ROBUST solution that addresses the failures \
                 and covers the edge cases that were missed.\n",
            );
        }

        prompt.push_str(
            "\nPlease provide:\n1. Root Cause Analysis\n2. The complete fixed code\n3. Explanation of your changes\n",
        );
        if !history.is_empty() {
            prompt.push_str("4. What was wrong with the previous attempt(s) and how this fix is different\n");
        }

        prompt
    }
}

#[async_trait]
impl FixGenerator for HttpFixGenerator {
    async fn generate(
        &self,
        request: &FixRequest,
        history: &[Attempt],
    ) -> Result<GeneratedFix, GenerationError> {
        let prompt = Self::build_prompt(request, history);
        debug!(
            bug_id = %request.bug_id,
            attempt = history.len() + 1,
            "requesting fix from generator"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut http_request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Response(format!(
                "generator returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Response(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or_default();

        Ok(parse::parse_response(content, &request.code))
    }
}
