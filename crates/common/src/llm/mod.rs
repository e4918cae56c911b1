//! Language-generation service abstraction
//!
//! Provides a unified text-in/text-out interface over:
//! - Google Gemini (generateContent)
//! - OpenAI-compatible chat completions
//! - A deterministic mock for development and tests

mod gemini;
mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::{LlmConfig, LlmProvider, RetryConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Why the pipeline is calling the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPurpose {
    /// Disambiguating entities/intents for the fallback parser
    QueryParsing,
    /// Producing the final natural-language answer
    Answer,
}

impl GenerationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPurpose::QueryParsing => "query_parsing",
            GenerationPurpose::Answer => "answer",
        }
    }
}

/// A single prompt sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(purpose: GenerationPurpose, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            prompt: prompt.into(),
        }
    }
}

/// Trait for text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt; output has no guaranteed structure
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Time a provider call and record its outcome
pub(crate) async fn observe<F>(purpose: GenerationPurpose, call: F) -> Result<String>
where
    F: Future<Output = Result<String>>,
{
    let start = Instant::now();
    let result = call.await;
    metrics::record_llm(
        start.elapsed().as_secs_f64(),
        purpose.as_str(),
        result.is_ok(),
    );
    result
}

/// Map a transport failure to a language-model error
pub(crate) fn transport_error(err: reqwest::Error) -> AppError {
    AppError::LanguageModel {
        transient: err.is_timeout() || err.is_connect(),
        message: format!("Request failed: {}", err),
    }
}

/// Build the HTTP client shared by provider clients
pub(crate) fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// What the mock answers with for `GenerationPurpose::Answer`
#[derive(Debug, Clone)]
enum MockAnswer {
    /// Echo the prompt back
    Echo,
    Fixed(String),
}

/// Deterministic in-process generator
///
/// Parse requests get scripted replies in order, then `none`.
pub struct MockGenerator {
    parse_replies: Mutex<VecDeque<String>>,
    answer: MockAnswer,
    fail_on: Option<GenerationPurpose>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            parse_replies: Mutex::new(VecDeque::new()),
            answer: MockAnswer::Echo,
            fail_on: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for the next query-parsing request
    pub fn with_parse_reply(mut self, reply: impl Into<String>) -> Self {
        self.parse_replies.get_mut().push_back(reply.into());
        self
    }

    /// Answer every answer request with `answer`
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = MockAnswer::Fixed(answer.into());
        self
    }

    /// Fail every request of the given purpose
    pub fn failing_on(mut self, purpose: GenerationPurpose) -> Self {
        self.fail_on = Some(purpose);
        self
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().await.push(request.clone());

        if self.fail_on == Some(request.purpose) {
            return Err(AppError::LanguageModel {
                message: format!("mock failure for {}", request.purpose.as_str()),
                transient: false,
            });
        }

        match request.purpose {
            GenerationPurpose::QueryParsing => Ok(self
                .parse_replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| "none".to_string())),
            GenerationPurpose::Answer => Ok(match &self.answer {
                MockAnswer::Echo => request.prompt.clone(),
                MockAnswer::Fixed(answer) => answer.clone(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &LlmConfig, retry: &RetryConfig) -> Result<Arc<dyn TextGenerator>> {
    let require_key = || {
        config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: format!(
                "llm.api_key (or {}) is required for provider {:?}",
                config.provider.api_key_env().unwrap_or("an API key"),
                config.provider
            ),
        })
    };

    match config.provider {
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(
            config,
            require_key()?,
            retry.clone(),
        )?)),
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::new(
            config,
            require_key()?,
            retry.clone(),
        )?)),
        LlmProvider::Mock => {
            tracing::warn!("Using mock language model, answers will echo the evidence");
            Ok(Arc::new(MockGenerator::new()))
        }
    }
}
