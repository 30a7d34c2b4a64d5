//! Chat-completion client for OpenAI-compatible providers.
//!
//! One logical `complete(messages) -> text` call maps to at most
//! [`MAX_ATTEMPTS`] HTTP requests. Each attempt classifies its failure as
//! `Retryable` (timeout, or an overload status) or `Fatal` (anything else),
//! and an explicit retry loop consumes that classification. The provider
//! profile (endpoint and header set) is resolved once at construction.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Total attempts per logical completion call, including the first.
pub const MAX_ATTEMPTS: u32 = 2;

/// Statuses worth one immediate re-attempt. Everything else fails fast.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
    #[error("completion service unavailable (HTTP {status}) after {attempts} attempt(s)")]
    ServiceUnavailable { status: u16, attempts: u32 },
    #[error("completion request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("connection to completion service failed: {0}")]
    Connection(String),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
    #[error("invalid completion client configuration: {0}")]
    Configuration(String),
}

/// Why an attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryReason {
    Timeout,
    Status(u16),
}

/// Outcome classification of a single HTTP attempt.
#[derive(Debug)]
enum AttemptError {
    Retryable(RetryReason),
    Fatal(CompletionError),
}

/// A generic client issuing one logical completion call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `messages` to the model and returns the raw response text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Endpoint and header set for one provider, fixed at construction.
pub trait ProviderProfile: Send + Sync {
    fn name(&self) -> &'static str;
    fn base_url(&self) -> &str;
    fn build_headers(&self) -> Result<HeaderMap, CompletionError>;
}

fn bearer_header(api_key: &str) -> Result<HeaderValue, CompletionError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| CompletionError::Configuration("API key is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Direct OpenAI API access.
pub struct OpenAiProfile {
    pub api_key: String,
}

impl ProviderProfile for OpenAiProfile {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn base_url(&self) -> &str {
        "https://api.openai.com/v1"
    }

    fn build_headers(&self) -> Result<HeaderMap, CompletionError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer_header(&self.api_key)?);
        Ok(headers)
    }
}

/// OpenRouter access. Sends the attribution headers OpenRouter expects in
/// addition to the bearer token.
pub struct OpenRouterProfile {
    pub api_key: String,
    pub referer: String,
    pub title: String,
}

impl ProviderProfile for OpenRouterProfile {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn base_url(&self) -> &str {
        "https://openrouter.ai/api/v1"
    }

    fn build_headers(&self) -> Result<HeaderMap, CompletionError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer_header(&self.api_key)?);
        headers.insert(
            "HTTP-Referer",
            HeaderValue::from_str(&self.referer).map_err(|_| {
                CompletionError::Configuration("referer is not a valid header value".into())
            })?,
        );
        headers.insert(
            "X-Title",
            HeaderValue::from_str(&self.title).map_err(|_| {
                CompletionError::Configuration("title is not a valid header value".into())
            })?,
        );
        Ok(headers)
    }
}

/// Request parameters common to every completion call.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// [`CompletionClient`] over HTTP for any OpenAI-compatible provider.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    params: ModelParams,
}

impl HttpCompletionClient {
    pub fn new(
        provider: &dyn ProviderProfile,
        params: ModelParams,
    ) -> Result<Self, CompletionError> {
        let headers = provider.build_headers()?;
        let http = reqwest::Client::builder()
            .timeout(params.timeout)
            .build()
            .map_err(|e| CompletionError::Configuration(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", provider.base_url()),
            headers,
            params,
        })
    }

    async fn attempt(&self, payload: &serde_json::Value) -> Result<String, AttemptError> {
        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Retryable(RetryReason::Timeout)
                } else {
                    AttemptError::Fatal(CompletionError::Connection(e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            if RETRYABLE_STATUSES.contains(&code) {
                return Err(AttemptError::Retryable(RetryReason::Status(code)));
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(CompletionError::Rejected {
                status: code,
                body,
            }));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(CompletionError::MalformedResponse(e.to_string())))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                AttemptError::Fatal(CompletionError::MalformedResponse(
                    "response carried no message content".into(),
                ))
            })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let payload = serde_json::json!({
            "model": self.params.model,
            "messages": messages,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
        });
        run_with_retry(MAX_ATTEMPTS, |_| self.attempt(&payload)).await
    }
}

/// Runs `attempt` up to `max_attempts` times. A `Fatal` error propagates
/// immediately; a `Retryable` one is re-attempted, and the last retryable
/// failure maps to the matching distinguishable [`CompletionError`].
async fn run_with_retry<F, Fut>(max_attempts: u32, mut attempt: F) -> Result<String, CompletionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, AttemptError>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt(attempts).await {
            Ok(text) => return Ok(text),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Retryable(reason)) if attempts < max_attempts => {
                warn!(attempt = attempts, ?reason, "retryable completion failure");
            }
            Err(AttemptError::Retryable(reason)) => {
                return Err(match reason {
                    RetryReason::Timeout => CompletionError::Timeout { attempts },
                    RetryReason::Status(status) => {
                        CompletionError::ServiceUnavailable { status, attempts }
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overloaded_status_is_retried_and_second_attempt_wins() {
        let mut calls = 0;
        let result = run_with_retry(MAX_ATTEMPTS, |attempt| {
            calls += 1;
            async move {
                if attempt == 1 {
                    Err(AttemptError::Retryable(RetryReason::Status(429)))
                } else {
                    Ok("second attempt body".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "second attempt body");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn fatal_status_fails_without_retry() {
        let mut calls = 0;
        let result = run_with_retry(MAX_ATTEMPTS, |_| {
            calls += 1;
            async {
                Err(AttemptError::Fatal(CompletionError::Rejected {
                    status: 401,
                    body: "bad key".to_string(),
                }))
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(CompletionError::Rejected { status: 401, .. })
        ));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn exhausted_timeouts_map_to_a_timeout_error() {
        let mut calls = 0;
        let result = run_with_retry(MAX_ATTEMPTS, |_| {
            calls += 1;
            async { Err(AttemptError::Retryable(RetryReason::Timeout)) }
        })
        .await;

        assert!(matches!(result, Err(CompletionError::Timeout { attempts: 2 })));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn exhausted_overload_maps_to_service_unavailable() {
        let result = run_with_retry(MAX_ATTEMPTS, |_| async {
            Err(AttemptError::Retryable(RetryReason::Status(503)))
        })
        .await;

        assert!(matches!(
            result,
            Err(CompletionError::ServiceUnavailable {
                status: 503,
                attempts: 2
            })
        ));
    }

    #[tokio::test]
    async fn first_success_makes_exactly_one_attempt() {
        let mut calls = 0;
        let result = run_with_retry(MAX_ATTEMPTS, |_| {
            calls += 1;
            async { Ok("body".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls, 1);
    }

    #[test]
    fn chat_messages_serialize_with_lowercase_roles() {
        let msg = serde_json::to_value(ChatMessage::system("be terse")).unwrap();
        assert_eq!(msg["role"], "system");
        assert_eq!(msg["content"], "be terse");

        let msg = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(msg["role"], "user");
    }

    #[test]
    fn provider_profiles_expose_their_endpoints() {
        let openai = OpenAiProfile {
            api_key: "k".into(),
        };
        assert_eq!(openai.base_url(), "https://api.openai.com/v1");

        let openrouter = OpenRouterProfile {
            api_key: "k".into(),
            referer: "http://localhost:3000".into(),
            title: "Assistant".into(),
        };
        assert_eq!(openrouter.base_url(), "https://openrouter.ai/api/v1");
    }

    #[test]
    fn openrouter_sends_attribution_headers() {
        let profile = OpenRouterProfile {
            api_key: "k".into(),
            referer: "http://localhost:3000".into(),
            title: "Assistant".into(),
        };
        let headers = profile.build_headers().unwrap();

        assert_eq!(headers.get("HTTP-Referer").unwrap(), "http://localhost:3000");
        assert_eq!(headers.get("X-Title").unwrap(), "Assistant");
        assert!(headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn openai_sends_only_auth_and_content_type() {
        let profile = OpenAiProfile {
            api_key: "k".into(),
        };
        let headers = profile.build_headers().unwrap();

        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key(AUTHORIZATION));
        assert!(headers.contains_key(CONTENT_TYPE));
    }
}
