//! LLM Client — the `LanguageModel` seam plus an HTTP implementation for
//! OpenAI-compatible, Ollama and Gemini backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse, Role};

/// Anything that can turn a request into generated text.
///
/// `Ok(None)` means the provider answered but produced no text. Errors are
/// reserved for failed calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: &LlmRequest) -> Result<Option<LlmResponse>, LlmError>;
}

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// Ollama running locally.
    Ollama { base_url: String },
    /// Google Gemini `generateContent` API.
    Gemini { base_url: String, api_key: String },
    /// No LLM available; all calls return `Unavailable`.
    None,
}

impl LlmProvider {
    /// Short provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible { .. } => "openai",
            Self::Ollama { .. } => "ollama",
            Self::Gemini { .. } => "gemini",
            Self::None => "none",
        }
    }
}

/// HTTP client that routes requests to the configured backend.
#[derive(Debug)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
        }
    }

    /// Create a client with no LLM backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Check if the client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// The configured provider.
    #[must_use]
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// The configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the built request with retries, returning the parsed JSON of the
    /// first successful response and its latency.
    async fn post_with_retries(
        &self,
        request: &LlmRequest,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> Result<(Value, u64), LlmError> {
        let provider = self.provider.name();
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    provider,
                    "Retrying LLM call (attempt {}/{})",
                    attempt + 1,
                    self.max_retries + 1
                );
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }

            let start = Instant::now();
            let result = build()
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let err = match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    return Ok((json, latency_ms));
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let text = resp.text().await.unwrap_or_default();
                    let body: String = text.chars().take(512).collect();
                    LlmError::Provider { status, body }
                }
                Err(e) if e.is_timeout() => LlmError::Timeout(request.timeout_ms),
                Err(e) => LlmError::from(e),
            };

            warn!(provider, attempt = attempt + 1, "LLM request failed: {err}");
            if !err.is_transient() {
                return Err(err);
            }
            last_error = err.to_string();
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<Option<LlmResponse>, LlmError> {
        if request.web_search {
            warn!("Chat completions have no web search tool; answering from model knowledge only");
        }
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let body = openai_body(&self.model, request);
        let (json, latency_ms) = self
            .post_with_retries(request, || {
                self.http.post(&url).bearer_auth(api_key).json(&body)
            })
            .await?;

        let tokens = json["usage"]["completion_tokens"].as_u64().unwrap_or(0);
        Ok(openai_text(&json).map(|text| self.response(text, tokens, latency_ms)))
    }

    async fn generate_ollama(
        &self,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<Option<LlmResponse>, LlmError> {
        if request.web_search {
            warn!("Ollama has no web search; answering from model knowledge only");
        }
        let url = format!("{}/api/chat", base_url.trim_end_matches('/'));
        let body = ollama_body(&self.model, request);
        let (json, latency_ms) = self
            .post_with_retries(request, || self.http.post(&url).json(&body))
            .await?;

        let tokens = json["eval_count"].as_u64().unwrap_or(0);
        Ok(ollama_text(&json).map(|text| self.response(text, tokens, latency_ms)))
    }

    async fn generate_gemini(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<Option<LlmResponse>, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            self.model
        );
        let body = gemini_body(request);
        let (json, latency_ms) = self
            .post_with_retries(request, || {
                self.http
                    .post(&url)
                    .header("x-goog-api-key", api_key)
                    .json(&body)
            })
            .await?;

        let tokens = json["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0);
        Ok(gemini_text(&json).map(|text| self.response(text, tokens, latency_ms)))
    }

    fn response(&self, text: String, tokens: u64, latency_ms: u64) -> LlmResponse {
        LlmResponse {
            text,
            tokens_generated: u32::try_from(tokens).unwrap_or(u32::MAX),
            latency_ms,
            model: self.model.clone(),
        }
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn generate(&self, request: &LlmRequest) -> Result<Option<LlmResponse>, LlmError> {
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            prompt_chars = request.prompt.len(),
            history = request.history.len(),
            web_search = request.web_search,
            "Sending LLM request"
        );
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, request).await,
            LlmProvider::Gemini { base_url, api_key } => {
                self.generate_gemini(base_url, api_key, request).await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

/// Role-tagged message list: system first, then history, then the prompt.
fn chat_messages(request: &LlmRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    for turn in &request.history {
        messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));
    messages
}

/// `web_search` is not sent: chat completions only accept typed function
/// tools, and an untyped search tool is rejected with 400.
fn openai_body(model: &str, request: &LlmRequest) -> Value {
    json!({
        "model": model,
        "messages": chat_messages(request),
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    })
}

fn ollama_body(model: &str, request: &LlmRequest) -> Value {
    json!({
        "model": model,
        "messages": chat_messages(request),
        "stream": false,
        "options": {
            "temperature": request.temperature,
            "num_predict": request.max_tokens,
        }
    })
}

fn gemini_body(request: &LlmRequest) -> Value {
    let mut contents: Vec<Value> = request
        .history
        .iter()
        .filter_map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => {
                    debug!("Skipping system turn in Gemini history");
                    return None;
                }
            };
            Some(json!({ "role": role, "parts": [{ "text": turn.content }] }))
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": request.prompt }] }));

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        }
    });
    if let Some(system) = &request.system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    if request.web_search {
        body["tools"] = json!([{ "google_search": {} }]);
    }
    body
}

fn non_empty(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn openai_text(json: &Value) -> Option<String> {
    json["choices"][0]["message"]["content"].as_str().and_then(non_empty)
}

fn ollama_text(json: &Value) -> Option<String> {
    json["message"]["content"].as_str().and_then(non_empty)
}

/// Gemini splits answers into parts; grounded answers often have several.
fn gemini_text(json: &Value) -> Option<String> {
    let parts = json["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    non_empty(&text)
}
