//! Scripted language model for tests and offline demos.
//!
//! Replies are consumed in order; once the script runs out every call
//! returns `Ok(None)`. Every request is recorded for later inspection.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::LanguageModel;
use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// One queued outcome.
#[derive(Debug)]
pub enum ScriptedReply {
    /// Answer with this text.
    Text(String),
    /// Answer with no text.
    Empty,
    /// Fail the call.
    Fail(LlmError),
}

/// Deterministic [`LanguageModel`] that plays back a script.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    /// Empty script: every call answers `Ok(None)`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script of text replies, in order.
    #[must_use]
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for text in texts {
            model.push_text(text);
        }
        model
    }

    /// Wait this long before answering each call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies.lock().push_back(ScriptedReply::Text(text.into()));
    }

    /// Queue an empty reply.
    pub fn push_empty(&self) {
        self.replies.lock().push_back(ScriptedReply::Empty);
    }

    /// Queue a failure.
    pub fn push_error(&self, err: LlmError) {
        self.replies.lock().push_back(ScriptedReply::Fail(err));
    }

    /// Copies of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Replies not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: &LlmRequest) -> Result<Option<LlmResponse>, LlmError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(ScriptedReply::Text(text)) => Ok(Some(LlmResponse {
                tokens_generated: u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX),
                text,
                latency_ms: 0,
                model: "scripted".to_string(),
            })),
            Some(ScriptedReply::Empty) | None => Ok(None),
            Some(ScriptedReply::Fail(err)) => Err(err),
        }
    }
}
