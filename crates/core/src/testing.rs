//! Scripted collaborators for tests across the workspace.
//!
//! Enabled with the `test-util` feature.

use crate::error::{GraphQlError, ProviderError};
use crate::graphql::{Credential, GraphQlExecutor};
use crate::message::{Message, MessageToolCall, unanswered_tool_calls};
use crate::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next entry in the queue and records
/// the request. A request whose transcript has unanswered tool calls is rejected with [`ProviderError::TranscriptDesync`] without
/// consuming the script, the way the real service behaves.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let orphans: Vec<String> = unanswered_tool_calls(&request.messages)
            .into_iter()
            .map(String::from)
            .collect();
        lock(&self.requests).push(request);

        if !orphans.is_empty() {
            return Err(ProviderError::TranscriptDesync(format!(
                "An assistant message with 'tool_calls' must be followed by tool messages \
                 responding to each 'tool_call_id'. Missing: {}",
                orphans.join(", ")
            )));
        }

        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "SequentialMockProvider: no more responses".into(),
                })
            })
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response requesting tool calls.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls(None, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

type Handler =
    Box<dyn Fn(&str, &serde_json::Value) -> Result<serde_json::Value, GraphQlError> + Send + Sync>;

/// One recorded call to [`MockExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutedDocument {
    pub credential: Credential,
    pub document: String,
    pub variables: serde_json::Value,
}

/// A GraphQL executor answering through a closure.
///
/// A numeric `delay_ms` variable makes the call sleep that long first, so
/// tests can shape completion order.
pub struct MockExecutor {
    handler: Handler,
    calls: Mutex<Vec<ExecutedDocument>>,
}

impl MockExecutor {
    pub fn new(
        handler: impl Fn(&str, &serde_json::Value) -> Result<serde_json::Value, GraphQlError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every document with its variables.
    pub fn echo() -> Self {
        Self::new(|_, variables| Ok(serde_json::json!({ "echo": variables })))
    }

    pub fn calls(&self) -> Vec<ExecutedDocument> {
        lock(&self.calls).clone()
    }
}

#[async_trait::async_trait]
impl GraphQlExecutor for MockExecutor {
    async fn execute(
        &self,
        credential: &Credential,
        document: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, GraphQlError> {
        lock(&self.calls).push(ExecutedDocument {
            credential: credential.clone(),
            document: document.to_string(),
            variables: variables.clone(),
        });
        if let Some(delay) = variables.get("delay_ms").and_then(|d| d.as_u64()) {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        (self.handler)(document, &variables)
    }
}
