//! Tool dispatch: turns model-issued tool calls into [`ToolOutcome`]s.
//!
//! Dispatch never fails: malformed arguments, unknown tools, a missing
//! credential, and executor errors all become error payloads that go back
//! to the model as the tool result.

use chrono::Utc;
use futures::future::join_all;
use recruitr_core::error::ToolError;
use recruitr_core::event::{DomainEvent, EventBus};
use recruitr_core::graphql::{Credential, GraphQlExecutor};
use recruitr_core::message::MessageToolCall;
use recruitr_core::provider::Provider;
use recruitr_core::tool::{Invocation, ToolContext, ToolOutcome, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    executor: Arc<dyn GraphQlExecutor>,
    provider: Arc<dyn Provider>,
    model: String,
    events: Option<Arc<EventBus>>,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        executor: Arc<dyn GraphQlExecutor>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            executor,
            provider,
            model: model.into(),
            events: None,
        }
    }

    /// Publish a `ToolExecuted` event for every dispatch.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run every call concurrently. Results come back in the order the calls
    /// were issued, whatever order they complete in.
    pub async fn dispatch_all(
        &self,
        session_id: &str,
        calls: &[MessageToolCall],
        credential: Option<&Credential>,
    ) -> Vec<(MessageToolCall, ToolOutcome)> {
        let outcomes = join_all(
            calls
                .iter()
                .map(|call| self.dispatch(session_id, call, credential)),
        )
        .await;
        calls.iter().cloned().zip(outcomes).collect()
    }

    /// Run one tool call.
    pub async fn dispatch(
        &self,
        session_id: &str,
        call: &MessageToolCall,
        credential: Option<&Credential>,
    ) -> ToolOutcome {
        let started = Instant::now();
        let outcome = self.run(call, credential).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            ToolOutcome::Success(_) => {
                debug!(session_id, tool = %call.name, call_id = %call.id, duration_ms, "Tool succeeded")
            }
            ToolOutcome::Failure { error, .. } => {
                warn!(session_id, tool = %call.name, call_id = %call.id, duration_ms, %error, "Tool failed")
            }
        }

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ToolExecuted {
                session_id: session_id.to_string(),
                tool_name: call.name.clone(),
                success: outcome.is_success(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        outcome
    }

    async fn run(&self, call: &MessageToolCall, credential: Option<&Credential>) -> ToolOutcome {
        let raw = call.arguments.trim();
        let arguments: serde_json::Value = if raw.is_empty() {
            json!({})
        } else {
            match serde_json::from_str(raw) {
                Ok(value) => value,
                Err(e) => {
                    return ToolOutcome::failure(
                        ToolError::InvalidArguments(e.to_string()).to_string(),
                        json!({ "tool": call.name, "arguments": call.arguments }),
                    );
                }
            }
        };

        let Some(descriptor) = self.registry.resolve(&call.name) else {
            return ToolOutcome::failure(
                ToolError::NotFound(call.name.clone()).to_string(),
                json!({ "tool": call.name }),
            );
        };

        let Some(credential) = credential else {
            return ToolOutcome::failure(
                ToolError::MissingCredential.to_string(),
                json!({ "tool": call.name }),
            );
        };

        match &descriptor.invocation {
            Invocation::Query { document } => {
                if !arguments.is_object() {
                    return ToolOutcome::failure(
                        ToolError::InvalidArguments("expected a JSON object".into()).to_string(),
                        json!({ "tool": call.name, "arguments": call.arguments }),
                    );
                }
                match self.executor.execute(credential, document, arguments.clone()).await {
                    Ok(data) => ToolOutcome::Success(data),
                    Err(e) => ToolOutcome::failure(
                        e.to_string(),
                        json!({ "tool": call.name, "variables": arguments }),
                    ),
                }
            }
            Invocation::Composite(tool) => {
                let ctx = ToolContext {
                    executor: self.executor.as_ref(),
                    provider: self.provider.as_ref(),
                    model: &self.model,
                    credential,
                };
                match tool.run(arguments, &ctx).await {
                    Ok(result) => ToolOutcome::Success(result),
                    Err(e) => composite_failure(&call.name, e),
                }
            }
        }
    }
}

fn composite_failure(tool: &str, error: ToolError) -> ToolOutcome {
    let message = error.to_string();
    let context = match error {
        ToolError::StepFailed { step, created, .. } => {
            let mut context = json!({ "tool": tool, "step": step });
            if let (Some(context), Some(created)) = (context.as_object_mut(), created.as_object()) {
                context.extend(created.clone());
            }
            context
        }
        _ => json!({ "tool": tool }),
    };
    ToolOutcome::failure(message, context)
}
