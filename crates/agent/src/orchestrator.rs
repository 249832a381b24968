//! The orchestration loop.
//!
//! One turn runs under the session lock and moves through
//! `AwaitingUser → Requesting → (Executing → Requesting)* → Done`, or ends
//! in `Aborted` when the tool round limit is hit. Every message is persisted
//! as soon as it exists, and tool results are written back as one batch
//! before the next request, so the stored transcript never holds a tool
//! request without its answers once a turn has finished.

use crate::prompts::{RESTART_MESSAGE, ROUND_LIMIT_MESSAGE, SYSTEM_PROMPT};
use chrono::Utc;
use recruitr_config::{AgentMode, AppConfig};
use recruitr_core::error::{Error, ProviderError, Result};
use recruitr_core::event::{DomainEvent, EventBus, ResetReason};
use recruitr_core::graphql::Credential;
use recruitr_core::message::{Conversation, Message, MessageToolCall};
use recruitr_core::provider::{Provider, ProviderRequest, ToolChoice};
use recruitr_core::store::KvStore;
use recruitr_store::{ConversationStore, CredentialCache, SessionLocks, SessionOwners};
use recruitr_tools::ToolDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where a turn is.
#[derive(Debug)]
enum TurnState {
    AwaitingUser(String),
    Requesting,
    Executing(Vec<MessageToolCall>),
    Done(String),
    Aborted,
}

/// Drives turns for any number of sessions. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
    conversations: Arc<ConversationStore>,
    credentials: Arc<CredentialCache>,
    owners: Arc<SessionOwners>,
    locks: Arc<SessionLocks>,
    events: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_rounds: u32,
    mode: AgentMode,
    admin_secret: Option<String>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: ToolDispatcher,
        kv: Arc<dyn KvStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            dispatcher: Arc::new(dispatcher),
            conversations: Arc::new(ConversationStore::new(kv.clone(), SYSTEM_PROMPT)),
            credentials: Arc::new(CredentialCache::new(kv.clone(), Duration::from_secs(3_600))),
            owners: Arc::new(SessionOwners::new(kv)),
            locks: Arc::new(SessionLocks::new()),
            events: Arc::new(EventBus::default()),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_rounds: 5,
            mode: AgentMode::Interactive,
            admin_secret: None,
        }
    }

    /// Build from configuration. `dispatcher` must share `events` to have
    /// its tool events seen by subscribers.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        dispatcher: ToolDispatcher,
        kv: Arc<dyn KvStore>,
        events: Arc<EventBus>,
    ) -> Self {
        let mut orchestrator = Self::new(provider, dispatcher, kv.clone(), &config.llm.model)
            .with_max_rounds(config.agent.max_rounds)
            .with_mode(config.agent.mode, config.graphql.admin_secret.clone())
            .with_events(events);
        orchestrator.conversations = Arc::new(
            ConversationStore::new(kv.clone(), SYSTEM_PROMPT)
                .with_ttl(Duration::from_secs(config.store.conversation_ttl_secs)),
        );
        orchestrator.credentials = Arc::new(CredentialCache::new(
            kv.clone(),
            Duration::from_secs(config.store.credential_ttl_secs),
        ));
        orchestrator.owners = Arc::new(
            SessionOwners::new(kv)
                .with_ttl(Duration::from_secs(config.store.conversation_ttl_secs)),
        );
        orchestrator.temperature = config.llm.temperature;
        orchestrator.max_tokens = config.llm.max_tokens;
        orchestrator
    }

    /// Tool rounds allowed per turn.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Choose the credential source. `admin_secret` is used in batch mode.
    pub fn with_mode(mut self, mode: AgentMode, admin_secret: Option<String>) -> Self {
        self.mode = mode;
        self.admin_secret = admin_secret;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Run one turn and return the assistant's reply.
    ///
    /// The turn runs on its own task. If the caller stops waiting, the turn
    /// (including in-flight tool calls) still completes and persists; only
    /// the reply is lost.
    pub async fn submit_message(&self, session_id: &str, text: &str) -> Result<String> {
        let this = self.clone();
        let session_id = session_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move { this.run_turn(&session_id, text).await })
            .await
            .map_err(|e| Error::Internal(format!("turn task failed: {e}")))?
    }

    /// Truncate the session's transcript to the system message.
    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.locks.lock(session_id).await;
        self.reset(session_id, ResetReason::Requested).await
    }

    /// Check that `identity` may use the session.
    ///
    /// The first verified caller to touch an unowned session claims it.
    /// After that only the same identity is admitted; anonymous callers
    /// keep access to unowned sessions only.
    pub async fn authorize(&self, session_id: &str, identity: Option<&str>) -> Result<()> {
        let _guard = self.locks.lock(session_id).await;
        match (self.owners.get(session_id).await?, identity) {
            (None, Some(identity)) => {
                self.owners.claim(session_id, identity).await?;
                debug!(session_id, "Session claimed");
                Ok(())
            }
            (None, None) => Ok(()),
            (Some(owner), Some(identity)) if owner == identity => Ok(()),
            (Some(_), _) => {
                warn!(session_id, "Rejected access to a session owned by another caller");
                Err(Error::AccessDenied(format!(
                    "session {session_id} belongs to another caller"
                )))
            }
        }
    }

    /// Forget the session entirely.
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.locks.lock(session_id).await;
        self.conversations.evict(session_id).await?;
        self.credentials.clear(session_id).await?;
        self.owners.clear(session_id).await?;
        info!(session_id, "Session ended");
        Ok(())
    }

    /// Cache the caller's bearer token for this session's tool calls.
    pub async fn store_credential(
        &self,
        session_id: &str,
        token: impl Into<String>,
        user_id: Option<String>,
    ) -> Result<()> {
        let credential = Credential::Bearer {
            token: token.into(),
            user_id,
        };
        self.credentials.put(session_id, &credential).await?;
        Ok(())
    }

    /// The session's current transcript.
    pub async fn transcript(&self, session_id: &str) -> Result<Conversation> {
        Ok(self.conversations.load(session_id).await?)
    }

    async fn credential_for(&self, session_id: &str) -> Result<Option<Credential>> {
        match self.mode {
            AgentMode::Interactive => Ok(self.credentials.get(session_id).await?),
            AgentMode::Batch => Ok(self
                .admin_secret
                .clone()
                .map(|secret| Credential::Admin { secret })),
        }
    }

    async fn reset(&self, session_id: &str, reason: ResetReason) -> Result<()> {
        self.conversations.reset(session_id).await?;
        info!(session_id, ?reason, "Session reset");
        self.events.publish(DomainEvent::SessionReset {
            session_id: session_id.to_string(),
            reason,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn report(&self, context: &str, err: &Error) {
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn run_turn(&self, session_id: &str, text: String) -> Result<String> {
        let _guard = self.locks.lock(session_id).await;
        info!(session_id, "Turn started");

        let credential = self.credential_for(session_id).await?;
        if credential.is_none() {
            debug!(session_id, mode = ?self.mode, "No credential for this session");
        }

        let tools = self.dispatcher.registry().definitions();
        let mut round = 0u32;
        let mut tokens_used = 0u32;
        let mut state = TurnState::AwaitingUser(text);

        loop {
            state = match state {
                TurnState::AwaitingUser(text) => {
                    self.conversations
                        .append(session_id, Message::user(text))
                        .await?;
                    TurnState::Requesting
                }

                TurnState::Requesting => {
                    let conversation = self.conversations.load(session_id).await?;
                    debug!(session_id, round, messages = conversation.len(), "Requesting completion");

                    let request = ProviderRequest {
                        model: self.model.clone(),
                        messages: conversation.messages().to_vec(),
                        temperature: self.temperature,
                        max_tokens: self.max_tokens,
                        tools: tools.clone(),
                        tool_choice: ToolChoice::Auto,
                    };

                    let response = match self.provider.complete(request).await {
                        Ok(response) => response,
                        Err(ProviderError::TranscriptDesync(detail)) => {
                            warn!(session_id, %detail, "Provider rejected the transcript, resetting");
                            self.reset(session_id, ResetReason::Desync).await?;
                            return Ok(RESTART_MESSAGE.to_string());
                        }
                        Err(e) => {
                            let err = Error::from(e);
                            error!(session_id, error = %err, "Completion failed");
                            self.report("completion", &err);
                            return Err(err);
                        }
                    };

                    if let Some(usage) = &response.usage {
                        tokens_used = tokens_used.saturating_add(usage.total_tokens);
                    }

                    let calls = response.message.tool_calls().to_vec();
                    if calls.is_empty() {
                        let reply = response.message.content().unwrap_or_default().to_string();
                        self.conversations
                            .append(session_id, response.message)
                            .await?;
                        TurnState::Done(reply)
                    } else {
                        self.conversations
                            .append(session_id, response.message)
                            .await?;
                        TurnState::Executing(calls)
                    }
                }

                TurnState::Executing(calls) => {
                    debug!(session_id, round, tool_count = calls.len(), "Executing tool calls");
                    let results = self
                        .dispatcher
                        .dispatch_all(session_id, &calls, credential.as_ref())
                        .await;

                    let tool_messages: Vec<Message> = results
                        .into_iter()
                        .map(|(call, outcome)| {
                            Message::tool_result(call.id, call.name, outcome.to_payload().to_string())
                        })
                        .collect();

                    if let Err(e) = self.conversations.append_all(session_id, tool_messages).await {
                        let err = Error::from(e);
                        error!(session_id, error = %err, "Failed to write back tool results");
                        self.report("tool write-back", &err);
                        if let Err(reset_err) = self.reset(session_id, ResetReason::WriteBackFailed).await {
                            error!(session_id, error = %reset_err, "Reset after failed write-back also failed");
                        }
                        return Err(err);
                    }

                    round += 1;
                    if round >= self.max_rounds {
                        TurnState::Aborted
                    } else {
                        TurnState::Requesting
                    }
                }

                TurnState::Done(reply) => {
                    info!(session_id, rounds = round, tokens_used, "Turn completed");
                    self.events.publish(DomainEvent::TurnCompleted {
                        session_id: session_id.to_string(),
                        rounds: round,
                        tokens_used,
                        timestamp: Utc::now(),
                    });
                    return Ok(reply);
                }

                TurnState::Aborted => {
                    warn!(session_id, rounds = round, "Tool round limit reached, resetting");
                    self.reset(session_id, ResetReason::RoundLimit).await?;
                    return Ok(ROUND_LIMIT_MESSAGE.to_string());
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recruitr_core::error::StoreError;
    use recruitr_core::message::Role;
    use recruitr_core::provider::ProviderResponse;
    use recruitr_core::testing::{
        MockExecutor, SequentialMockProvider, make_text_response, make_tool_call,
        make_tool_call_response,
    };
    use recruitr_store::InMemoryKv;
    use serde_json::json;

    const SECRET: &str = "hasura-secret";

    struct Harness {
        orchestrator: Orchestrator,
        provider: Arc<SequentialMockProvider>,
        executor: Arc<MockExecutor>,
        kv: Arc<dyn KvStore>,
    }

    fn harness_with(provider: SequentialMockProvider, kv: Arc<dyn KvStore>, mode: AgentMode) -> Harness {
        let provider = Arc::new(provider);
        let executor = Arc::new(MockExecutor::echo());
        let dispatcher = ToolDispatcher::new(
            recruitr_tools::registry(),
            executor.clone(),
            provider.clone(),
            "mock-model",
        );
        let orchestrator = Orchestrator::new(provider.clone(), dispatcher, kv.clone(), "mock-model")
            .with_mode(mode, Some(SECRET.into()));
        Harness {
            orchestrator,
            provider,
            executor,
            kv,
        }
    }

    fn harness(responses: Vec<ProviderResponse>) -> Harness {
        harness_with(
            SequentialMockProvider::new(responses),
            Arc::new(InMemoryKv::new()),
            AgentMode::Batch,
        )
    }

    fn top_candidates(id: &str) -> MessageToolCall {
        make_tool_call(id, "getTopCandidates", json!({ "pipeline_id": "p-1", "limit": 3 }))
    }

    fn tool_round(id: &str) -> ProviderResponse {
        make_tool_call_response(vec![top_candidates(id)])
    }

    #[tokio::test]
    async fn plain_answer_is_returned_and_persisted() {
        let h = harness(vec![make_text_response("Hello! How can I help?")]);

        let reply = h.orchestrator.submit_message("s1", "Hi").await.unwrap();
        assert_eq!(reply, "Hello! How can I help?");

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        // System + User + Assistant
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.messages()[1], Message::user("Hi"));
        assert_eq!(transcript.messages()[2], Message::assistant("Hello! How can I help?"));

        let requests = h.provider.requests();
        assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
        assert_eq!(requests[0].tools.len(), recruitr_tools::registry().len());
    }

    #[tokio::test]
    async fn system_message_stays_first_across_turns() {
        let h = harness(vec![
            make_text_response("one"),
            tool_round("c1"),
            make_text_response("two"),
        ]);

        h.orchestrator.submit_message("s1", "first").await.unwrap();
        h.orchestrator.submit_message("s1", "second").await.unwrap();

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        assert_eq!(transcript.messages()[0], Message::system(SYSTEM_PROMPT));
        assert_eq!(
            transcript
                .messages()
                .iter()
                .filter(|m| m.role() == Role::System)
                .count(),
            1
        );
        for request in h.provider.requests() {
            assert_eq!(request.messages[0], Message::system(SYSTEM_PROMPT));
        }
    }

    #[tokio::test]
    async fn tool_results_answer_every_call_in_order() {
        let h = harness(vec![
            make_tool_call_response(vec![
                top_candidates("call_a"),
                make_tool_call("call_b", "getRecentPipeline", json!({})),
            ]),
            make_text_response("Here are your candidates."),
        ]);

        let reply = h.orchestrator.submit_message("s1", "Top candidates?").await.unwrap();
        assert_eq!(reply, "Here are your candidates.");

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        let tool_ids: Vec<_> = transcript
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tool_ids, vec!["call_a", "call_b"]);
        assert!(transcript.unanswered_tool_calls().is_empty());

        // The executor received the model's arguments as variables.
        let calls = h.executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].variables["pipeline_id"], "p-1");
        let payload: serde_json::Value =
            serde_json::from_str(transcript.messages()[3].content().unwrap()).unwrap();
        assert_eq!(payload["echo"]["limit"], 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_first_tool_result_still_lands_first() {
        let call = |id: &str, delay: u64| {
            make_tool_call(id, "getTopCandidates", json!({ "pipeline_id": "p-1", "delay_ms": delay }))
        };
        let h = harness(vec![
            make_tool_call_response(vec![call("A", 300), call("B", 10), call("C", 100)]),
            make_text_response("done"),
        ]);

        let started = tokio::time::Instant::now();
        h.orchestrator.submit_message("s1", "compare").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(400));

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        let results: Vec<_> = transcript
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, content, .. } => {
                    let payload: serde_json::Value = serde_json::from_str(content).unwrap();
                    Some((tool_call_id.as_str(), payload["echo"]["delay_ms"].as_u64()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            results,
            vec![("A", Some(300)), ("B", Some(10)), ("C", Some(100))]
        );
    }

    #[tokio::test]
    async fn five_tool_rounds_abort_and_reset() {
        let h = harness((1..=5).map(|i| tool_round(&format!("c{i}"))).collect());
        let mut rx = h.orchestrator.events().subscribe();

        let reply = h.orchestrator.submit_message("s1", "Loop forever").await.unwrap();
        assert_eq!(reply, ROUND_LIMIT_MESSAGE);
        assert_eq!(h.provider.call_count(), 5);

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        assert_eq!(transcript.messages(), &[Message::system(SYSTEM_PROMPT)]);

        let mut saw_reset = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::SessionReset { reason, .. } = event.as_ref() {
                assert_eq!(*reason, ResetReason::RoundLimit);
                saw_reset = true;
            }
        }
        assert!(saw_reset);
    }

    #[tokio::test]
    async fn four_tool_rounds_then_answer_completes() {
        let mut responses: Vec<_> = (1..=4).map(|i| tool_round(&format!("c{i}"))).collect();
        responses.push(make_text_response("Done at last."));
        let h = harness(responses);
        let mut rx = h.orchestrator.events().subscribe();

        let reply = h.orchestrator.submit_message("s1", "Dig deep").await.unwrap();
        assert_eq!(reply, "Done at last.");
        assert_eq!(h.provider.call_count(), 5);

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        // System + User + 4 × (Assistant + Tool) + Assistant
        assert_eq!(transcript.len(), 11);

        let completed = std::iter::from_fn(|| rx.try_recv().ok()).find_map(|event| match event.as_ref() {
            DomainEvent::TurnCompleted {
                rounds, tokens_used, ..
            } => Some((*rounds, *tokens_used)),
            _ => None,
        });
        assert_eq!(completed, Some((4, 75)));
    }

    #[tokio::test]
    async fn orphaned_transcript_is_reset_with_restart_message() {
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
        let corrupted = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user("show me candidates"),
            Message::assistant_tool_calls(None, vec![top_candidates("orphan")]),
        ];
        kv.set(
            "conversation:s1",
            &serde_json::to_string(&corrupted).unwrap(),
            None,
        )
        .await
        .unwrap();

        let h = harness_with(
            SequentialMockProvider::single_text("never sent"),
            kv,
            AgentMode::Batch,
        );

        let reply = h.orchestrator.submit_message("s1", "hello?").await.unwrap();
        assert_eq!(reply, RESTART_MESSAGE);

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        assert_eq!(transcript.messages(), &[Message::system(SYSTEM_PROMPT)]);
        assert_eq!(h.provider.remaining(), 1);

        // The next turn starts clean.
        let reply = h.orchestrator.submit_message("s1", "hello again").await.unwrap();
        assert_eq!(reply, "never sent");
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result_and_turn_continues() {
        let h = harness(vec![
            make_tool_call_response(vec![make_tool_call("c1", "fireEveryone", json!({}))]),
            make_text_response("I can't do that."),
        ]);

        let reply = h.orchestrator.submit_message("s1", "Fire everyone").await.unwrap();
        assert_eq!(reply, "I can't do that.");

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        let payload: serde_json::Value =
            serde_json::from_str(transcript.messages()[3].content().unwrap()).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("fireEveryone"));
        assert!(h.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_propagates_and_keeps_user_message() {
        let h = harness_with(
            SequentialMockProvider::scripted(vec![Err(ProviderError::RateLimited {
                retry_after_secs: 30,
            })]),
            Arc::new(InMemoryKv::new()),
            AgentMode::Batch,
        );
        let mut rx = h.orchestrator.events().subscribe();

        let err = h.orchestrator.submit_message("s1", "Hi").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::RateLimited { retry_after_secs: 30 })
        ));

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            DomainEvent::ErrorOccurred { .. }
        ));
    }

    #[tokio::test]
    async fn interactive_session_without_token_gets_credential_errors() {
        let h = harness_with(
            SequentialMockProvider::new(vec![tool_round("c1"), make_text_response("Please log in.")]),
            Arc::new(InMemoryKv::new()),
            AgentMode::Interactive,
        );

        let reply = h.orchestrator.submit_message("s1", "Top candidates?").await.unwrap();
        assert_eq!(reply, "Please log in.");
        assert!(h.executor.calls().is_empty());

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        let payload: serde_json::Value =
            serde_json::from_str(transcript.messages()[3].content().unwrap()).unwrap();
        assert_eq!(payload["error"], "No credential available for this session");
    }

    #[tokio::test]
    async fn interactive_session_uses_stored_bearer_token() {
        let h = harness_with(
            SequentialMockProvider::tool_then_answer(vec![top_candidates("c1")], "ok"),
            Arc::new(InMemoryKv::new()),
            AgentMode::Interactive,
        );
        h.orchestrator
            .store_credential("s1", "jwt-token", Some("u-1".into()))
            .await
            .unwrap();

        h.orchestrator.submit_message("s1", "Top candidates?").await.unwrap();

        assert_eq!(
            h.executor.calls()[0].credential,
            Credential::Bearer {
                token: "jwt-token".into(),
                user_id: Some("u-1".into()),
            }
        );
    }

    #[tokio::test]
    async fn batch_mode_uses_admin_secret() {
        let h = harness(vec![tool_round("c1"), make_text_response("ok")]);

        h.orchestrator.submit_message("s1", "Top candidates?").await.unwrap();

        assert_eq!(
            h.executor.calls()[0].credential,
            Credential::Admin {
                secret: SECRET.into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_turn_still_finishes_and_persists() {
        let h = harness(vec![
            make_tool_call_response(vec![make_tool_call(
                "slow",
                "getTopCandidates",
                json!({ "pipeline_id": "p-1", "delay_ms": 500 }),
            )]),
            make_text_response("Finished anyway."),
        ]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            h.orchestrator.submit_message("s1", "Slow query"),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        assert!(transcript.unanswered_tool_calls().is_empty());
        assert_eq!(transcript.last(), Some(&Message::assistant("Finished anyway.")));
        assert_eq!(transcript.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn turns_on_one_session_do_not_interleave() {
        let h = harness(vec![
            make_tool_call_response(vec![make_tool_call(
                "c1",
                "getTopCandidates",
                json!({ "pipeline_id": "p-1", "delay_ms": 200 }),
            )]),
            make_text_response("first"),
            make_text_response("second"),
        ]);

        let (a, b) = tokio::join!(
            h.orchestrator.submit_message("s1", "one"),
            h.orchestrator.submit_message("s1", "two"),
        );
        let mut replies = vec![a.unwrap(), b.unwrap()];
        replies.sort();
        assert_eq!(replies, vec!["first", "second"]);

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        // System + (User + Assistant + Tool + Assistant) + (User + Assistant)
        assert_eq!(transcript.len(), 7);
        assert!(transcript.unanswered_tool_calls().is_empty());
        let roles: Vec<_> = transcript.messages().iter().map(Message::role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
                Role::User,
                Role::Assistant,
            ]
        );
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let h = harness(vec![make_text_response("for a"), make_text_response("for b")]);

        h.orchestrator.submit_message("a", "hi").await.unwrap();
        h.orchestrator.submit_message("b", "hi").await.unwrap();

        h.orchestrator.reset_session("a").await.unwrap();
        assert_eq!(h.orchestrator.transcript("a").await.unwrap().len(), 1);
        assert_eq!(h.orchestrator.transcript("b").await.unwrap().len(), 3);
    }

    /// Fails every write that carries tool results.
    struct ToolWriteFails(InMemoryKv);

    #[async_trait]
    impl KvStore for ToolWriteFails {
        fn name(&self) -> &str {
            "tool_write_fails"
        }

        async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
            self.0.get(key).await
        }

        async fn set(
            &self,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> std::result::Result<(), StoreError> {
            if value.contains("tool_call_id") {
                return Err(StoreError::Storage("disk full".into()));
            }
            self.0.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
            self.0.delete(key).await
        }
    }

    #[tokio::test]
    async fn failed_write_back_resets_and_propagates() {
        let h = harness_with(
            SequentialMockProvider::tool_then_answer(vec![top_candidates("c1")], "unreachable"),
            Arc::new(ToolWriteFails(InMemoryKv::new())),
            AgentMode::Batch,
        );

        let err = h.orchestrator.submit_message("s1", "Top candidates?").await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Storage(_))));

        let transcript = h.orchestrator.transcript("s1").await.unwrap();
        assert_eq!(transcript.messages(), &[Message::system(SYSTEM_PROMPT)]);
        assert!(h.kv.get("conversation:s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn end_session_forgets_transcript_and_credential() {
        let h = harness_with(
            SequentialMockProvider::single_text("hi"),
            Arc::new(InMemoryKv::new()),
            AgentMode::Interactive,
        );
        h.orchestrator.store_credential("s1", "jwt", None).await.unwrap();
        h.orchestrator.submit_message("s1", "hello").await.unwrap();

        h.orchestrator.end_session("s1").await.unwrap();

        assert!(h.kv.get("conversation:s1").await.unwrap().is_none());
        assert!(h.kv.get("credential:s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_verified_caller_owns_the_session() {
        let h = harness(vec![]);

        h.orchestrator.authorize("s1", None).await.unwrap();
        h.orchestrator.authorize("s1", Some("u-1")).await.unwrap();
        h.orchestrator.authorize("s1", Some("u-1")).await.unwrap();

        let other = h.orchestrator.authorize("s1", Some("u-2")).await;
        assert!(matches!(other, Err(Error::AccessDenied(_))));
        let anonymous = h.orchestrator.authorize("s1", None).await;
        assert!(matches!(anonymous, Err(Error::AccessDenied(_))));

        // Other sessions are unaffected.
        h.orchestrator.authorize("s2", Some("u-2")).await.unwrap();
    }

    #[tokio::test]
    async fn ending_a_session_releases_ownership() {
        let h = harness(vec![]);
        h.orchestrator.authorize("s1", Some("u-1")).await.unwrap();
        h.orchestrator.end_session("s1").await.unwrap();

        assert!(h.kv.get("owner:s1").await.unwrap().is_none());
        h.orchestrator.authorize("s1", Some("u-2")).await.unwrap();
    }
}
