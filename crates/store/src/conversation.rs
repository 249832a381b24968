//! Session transcripts persisted through a [`KvStore`].
//!
//! Every mutating call loads the current transcript, changes it, and writes
//! the whole message list back in a single `set` before returning. Callers
//! serialize mutations of one session through [`crate::SessionLocks`].

use recruitr_core::error::StoreError;
use recruitr_core::message::{Conversation, Message};
use recruitr_core::store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) fn conversation_key(session_id: &str) -> String {
    format!("conversation:{session_id}")
}

pub struct ConversationStore {
    kv: Arc<dyn KvStore>,
    system_prompt: Arc<str>,
    ttl: Option<Duration>,
}

impl ConversationStore {
    pub fn new(kv: Arc<dyn KvStore>, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            kv,
            system_prompt: system_prompt.into(),
            ttl: None,
        }
    }

    /// Expire idle transcripts after `ttl`. A zero duration disables expiry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// The stored transcript, or a fresh one seeded with the system message.
    ///
    /// Loading never writes. A stored transcript that lost or changed its
    /// system message is repaired in the returned value.
    pub async fn load(&self, session_id: &str) -> Result<Conversation, StoreError> {
        let key = conversation_key(session_id);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(Conversation::seeded(&self.system_prompt));
        };

        let messages: Vec<Message> =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        let conversation = Conversation::restore(&self.system_prompt, messages);
        let orphans = conversation.unanswered_tool_calls();
        if !orphans.is_empty() {
            warn!(session_id, ?orphans, "Loaded transcript has unanswered tool calls");
        }
        Ok(conversation)
    }

    /// Append one message and persist. Returns the appended message.
    pub async fn append(&self, session_id: &str, message: Message) -> Result<Message, StoreError> {
        let mut conversation = self.load(session_id).await?;
        conversation.push(message.clone());
        self.save(session_id, &conversation).await?;
        Ok(message)
    }

    /// Append a batch in order with a single persist.
    pub async fn append_all(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut conversation = self.load(session_id).await?;
        for message in messages {
            conversation.push(message);
        }
        self.save(session_id, &conversation).await
    }

    /// Truncate the transcript to the system message and persist it.
    pub async fn reset(&self, session_id: &str) -> Result<Conversation, StoreError> {
        let conversation = Conversation::seeded(&self.system_prompt);
        self.save(session_id, &conversation).await?;
        debug!(session_id, "Conversation reset");
        Ok(conversation)
    }

    /// Remove the transcript.
    pub async fn evict(&self, session_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&conversation_key(session_id)).await?;
        debug!(session_id, "Session evicted");
        Ok(())
    }

    async fn save(&self, session_id: &str, conversation: &Conversation) -> Result<(), StoreError> {
        let raw = serde_json::to_string(conversation)
            .map_err(|e| StoreError::Storage(format!("failed to serialize transcript: {e}")))?;
        self.kv
            .set(&conversation_key(session_id), &raw, self.ttl)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKv;
    use recruitr_core::message::MessageToolCall;

    const PROMPT: &str = "You are an AI recruiter assistant.";

    fn store() -> (Arc<InMemoryKv>, ConversationStore) {
        let kv = Arc::new(InMemoryKv::new());
        (kv.clone(), ConversationStore::new(kv, PROMPT))
    }

    #[tokio::test]
    async fn fresh_session_is_seeded_and_not_persisted() {
        let (kv, store) = store();
        let conv = store.load("s1").await.unwrap();
        assert_eq!(conv.messages(), &[Message::system(PROMPT)]);
        assert!(kv.is_empty().await);
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let (_, store) = store();
        store.append("s1", Message::user("hello")).await.unwrap();
        let first = store.load("s1").await.unwrap();
        let second = store.load("s1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn system_message_is_stable_across_turns() {
        let (_, store) = store();
        for i in 0..10 {
            store.append("s1", Message::user(format!("q{i}"))).await.unwrap();
            store.append("s1", Message::assistant(format!("a{i}"))).await.unwrap();
            let conv = store.load("s1").await.unwrap();
            assert_eq!(conv.messages()[0], Message::system(PROMPT));
        }
        assert_eq!(store.load("s1").await.unwrap().len(), 21);
    }

    #[tokio::test]
    async fn append_all_preserves_order() {
        let (_, store) = store();
        store
            .append(
                "s1",
                Message::assistant_tool_calls(
                    None,
                    vec![
                        MessageToolCall { id: "a".into(), name: "t".into(), arguments: "{}".into() },
                        MessageToolCall { id: "b".into(), name: "t".into(), arguments: "{}".into() },
                    ],
                ),
            )
            .await
            .unwrap();
        store
            .append_all(
                "s1",
                vec![Message::tool_result("a", "t", "1"), Message::tool_result("b", "t", "2")],
            )
            .await
            .unwrap();

        let conv = store.load("s1").await.unwrap();
        let ids: Vec<_> = conv
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(conv.unanswered_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn reset_keeps_only_system_message() {
        let (_, store) = store();
        store.append("s1", Message::user("hi")).await.unwrap();
        store.reset("s1").await.unwrap();
        assert_eq!(store.load("s1").await.unwrap().messages(), &[Message::system(PROMPT)]);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let (_, store) = store();
        store.append("s1", Message::user("one")).await.unwrap();
        store.append("s2", Message::user("two")).await.unwrap();
        store.reset("s1").await.unwrap();
        assert_eq!(store.load("s1").await.unwrap().len(), 1);
        assert_eq!(store.load("s2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn evict_removes_transcript() {
        let (kv, store) = store();
        store.append("s1", Message::user("hi")).await.unwrap();
        store.evict("s1").await.unwrap();
        assert!(kv.is_empty().await);
        assert_eq!(store.load("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stored_transcript_without_system_is_repaired() {
        let (kv, store) = store();
        kv.set("conversation:s1", r#"[{"role":"user","content":"hi"}]"#, None)
            .await
            .unwrap();
        let conv = store.load("s1").await.unwrap();
        assert_eq!(conv.messages()[0], Message::system(PROMPT));
        assert_eq!(conv.messages()[1], Message::user("hi"));
    }

    #[tokio::test]
    async fn garbage_is_reported_as_corrupt() {
        let (kv, store) = store();
        kv.set("conversation:s1", "not json", None).await.unwrap();
        assert!(matches!(
            store.load("s1").await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn transcripts_expire_with_ttl() {
        let kv = Arc::new(InMemoryKv::new());
        let store = ConversationStore::new(kv, PROMPT).with_ttl(Duration::from_secs(60));
        store.append("s1", Message::user("hi")).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.load("s1").await.unwrap().len(), 1);
    }
}
