//! Message and Conversation domain types.
//!
//! A conversation is the per-session transcript exchanged with the LLM:
//! the fixed system instruction, then user turns, assistant answers or
//! tool requests, and the tool results that answer those requests.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The human operator
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single transcript entry, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        /// Absent when the model only requested tools.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<MessageToolCall>,
    },
    Tool {
        /// Id of the assistant tool call this message answers.
        tool_call_id: String,
        name: String,
        /// Serialized JSON result.
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// A plain assistant answer with no tool requests.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// An assistant message carrying tool requests.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content)
            }
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls requested by an assistant message; empty for every other role.
    pub fn tool_calls(&self) -> &[MessageToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Opaque id issued by the LLM
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as raw JSON text, parsed at dispatch time
    pub arguments: String,
}

/// An ordered transcript whose first entry is always the system instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// A fresh transcript seeded with the system instruction.
    pub fn seeded(system_prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Rebuild from stored messages, re-seeding if the system instruction is
    /// missing or differs from `system_prompt`.
    pub fn restore(system_prompt: &str, mut messages: Vec<Message>) -> Self {
        match messages.first() {
            Some(Message::System { content }) if content == system_prompt => {}
            Some(Message::System { .. }) => messages[0] = Message::system(system_prompt),
            _ => messages.insert(0, Message::system(system_prompt)),
        }
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool call ids requested by an assistant message but never answered.
    /// See [`unanswered_tool_calls`].
    pub fn unanswered_tool_calls(&self) -> Vec<&str> {
        unanswered_tool_calls(&self.messages)
    }
}

/// Tool call ids requested by an assistant message but never answered by
/// a following tool message. A provider rejects any transcript for which
/// this is non-empty.
pub fn unanswered_tool_calls(messages: &[Message]) -> Vec<&str> {
    let mut pending: Vec<&str> = Vec::new();
    let mut unanswered = Vec::new();
    for message in messages {
        match message {
            Message::Assistant { tool_calls, .. } => {
                unanswered.append(&mut pending);
                pending = tool_calls.iter().map(|tc| tc.id.as_str()).collect();
            }
            Message::Tool { tool_call_id, .. } => {
                pending.retain(|id| id != tool_call_id);
            }
            _ => unanswered.append(&mut pending),
        }
    }
    unanswered.append(&mut pending);
    unanswered
}
