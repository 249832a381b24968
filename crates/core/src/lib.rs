//! # Recruitr Core
//!
//! Domain types, traits, and error definitions for the Recruitr ATS
//! assistant. This crate has **no framework dependencies**. It defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the LLM ([`Provider`]), the
//! ATS data service ([`GraphQlExecutor`]) and the session store
//! ([`KvStore`]). Implementations live in their respective crates, and tests
//! swap in scripted ones.

pub mod error;
pub mod event;
pub mod graphql;
pub mod message;
pub mod provider;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus, ResetReason};
pub use graphql::{Credential, GraphQlExecutor};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use store::KvStore;
pub use tool::{CompositeTool, Invocation, ToolContext, ToolDescriptor, ToolOutcome, ToolRegistry};
