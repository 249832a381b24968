//! Error types for the Recruitr domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Recruitr operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Session store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Data service errors ---
    #[error("GraphQL error: {0}")]
    GraphQl(#[from] GraphQlError),

    // --- Access errors ---
    #[error("Access denied: {0}")]
    AccessDenied(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The provider rejected the transcript because an assistant tool
    /// request was never answered by a tool message.
    #[error("Transcript out of sync with provider: {0}")]
    TranscriptDesync(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("No credential available for this session")]
    MissingCredential,

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    /// A multi-step tool failed. `created` holds ids of records that earlier
    /// steps already wrote; they are not rolled back.
    #[error("{tool_name} failed at step '{step}': {reason}")]
    StepFailed {
        tool_name: String,
        step: String,
        reason: String,
        created: serde_json::Value,
    },
}

#[derive(Debug, Error)]
pub enum GraphQlError {
    #[error("GraphQL endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("GraphQL errors: {0}")]
    Envelope(serde_json::Value),

    #[error("GraphQL transport failure: {0}")]
    Transport(String),

    #[error("GraphQL response missing data")]
    MissingData,
}
