//! GraphQL executor trait: the contract with the ATS data service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::GraphQlError;

/// The authority a request runs under.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// Service-level secret, used in batch mode.
    Admin { secret: String },
    /// Per-session bearer token from the interactive caller.
    Bearer {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

impl Credential {
    /// The acting user, when the credential identifies one.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Admin { .. } => None,
            Self::Bearer { user_id, .. } => user_id.as_deref(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin { .. } => f.debug_struct("Admin").field("secret", &"[REDACTED]").finish(),
            Self::Bearer { user_id, .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .field("user_id", user_id)
                .finish(),
        }
    }
}

/// Executes parameterized GraphQL documents against the data service.
#[async_trait]
pub trait GraphQlExecutor: Send + Sync {
    /// Run `document` with `variables`, returning the `data` member of the
    /// response. An `errors` envelope is returned as [`GraphQlError::Envelope`].
    async fn execute(
        &self,
        credential: &Credential,
        document: &str,
        variables: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, GraphQlError>;
}
