//! LLM Provider implementations for Recruitr.
//!
//! All providers implement the `recruitr_core::Provider` trait. The ATS
//! assistant talks to any OpenAI-compatible chat completions endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use recruitr_config::AppConfig;
use recruitr_core::error::ProviderError;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is available.
pub fn from_config(
    config: &AppConfig,
) -> std::result::Result<Arc<dyn recruitr_core::Provider>, ProviderError> {
    let api_key = config.llm.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no LLM API key; set RECRUITR_API_KEY or OPENAI_API_KEY".into(),
        )
    })?;

    let provider = OpenAiCompatProvider::new("openai", &config.llm.base_url, api_key)
        .with_timeout(Duration::from_secs(config.agent.request_timeout_secs));
    Ok(Arc::new(provider))
}
