//! `recruitr reset`: Truncate a session's transcript.

use recruitr_agent::SYSTEM_PROMPT;
use recruitr_store::ConversationStore;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: Option<&Path>, session_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let kv = recruitr_store::connect(&config.store).await?;
    let store = ConversationStore::new(kv, SYSTEM_PROMPT)
        .with_ttl(Duration::from_secs(config.store.conversation_ttl_secs));

    store.reset(session_id).await?;
    println!("Session {session_id} reset.");
    Ok(())
}
