//! `recruitr chat`: Interactive or single-message chat mode.

use recruitr_agent::spawn_event_logger;
use recruitr_config::AppConfig;
use recruitr_core::event::EventBus;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    session: Option<String>,
    message: Option<String>,
    token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    // Fail early with setup help when no API key is set
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    RECRUITR_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let events = Arc::new(EventBus::default());
    let _logger = spawn_event_logger(&events);
    let orchestrator = recruitr_gateway::assemble(&config, events).await?;

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if let Some(token) = token {
        orchestrator.store_credential(&session_id, token, None).await?;
    }

    if let Some(msg) = message {
        // Single message mode
        let response = orchestrator.submit_message(&session_id, &msg).await?;
        println!("{response}");
        return Ok(());
    }

    println!();
    println!("  Recruitr, interactive mode");
    println!();
    println!("  Session:   {session_id}");
    println!("  Model:     {}", config.llm.model);
    println!("  Tools:     {}", orchestrator.dispatcher().registry().len());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/reset' to start over, 'exit' or Ctrl+D to quit.");
    println!();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                orchestrator.reset_session(&session_id).await?;
                println!("  (conversation reset)");
                println!();
                continue;
            }
            _ => {}
        }

        match orchestrator.submit_message(&session_id, line).await {
            Ok(response) => {
                println!();
                for text in response.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
