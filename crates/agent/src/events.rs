//! Structured logging of domain events.

use recruitr_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Log every event published on `bus` until the bus is dropped.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::TurnCompleted {
            session_id,
            rounds,
            tokens_used,
            ..
        } => info!(target: "recruitr::events", %session_id, rounds, tokens_used, "turn_completed"),
        DomainEvent::ToolExecuted {
            session_id,
            tool_name,
            success,
            duration_ms,
            ..
        } => debug!(target: "recruitr::events", %session_id, %tool_name, success, duration_ms, "tool_executed"),
        DomainEvent::SessionReset {
            session_id, reason, ..
        } => info!(target: "recruitr::events", %session_id, ?reason, "session_reset"),
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => warn!(target: "recruitr::events", %context, %error_message, "error_occurred"),
    }
}
