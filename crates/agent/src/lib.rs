//! The orchestration loop, the heart of Recruitr.
//!
//! Each turn follows a **Request → Dispatch → Write back** cycle:
//!
//! 1. **Append** the user's message to the session transcript
//! 2. **Request** a completion with the transcript and the tool catalogue
//! 3. **If tool calls**: dispatch them concurrently, write every result back
//!    in call order, loop back to step 2
//! 4. **If text**: append it and return it to the caller
//!
//! A turn is capped at a fixed number of tool rounds. Hitting the cap, or
//! the provider rejecting the transcript, resets the session instead of
//! failing the caller.

pub mod events;
pub mod orchestrator;
pub mod prompts;

pub use events::spawn_event_logger;
pub use orchestrator::Orchestrator;
pub use prompts::{RESTART_MESSAGE, ROUND_LIMIT_MESSAGE, SYSTEM_PROMPT};
