//! ATS tools for Recruitr.
//!
//! The catalogue describes what the model may call; the dispatcher runs
//! those calls against the ATS GraphQL service on the session's behalf.
//! `createPipeline` is the one composite tool, with local multi-step logic.

pub mod catalog;
pub mod dispatcher;
pub mod graphql;
pub mod pipeline;

pub use catalog::registry;
pub use dispatcher::ToolDispatcher;
pub use graphql::HttpGraphQlExecutor;
pub use pipeline::CreatePipelineTool;
