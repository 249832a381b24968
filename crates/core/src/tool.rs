//! Tool descriptors, invocation strategies, and the registry.
//!
//! Tools fall into two classes: query tools forward a fixed GraphQL document
//! to the data service, composite tools run local multi-step logic. Both are
//! described by a static [`ToolDescriptor`] and resolved through a
//! [`ToolRegistry`] that is read-only once built.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use crate::error::ToolError;
use crate::graphql::{Credential, GraphQlExecutor};
use crate::provider::{Provider, ToolDefinition};

/// How a tool is carried out once the model requests it.
#[derive(Clone)]
pub enum Invocation {
    /// Forward the parsed arguments as variables to this GraphQL document.
    Query { document: &'static str },
    /// Run local logic.
    Composite(Arc<dyn CompositeTool>),
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query { document } => f.debug_struct("Query").field("document", document).finish(),
            Self::Composite(tool) => f.debug_tuple("Composite").field(&tool.name()).finish(),
        }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments. Sent to the model, not enforced locally.
    pub parameters: serde_json::Value,
    pub invocation: Invocation,
}

impl ToolDescriptor {
    pub fn query(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        document: &'static str,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            invocation: Invocation::Query { document },
        }
    }

    pub fn composite(tool: Arc<dyn CompositeTool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
            invocation: Invocation::Composite(tool),
        }
    }

    /// Convert into the LLM-facing definition.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Everything a composite tool may reach while it runs.
pub struct ToolContext<'a> {
    pub executor: &'a dyn GraphQlExecutor,
    pub provider: &'a dyn Provider,
    pub model: &'a str,
    pub credential: &'a Credential,
}

/// Local multi-step logic behind a composite tool.
///
/// Sequential sub-steps happen inside `run`. A failure after an earlier write
/// succeeded must surface as [`ToolError::StepFailed`], never as success.
#[async_trait]
pub trait CompositeTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn run(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext<'_>,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

/// The result of dispatching one tool call. Dispatch never raises; every
/// failure is captured here and fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(serde_json::Value),
    Failure {
        error: String,
        context: serde_json::Value,
    },
}

impl ToolOutcome {
    pub fn failure(error: impl Into<String>, context: serde_json::Value) -> Self {
        Self::Failure {
            error: error.into(),
            context,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The JSON payload written into the tool message.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Failure { error, context } => serde_json::json!({
                "error": error,
                "context": context,
            }),
        }
    }
}

/// A registry of available tools, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: ToolDescriptor) {
        match self.index.get(&tool.name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(tool.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// All descriptors, in registration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Look up a descriptor by name.
    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::to_definition).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl CompositeTool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn run(
            &self,
            arguments: serde_json::Value,
            _ctx: &ToolContext<'_>,
        ) -> std::result::Result<serde_json::Value, ToolError> {
            Ok(arguments)
        }
    }

    fn query(name: &str) -> ToolDescriptor {
        ToolDescriptor::query(name, "a query", serde_json::json!({"type": "object"}), "query Q { x }")
    }

    #[test]
    fn registry_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        registry.register(query("getJob"));
        registry.register(ToolDescriptor::composite(Arc::new(EchoTool)));
        assert!(registry.resolve("getJob").is_some());
        assert!(matches!(
            registry.resolve("echo").unwrap().invocation,
            Invocation::Composite(_)
        ));
        assert!(registry.resolve("nonexistent").is_none());
    }

    #[test]
    fn registry_preserves_order_and_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(query("a"));
        registry.register(query("b"));
        registry.register(ToolDescriptor::query("a", "replaced", serde_json::json!({}), "query R { y }"));

        let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.resolve("a").unwrap().description, "replaced");
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn failure_payload_is_error_shaped() {
        let outcome = ToolOutcome::failure("Unknown tool: x", serde_json::json!({"tool": "x"}));
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.to_payload(),
            serde_json::json!({"error": "Unknown tool: x", "context": {"tool": "x"}})
        );
    }

    #[test]
    fn success_payload_is_the_value() {
        let outcome = ToolOutcome::Success(serde_json::json!({"Pipeline": []}));
        assert!(outcome.is_success());
        assert_eq!(outcome.to_payload(), serde_json::json!({"Pipeline": []}));
    }
}
