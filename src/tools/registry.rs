//! Tool registry - manages and dispatches tool calls
//!
//! Tools are keyed by unique name. Each tool's parameter schema is compiled
//! once at registration, so a broken schema or a duplicate name is rejected
//! at startup rather than at call time.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde_json::Value;
use tracing::{debug, warn};

use super::Tool;
use crate::core::{ErgonError, Result, ToolDefinition, ToolResult};

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: Validator,
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    /// Registration order, used for stable tool definitions
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ErgonError::DuplicateTool(name));
        }

        let validator = jsonschema::validator_for(&tool.parameters()).map_err(|e| {
            ErgonError::config(format!("Invalid parameter schema for tool '{}': {}", name, e))
        })?;

        debug!(tool = %name, terminal = tool.is_terminal(), "Registered tool");
        self.order.push(name.clone());
        self.tools.insert(name, RegisteredTool { tool, validator });
        Ok(())
    }

    /// Builder-style registration
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .map(|entry| Arc::clone(&entry.tool))
            .ok_or_else(|| ErgonError::ToolNotFound(name.to_string()))
    }

    /// Whether `name` is registered and terminal
    pub fn is_terminal(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .is_some_and(|entry| entry.tool.is_terminal())
    }

    /// Definitions for every tool, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|entry| entry.tool.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check arguments against the tool's schema
    ///
    /// Reports the first violation, naming the offending field.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<()> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ErgonError::ToolNotFound(name.to_string()))?;

        let arguments = normalize(arguments);
        let first = entry.validator.iter_errors(&arguments).next();
        match first {
            None => Ok(()),
            Some(error) => {
                let field = match &error.kind {
                    ValidationErrorKind::Required { property } => property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string()),
                    _ => {
                        let path = error.instance_path.to_string();
                        let field = path.trim_start_matches('/');
                        if field.is_empty() {
                            "<arguments>".to_string()
                        } else {
                            field.to_string()
                        }
                    }
                };
                Err(ErgonError::validation(name, field, error.to_string()))
            }
        }
    }

    /// Invoke a tool without validating its arguments
    ///
    /// The tool's own failure comes back as a [`ToolResult`] with `error` set.
    pub async fn run(&self, name: &str, arguments: &Value) -> Result<ToolResult> {
        let tool = self.get(name)?;
        match tool.execute(normalize(arguments)).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                Ok(ToolResult::failure(e.to_string()))
            }
        }
    }

    /// Validate then invoke
    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolResult> {
        self.validate(name, arguments)?;
        self.run(name, arguments).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

/// Models sometimes send `null` for a call with no arguments
fn normalize(arguments: &Value) -> Value {
    if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo a message"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" },
                    "times": { "type": "integer" }
                },
                "required": ["message"]
            })
        }

        async fn execute(&self, arguments: Value) -> Result<ToolResult> {
            let message = arguments["message"].as_str().unwrap_or_default();
            if message == "fail" {
                return Err(ErgonError::tool("asked to fail"));
            }
            Ok(ToolResult::success(message))
        }
    }

    struct BadSchema;

    #[async_trait]
    impl Tool for BadSchema {
        fn name(&self) -> &str {
            "bad"
        }

        fn description(&self) -> &str {
            "Broken schema"
        }

        fn parameters(&self) -> Value {
            json!({ "type": "not-a-type" })
        }

        async fn execute(&self, _arguments: Value) -> Result<ToolResult> {
            Ok(ToolResult::default())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        registry
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = registry();
        let err = registry.register(Echo).unwrap_err();
        assert!(matches!(err, ErgonError::DuplicateTool(name) if name == "echo"));
    }

    #[test]
    fn invalid_schema_is_rejected_at_registration() {
        let mut registry = ToolRegistry::new();
        assert!(matches!(
            registry.register(BadSchema),
            Err(ErgonError::Config(_))
        ));
    }

    #[test]
    fn missing_tool_is_not_found() {
        assert!(matches!(
            registry().get("nope"),
            Err(ErgonError::ToolNotFound(_))
        ));
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = registry().validate("echo", &json!({})).unwrap_err();
        match err {
            ErgonError::Validation { tool, field, .. } => {
                assert_eq!(tool, "echo");
                assert_eq!(field, "message");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_type_names_the_field() {
        let err = registry()
            .validate("echo", &json!({ "message": "hi", "times": "three" }))
            .unwrap_err();
        assert!(matches!(err, ErgonError::Validation { field, .. } if field == "times"));
    }

    #[tokio::test]
    async fn tool_failure_is_wrapped() {
        let result = registry()
            .execute("echo", &json!({ "message": "fail" }))
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("asked to fail"));
    }

    #[tokio::test]
    async fn execute_runs_valid_call() {
        let result = registry()
            .execute("echo", &json!({ "message": "hello" }))
            .await
            .unwrap();
        assert_eq!(result.output, "hello");
        assert!(!result.is_error());
    }

    #[test]
    fn definitions_follow_registration_order() {
        let registry = registry();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].function.name, "echo");
        assert!(!registry.is_terminal("echo"));
    }
}
