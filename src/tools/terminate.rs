//! `terminate` - terminal tool that ends a run with a success/failure status

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{arg_str, Tool};
use crate::core::{ErgonError, Result, ToolResult};

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        "terminate"
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met OR when the task cannot \
         proceed further."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        let status = arg_str(&arguments, "status")
            .ok_or_else(|| ErgonError::tool("missing 'status'"))?;
        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {}",
            status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    #[tokio::test]
    async fn reports_status() {
        let result = TerminateTool
            .execute(json!({ "status": "failure" }))
            .await
            .unwrap();
        assert!(result.output.ends_with("failure"));
    }

    #[test]
    fn status_outside_enum_fails_validation() {
        let mut registry = ToolRegistry::new();
        registry.register(TerminateTool).unwrap();
        assert!(registry
            .validate("terminate", &json!({ "status": "maybe" }))
            .is_err());
        assert!(registry.is_terminal("terminate"));
    }
}
