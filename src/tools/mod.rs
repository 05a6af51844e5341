//! Tools module - the tool contract, the registry, and built-in tools
//!
//! A tool declares a name, a description and a JSON Schema for its
//! arguments. The registry validates arguments against that schema before
//! a tool runs; the agent loop only ever sees [`ToolResult`]s.

pub mod finish;
pub mod planning;
pub mod registry;
pub mod terminate;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Result, ToolDefinition, ToolResult};
use crate::plan::SharedPlanTracker;

pub use finish::{FinishPolicy, FinishTool};
pub use planning::PlanningTool;
pub use registry::ToolRegistry;
pub use terminate::TerminateTool;

/// A capability the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model calls the tool by
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    /// Whether a successful call ends the agent's run
    fn is_terminal(&self) -> bool {
        false
    }

    /// Run the tool with already-validated arguments
    ///
    /// Returning `Err` is fine: the registry turns it into a
    /// [`ToolResult`] with `error` set.
    async fn execute(&self, arguments: Value) -> Result<ToolResult>;

    /// Definition sent to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

/// Registry with the built-in tools: `planning`, `finish` and `terminate`
pub fn standard_registry(
    plans: SharedPlanTracker,
    finish_policy: FinishPolicy,
) -> Result<ToolRegistry> {
    ToolRegistry::new()
        .with(PlanningTool::new(plans.clone()))?
        .with(FinishTool::with_plans(finish_policy, plans))?
        .with(TerminateTool)
}

/// Read an optional string argument
pub(crate) fn arg_str<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str)
}

/// Read an optional boolean argument
pub(crate) fn arg_bool(arguments: &Value, key: &str) -> Option<bool> {
    arguments.get(key).and_then(Value::as_bool)
}
