//! `finish` - terminal tool that ends a run with a final answer

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{arg_bool, arg_str, Tool};
use crate::core::{Result, ToolResult};
use crate::plan::SharedPlanTracker;

const DEFAULT_RESULT: &str = "Task completed.";

/// Whether finishing requires the active plan to be complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishPolicy {
    /// Finish whenever the model asks to
    #[default]
    Unconditional,
    /// Refuse while the active plan has incomplete steps, unless `force` is set
    RequirePlanComplete,
}

impl std::str::FromStr for FinishPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unconditional" => Ok(Self::Unconditional),
            "require-plan-complete" => Ok(Self::RequirePlanComplete),
            other => Err(format!("unknown finish policy '{}'", other)),
        }
    }
}

/// Ends the task and reports the final result
pub struct FinishTool {
    policy: FinishPolicy,
    plans: Option<SharedPlanTracker>,
}

impl FinishTool {
    /// Finish tool with no plan pre-condition
    pub fn new() -> Self {
        Self {
            policy: FinishPolicy::Unconditional,
            plans: None,
        }
    }

    /// Finish tool that consults `plans` under `policy`
    pub fn with_plans(policy: FinishPolicy, plans: SharedPlanTracker) -> Self {
        Self {
            policy,
            plans: Some(plans),
        }
    }

    /// Incomplete steps of the active plan, if the policy cares
    fn blocking_steps(&self) -> Option<(String, usize, String)> {
        if self.policy != FinishPolicy::RequirePlanComplete {
            return None;
        }
        let plans = self.plans.as_ref()?.lock();
        let plan = plans.active()?;
        let (index, step) = plan.current()?;
        Some((plan.id.clone(), plan.remaining(), format!("{}. {}", index, step)))
    }
}

impl Default for FinishTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        "finish"
    }

    fn description(&self) -> &str {
        "Ends the current task and provides a final result. Use this tool when the task \
         objective has been completed and no further processing is needed. Provide a direct \
         answer or a summary of what was accomplished. After this call the agent stops."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result": {
                    "type": "string",
                    "description": "The final result, summary, or answer to the user's request."
                },
                "force": {
                    "type": "boolean",
                    "description": "Finish even if the active plan still has incomplete steps."
                }
            },
            "required": ["result"]
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        let result = arg_str(&arguments, "result")
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_RESULT);
        let force = arg_bool(&arguments, "force").unwrap_or(false);

        if !force {
            if let Some((plan_id, remaining, current)) = self.blocking_steps() {
                return Ok(ToolResult::failure(format!(
                    "Plan '{}' still has {} incomplete step(s), starting at {}. \
                     Complete them with the planning tool or call finish with force=true.",
                    plan_id, remaining, current
                )));
            }
        }

        Ok(ToolResult::success(result))
    }
}
