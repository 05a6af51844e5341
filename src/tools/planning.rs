//! `planning` - create and track step plans
//!
//! Thin command dispatcher over a shared [`PlanTracker`]. Tracker errors
//! (unknown plan, bad index) surface as tool errors so the model can
//! correct itself.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{arg_str, Tool};
use crate::core::{ErgonError, PlanError, Result, ToolResult};
use crate::plan::{SharedPlanTracker, StepStatus};

pub struct PlanningTool {
    plans: SharedPlanTracker,
}

impl PlanningTool {
    pub fn new(plans: SharedPlanTracker) -> Self {
        Self { plans }
    }

    fn create(&self, arguments: &Value) -> Result<ToolResult> {
        let plan_id = required_str(arguments, "plan_id")?;
        let steps = steps_arg(arguments)?.ok_or(PlanError::EmptySteps)?;
        let title = arg_str(arguments, "title").unwrap_or(plan_id);

        let mut plans = self.plans.lock();
        let plan = plans.create(plan_id, title, steps)?;
        Ok(ToolResult::success(format!(
            "Plan created successfully with ID: {}\n\n{}",
            plan_id,
            plan.render()
        )))
    }

    fn update(&self, arguments: &Value) -> Result<ToolResult> {
        let plan_id = required_str(arguments, "plan_id")?;
        let steps = steps_arg(arguments)?;
        let title = arg_str(arguments, "title");

        let mut plans = self.plans.lock();
        let plan = plans.update(plan_id, title, steps)?;
        Ok(ToolResult::success(format!(
            "Plan updated successfully: {}\n\n{}",
            plan_id,
            plan.render()
        )))
    }

    fn list(&self) -> Result<ToolResult> {
        let plans = self.plans.lock();
        let all = plans.list();
        if all.is_empty() {
            return Ok(ToolResult::success(
                "No plans available. Create a plan with the 'create' command.",
            ));
        }

        let active = plans.active().map(|p| p.id.as_str());
        let mut out = String::from("Available plans:\n");
        for plan in all {
            let marker = if Some(plan.id.as_str()) == active {
                " (active)"
            } else {
                ""
            };
            out.push_str(&format!(
                "- {}{}: {} - {}/{} steps completed\n",
                plan.id,
                marker,
                plan.title,
                plan.len() - plan.remaining(),
                plan.len()
            ));
        }
        Ok(ToolResult::success(out))
    }

    fn get(&self, arguments: &Value) -> Result<ToolResult> {
        let plans = self.plans.lock();
        let plan = plans.resolve(arg_str(arguments, "plan_id"))?;
        Ok(ToolResult::success(plan.render()))
    }

    fn set_active(&self, arguments: &Value) -> Result<ToolResult> {
        let plan_id = required_str(arguments, "plan_id")?;
        let mut plans = self.plans.lock();
        let plan = plans.set_active(plan_id)?;
        Ok(ToolResult::success(format!(
            "Plan '{}' is now the active plan.\n\n{}",
            plan_id,
            plan.render()
        )))
    }

    fn mark_step(&self, arguments: &Value) -> Result<ToolResult> {
        let index = arguments
            .get("step_index")
            .and_then(Value::as_u64)
            .ok_or_else(|| ErgonError::tool("'step_index' is required for mark_step"))?
            as usize;
        let status = match arg_str(arguments, "step_status") {
            Some(s) => s.parse::<StepStatus>()?,
            None => StepStatus::Completed,
        };
        let notes = arg_str(arguments, "step_notes");

        let mut plans = self.plans.lock();
        let plan_id = plans.resolve(arg_str(arguments, "plan_id"))?.id.clone();
        let plan = plans.mark_step(&plan_id, index, status, notes)?;
        Ok(ToolResult::success(format!(
            "Step {} updated in plan '{}'.\n\n{}",
            index,
            plan_id,
            plan.render()
        )))
    }

    fn delete(&self, arguments: &Value) -> Result<ToolResult> {
        let plan_id = required_str(arguments, "plan_id")?;
        self.plans.lock().delete(plan_id)?;
        Ok(ToolResult::success(format!(
            "Plan '{}' has been deleted.",
            plan_id
        )))
    }
}

#[async_trait]
impl Tool for PlanningTool {
    fn name(&self) -> &str {
        "planning"
    }

    fn description(&self) -> &str {
        "Create and manage plans for solving complex tasks. Commands: create, update, \
         list, get, set_active, mark_step, delete."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": [
                        "create", "update", "list", "get", "set_active", "mark_step", "delete"
                    ],
                    "description": "The command to execute."
                },
                "plan_id": {
                    "type": "string",
                    "description": "Plan identifier. Required for create, update, set_active \
                        and delete; defaults to the active plan for get and mark_step."
                },
                "title": {
                    "type": "string",
                    "description": "Plan title, used by create and update."
                },
                "steps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ordered step descriptions, used by create and update."
                },
                "step_index": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Index of the step to update (0-based), used by mark_step."
                },
                "step_status": {
                    "type": "string",
                    "enum": ["not_started", "in_progress", "completed", "blocked"],
                    "description": "New status for the step, used by mark_step."
                },
                "step_notes": {
                    "type": "string",
                    "description": "Additional notes for the step, used by mark_step."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        let command = required_str(&arguments, "command")?;
        match command {
            "create" => self.create(&arguments),
            "update" => self.update(&arguments),
            "list" => self.list(),
            "get" => self.get(&arguments),
            "set_active" => self.set_active(&arguments),
            "mark_step" => self.mark_step(&arguments),
            "delete" => self.delete(&arguments),
            other => Err(ErgonError::tool(format!(
                "Unrecognized command: {}. Allowed commands are: create, update, list, get, \
                 set_active, mark_step, delete",
                other
            ))),
        }
    }
}

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arg_str(arguments, key).ok_or_else(|| ErgonError::tool(format!("'{}' is required", key)))
}

fn steps_arg(arguments: &Value) -> Result<Option<Vec<String>>> {
    match arguments.get("steps") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| ErgonError::tool("'steps' must be a list of strings")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanTracker;
    use crate::tools::ToolRegistry;

    fn setup() -> (SharedPlanTracker, ToolRegistry) {
        let plans = PlanTracker::shared();
        let mut registry = ToolRegistry::new();
        registry
            .register(PlanningTool::new(plans.clone()))
            .unwrap();
        (plans, registry)
    }

    #[tokio::test]
    async fn create_then_mark_step() {
        let (plans, registry) = setup();
        let created = registry
            .execute(
                "planning",
                &json!({
                    "command": "create",
                    "plan_id": "p1",
                    "title": "Math",
                    "steps": ["add", "check"]
                }),
            )
            .await
            .unwrap();
        assert!(!created.is_error());
        assert!(created.output.contains("0/2 steps completed"));

        let marked = registry
            .execute(
                "planning",
                &json!({ "command": "mark_step", "step_index": 0, "step_status": "completed" }),
            )
            .await
            .unwrap();
        assert!(!marked.is_error());
        assert_eq!(plans.lock().current(), Some((1, "check")));
    }

    #[tokio::test]
    async fn duplicate_create_is_a_tool_error() {
        let (_plans, registry) = setup();
        let args = json!({ "command": "create", "plan_id": "p1", "steps": ["a"] });
        registry.execute("planning", &args).await.unwrap();
        let again = registry.execute("planning", &args).await.unwrap();
        assert!(again.error.unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn out_of_range_step_is_a_tool_error() {
        let (_plans, registry) = setup();
        registry
            .execute(
                "planning",
                &json!({ "command": "create", "plan_id": "p1", "steps": ["a"] }),
            )
            .await
            .unwrap();
        let result = registry
            .execute(
                "planning",
                &json!({ "command": "mark_step", "plan_id": "p1", "step_index": 3 }),
            )
            .await
            .unwrap();
        assert!(result.error.unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn unknown_command_fails_validation() {
        let (_plans, registry) = setup();
        let err = registry
            .execute("planning", &json!({ "command": "explode" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ErgonError::Validation { .. }));
    }

    #[tokio::test]
    async fn list_marks_active_plan() {
        let (_plans, registry) = setup();
        for id in ["p1", "p2"] {
            registry
                .execute(
                    "planning",
                    &json!({ "command": "create", "plan_id": id, "steps": ["a"] }),
                )
                .await
                .unwrap();
        }
        let listed = registry
            .execute("planning", &json!({ "command": "list" }))
            .await
            .unwrap();
        assert!(listed.output.contains("- p2 (active)"));
        assert!(listed.output.contains("- p1:"));
    }
}
