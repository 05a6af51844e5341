//! Event rendering for the terminal
//!
//! Turns events into one human-readable block each, or JSON lines.

use crate::agent::AgentState;
use crate::events::{Event, EventPayload};
use crate::plan::{PlanSnapshot, StepStatus};

/// Maximum characters of tool output shown inline
const MAX_OUTPUT: usize = 500;

/// Output format for streamed events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Human,
    Json,
}

/// Render one event for display; `None` means print nothing
pub fn render(event: &Event, mode: RenderMode) -> Option<String> {
    match mode {
        RenderMode::Json => event.to_json().ok(),
        RenderMode::Human => render_human(event),
    }
}

fn render_human(event: &Event) -> Option<String> {
    let step = event.step;
    let line = match &event.payload {
        EventPayload::StatusChange {
            state: AgentState::Running,
            ..
        } => format!("── step {} ──", step),
        EventPayload::StatusChange { .. } => return None,
        EventPayload::Think { content } => {
            let content = content.trim();
            if content.is_empty() {
                return None;
            }
            format!("💭 {}", content)
        }
        EventPayload::ToolSelect { name } => format!("🛠️  {}", name),
        EventPayload::ToolExecute { arguments, .. } => {
            format!("   args: {}", truncate(&arguments.to_string(), MAX_OUTPUT))
        }
        EventPayload::ToolResult {
            name,
            output,
            error,
            base64_image,
        } => {
            let mut out = String::new();
            if !output.is_empty() {
                out.push_str(&format!("📎 {}: {}", name, truncate(output, MAX_OUTPUT)));
            }
            if let Some(err) = error.as_deref().filter(|e| !e.is_empty()) {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&format!("⚠️  {} failed: {}", name, err));
            }
            if base64_image.is_some() {
                out.push_str("\n   (image attached)");
            }
            if out.is_empty() {
                out = format!("📎 {}: (no output)", name);
            }
            out
        }
        EventPayload::PlanUpdate { plan } => render_plan(plan),
        EventPayload::Error { message } => format!("❌ Error: {}", message),
        EventPayload::Complete {
            result,
            terminated,
            truncated,
        } => {
            if *terminated {
                "⏹️  Task terminated".to_string()
            } else if *truncated {
                format!("⚠️  {}", result)
            } else {
                format!("✅ Result:\n{}", result)
            }
        }
    };
    Some(line)
}

fn render_plan(plan: &PlanSnapshot) -> String {
    let done = plan
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .count();
    let mut out = format!(
        "📋 Plan '{}' ({}/{} done)",
        plan.title,
        done,
        plan.steps.len()
    );
    for (i, step) in plan.steps.iter().enumerate() {
        let marker = match step.status {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        };
        out.push_str(&format!("\n   {} {}", marker, step.title));
        if plan.current_step_index == Some(i) {
            out.push_str("  ← current");
        }
    }
    out
}

/// Truncate on a character boundary
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolResult;

    #[test]
    fn hides_non_running_status_changes() {
        let finished = Event::status_change(2, AgentState::Finished, None);
        assert!(render(&finished, RenderMode::Human).is_none());
        let running = Event::status_change(2, AgentState::Running, None);
        assert_eq!(render(&running, RenderMode::Human).unwrap(), "── step 2 ──");
    }

    #[test]
    fn tool_errors_are_flagged() {
        let event = Event::tool_result(1, "finish", &ToolResult::failure("plan incomplete"));
        let line = render(&event, RenderMode::Human).unwrap();
        assert!(line.contains("finish failed: plan incomplete"));
    }

    #[test]
    fn json_mode_emits_wire_format() {
        let line = render(&Event::complete(1, "4"), RenderMode::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["result"], "4");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
