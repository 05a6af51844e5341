//! Plan tracker
//!
//! Keeps ordered step checklists keyed by plan id. Plans are mutated only
//! through explicit commands (create, update, mark_step, set_active, delete);
//! every mutation bumps a revision counter so observers can tell when to
//! publish a fresh snapshot.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::PlanError;

/// Tracker shared between the planning tool, the finish tool and the agent
pub type SharedPlanTracker = Arc<Mutex<PlanTracker>>;

/// Status of one plan step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepStatus {
    fn marker(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::NotStarted => write!(f, "not_started"),
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl FromStr for StepStatus {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(StepStatus::NotStarted),
            "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            "blocked" => Ok(StepStatus::Blocked),
            other => Err(PlanError::UnknownStatus(other.to_string())),
        }
    }
}

/// An ordered checklist with per-step status
///
/// `steps`, `statuses` and `notes` always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
    steps: Vec<String>,
    statuses: Vec<StepStatus>,
    notes: Vec<String>,
}

impl Plan {
    fn new(id: String, title: String, steps: Vec<String>) -> Self {
        let len = steps.len();
        Self {
            id,
            title,
            steps,
            statuses: vec![StepStatus::NotStarted; len],
            notes: vec![String::new(); len],
        }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn statuses(&self) -> &[StepStatus] {
        &self.statuses
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the first step that is not completed
    pub fn current_step_index(&self) -> Option<usize> {
        self.statuses
            .iter()
            .position(|s| *s != StepStatus::Completed)
    }

    /// First step that is not completed
    pub fn current(&self) -> Option<(usize, &str)> {
        self.current_step_index()
            .map(|i| (i, self.steps[i].as_str()))
    }

    /// Number of steps not yet completed
    pub fn remaining(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s != StepStatus::Completed)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Replace steps, keeping status and notes where the step text at the
    /// same index is unchanged
    fn replace_steps(&mut self, steps: Vec<String>) {
        let mut statuses = Vec::with_capacity(steps.len());
        let mut notes = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if self.steps.get(i) == Some(step) {
                statuses.push(self.statuses[i]);
                notes.push(self.notes[i].clone());
            } else {
                statuses.push(StepStatus::NotStarted);
                notes.push(String::new());
            }
        }
        self.steps = steps;
        self.statuses = statuses;
        self.notes = notes;
    }

    /// Serializable view of the plan
    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            plan_id: self.id.clone(),
            title: self.title.clone(),
            steps: self
                .steps
                .iter()
                .zip(&self.statuses)
                .zip(&self.notes)
                .map(|((title, status), notes)| PlanStep {
                    title: title.clone(),
                    status: *status,
                    notes: (!notes.is_empty()).then(|| notes.clone()),
                })
                .collect(),
            current_step_index: self.current_step_index(),
        }
    }

    /// Human-readable checklist for tool output
    pub fn render(&self) -> String {
        let completed = self.len() - self.remaining();
        let mut out = format!(
            "Plan: {} (ID: {})\nProgress: {}/{} steps completed\n\n",
            self.title,
            self.id,
            completed,
            self.len()
        );
        for (i, (step, status)) in self.steps.iter().zip(&self.statuses).enumerate() {
            out.push_str(&format!("{}. {} {}\n", i, status.marker(), step));
            if !self.notes[i].is_empty() {
                out.push_str(&format!("   Notes: {}\n", self.notes[i]));
            }
        }
        out
    }
}

/// One step within a [`PlanSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub title: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Immutable copy of a plan, carried by `plan_update` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub plan_id: String,
    pub title: String,
    pub steps: Vec<PlanStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_index: Option<usize>,
}

/// Collection of plans with one optional active plan
#[derive(Debug, Default)]
pub struct PlanTracker {
    plans: HashMap<String, Plan>,
    order: Vec<String>,
    active: Option<String>,
    revision: u64,
}

impl PlanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker wrapped for sharing
    pub fn shared() -> SharedPlanTracker {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Incremented on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Create a plan and make it active
    pub fn create(
        &mut self,
        plan_id: &str,
        title: &str,
        steps: Vec<String>,
    ) -> Result<&Plan, PlanError> {
        if self.plans.contains_key(plan_id) {
            return Err(PlanError::AlreadyExists(plan_id.to_string()));
        }
        if steps.is_empty() {
            return Err(PlanError::EmptySteps);
        }

        let plan = Plan::new(plan_id.to_string(), title.to_string(), steps);
        self.plans.insert(plan_id.to_string(), plan);
        self.order.push(plan_id.to_string());
        self.active = Some(plan_id.to_string());
        self.revision += 1;
        Ok(&self.plans[plan_id])
    }

    /// Change a plan's title and/or steps
    pub fn update(
        &mut self,
        plan_id: &str,
        title: Option<&str>,
        steps: Option<Vec<String>>,
    ) -> Result<&Plan, PlanError> {
        if steps.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(PlanError::EmptySteps);
        }
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;

        if let Some(title) = title {
            plan.title = title.to_string();
        }
        if let Some(steps) = steps {
            plan.replace_steps(steps);
        }
        self.revision += 1;
        Ok(plan)
    }

    /// Set the status (and optionally notes) of one step
    pub fn mark_step(
        &mut self,
        plan_id: &str,
        index: usize,
        status: StepStatus,
        notes: Option<&str>,
    ) -> Result<&Plan, PlanError> {
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;

        if index >= plan.len() {
            return Err(PlanError::IndexOutOfRange {
                index,
                len: plan.len(),
            });
        }

        plan.statuses[index] = status;
        if let Some(notes) = notes {
            plan.notes[index] = notes.to_string();
        }
        self.revision += 1;
        Ok(plan)
    }

    pub fn set_active(&mut self, plan_id: &str) -> Result<&Plan, PlanError> {
        if !self.plans.contains_key(plan_id) {
            return Err(PlanError::NotFound(plan_id.to_string()));
        }
        self.active = Some(plan_id.to_string());
        self.revision += 1;
        Ok(&self.plans[plan_id])
    }

    pub fn delete(&mut self, plan_id: &str) -> Result<Plan, PlanError> {
        let plan = self
            .plans
            .remove(plan_id)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;
        self.order.retain(|id| id != plan_id);
        if self.active.as_deref() == Some(plan_id) {
            self.active = None;
        }
        self.revision += 1;
        Ok(plan)
    }

    pub fn get(&self, plan_id: &str) -> Result<&Plan, PlanError> {
        self.plans
            .get(plan_id)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))
    }

    pub fn active(&self) -> Option<&Plan> {
        self.active.as_ref().and_then(|id| self.plans.get(id))
    }

    /// Resolve an explicit plan id, falling back to the active plan
    pub fn resolve(&self, plan_id: Option<&str>) -> Result<&Plan, PlanError> {
        match plan_id {
            Some(id) => self.get(id),
            None => self.active().ok_or(PlanError::NoActivePlan),
        }
    }

    /// First incomplete step of the active plan
    pub fn current(&self) -> Option<(usize, &str)> {
        self.active().and_then(Plan::current)
    }

    /// Plans in creation order
    pub fn list(&self) -> Vec<&Plan> {
        self.order.iter().filter_map(|id| self.plans.get(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let mut tracker = PlanTracker::new();
        tracker.create("p1", "First", steps(&["a"])).unwrap();
        let err = tracker.create("p1", "Again", steps(&["b"])).unwrap_err();
        assert_eq!(err, PlanError::AlreadyExists("p1".into()));
    }

    #[test]
    fn create_rejects_empty_steps() {
        let mut tracker = PlanTracker::new();
        assert_eq!(
            tracker.create("p1", "Empty", vec![]).unwrap_err(),
            PlanError::EmptySteps
        );
    }

    #[test]
    fn mark_step_out_of_range() {
        let mut tracker = PlanTracker::new();
        tracker.create("p1", "Plan", steps(&["a", "b"])).unwrap();
        let err = tracker
            .mark_step("p1", 2, StepStatus::Completed, None)
            .unwrap_err();
        assert_eq!(err, PlanError::IndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn current_skips_completed_steps() {
        let mut tracker = PlanTracker::new();
        tracker.create("p1", "Plan", steps(&["a", "b", "c"])).unwrap();
        assert_eq!(tracker.current(), Some((0, "a")));

        tracker.mark_step("p1", 0, StepStatus::Completed, None).unwrap();
        tracker.mark_step("p1", 1, StepStatus::Blocked, None).unwrap();
        assert_eq!(tracker.current(), Some((1, "b")));

        tracker.mark_step("p1", 1, StepStatus::Completed, None).unwrap();
        tracker.mark_step("p1", 2, StepStatus::Completed, None).unwrap();
        assert_eq!(tracker.current(), None);
        assert!(tracker.active().unwrap().is_complete());
    }

    #[test]
    fn update_preserves_unchanged_step_status() {
        let mut tracker = PlanTracker::new();
        tracker.create("p1", "Plan", steps(&["a", "b"])).unwrap();
        tracker
            .mark_step("p1", 0, StepStatus::Completed, Some("done early"))
            .unwrap();
        tracker.mark_step("p1", 1, StepStatus::InProgress, None).unwrap();

        let plan = tracker
            .update("p1", Some("Renamed"), Some(steps(&["a", "x", "y"])))
            .unwrap();
        assert_eq!(plan.title, "Renamed");
        assert_eq!(
            plan.statuses(),
            &[
                StepStatus::Completed,
                StepStatus::NotStarted,
                StepStatus::NotStarted
            ]
        );
        assert_eq!(plan.notes()[0], "done early");
        assert_eq!(plan.steps().len(), plan.statuses().len());
    }

    #[test]
    fn revision_tracks_mutations_only() {
        let mut tracker = PlanTracker::new();
        assert_eq!(tracker.revision(), 0);
        tracker.create("p1", "Plan", steps(&["a"])).unwrap();
        let after_create = tracker.revision();
        let _ = tracker.get("p1");
        let _ = tracker.list();
        assert_eq!(tracker.revision(), after_create);
        tracker.mark_step("p1", 0, StepStatus::InProgress, None).unwrap();
        assert!(tracker.revision() > after_create);
    }

    #[test]
    fn delete_clears_active() {
        let mut tracker = PlanTracker::new();
        tracker.create("p1", "Plan", steps(&["a"])).unwrap();
        tracker.delete("p1").unwrap();
        assert!(tracker.active().is_none());
        assert_eq!(tracker.resolve(None).unwrap_err(), PlanError::NoActivePlan);
    }

    #[test]
    fn snapshot_reports_current_index() {
        let mut tracker = PlanTracker::new();
        tracker.create("p1", "Plan", steps(&["a", "b"])).unwrap();
        tracker
            .mark_step("p1", 0, StepStatus::Completed, Some("ok"))
            .unwrap();
        let snap = tracker.get("p1").unwrap().snapshot();
        assert_eq!(snap.current_step_index, Some(1));
        assert_eq!(snap.steps[0].notes.as_deref(), Some("ok"));
        assert!(snap.steps[1].notes.is_none());
    }

    #[test]
    fn status_parses_from_wire_names() {
        assert_eq!("blocked".parse::<StepStatus>().unwrap(), StepStatus::Blocked);
        assert!("done".parse::<StepStatus>().is_err());
    }
}
