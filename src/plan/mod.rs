//! Plan module - ordered step checklists for planning-style agents

pub mod tracker;

pub use tracker::{Plan, PlanSnapshot, PlanStep, PlanTracker, SharedPlanTracker, StepStatus};
