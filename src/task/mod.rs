//! Task module - per-task agent runs, hubs and cancellation

pub mod factory;
pub mod registry;

pub use factory::{planning_agent_factory, reasoning_agent_factory};
pub use registry::{AgentFactory, Task, TaskId, TaskRegistry, TaskStatus, TerminateOutcome};
