//! Agent factories for the task registry
//!
//! Each task gets a fresh agent (and, for planning agents, a fresh plan
//! tracker and tool set) bound to the task's own hub and cancellation token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AnswerPolicy};
use crate::core::AgentConfig;
use crate::events::EventHub;
use crate::llm::LLMProvider;
use crate::plan::PlanTracker;
use crate::tools::standard_registry;

use super::registry::AgentFactory;

const REASONING_SYSTEM_PROMPT: &str = "You are a careful reasoning assistant. Think through \
the problem step by step, showing your reasoning, then state the final answer clearly on \
the last line.";

/// Multi-step agent with the planning, finish and terminate tools
pub fn planning_agent_factory(
    config: AgentConfig,
    provider: Arc<dyn LLMProvider>,
) -> AgentFactory {
    Arc::new(move |hub: Arc<EventHub>, cancel: CancellationToken| {
        let plans = PlanTracker::shared();
        let tools = standard_registry(plans.clone(), config.finish_policy)?;
        Agent::builder("ergon")
            .config(&config)
            .provider(Arc::clone(&provider))
            .tools(Arc::new(tools))
            .plans(plans)
            .hub(hub)
            .cancellation(cancel)
            .build()
    })
}

/// Single-step chain-of-thought agent: no tools, one answer
pub fn reasoning_agent_factory(
    config: AgentConfig,
    provider: Arc<dyn LLMProvider>,
) -> AgentFactory {
    Arc::new(move |hub: Arc<EventHub>, cancel: CancellationToken| {
        Agent::builder("cot")
            .config(&config)
            .system_prompt(REASONING_SYSTEM_PROMPT)
            .next_step_prompt(None)
            .answer_policy(AnswerPolicy::Always)
            .max_steps(1)
            .provider(Arc::clone(&provider))
            .hub(hub)
            .cancellation(cancel)
            .build()
    })
}
