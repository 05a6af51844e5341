//! Agent state machine
//!
//! Drives one run through bounded think/act steps. Each step asks the
//! provider for the next turn, runs any selected tools through the registry,
//! and publishes what happened to the run's [`EventHub`]. Every run ends with
//! exactly one terminal event: `complete` (finished, truncated or cancelled)
//! or `error`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::conversation::Conversation;
use super::policy::{AnswerPolicy, ContextPolicy, StuckDetector};
use super::state::AgentState;
use crate::core::{AgentConfig, ErgonError, Message, Result, ToolCall, ToolResult};
use crate::events::{Event, EventHub};
use crate::llm::{LLMProvider, LLMResponse};
use crate::plan::SharedPlanTracker;
use crate::tools::ToolRegistry;

const TERMINATED_RESULT: &str = "Task was terminated";

/// One agent run
pub struct Agent {
    name: String,
    system_prompt: String,
    next_step_prompt: Option<String>,
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    hub: Arc<EventHub>,
    plans: Option<SharedPlanTracker>,
    answer_policy: AnswerPolicy,
    context_policy: Option<ContextPolicy>,
    stuck: StuckDetector,
    max_retries: u32,
    retry_backoff: Duration,
    cancel: CancellationToken,

    conversation: Conversation,
    state: AgentState,
    current_step: usize,
    max_steps: usize,
    result: Option<String>,
    plan_revision: u64,
}

impl Agent {
    /// Create a builder for an agent
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Steps started so far (never exceeds `max_steps`)
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Final result once finished
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stuck_interventions(&self) -> usize {
        self.stuck.interventions()
    }

    /// Seed the transcript with `prompt` and step until a terminal state
    #[instrument(skip(self, prompt), fields(agent = %self.name))]
    pub async fn run(&mut self, prompt: &str) -> Result<String> {
        self.transition(AgentState::Running)?;
        info!(max_steps = self.max_steps, "Starting agent run");
        self.conversation.add_user(prompt);

        while self.step().await? {}

        Ok(self.result.clone().unwrap_or_default())
    }

    /// Execute one think/act cycle; returns whether to keep stepping
    ///
    /// Failures and cancellation are reported as terminal events before the
    /// error is returned.
    pub async fn step(&mut self) -> Result<bool> {
        if self.state != AgentState::Running {
            return Err(ErgonError::InvalidState(format!(
                "cannot step agent in state {}",
                self.state
            )));
        }

        match self.step_inner().await {
            Ok(keep_going) => Ok(keep_going),
            Err(ErgonError::Cancelled) => {
                self.on_cancelled();
                Err(ErgonError::Cancelled)
            }
            Err(e) => {
                self.on_failure(&e);
                Err(e)
            }
        }
    }

    async fn step_inner(&mut self) -> Result<bool> {
        if self.cancel.is_cancelled() {
            return Err(ErgonError::Cancelled);
        }

        self.current_step += 1;
        let step = self.current_step;
        debug!(step, "Step started");
        self.emit(Event::status_change(step, AgentState::Running, None));

        let response = self.think().await?;
        self.emit(Event::think(step, response.content.clone()));
        self.conversation.push(Message::assistant_with_tools(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        let had_tool_calls = response.has_tool_calls();
        if had_tool_calls {
            if let Some(result) = self.act(&response.tool_calls).await? {
                self.finish(result, false)?;
                return Ok(false);
            }
        }

        if self.answer_policy.finishes(had_tool_calls) {
            self.finish(response.content, false)?;
            return Ok(false);
        }

        if self.stuck.check(&mut self.conversation) {
            warn!(
                step,
                threshold = self.stuck.threshold(),
                "Agent appears stuck; added corrective note"
            );
        }

        if step >= self.max_steps {
            self.finish(
                format!("Terminated: reached max steps ({})", self.max_steps),
                true,
            )?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Ask the provider for the next turn, retrying provider failures
    async fn think(&self) -> Result<LLMResponse> {
        let messages = self.request_messages();
        let system = [Message::system(self.system_prompt.clone())];
        let tools = self.tools.definitions();

        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ErgonError::Cancelled),
                outcome = self.provider.ask(&messages, &system, &tools) => outcome,
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(ErgonError::Provider(msg)) if attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.retry_backoff * attempt;
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %msg,
                        "Completion failed; retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(ErgonError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Transcript sent to the provider for this step
    fn request_messages(&self) -> Vec<Message> {
        let mut messages = self.conversation.messages().to_vec();
        if let Some(hint) = &self.next_step_prompt {
            if self.conversation.len() > 1 {
                messages.push(Message::user(hint.clone()));
            }
        }
        match &self.context_policy {
            Some(policy) => policy(&messages),
            None => messages,
        }
    }

    /// Run the selected tools in order; returns the final result if a
    /// terminal tool succeeded
    async fn act(&mut self, calls: &[ToolCall]) -> Result<Option<String>> {
        let step = self.current_step;

        for (i, call) in calls.iter().enumerate() {
            self.emit(Event::tool_select(step, call.name.clone()));

            let result = match self.tools.validate(&call.name, &call.arguments) {
                Ok(()) => {
                    self.emit(Event::tool_execute(
                        step,
                        call.name.clone(),
                        call.arguments.clone(),
                    ));
                    self.run_tool(call).await?
                }
                Err(e) if e.is_recoverable() => {
                    warn!(step, tool = %call.name, error = %e, "Rejected tool call");
                    ToolResult::failure(e.to_string())
                }
                Err(e) => return Err(e),
            };

            self.emit(Event::tool_result(step, call.name.clone(), &result));
            self.conversation
                .add_tool(call.name.clone(), result.to_observation());
            self.publish_plan_if_changed();

            if self.tools.is_terminal(&call.name) && !result.is_error() {
                if i + 1 < calls.len() {
                    debug!(
                        step,
                        skipped = calls.len() - i - 1,
                        "Skipping calls after terminal tool"
                    );
                }
                return Ok(Some(result.output));
            }
        }

        Ok(None)
    }

    async fn run_tool(&self, call: &ToolCall) -> Result<ToolResult> {
        debug!(step = self.current_step, tool = %call.name, "Executing tool");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ErgonError::Cancelled),
            result = self.tools.run(&call.name, &call.arguments) => result,
        }
    }

    fn publish_plan_if_changed(&mut self) {
        let Some(plans) = &self.plans else {
            return;
        };

        let snapshot = {
            let tracker = plans.lock();
            if tracker.revision() == self.plan_revision {
                return;
            }
            self.plan_revision = tracker.revision();
            tracker.active().map(|plan| plan.snapshot())
        };

        if let Some(snapshot) = snapshot {
            self.emit(Event::plan_update(self.current_step, snapshot));
        }
    }

    fn finish(&mut self, result: String, truncated: bool) -> Result<()> {
        self.transition(AgentState::Finished)?;
        let step = self.current_step;
        info!(step, truncated, "Agent finished");

        self.emit(Event::status_change(step, AgentState::Finished, None));
        if truncated {
            self.emit(Event::truncated(step, result.clone()));
        } else {
            self.emit(Event::complete(step, result.clone()));
        }
        self.result = Some(result);
        Ok(())
    }

    fn on_failure(&mut self, error: &ErgonError) {
        if self.transition(AgentState::Error).is_err() {
            return;
        }
        let step = self.current_step;
        warn!(step, error = %error, "Agent failed");

        self.emit(Event::status_change(
            step,
            AgentState::Error,
            Some(error.to_string()),
        ));
        self.emit(Event::error(step, error.to_string()));
    }

    fn on_cancelled(&mut self) {
        if self.transition(AgentState::Error).is_err() {
            return;
        }
        let step = self.current_step;
        info!(step, "Agent cancelled");

        self.emit(Event::status_change(
            step,
            AgentState::Error,
            Some("terminated".to_string()),
        ));
        self.emit(Event::terminated(step, TERMINATED_RESULT));
        self.result = Some(TERMINATED_RESULT.to_string());
    }

    /// Move to `next`, rejecting moves the lifecycle does not allow
    fn transition(&mut self, next: AgentState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ErgonError::InvalidState(format!(
                "cannot move agent from {} to {}",
                self.state, next
            )));
        }
        debug!(from = %self.state, to = %next, "State change");
        self.state = next;
        Ok(())
    }

    fn emit(&self, event: Event) {
        debug!(step = event.step, kind = %event.kind(), "Event");
        self.hub.publish(event);
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("current_step", &self.current_step)
            .field("max_steps", &self.max_steps)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Builder for creating Agents
pub struct AgentBuilder {
    name: String,
    system_prompt: Option<String>,
    next_step_prompt: Option<String>,
    provider: Option<Arc<dyn LLMProvider>>,
    tools: Option<Arc<ToolRegistry>>,
    hub: Option<Arc<EventHub>>,
    plans: Option<SharedPlanTracker>,
    answer_policy: AnswerPolicy,
    context_policy: Option<ContextPolicy>,
    duplicate_threshold: usize,
    max_steps: usize,
    max_retries: u32,
    retry_backoff: Duration,
    cancel: Option<CancellationToken>,
}

impl AgentBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: None,
            next_step_prompt: None,
            provider: None,
            tools: None,
            hub: None,
            plans: None,
            answer_policy: AnswerPolicy::default(),
            context_policy: None,
            duplicate_threshold: 2,
            max_steps: 20,
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            cancel: None,
        }
    }

    /// Take prompts, limits and policies from configuration
    pub fn config(mut self, config: &AgentConfig) -> Self {
        self.system_prompt = Some(config.system_prompt.clone());
        self.next_step_prompt = config.next_step_prompt.clone();
        self.answer_policy = config.answer_policy;
        self.duplicate_threshold = config.duplicate_threshold;
        self.max_steps = config.max_steps;
        self.max_retries = config.max_retries;
        self.retry_backoff = Duration::from_millis(config.retry_backoff_ms);
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the hint sent before each follow-up step
    pub fn next_step_prompt(mut self, prompt: Option<String>) -> Self {
        self.next_step_prompt = prompt;
        self
    }

    /// Set the completion provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Publish to an existing hub
    pub fn hub(mut self, hub: Arc<EventHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Plan tracker watched for `plan_update` events
    pub fn plans(mut self, plans: SharedPlanTracker) -> Self {
        self.plans = Some(plans);
        self
    }

    pub fn answer_policy(mut self, policy: AnswerPolicy) -> Self {
        self.answer_policy = policy;
        self
    }

    pub fn context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = Some(policy);
        self
    }

    /// Identical trailing assistant turns that trigger a corrective note (0 disables)
    pub fn duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    /// Set maximum steps
    pub fn max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Token that cancels the run at its next suspension point
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the Agent
    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| ErgonError::config("agent needs a completion provider"))?;
        if self.max_steps == 0 {
            return Err(ErgonError::config("max_steps must be at least 1"));
        }
        if self.duplicate_threshold == 1 {
            return Err(ErgonError::config(
                "duplicate_threshold must be 0 (disabled) or at least 2",
            ));
        }

        let name = self.name;
        Ok(Agent {
            system_prompt: self.system_prompt.unwrap_or_else(|| {
                format!(
                    "You are a helpful agent named '{}'. Complete the task you are given.",
                    name
                )
            }),
            name,
            next_step_prompt: self.next_step_prompt,
            provider,
            tools: self.tools.unwrap_or_default(),
            hub: self.hub.unwrap_or_default(),
            plans: self.plans,
            answer_policy: self.answer_policy,
            context_policy: self.context_policy,
            stuck: StuckDetector::new(self.duplicate_threshold),
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
            cancel: self.cancel.unwrap_or_default(),
            conversation: Conversation::new(),
            state: AgentState::Idle,
            current_step: 0,
            max_steps: self.max_steps,
            result: None,
            plan_revision: 0,
        })
    }
}
