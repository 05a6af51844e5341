//! Task registry
//!
//! Owns one agent run and one event hub per task. Creating a task spawns the
//! run as its own tokio task and returns immediately; callers follow progress
//! through the task's hub and stop it through its cancellation token.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::Agent;
use crate::core::{ErgonError, HubConfig, Result};
use crate::events::{Event, EventHub, Subscription};

/// Builds the agent for a task, bound to that task's hub and token
pub type AgentFactory =
    Arc<dyn Fn(Arc<EventHub>, CancellationToken) -> Result<Agent> + Send + Sync>;

/// Opaque task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = ErgonError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(TaskId)
            .map_err(|_| ErgonError::TaskNotFound(s.to_string()))
    }
}

/// Lifecycle of a task as seen by callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
    Terminated,
}

impl TaskStatus {
    /// Whether the task's run has ended
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed(_) | TaskStatus::Terminated
        )
    }

    /// Pending or running tasks can still be terminated
    pub fn is_active(&self) -> bool {
        !self.is_final()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed(reason) => write!(f, "failed: {}", reason),
            TaskStatus::Terminated => write!(f, "terminated"),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a terminate request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateOutcome {
    Terminated,
    NotRunning,
}

/// Point-in-time view of a task
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    /// Retained events, oldest first
    pub events: Vec<Event>,
}

struct TaskEntry {
    id: TaskId,
    seq: u64,
    prompt: String,
    created_at: DateTime<Utc>,
    status: watch::Sender<TaskStatus>,
    hub: Arc<EventHub>,
    cancel: CancellationToken,
}

impl TaskEntry {
    fn status(&self) -> TaskStatus {
        self.status.borrow().clone()
    }

    fn snapshot(&self) -> Task {
        Task {
            id: self.id,
            prompt: self.prompt.clone(),
            created_at: self.created_at,
            status: self.status(),
            events: self.hub.history(),
        }
    }
}

/// Registry of tasks and their runs
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskEntry>>>,
    factory: AgentFactory,
    hub_config: HubConfig,
    next_seq: AtomicU64,
}

impl TaskRegistry {
    pub fn new(factory: AgentFactory, hub_config: HubConfig) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            factory,
            hub_config,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a task and start its run; returns without waiting for it
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(&self, prompt: impl Into<String>) -> Result<TaskId> {
        let prompt = prompt.into();
        let id = TaskId::new();
        let hub = Arc::new(EventHub::from_config(&self.hub_config));
        let cancel = CancellationToken::new();
        let agent = (self.factory)(Arc::clone(&hub), cancel.clone())?;

        let (status, _) = watch::channel(TaskStatus::Pending);
        let entry = Arc::new(TaskEntry {
            id,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            prompt: prompt.clone(),
            created_at: Utc::now(),
            status,
            hub,
            cancel,
        });

        self.tasks.write().insert(id, Arc::clone(&entry));
        info!(task_id = %id, agent = agent.name(), "Task created");

        let span = info_span!("task", task_id = %id);
        tokio::spawn(drive(entry, agent, prompt).instrument(span));

        Ok(id)
    }

    fn entry(&self, id: &TaskId) -> Result<Arc<TaskEntry>> {
        self.tasks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ErgonError::TaskNotFound(id.to_string()))
    }

    /// Snapshot of one task
    pub fn get(&self, id: &TaskId) -> Result<Task> {
        Ok(self.entry(id)?.snapshot())
    }

    /// Current status of one task
    pub fn status(&self, id: &TaskId) -> Result<TaskStatus> {
        Ok(self.entry(id)?.status())
    }

    /// Snapshots of every task, most recent first
    pub fn list(&self) -> Vec<Task> {
        let mut entries: Vec<Arc<TaskEntry>> = self.tasks.read().values().cloned().collect();
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        entries.iter().map(|e| e.snapshot()).collect()
    }

    /// Follow a task's events
    pub fn subscribe(&self, id: &TaskId, replay: bool) -> Result<Subscription> {
        Ok(self.entry(id)?.hub.subscribe(replay))
    }

    /// The task's hub, for callers that need history or subscriber counts
    pub fn hub(&self, id: &TaskId) -> Result<Arc<EventHub>> {
        Ok(Arc::clone(&self.entry(id)?.hub))
    }

    /// Request cancellation of a pending or running task
    ///
    /// A task that already ended is left untouched.
    pub fn terminate(&self, id: &TaskId) -> Result<TerminateOutcome> {
        let entry = self.entry(id)?;
        if !entry.status().is_active() {
            return Ok(TerminateOutcome::NotRunning);
        }
        info!(task_id = %id, "Terminating task");
        entry.cancel.cancel();
        Ok(TerminateOutcome::Terminated)
    }

    /// Cancel every active task; returns how many were signalled
    pub fn terminate_all(&self) -> usize {
        let entries: Vec<Arc<TaskEntry>> = self.tasks.read().values().cloned().collect();
        let mut signalled = 0;
        for entry in entries.iter().filter(|e| e.status().is_active()) {
            entry.cancel.cancel();
            signalled += 1;
        }
        if signalled > 0 {
            info!(signalled, "Terminating all active tasks");
        }
        signalled
    }

    /// Wait until the task's run has ended and return its final status
    pub async fn wait(&self, id: &TaskId) -> Result<TaskStatus> {
        let entry = self.entry(id)?;
        let mut rx = entry.status.subscribe();
        let status = rx
            .wait_for(TaskStatus::is_final)
            .await
            .map(|s| s.clone())
            .map_err(|_| ErgonError::InvalidState(format!("task {} status channel closed", id)))?;
        Ok(status)
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

/// One task's unit of work
async fn drive(entry: Arc<TaskEntry>, mut agent: Agent, prompt: String) {
    entry.status.send_replace(TaskStatus::Running);

    let outcome = AssertUnwindSafe(agent.run(&prompt)).catch_unwind().await;
    let status = match outcome {
        Ok(Ok(_)) => TaskStatus::Completed,
        Ok(Err(ErgonError::Cancelled)) => TaskStatus::Terminated,
        Ok(Err(e)) => TaskStatus::Failed(e.to_string()),
        Err(_) => {
            error!("Agent panicked");
            let already_terminal = entry.hub.history().last().is_some_and(Event::is_terminal);
            if !already_terminal {
                entry
                    .hub
                    .publish(Event::error(agent.current_step(), "agent panicked"));
            }
            TaskStatus::Failed("agent panicked".to_string())
        }
    };

    match &status {
        TaskStatus::Failed(reason) => warn!(reason = %reason, "Task failed"),
        other => info!(status = %other, "Task ended"),
    }
    entry.status.send_replace(status);
    entry.hub.close();
}
