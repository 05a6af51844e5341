//! CLI module - command-line front end
//!
//! Runs one task through the registry and streams its events to stdout.

pub mod render;

use std::io::{self, Write};

use tracing::{info, warn};

use crate::core::Result;
use crate::task::{TaskId, TaskRegistry, TaskStatus};

pub use render::{render, RenderMode};

/// Create a task for `prompt`, print its events until it ends, and return
/// its final status. Ctrl-C terminates the task; its terminal events are
/// still printed.
pub async fn run_prompt(
    registry: &TaskRegistry,
    prompt: &str,
    mode: RenderMode,
) -> Result<(TaskId, TaskStatus)> {
    let id = registry.create(prompt)?;
    let mut events = registry.subscribe(&id, true)?;
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = render(&event, mode) {
                    println!("{}", line);
                    let _ = io::stdout().flush();
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        info!(task_id = %id, "Interrupted; terminating task");
                        registry.terminate(&id)?;
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
                }
            }
        }
    }

    let status = registry.wait(&id).await?;
    Ok((id, status))
}
