//! Ergon - autonomous agent runner
//!
//! Main entry point for the CLI application.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ergon::cli::{run_prompt, RenderMode};
use ergon::llm::{LLMProvider, OllamaClient};
use ergon::task::{planning_agent_factory, reasoning_agent_factory, TaskRegistry, TaskStatus};
use ergon::tools::FinishPolicy;
use ergon::Config;
use tracing_subscriber::EnvFilter;

/// Ergon - run an autonomous agent task and stream its progress
#[derive(Parser, Debug)]
#[command(name = "ergon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task prompt
    prompt: Option<String>,

    /// Task prompt (alternative to the positional argument)
    #[arg(long = "prompt", short = 'p', conflicts_with = "prompt")]
    prompt_flag: Option<String>,

    /// Model used for completions
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Maximum think/act steps
    #[arg(long)]
    max_steps: Option<usize>,

    /// Single-step reasoning agent (no tools)
    #[arg(long)]
    single_step: bool,

    /// Whether `finish` requires the active plan to be complete
    #[arg(long, value_parser = str::parse::<FinishPolicy>)]
    finish_policy: Option<FinishPolicy>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only events
    let default_filter = if args.verbose { "ergon=debug" } else { "ergon=info" };
    let filter = EnvFilter::try_from_env("ERGON_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(prompt) = args.prompt.clone().or_else(|| args.prompt_flag.clone()) else {
        anyhow::bail!("no prompt given; pass it as an argument or with -p");
    };

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.ollama.model = model;
    }
    if let Some(max_steps) = args.max_steps {
        config.agent.max_steps = max_steps;
    }
    if let Some(policy) = args.finish_policy {
        config.agent.finish_policy = policy;
    }
    config.validate()?;

    let client = OllamaClient::from_config(&config)?;
    match client.is_model_available().await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(
            model = %config.ollama.model,
            "Model not listed by Ollama; run `ollama pull {}`",
            config.ollama.model
        ),
        Err(e) => anyhow::bail!("Ollama is not reachable at {}: {}", config.ollama_url(), e),
    }

    let provider: Arc<dyn LLMProvider> = Arc::new(client);
    let factory = if args.single_step {
        reasoning_agent_factory(config.agent.clone(), provider)
    } else {
        planning_agent_factory(config.agent.clone(), provider)
    };
    let registry = TaskRegistry::new(factory, config.hub.clone());

    let mode = if args.json {
        RenderMode::Json
    } else {
        RenderMode::Human
    };
    let (id, status) = run_prompt(&registry, &prompt, mode).await?;
    tracing::info!(task_id = %id, status = %status, "Done");

    Ok(match status {
        TaskStatus::Completed => ExitCode::SUCCESS,
        TaskStatus::Terminated => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}
