//! Terminal front end: loads settings, wires the kernel, and runs the REPL.

mod commands;
mod console;
mod editor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gem_assist::adapters::ollama::{OllamaAdapter, OllamaConfig};
use gem_assist::adapters::openai::{OpenAiAdapter, OpenAiConfig};
use gem_assist::adapters::traits::ModelAdapter;
use gem_assist::config::{Provider, Settings};
use gem_assist::kernel::{
    CompositeObserver, Conversation, Orchestrator, OrchestratorConfig, RetryPolicy,
    TracingObserver, TurnObserver,
};
use gem_assist::prompts::PromptSet;
use gem_assist::telemetry::{TelemetryConfig, init_tracing};
use gem_assist::tools::{ToolRegistry, builtin_plugins, discover};
use tracing::{info, warn};

use crate::commands::{Command, HELP, session_path};
use crate::console::ConsoleObserver;
use crate::editor::{Input, LineEditor};

/// Two-phase terminal assistant.
#[derive(Debug, Parser)]
#[command(name = "gem-assist", version, about)]
struct Cli {
    /// JSON settings file, applied before `ASSISTANT_*` variables.
    #[arg(short, long, env = "ASSISTANT_CONFIG")]
    config: Option<PathBuf>,

    /// Model identifier.
    #[arg(long)]
    model: Option<String>,

    /// Backend protocol: `openai` or `ollama`.
    #[arg(long)]
    provider: Option<Provider>,

    /// Endpoint base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// JSON file overriding the built-in prompts.
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Directory used by `/save`, `/load` and input history.
    #[arg(long, default_value = "sessions")]
    sessions_dir: PathBuf,

    /// Show reasoning plans and verbose logs.
    #[arg(long)]
    debug: bool,

    /// Send one message, print the answer, and exit.
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_tracing(&TelemetryConfig::for_cli(settings.debug));

    let prompts = match &settings.prompts_path {
        Some(path) => PromptSet::load(path)?,
        None => PromptSet::default(),
    };

    let mut registry = ToolRegistry::new();
    let stats = discover(&mut registry, &builtin_plugins());
    if stats.errored_plugins > 0 {
        warn!(errored = stats.errored_plugins, "some plugins failed to load; see /status");
    }
    info!(tools = stats.total_tools, "tools ready");

    let adapter = build_adapter(&settings)?;
    let observer: Arc<dyn TurnObserver> = Arc::new(CompositeObserver::new([
        Arc::new(TracingObserver) as Arc<dyn TurnObserver>,
        Arc::new(ConsoleObserver::new(settings.debug)),
    ]));
    let mut orchestrator = Orchestrator::new(
        adapter,
        Arc::new(registry),
        prompts,
        orchestrator_config(&settings),
    )
    .with_observer(observer);

    if let Some(message) = cli.message.as_deref() {
        let outcome = orchestrator.handle_turn(message).await?;
        println!("{}", outcome.response);
        return Ok(());
    }

    if settings.clear_terminal {
        print!("\x1b[2J\x1b[1;1H");
    }
    repl(&mut orchestrator, &settings, &cli.sessions_dir).await
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(model) = &cli.model {
        settings.model.clone_from(model);
    }
    if let Some(provider) = cli.provider {
        settings.provider = provider;
    }
    if let Some(base_url) = &cli.base_url {
        settings.base_url = Some(base_url.clone());
    }
    if let Some(prompts) = &cli.prompts {
        settings.prompts_path = Some(prompts.clone());
    }
    settings.debug |= cli.debug;
    settings.validate()?;
    Ok(settings)
}

fn build_adapter(settings: &Settings) -> Result<Arc<dyn ModelAdapter>> {
    let adapter: Arc<dyn ModelAdapter> = match settings.provider {
        Provider::OpenAi => {
            let mut config = OpenAiConfig::from_env(settings.model.clone())
                .with_default_temperature(settings.temperature)
                .with_timeout(settings.request_timeout());
            if let Some(url) = settings.effective_base_url() {
                config = config.with_base_url(url)?;
            }
            Arc::new(OpenAiAdapter::new(config)?)
        }
        Provider::Ollama => {
            let mut config = OllamaConfig::new(settings.model.clone())
                .with_default_temperature(settings.temperature)
                .with_timeout(settings.request_timeout());
            if let Some(url) = settings.effective_base_url() {
                config = config.with_base_url(url)?;
            }
            Arc::new(OllamaAdapter::new(config)?)
        }
    };
    Ok(adapter)
}

fn orchestrator_config(settings: &Settings) -> OrchestratorConfig {
    OrchestratorConfig {
        assistant_name: settings.name.clone(),
        history_limit: settings.history_limit,
        max_tool_rounds: settings.max_tool_rounds,
        temperature: Some(settings.temperature),
        top_p: settings.top_p,
        max_output_tokens: Some(settings.max_tokens),
        seed: settings.seed,
        enable_reasoning_validation: settings.enable_reasoning_validation,
        reasoning_quality_threshold: settings.reasoning_quality_threshold,
        retry: RetryPolicy::default(),
    }
}

async fn repl(
    orchestrator: &mut Orchestrator,
    settings: &Settings,
    sessions_dir: &Path,
) -> Result<()> {
    let metadata = orchestrator.metadata();
    println!(
        "{} ({} via {}). Type /help for commands.",
        settings.name,
        metadata.model(),
        metadata.provider()
    );

    let mut editor = LineEditor::open(sessions_dir)?;
    loop {
        let line = match editor.read("\n› ")? {
            Input::Line(line) => line,
            Input::Cancelled => {
                println!("^C");
                continue;
            }
            Input::Eof => break,
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Exit => break,
            Command::Help => println!("{HELP}"),
            Command::Clear => {
                orchestrator.clear();
                println!("Conversation cleared.");
            }
            Command::Save(name) => {
                let path = session_path(sessions_dir, &name);
                match orchestrator.conversation().save(&path).await {
                    Ok(()) => println!("Saved to {}.", path.display()),
                    Err(err) => println!("Could not save: {err}"),
                }
            }
            Command::Load(name) => {
                let path = session_path(sessions_dir, &name);
                match Conversation::load(&path).await {
                    Ok(conversation) => {
                        let count = conversation.len();
                        orchestrator.replace_conversation(conversation);
                        println!("Loaded {count} messages from {}.", path.display());
                    }
                    Err(err) => println!("Could not load: {err}"),
                }
            }
            Command::BadName(command) => {
                println!("Usage: /{command} <name> (letters, digits, - and _)");
            }
            Command::Tools => print_tools(orchestrator.registry()),
            Command::Status => print_status(orchestrator)?,
            Command::Reasoning => match orchestrator.last_reasoning() {
                Some(plan) => println!("{plan}"),
                None => println!("No reasoning yet."),
            },
            Command::Unknown(name) => println!("Unknown command /{name}. Type /help."),
            Command::Message(message) => {
                // A cancelled turn leaves the conversation as it was.
                tokio::select! {
                    result = orchestrator.handle_turn(&message) => match result {
                        Ok(outcome) => println!("\n{}", outcome.response),
                        Err(err) => println!("Error: {err}"),
                    },
                    _ = tokio::signal::ctrl_c() => println!("\nCancelled."),
                }
            }
        }
    }

    editor.save_history();
    println!("Goodbye.");
    Ok(())
}

fn print_tools(registry: &ToolRegistry) {
    for spec in registry.list() {
        let categories: Vec<&str> = spec
            .capabilities()
            .categories()
            .iter()
            .map(|c| c.as_str())
            .collect();
        println!(
            "{:<26} [{}] {}",
            spec.name(),
            categories.join(", "),
            spec.description()
        );
    }
}

fn print_status(orchestrator: &Orchestrator) -> Result<()> {
    let conversation = orchestrator.conversation();
    let status = serde_json::json!({
        "model": orchestrator.metadata().model(),
        "provider": orchestrator.metadata().provider(),
        "session": conversation.session_id().to_string(),
        "messages": conversation.len(),
        "registry": orchestrator.registry().status(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
