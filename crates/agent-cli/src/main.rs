use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;

use agent_core::{AgentEvent, IntentStore, JsonlThreadStore, Thread, ThreadStore};
use agent_llm::OpenAIProvider;
use agent_loop::QueryEngine;
use agent_tools::ConnectorSet;

mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "agent-cli")]
#[command(about = "Run queries through the fulfillment engine")]
#[command(version)]
struct Cli {
    /// LLM API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// LLM model name
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY", default_value = "")]
    api_key: String,

    /// YAML settings file (engine options, intent catalog, agent prompts)
    #[arg(long, short, env = "AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, env = "DEBUG", default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream one query
    Ask {
        query: String,

        /// Continue an existing thread
        #[arg(long)]
        thread_id: Option<String>,

        #[arg(long, default_value = "cli")]
        user_id: String,

        /// Print raw events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List the loaded intent catalog
    Intents,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let settings = Settings::load(cli.config.as_deref())?;
    log::debug!(
        "Loaded {} intents, {} agent prompts",
        settings.intents.len(),
        settings.agent_prompts.len()
    );

    match cli.command {
        Commands::Intents => list_intents(&settings).await,
        Commands::Ask {
            ref query,
            ref thread_id,
            ref user_id,
            json,
        } => {
            let llm = OpenAIProvider::new(cli.api_key.clone())
                .with_base_url(cli.llm_base_url.clone())
                .with_model(cli.model.clone());
            log::info!("LLM: {} ({})", cli.llm_base_url, llm.model());

            ask(settings, Arc::new(llm), query, thread_id.clone(), user_id, json).await
        }
    }
}

async fn list_intents(settings: &Settings) -> anyhow::Result<()> {
    let intents = settings.build_store().list_intents().await?;
    if intents.is_empty() {
        println!("{}", "No intents configured".dimmed());
        return Ok(());
    }

    for intent in intents {
        println!("{} {}", intent.name.cyan().bold(), format!("({})", intent.id).dimmed());
        println!("   {}", intent.description);
        if let Some(model) = intent.model {
            println!("   {}", format!("model: {}", model).dimmed());
        }
    }
    Ok(())
}

async fn ask(
    settings: Settings,
    llm: Arc<OpenAIProvider>,
    query: &str,
    thread_id: Option<String>,
    user_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    let store = Arc::new(settings.build_store());
    let mut engine = QueryEngine::new(llm, Arc::new(ConnectorSet::new()), store.clone())
        .with_agent_store(store)
        .with_config(settings.engine.clone());

    let thread_id = thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut thread = Thread::new(thread_id.clone(), user_id);

    if let Some(dir) = &settings.threads_dir {
        let threads = JsonlThreadStore::new(dir);
        threads.init().await?;
        if let Some(stored) = threads.load_thread(&thread_id).await? {
            log::info!(
                "[{}] Continuing thread with {} messages",
                thread_id,
                stored.messages.len()
            );
            thread = stored;
        }
        engine = engine.with_thread_store(Arc::new(threads));
    }

    let engine = Arc::new(engine);
    let mut handle = engine.stream_query(query, thread);

    let cancel_token = handle.cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, cancelling query");
            cancel_token.cancel();
        }
    });

    let start = Instant::now();
    let mut event_count = 0usize;

    while let Some(event) = handle.events.next().await {
        event_count += 1;
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event)?;
        }
    }

    let thread = handle.join.await?;
    if !json {
        println!();
        println!(
            "{}",
            format!(
                "📊 {} events in {:?}, thread {} now has {} messages",
                event_count,
                start.elapsed(),
                thread.id,
                thread.messages.len()
            )
            .dimmed()
        );
    }
    Ok(())
}

fn print_event(event: &AgentEvent) -> io::Result<()> {
    match event {
        AgentEvent::ThreadId { thread_id, user_id } => {
            println!("{}", format!("🧵 Thread {} (user {})", thread_id, user_id).dimmed());
        }
        AgentEvent::ThinkingProcess { title, description } => {
            println!("{}", format!("💭 {}", title).cyan());
            for line in description.lines() {
                println!("{}", format!("   {}", line).dimmed());
            }
        }
        AgentEvent::IntentProcess {
            subquery,
            action_plan,
        } => {
            println!("{}", format!("🎯 {}", subquery).cyan());
            if let Some(plan) = action_plan {
                println!("{}", format!("   Plan: {}", plan).dimmed());
            }
        }
        AgentEvent::TextChunk { delta } => {
            print!("{}", delta.green());
            io::stdout().flush()?;
        }
        AgentEvent::ToolStart {
            protocol,
            tool_name,
            tool_args,
            ..
        } => {
            println!("{}", format!("🔧 {} tool: {}", protocol, tool_name).yellow());
            println!("{}", format!("   Args: {}", tool_args).dimmed());
        }
        AgentEvent::ToolOutput { result, .. } => {
            println!("{}", format!("✅ Tool result: {}", result).green());
        }
        AgentEvent::TaskStatus {
            task_id,
            state,
            message,
        } => {
            let line = match message {
                Some(message) => format!("📡 Task {} {:?}: {}", task_id, state, message),
                None => format!("📡 Task {} {:?}", task_id, state),
            };
            println!("{}", line.dimmed());
        }
        AgentEvent::Error { message } => {
            println!();
            println!("{}", format!("❌ Error: {}", message).red());
        }
    }
    Ok(())
}
