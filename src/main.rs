use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cartful_assistant::{build_registry, default_graph, InvocationPayload, OrderAssistant};
use cartful_core::config::AppConfig;
use cartful_session::SqliteContextStore;

#[derive(Parser)]
#[command(name = "cartful", version, about = "Conversational grocery ordering assistant")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "cartful.toml")]
    config: PathBuf,

    /// Conversation/customer identifier
    #[arg(long, default_value = "local")]
    customer: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL mode
    Repl,
    /// Process a single turn and exit
    Run {
        /// Raw JSON payload instead of a plain message
        #[arg(long)]
        payload: Option<String>,
        /// The customer message
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Show current configuration
    Config,
    /// Delete expired context entries and exit
    Purge,
}

/// How often the background sweep reaps expired context entries.
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cartful=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        let home_config = dirs_home().map(|h| h.join(".cartful").join("config.toml"));
        match home_config {
            Some(ref path) if path.exists() => {
                info!(path = %path.display(), "Loading config from home directory");
                AppConfig::load(path)?
            }
            _ => {
                eprintln!(
                    "Warning: No config file found. Set ANTHROPIC_API_KEY or create cartful.toml"
                );
                create_env_config()?
            }
        }
    };

    if let Some(Commands::Config) = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let context = Arc::new(SqliteContextStore::open(&config.context_db_path())?);

    if let Some(Commands::Purge) = cli.command {
        let removed = context.purge_expired()?;
        println!("Purged {} expired context entries", removed);
        return Ok(());
    }

    // A malformed graph is fatal at startup, never per turn.
    let graph = Arc::new(default_graph(&config)?);
    let registry = Arc::new(build_registry(&config));
    let assistant = Arc::new(OrderAssistant::new(&config, graph, registry, context.clone())?);

    // Background sweep for expired context, stopped on shutdown.
    let cancel = tokio_util::sync::CancellationToken::new();
    let sweep_cancel = cancel.clone();
    let sweep_store = context.clone();
    let sweep = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => break,
                _ = tokio::time::sleep(PURGE_INTERVAL) => {
                    if let Err(e) = sweep_store.purge_expired() {
                        warn!(error = %e, "Context purge failed");
                    }
                }
            }
        }
    });

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        ctrl_c_cancel.cancel();
    });

    let result = match cli.command {
        Some(Commands::Run { payload, message }) => {
            let payload = match payload {
                Some(raw) => {
                    let value: serde_json::Value = serde_json::from_str(&raw)?;
                    InvocationPayload::from_value(&value)?
                }
                None => {
                    let text = message.join(" ");
                    let text = if text.is_empty() {
                        let stdin = io::stdin();
                        stdin
                            .lock()
                            .lines()
                            .map_while(|l| l.ok())
                            .collect::<Vec<_>>()
                            .join("\n")
                    } else {
                        text
                    };
                    InvocationPayload::text(&cli.customer, text)
                }
            };

            let reply = assistant.handle_turn(&payload).await;
            println!("{}", reply.text);
            Ok(())
        }
        Some(Commands::Repl) | None => run_repl(&assistant, &cli.customer, &cancel).await,
        Some(Commands::Config) | Some(Commands::Purge) => unreachable!("handled above"),
    };

    cancel.cancel();
    sweep.await.ok();
    result
}

async fn run_repl(
    assistant: &OrderAssistant,
    customer: &str,
    cancel: &tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    println!("Cartful v{}", env!("CARGO_PKG_VERSION"));
    println!("Customer: {}", customer);
    println!("Type /quit to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "/quit" | "/exit" | "/q") {
            println!("Goodbye!");
            break;
        }

        let reply = assistant
            .handle_turn(&InvocationPayload::text(customer, input))
            .await;
        if reply.is_fallback() {
            println!("[fallback] {}", reply.text);
        } else {
            println!("{}", reply.text);
        }
        println!();
    }

    Ok(())
}

fn create_env_config() -> anyhow::Result<AppConfig> {
    let anthropic_key = std::env::var("ANTHROPIC_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    let (provider, model_id, api_key, base_url) = if let Some(key) = anthropic_key {
        (
            "anthropic".to_string(),
            "claude-sonnet-4-20250514".to_string(),
            Some(key),
            None,
        )
    } else if let Some(key) = openai_key {
        ("openai".to_string(), "gpt-4o".to_string(), Some(key), None)
    } else {
        // Default to Ollama (local)
        (
            "ollama".to_string(),
            "llama3.2".to_string(),
            Some("ollama".to_string()),
            Some("http://localhost:11434/v1/chat/completions".to_string()),
        )
    };

    let toml_str = format!(
        "[model]\nprovider = \"{}\"\nmodel_id = \"{}\"\n",
        provider, model_id
    );
    let mut config: AppConfig = toml::from_str(&toml_str)?;
    config.model.api_key = api_key;
    config.model.base_url = base_url;
    Ok(config)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
