//! ollama-chat - an interactive terminal chat client for a local Ollama server.
//!
//! Reads a line, sends it to the server's generate endpoint, prints the reply,
//! and repeats until `/exit` or end of input.

mod chat;
mod config;
mod error;
mod protocol;
mod provider;
mod transcript;

use anyhow::{Context, Result};
use chat::{ChatSession, ModelCheck, SessionEnd, SessionOptions};
use clap::{Parser, Subcommand};
use config::{Config, Overrides};
use provider::{CompletionProvider, OllamaProvider};
use std::process::Command as ProcessCommand;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ollama-chat")]
#[command(author, version, about = "Chat with a local Ollama model from the terminal")]
#[command(long_about = "Chat with a local Ollama model from the terminal.\n\nType a message and press Enter. Type /help for commands, /exit or Ctrl-D to quit.")]
struct Cli {
    /// Model to chat with (overrides the config file)
    #[arg(short = 'm', long, env = "OLLAMA_MODEL", value_name = "MODEL")]
    model: Option<String>,

    /// Ollama server address
    #[arg(long, env = "OLLAMA_HOST", value_name = "URL")]
    host: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable debug logging on stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List models installed on the Ollama server
    Models,
    /// Open configuration file in $EDITOR
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let overrides = Overrides {
        host: cli.host,
        model: cli.model,
        timeout_secs: cli.timeout,
    };

    match cli.command {
        Some(Commands::Models) => {
            let config = Config::load()?.with_overrides(overrides);
            list_models(&config).await
        }
        Some(Commands::Config { path }) => handle_config(path),
        None => {
            let config = Config::load()
                .context("Failed to load configuration")?
                .with_overrides(overrides);
            run_chat(config).await
        }
    }
}

/// Initialize logging on stderr so it never mixes with replies on stdout.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "ollama_chat=debug" } else { "ollama_chat=warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(level.parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();
    Ok(())
}

/// Run the interactive chat loop.
async fn run_chat(config: Config) -> Result<()> {
    let provider = OllamaProvider::new(config.server.host.clone(), config.server.timeout())?;
    let model = config.chat.model.clone();

    match chat::preflight(&provider, &model).await {
        Ok(ModelCheck::Installed) | Ok(ModelCheck::Unknown) => {}
        Ok(ModelCheck::Missing(available)) => {
            eprintln!("Warning: model '{}' is not installed on {}", model, provider.endpoint());
            if available.is_empty() {
                eprintln!("Pull one with: ollama pull {}", model);
            } else {
                eprintln!("Available: {}", available.join(", "));
            }
        }
        Err(e) => {
            eprintln!("{}", chat::fatal_message(&e));
            std::process::exit(1);
        }
    }

    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!(
            "Chatting with {} via {}. Type /help for commands, /exit to quit.",
            model,
            provider.endpoint()
        );
    }
    info!(model = %model, host = %config.server.host, "starting chat session");

    let mut session = ChatSession::new(
        &provider,
        SessionOptions {
            model,
            interactive,
            autosave: config.chat.autosave,
            chats_dir: Config::chats_dir()?,
        },
    );

    let input = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    let end = session
        .run_interruptible(input, &mut stdout, &mut stderr, tokio::signal::ctrl_c())
        .await?;
    info!(
        model = session.model(),
        turns = session.transcript().len(),
        state = ?session.state(),
        "chat session ended"
    );

    if end == SessionEnd::Interrupted {
        std::process::exit(130);
    }
    Ok(())
}

/// List available Ollama models.
async fn list_models(config: &Config) -> Result<()> {
    let provider = OllamaProvider::new(config.server.host.clone(), config.server.timeout())?;
    let models = match provider.list_models().await {
        Ok(models) => models,
        Err(e) => {
            eprintln!("{}", chat::fatal_message(&e));
            std::process::exit(1);
        }
    };

    println!("Available Models");
    println!("================\n");
    chat::write_models(&mut std::io::stdout(), &models, Some(&config.chat.model))
}

/// Handle the config command.
fn handle_config(print_path: bool) -> Result<()> {
    let config_path = Config::config_path()?;
    if print_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    // Create default config if it doesn't exist
    if !config_path.exists() {
        Config::default().save()?;
        println!("Created default config at {}", config_path.display());
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}
