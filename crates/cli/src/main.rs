//! grokcli: chat with Grok in your terminal.
//!
//! Without `--prompt` this starts an interactive session; with it, the
//! prompt is answered once and the process exits.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use grokcli_config::ConfigError;

mod attachments;
mod commands;
mod ui;

#[derive(Parser)]
#[command(
    name = "grokcli",
    about = "Chat with Grok in your terminal",
    version
)]
struct Cli {
    /// xAI API key. If not provided, uses the XAI_API_KEY env var.
    #[arg(long)]
    api_key: Option<String>,

    /// Use the cheaper OpenAI model for development (requires OPENAI_API_KEY)
    #[arg(long)]
    dev: bool,

    /// Prompt to run directly. If not provided, enters interactive mode.
    #[arg(long)]
    prompt: Option<String>,

    /// Config file to use instead of ~/.grokcli/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the transcript
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = commands::chat::ChatOptions {
        api_key: cli.api_key,
        dev: cli.dev,
        prompt: cli.prompt,
        config: cli.config,
    };

    if let Err(e) = commands::chat::run(options).await {
        if let Some(ConfigError::MissingApiKey(message)) = e.downcast_ref::<ConfigError>() {
            Cli::command()
                .error(clap::error::ErrorKind::MissingRequiredArgument, message)
                .exit();
        }
        return Err(e);
    }

    Ok(())
}
