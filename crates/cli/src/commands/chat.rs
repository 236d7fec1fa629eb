//! Interactive or single-prompt chat.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use grokcli_agent::Agent;
use grokcli_config::AppConfig;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::{attachments, ui};

pub struct ChatOptions {
    pub api_key: Option<String>,
    pub dev: bool,
    pub prompt: Option<String>,
    pub config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(AppConfig::load()?);
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(options.config.as_ref())?;

    // Credentials are checked before anything else is built
    let profile = config.resolve_profile(options.dev, options.api_key, |key| std::env::var(key).ok())?;
    info!(provider = %profile.name, model = %profile.model, "Starting session");

    let provider = grokcli_providers::build_from_profile(&profile);
    let cwd = std::env::current_dir()?;
    let tools = Arc::new(grokcli_tools::registry_for(&cwd, config.tools.snippet_chars));
    let mut agent = Agent::from_config(&config, provider, profile.model.clone(), tools);

    if options.dev {
        println!("DEVELOPMENT MODE: Using OpenAI {} (cheaper)", profile.model);
    }
    ui::print_banner();

    if let Some(prompt) = options.prompt {
        let message = attachments::expand(&prompt, &cwd).await;
        match answer_or_interrupt(&mut agent, &message, ctrl_c()).await {
            Some(answer) => ui::print_turn(&agent, &answer),
            None => {
                println!();
                println!("Goodbye!");
            }
        }
        return Ok(());
    }

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = ctrl_c() => {
                println!();
                break;
            }
        };

        // EOF (Ctrl+D)
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        let message = attachments::expand(input, &cwd).await;
        if message.len() != input.len() {
            debug!(bytes = message.len() - input.len(), "Expanded attachments");
        }

        let Some(answer) = answer_or_interrupt(&mut agent, &message, ctrl_c()).await else {
            println!();
            break;
        };
        ui::print_turn(&agent, &answer);
    }

    println!("Goodbye!");
    Ok(())
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Answer `message`, or `None` if `interrupt` fires first.
async fn answer_or_interrupt(
    agent: &mut Agent,
    message: &str,
    interrupt: impl Future<Output = ()>,
) -> Option<String> {
    eprint!("{}", ui::THINKING);
    let answer = tokio::select! {
        answer = agent.chat(message) => Some(answer),
        () = interrupt => None,
    };
    eprint!("\r{}\r", " ".repeat(ui::THINKING.len()));
    answer
}
