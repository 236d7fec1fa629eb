//! Terminal rendering: banner, answers, tool activity and the status line.

use std::io::IsTerminal;

use grokcli_agent::{Agent, TokenUsage};
use grokcli_core::message::{Message, Role};

pub const THINKING: &str = "Thinking...";

const BANNER: &str = r"
 ██████╗ ██████╗  ██████╗ ██╗  ██╗     ██████╗██╗     ██╗
██╔════╝ ██╔══██╗██╔═══██╗██║ ██╔╝    ██╔════╝██║     ██║
██║  ███╗██████╔╝██║   ██║█████╔╝     ██║     ██║     ██║
██║   ██║██╔══██╗██║   ██║██╔═██╗     ██║     ██║     ██║
╚██████╔╝██║  ██║╚██████╔╝██║  ██╗    ╚██████╗███████╗██║
 ╚═════╝ ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝     ╚═════╝╚══════╝╚═╝
";

pub fn print_banner() {
    println!("{BANNER}");
    println!("Chat with Grok in your terminal.");
    println!("Type 'exit' to quit.");
}

/// Print tool activity, the answer and the status line for the last turn.
pub fn print_turn(agent: &Agent, answer: &str) {
    for line in tool_activity(current_turn(agent.conversation().messages())) {
        println!("{}", dim(&line));
    }
    println!("✦ {answer}");
    println!(
        "{}",
        dim(&status_line(agent.last_token_usage(), agent.last_error_count()))
    );
}

pub fn status_line(usage: TokenUsage, errors: u32) -> String {
    format!("tokens: {usage} | errors: {errors}")
}

/// Turns after the most recent user turn.
fn current_turn(messages: &[Message]) -> &[Message] {
    match messages.iter().rposition(|m| m.role == Role::User) {
        Some(pos) => &messages[pos + 1..],
        None => messages,
    }
}

/// One line per tool turn, rendered from its JSON result.
pub fn tool_activity(turns: &[Message]) -> Vec<String> {
    turns
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| {
            let name = m.tool_name.as_deref().unwrap_or("tool");
            let result: serde_json::Value =
                serde_json::from_str(&m.content).unwrap_or(serde_json::Value::Null);
            describe_result(name, &result)
        })
        .collect()
}

fn describe_result(name: &str, result: &serde_json::Value) -> String {
    if result["status"] != "success" {
        let message = result["message"].as_str().unwrap_or("unknown error");
        return format!("  ⚙ {name} failed: {message}");
    }

    let detail = match name {
        "list_files" => {
            let count = result["files"].as_array().map_or(0, Vec::len);
            format!("{count} entries")
        }
        "read_file" => {
            let chars = result["content"].as_str().map_or(0, |c| c.chars().count());
            format!("{chars} chars")
        }
        "edit_file" => format!(
            "{} {}",
            result["operation"].as_str().unwrap_or("edit"),
            result["file_path"].as_str().unwrap_or("")
        ),
        _ => "ok".to_string(),
    };
    format!("  ⚙ {name}: {detail}")
}

fn dim(text: &str) -> String {
    if std::io::stdout().is_terminal() {
        format!("\x1b[2m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}
