//! askrelay setup wizard.
//!
//! Asks for the bot token and the administrator ids in the terminal and
//! writes a `config.toml` next to the bot. An existing file is only
//! overwritten after confirmation.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

// ── Config formatting ──────────────────────────────────────────────────────────

struct ConfigParams<'a> {
    bot_token: &'a str,
    admin_ids: &'a str,
    choice_ttl_hours: u64,
    question_ttl_hours: u64,
}

/// Normalize "1 2,3" into "1, 2, 3", rejecting anything that is not a number.
fn normalize_ids(raw: &str) -> Result<String> {
    let ids = raw
        .split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("Not a Telegram user id: {s:?}"))
        })
        .collect::<Result<Vec<_>>>()?;

    if ids.is_empty() {
        bail!("At least one administrator id is required");
    }

    Ok(ids
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", "))
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> Result<String> {
    let ids_str = normalize_ids(p.admin_ids)?;
    let bot_token = p.bot_token.trim();
    if bot_token.is_empty() {
        bail!("The bot token is required");
    }
    let choice_ttl = p.choice_ttl_hours;
    let question_ttl = p.question_ttl_hours;

    Ok(format!(
        r#"[telegram]
bot_token = "{bot_token}"
admin_ids = [{ids_str}]

[relay]
# Hours before an unused menu choice or an unanswered question is forgotten (0 = never)
choice_ttl_hours = {choice_ttl}
question_ttl_hours = {question_ttl}
sweep_cron = "0 */10 * * * *"

# [messages]
# greeting = "..."
# answer_prefix = "📨 Ответ наставника:"
"#
    ))
}

// ── Terminal wizard ────────────────────────────────────────────────────────────

fn run_cli(config_path: &Path, input: &mut impl BufRead) -> Result<()> {
    println!("=== askrelay setup ===\n");

    let mut read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        input.read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    if config_path.exists() {
        let answer = read_line(&format!(
            "{} already exists. Overwrite? [y/N]: ",
            config_path.display()
        ))?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Nothing written.");
            return Ok(());
        }
    }

    let bot_token = read_line("Telegram bot token: ")?;
    let admin_ids = read_line("Administrator user IDs (comma-separated): ")?;
    let choice_ttl = read_line("Forget unused menu choices after N hours [24]: ")?;
    let question_ttl = read_line("Forget unanswered questions after N hours [168]: ")?;

    let parse_hours = |s: &str, default: u64| -> Result<u64> {
        if s.is_empty() {
            Ok(default)
        } else {
            s.parse()
                .with_context(|| format!("Not a number of hours: {s:?}"))
        }
    };

    let config = format_config(&ConfigParams {
        bot_token: &bot_token,
        admin_ids: &admin_ids,
        choice_ttl_hours: parse_hours(&choice_ttl, 24)?,
        question_ttl_hours: parse_hours(&question_ttl, 168)?,
    })?;

    std::fs::write(config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config saved to {}", config_path.display());
    println!("   Run the bot with:  cargo run --bin askrelay");
    Ok(())
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let stdin = io::stdin();
    run_cli(&config_path, &mut stdin.lock())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
