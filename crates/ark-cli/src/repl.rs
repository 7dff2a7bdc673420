//! REPL – the interactive ARK shell.
//!
//! Plain text is sent through the consensus pipeline.  Slash-commands:
//!   /alert <json>          – raise a hardware alert with the given payload
//!   /update <json>         – deliver a system update
//!   /release               – release the current attention focus
//!   /review [n]            – run up to n queued reviews (default 5)
//!   /report                – meta-observer report as JSON
//!   /memory <text>         – search long-term memory
//!   /mood <state> [e=v …]  – set consciousness state and emotions
//!   /status                – brain status
//!   /models                – list Ollama models
//!   /help                  – show this list
//!   /quit | /exit          – leave the shell

use ark_memory::{EmotionalTrace, MemoryEntry};
use ark_runtime::{BrainError, BrainOutcome, CognitiveBrain, FollowUp};
use ark_types::{Event, Payload};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::ollama;

const DEFAULT_REVIEW_BATCH: usize = 5;
const MEMORY_SEARCH_LIMIT: usize = 10;
const VOTE_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ask(String),
    Alert(Payload),
    Update(Payload),
    Release,
    Review(usize),
    Report,
    Memory(String),
    Mood { state: String, trace: EmotionalTrace },
    Status,
    Models,
    Help,
    Quit,
}

/// Parse one non-empty input line.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(Command::Ask(line.to_string()));
    }
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match name {
        "/alert" => parse_payload(rest).map(Command::Alert),
        "/update" => parse_payload(rest).map(Command::Update),
        "/release" => Ok(Command::Release),
        "/review" if rest.is_empty() => Ok(Command::Review(DEFAULT_REVIEW_BATCH)),
        "/review" => rest
            .parse::<usize>()
            .map(Command::Review)
            .map_err(|_| format!("'{}' is not a count", rest)),
        "/report" => Ok(Command::Report),
        "/memory" if rest.is_empty() => Err("usage: /memory <text>".to_string()),
        "/memory" => Ok(Command::Memory(rest.to_string())),
        "/mood" => parse_mood(rest),
        "/status" => Ok(Command::Status),
        "/models" => Ok(Command::Models),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command '{}'", other)),
    }
}

fn parse_payload(raw: &str) -> Result<Payload, String> {
    if raw.is_empty() {
        return Ok(Payload::new());
    }
    serde_json::from_str::<Payload>(raw).map_err(|e| format!("payload must be a JSON object: {}", e))
}

fn parse_mood(rest: &str) -> Result<Command, String> {
    let mut parts = rest.split_whitespace();
    let state = parts
        .next()
        .ok_or_else(|| "usage: /mood <state> [emotion=intensity …]".to_string())?;
    let mut trace = EmotionalTrace::new();
    for part in parts {
        let (emotion, value) = part
            .split_once('=')
            .ok_or_else(|| format!("'{}' is not emotion=intensity", part))?;
        let intensity = value
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", value))?;
        trace.insert(emotion.to_string(), intensity);
    }
    Ok(Command::Mood {
        state: state.to_string(),
        trace,
    })
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, brain: &mut CognitiveBrain, runtime: &Runtime, cfg: &Config) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "ark>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{} {}. Type {} for available commands.", "✗".red(), e, "/help".bold());
                continue;
            }
        };

        match command {
            Command::Ask(text) => cmd_ask(brain, runtime, &text),
            Command::Alert(payload) => cmd_event(brain, Event::hardware_alert(payload)),
            Command::Update(payload) => cmd_event(brain, Event::system_update(payload)),
            Command::Release => match brain.release_attention() {
                Some(focus) => println!("  Released focus {}", focus.topic.yellow()),
                None => println!("  {}", "No current focus.".dimmed()),
            },
            Command::Review(limit) => cmd_review(brain, runtime, limit),
            Command::Report => cmd_report(brain),
            Command::Memory(text) => cmd_memory(brain, &text),
            Command::Mood { state, trace } => {
                println!("  Mood set to {}", state.yellow());
                brain.set_affect(state, trace);
            }
            Command::Status => cmd_status(brain),
            Command::Models => cmd_models(cfg),
            Command::Help => cmd_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "ARK Commands".bold().underline());
    println!("  {}        – ask the departments", "<text>".bold().cyan());
    println!("  {}  – raise a hardware alert", "/alert <json>".bold().cyan());
    println!("  {} – deliver a system update", "/update <json>".bold().cyan());
    println!("  {}       – release the current focus", "/release".bold().cyan());
    println!("  {}    – run queued reviews", "/review [n]".bold().cyan());
    println!("  {}        – meta-observer report", "/report".bold().cyan());
    println!("  {} – search long-term memory", "/memory <text>".bold().cyan());
    println!("  {}  – set state and emotions (e.g. /mood stressed anxiety=0.8)", "/mood <state>".bold().cyan());
    println!("  {}        – brain status", "/status".bold().cyan());
    println!("  {}        – list Ollama models", "/models".bold().cyan());
    println!("  {}  – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_ask(brain: &mut CognitiveBrain, runtime: &Runtime, text: &str) {
    println!("  {}", "Consulting departments …".dimmed());
    match runtime.block_on(brain.process_input(text, &Payload::new())) {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn print_outcome(outcome: &BrainOutcome) {
    let consensus = &outcome.consensus;
    println!();
    for (department, vote) in &consensus.department_votes {
        println!("  {:<14} {}", department.as_str().dimmed(), preview(vote));
    }
    println!();
    println!("{}", consensus.final_decision);
    println!();
    let confidence = format!("{:.2}", consensus.confidence_score);
    let confidence = if consensus.confidence_score >= 0.7 {
        confidence.green()
    } else {
        confidence.yellow()
    };
    println!("  confidence {}  focus {}", confidence, outcome.focus.topic.cyan());
    if !consensus.conflicts.is_empty() {
        println!("  {} {}", "conflicts:".red(), consensus.conflicts.join(", "));
    }
    if let Some(task_id) = &outcome.follow_up {
        println!("  {} review queued ({})", "↺".yellow(), task_id.dimmed());
    }
}

fn cmd_event(brain: &mut CognitiveBrain, event: Event) {
    let kind = event.kind();
    match brain.handle_event(event) {
        Ok(outcome) => println!(
            "  {} {} stored as memory #{}; focus {} (priority {})",
            "✓".green(),
            kind.as_str(),
            outcome.memory_id,
            outcome.focus.topic.cyan(),
            outcome.focus.priority
        ),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_review(brain: &mut CognitiveBrain, runtime: &Runtime, limit: usize) {
    match runtime.block_on(brain.run_follow_ups(limit)) {
        Ok(reviews) if reviews.is_empty() => println!("  {}", "No reviews queued.".dimmed()),
        Ok(reviews) => reviews.iter().for_each(print_review),
        Err(BrainError::FollowUps { completed, source }) => {
            completed.iter().for_each(print_review);
            println!("{}: {}", "Error".red(), source);
        }
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn print_review(review: &FollowUp) {
    println!(
        "  {} {:.2}  {}",
        review.task_id.dimmed(),
        review.consensus.confidence_score,
        preview(&review.consensus.final_decision)
    );
}

fn cmd_report(brain: &mut CognitiveBrain) {
    let report = brain.report();
    for event in &report.critical_events {
        println!("  {} {} ({})", "!".red().bold(), event.message, event.recommendation.dimmed());
    }
    print_json(&report);
}

fn cmd_memory(brain: &CognitiveBrain, text: &str) {
    match brain.store().search(Some(text), None, &[], MEMORY_SEARCH_LIMIT) {
        Ok(entries) if entries.is_empty() => println!("  {}", "No matching memories.".dimmed()),
        Ok(entries) => entries.iter().for_each(print_memory),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn print_memory(entry: &MemoryEntry) {
    println!(
        "  #{:<5} {} {:<12} {:?}  {}",
        entry.id,
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.kind.as_str().cyan(),
        entry.priority,
        preview(&entry.content.to_string())
    );
}

fn cmd_status(brain: &CognitiveBrain) {
    match brain.status() {
        Ok(status) => print_json(&status),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_models(cfg: &Config) {
    println!("{}", "AI Models".bold().underline());
    println!("  Default model : {}", cfg.default_model.yellow());
    println!("  Coder model   : {}", cfg.coder_model.yellow());
    print!("  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    io::stdout().flush().ok();

    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) if models.is_empty() => {
            println!("{}", "no models found".yellow());
            println!("  Run `ollama pull {}` to download a model.", cfg.default_model);
        }
        Ok(models) => {
            println!("{}", "online".green());
            for m in &models {
                let active = m.name == cfg.default_model || m.name == cfg.coder_model;
                let marker = if active { "▶" } else { " " };
                println!("    {} {} {}", marker.green(), m.name.bold(), format!("{:.1} GB", m.size_gb()).dimmed());
            }
            for wanted in [&cfg.default_model, &cfg.coder_model] {
                if !ollama::has_model(&models, wanted) {
                    println!("  {} {} is not pulled", "Warning:".yellow(), wanted.bold());
                }
            }
        }
        Err(e) => {
            println!("{}", "offline".red());
            println!("  {}", e.dimmed());
            println!("  Is Ollama running?  Try: ollama serve");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= VOTE_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(VOTE_PREVIEW_CHARS).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(parse("  how do caches work? ").unwrap(), Command::Ask("how do caches work?".into()));
    }

    #[test]
    fn alert_payload_is_parsed_as_object() {
        let Command::Alert(payload) = parse(r#"/alert {"cpu_temp": 97}"#).unwrap() else {
            panic!("expected alert");
        };
        assert_eq!(payload["cpu_temp"], json!(97));
        assert_eq!(parse("/update").unwrap(), Command::Update(Payload::new()));
        assert!(parse("/alert [1, 2]").unwrap_err().contains("JSON object"));
    }

    #[test]
    fn review_count_defaults_and_validates() {
        assert_eq!(parse("/review").unwrap(), Command::Review(DEFAULT_REVIEW_BATCH));
        assert_eq!(parse("/review 2").unwrap(), Command::Review(2));
        assert!(parse("/review lots").is_err());
    }

    #[test]
    fn mood_collects_emotions() {
        let Command::Mood { state, trace } = parse("/mood stressed anxiety=0.8 fear=0.25").unwrap() else {
            panic!("expected mood");
        };
        assert_eq!(state, "stressed");
        assert_eq!(trace["anxiety"], 0.8);
        assert_eq!(trace["fear"], 0.25);
        assert!(parse("/mood").is_err());
        assert!(parse("/mood calm joy").is_err());
    }

    #[test]
    fn unknown_and_incomplete_commands_are_errors() {
        assert!(parse("/launch").unwrap_err().contains("/launch"));
        assert!(parse("/memory").is_err());
        assert_eq!(parse("/memory cpu").unwrap(), Command::Memory("cpu".into()));
        assert_eq!(parse("/exit").unwrap(), Command::Quit);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(VOTE_PREVIEW_CHARS + 5);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), VOTE_PREVIEW_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(preview("a\nb"), "a b");
    }
}
