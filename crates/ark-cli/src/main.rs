//! `ark-cli` – interactive shell for the ARK cognitive core.
//!
//! On start it:
//!
//! 1. Installs tracing via [`ark_runtime::init_tracing`].
//! 2. Loads `~/.ark/config.toml`, running a **First-Run Wizard** when the
//!    file is absent.
//! 3. Probes the local Ollama instance and reports available models.
//! 4. Builds the [`CognitiveBrain`] and drops into the REPL.
//! 5. Intercepts **Ctrl-C** so the REPL can stop at the next prompt.

mod config;
mod ollama;
mod repl;

use ark_runtime::CognitiveBrain;
use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

fn main() {
    // Held until exit so pending spans are flushed.
    let _telemetry = ark_runtime::init_tracing("ark");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing the current step and exiting …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // Blocking probe: must run before the Tokio runtime exists.
    print!("\n  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            for wanted in [&cfg.default_model, &cfg.coder_model] {
                if !ollama::has_model(&models, wanted) {
                    println!("  {} Run `{}` to enable it.", wanted.yellow(), format!("ollama pull {wanted}").bold());
                }
            }
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Departments will answer in degraded mode until `{}` is running.",
                "No Ollama instance detected.".dimmed(),
                "ollama serve".bold()
            );
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return;
        }
    };

    let mut brain = match CognitiveBrain::new(cfg.brain_config()) {
        Ok(brain) => brain,
        Err(e) => {
            println!("{}: {}", "Failed to start ARK".red(), e);
            return;
        }
    };

    println!();
    println!("  Type a question, or {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(shutdown, &mut brain, &runtime, &cfg);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║         ARK First-Run Wizard         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up ARK.\n");

    let mut cfg = config::Config::default();

    cfg.ollama_url = prompt_line(&format!("  Ollama URL [{}]: ", cfg.ollama_url), &cfg.ollama_url);
    cfg.default_model = prompt_line(&format!("  Default model [{}]: ", cfg.default_model), &cfg.default_model);
    cfg.coder_model = prompt_line(&format!("  Engineer model [{}]: ", cfg.coder_model), &cfg.coder_model);

    let db = config::default_memory_db().display().to_string();
    let keep = prompt_line(&format!("  Keep memories across sessions in {}? [Y/n]: ", db), "y");
    if !keep.eq_ignore_ascii_case("n") {
        cfg.memory_db = Some(db);
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___    ____  __ __"#.bold().cyan());
    println!("{}", r#"   /   |  / __ \/ //_/"#.bold().cyan());
    println!("{}", r#"  / /| | / /_/ / ,<   "#.bold().cyan());
    println!("{}", r#" / ___ |/ _, _/ /| |  "#.bold().cyan());
    println!("{}", r#"/_/  |_/_/ |_/_/ |_|  "#.bold().cyan());
    println!();
    println!("  {} {}", "ARK".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Multi-department cognitive core");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
