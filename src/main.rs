mod client;
mod config;
mod logging;
mod session;
mod suggestion;
mod tui;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use config::{ConfigFile, ResolvedConfig};

use crate::client::HttpAnswerClient;
use crate::session::{SessionController, SessionState};

#[derive(Parser, Debug)]
#[command(
    name = "sitechat",
    about = "Terminal client for a construction question-answering bot",
    long_about = None,
)]
struct Args {
    /// Question to ask directly (omit to enter interactive TUI mode)
    question: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "SITECHAT_PROFILE")]
    profile: Option<String>,

    /// Override endpoint URL
    #[arg(long, env = "SITECHAT_ENDPOINT")]
    endpoint: Option<String>,

    /// Override the per-question timeout, in seconds
    #[arg(long, env = "SITECHAT_TIMEOUT", value_name = "SECS")]
    timeout: Option<u64>,

    /// Show timestamps on messages
    #[arg(long)]
    timestamps: bool,

    /// Write a default config file to ~/.config/sitechat/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Check that the backend is reachable and exit
    #[arg(long)]
    check: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: sitechat");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    // Logging is best-effort: a read-only data dir must not stop the client
    if let Err(e) = logging::init() {
        eprintln!("  logging disabled: {e:#}");
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.timeout,
        args.timestamps,
    );
    tracing::info!(
        profile = %resolved.profile_name,
        endpoint = %resolved.endpoint,
        timeout_secs = resolved.timeout.as_secs(),
        "starting sitechat"
    );

    // ── --check ───────────────────────────────────────────────────────────────
    if args.check {
        return run_check(&resolved).await;
    }

    // ── Single-shot mode (non-TUI) ────────────────────────────────────────────
    if let Some(question) = args.question {
        return run_single_shot(question, &resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(resolved).await
}

fn build_controller(resolved: &ResolvedConfig) -> Result<SessionController> {
    let client = HttpAnswerClient::new(resolved.endpoint.clone(), resolved.timeout)?;
    Ok(SessionController::new(
        SessionState::new(&resolved.greeting),
        Arc::new(client),
        resolved.timeout,
    ))
}

// ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────────

async fn run_single_shot(question: String, resolved: &ResolvedConfig) -> Result<()> {
    println!();
    println!("  ▲ sitechat  {}  ·  {}", resolved.profile_name, resolved.endpoint);
    println!();

    let mut controller = build_controller(resolved)?;
    let before = controller.transcript().len();

    if let Err(rejected) = controller.submit(&question).await {
        println!("  {rejected}");
        return Ok(());
    }

    // Print only this cycle's turns, not the greeting
    for turn in &controller.transcript()[before..] {
        println!("{}", ui::format_turn_plain(turn, resolved.show_timestamps));
    }
    Ok(())
}

// ── Backend health check ──────────────────────────────────────────────────────

async fn run_check(resolved: &ResolvedConfig) -> Result<()> {
    let client = HttpAnswerClient::new(resolved.endpoint.clone(), resolved.timeout)?;
    match client.ping().await {
        Ok(message) => {
            println!("  ✓ {}  {message}", resolved.endpoint);
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            eprintln!("  ✗ {}  {e}", resolved.endpoint);
            std::process::exit(1);
        }
    }
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(String, String, u64)> = file
        .profiles
        .iter()
        .map(|(name, p)| (name.clone(), p.endpoint.clone(), p.timeout_secs))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    println!();
    println!("  Profiles");
    if entries.is_empty() {
        println!("  (none — run `sitechat --init` to write a starter config)");
    }
    for (name, endpoint, timeout) in &entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint  {endpoint}");
        println!("    timeout   {timeout}s");
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "sitechat", &mut std::io::stdout());
    Ok(())
}
