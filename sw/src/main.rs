//! Specwright - interactive planning assistant
//!
//! CLI entry point for starting, resuming and finishing planning sessions.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use specwright::cli::{Cli, Command, get_log_dir, get_log_path};
use specwright::config::Config;
use specwright::planner::{Planner, StartRequest};
use specwright::repl::{self, DialogueEnd};
use specwright::session::{FileSessionStore, SessionStore, WorkflowKind};
use specwright::tools::ToolRegistry;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to the log file, keeping the terminal clean for the dialogue
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(get_log_path())
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Specwright loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Start { feature, kind, path }) => cmd_start(&config, feature, kind, path).await,
        Some(Command::Resume { id }) => cmd_resume(&config, &id).await,
        Some(Command::List) => cmd_list(&config).await,
        Some(Command::Generate { id, output }) => cmd_generate(&config, &id, output.as_deref()).await,
        Some(Command::Tools) => cmd_tools(&config).await,
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn working_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    cwd.canonicalize().context("Failed to resolve current directory")
}

/// Planner for commands that talk to the model
fn planner(config: &Config) -> Result<Planner> {
    config.validate()?;
    Planner::from_config(config, &working_root()?)
}

async fn cmd_start(config: &Config, feature: String, kind: Option<WorkflowKind>, path: Option<String>) -> Result<()> {
    let mut planner = planner(config)?;
    println!("{}", "Packing codebase and preparing the first question...".dimmed());

    let request = StartRequest {
        feature,
        subpath: path,
        kind,
    };
    let update = planner.start_session(request).await?;
    finish_dialogue(repl::run_interactive(&mut planner, update).await?)
}

async fn cmd_resume(config: &Config, id: &str) -> Result<()> {
    let mut planner = planner(config)?;
    let update = planner.resume_session(id).await?;
    finish_dialogue(repl::run_interactive(&mut planner, update).await?)
}

fn finish_dialogue(end: DialogueEnd) -> Result<()> {
    if let DialogueEnd::Generated(document) = end {
        println!();
        println!("{} {}", "Generated:".bright_green(), document.title);
    }
    Ok(())
}

async fn cmd_list(config: &Config) -> Result<()> {
    // Listing needs no model client, so it works without an API key
    let store = FileSessionStore::new(config.storage.sessions_path());
    let sessions = store.list().await?;
    if sessions.is_empty() {
        println!("No sessions yet. Start one with: sw start \"<feature>\"");
        return Ok(());
    }

    for session in sessions {
        println!(
            "{}  {:17}  {}  {}",
            session.id.yellow(),
            session.phase.to_string(),
            session.last_updated.format("%Y-%m-%d %H:%M"),
            session.display_name
        );
    }
    Ok(())
}

async fn cmd_generate(config: &Config, id: &str, output: Option<&Path>) -> Result<()> {
    let planner = planner(config)?;
    let document = match output {
        Some(path) => {
            let document = planner.generate_document(id).await?;
            fs::write(path, format!("{}\n", document.content))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Wrote".bright_green(), path.display());
            document
        }
        None => repl::stream_document(&planner, id).await?,
    };
    info!(%id, title = %document.title, "Document delivered");
    Ok(())
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let mut registry = ToolRegistry::from_config(&config.tools, &working_root()?);
    let tools = registry.discover().await.to_vec();
    registry.shutdown().await;

    if tools.is_empty() {
        println!("No tools available. Configure MCP servers under `tools.servers`.");
        return Ok(());
    }
    for tool in tools {
        println!("{} {}", format!("{}/{}", tool.provider_id, tool.name).yellow(), tool.description);
    }
    Ok(())
}

/// Show logs
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(|line| line.ok()).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
