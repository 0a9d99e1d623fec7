//! move-chat CLI
//!
//! Lists the sessions of a Claude Code project and moves a session from one
//! project to another. Interactive pickers call this with resolved arguments.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use move_chat_lib::{
    default_projects_root, list_sessions, move_session, resolve_project, ListedSession,
    MoveReport, MoveRequest, PROJECTS_DIR_ENV,
};

#[derive(Parser)]
#[command(name = "move-chat")]
#[command(about = "Move chat sessions between Claude Code projects", long_about = None)]
struct Cli {
    /// Session ID to move
    session_id: Option<String>,

    /// List sessions in a project
    #[arg(long, value_name = "PROJECT", conflicts_with_all = ["session_id", "from", "to", "dry_run"])]
    list: Option<String>,

    /// Source project (working directory path or store directory)
    #[arg(long, value_name = "PROJECT", requires_all = ["to", "session_id"])]
    from: Option<String>,

    /// Destination project (working directory path or store directory)
    #[arg(long, value_name = "PROJECT", requires_all = ["from", "session_id"])]
    to: Option<String>,

    /// Preview changes without modifying files
    #[arg(long)]
    dry_run: bool,

    /// Report each step taken
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Claude Code projects directory (default: ~/.claude/projects)
    #[arg(long, value_name = "DIR", env = PROJECTS_DIR_ENV)]
    projects_dir: Option<PathBuf>,
}

// ============ Output Types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListOutput<'a> {
    project_dir: &'a Path,
    sessions: &'a [ListedSession],
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
}

// ============ Main ============

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list.is_none() && cli.session_id.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "pass --list <PROJECT>, or <SESSION_ID> --from <PROJECT> --to <PROJECT>",
            )
            .exit();
    }

    if let Err(e) = run(&cli) {
        if cli.json {
            let error = ErrorOutput { error: format!("{:#}", e) };
            let rendered = serde_json::to_string(&error).unwrap_or_else(|_| error.error.clone());
            eprintln!("{}", rendered);
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,move_chat_lib=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn projects_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.projects_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(default_projects_root()?),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let root = projects_root(cli)?;

    if let Some(project) = &cli.list {
        return handle_list(cli, &root, project);
    }

    match (&cli.session_id, &cli.from, &cli.to) {
        (Some(session_id), Some(from), Some(to)) => handle_move(cli, &root, session_id, from, to),
        _ => Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "moving a session needs both --from <PROJECT> and --to <PROJECT>",
            )
            .exit(),
    }
}

// ============ Handlers ============

fn handle_list(cli: &Cli, root: &Path, project: &str) -> Result<()> {
    let location = resolve_project(root, project);
    let sessions = list_sessions(&location.dir)
        .with_context(|| format!("listing sessions of {}", project))?;

    if cli.json {
        let output = ListOutput {
            project_dir: &location.dir,
            sessions: &sessions,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if sessions.is_empty() {
        eprintln!("No sessions found in project: {}", project);
        return Ok(());
    }

    for session in &sessions {
        println!("{}|{}|{}", session.session_id, session.title, session.modified);
        if cli.verbose {
            println!(
                "    indexed: {}, transcript: {}, aux dir: {}",
                session.indexed, session.transcript_present, session.has_aux_dir
            );
        }
    }

    Ok(())
}

fn handle_move(cli: &Cli, root: &Path, session_id: &str, from: &str, to: &str) -> Result<()> {
    let source = resolve_project(root, from);
    let dest = resolve_project(root, to);

    let request = MoveRequest {
        session_id: session_id.to_string(),
        source_dir: source.dir,
        dest_dir: dest.dir,
        dest_original_path: dest.original_path,
        dry_run: cli.dry_run,
    };

    let report = move_session(&request)
        .with_context(|| format!("moving session {}", session_id))?;

    if cli.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report, cli.verbose);
    }

    Ok(())
}

fn print_report(report: &MoveReport, verbose: bool) {
    if report.dry_run || verbose {
        let prefix = if report.dry_run { "Would" } else { "Done:" };
        for step in &report.steps {
            println!("{} {}", prefix, step);
        }
    }

    if report.dry_run {
        println!("Dry run complete, nothing changed.");
    } else {
        println!(
            "Moved session {} ({}) from {} to {}",
            report.session_id,
            report.title,
            report.source_dir.display(),
            report.dest_dir.display()
        );
    }
}
