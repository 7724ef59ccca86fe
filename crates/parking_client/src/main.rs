//! Solve Parking - command-line client
//!
//! Thin front end over [`parking_client::PuzzleSession`]: every subcommand
//! maps to one session operation and prints the resulting state as JSON.

mod cli;

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use parking_client::{
    HttpBackend, PuzzleSession, SaveConfigRequest, SessionToken, UpdateConfigRequest,
};
use parking_core::{Puzzle, validate_draft};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let token = match &cli.session {
        Some(raw) => SessionToken::new(raw.clone())
            .context("invalid --session token (8-128 chars of [A-Za-z0-9_-])")?,
        None => SessionToken::generate(),
    };
    info!(session = %token, base_url = %cli.base_url, "starting client");

    let backend = Arc::new(HttpBackend::new(cli.base_url.clone(), token));
    let mut session = PuzzleSession::new(backend, None);

    match cli.command {
        Command::Show => {
            let state = session.load_puzzle().await;
            print_json(&state)?;
            report(&session);
        }
        Command::Move { vehicle, steps } => {
            match session.move_vehicle(&vehicle, steps).await {
                Ok(outcome) => {
                    print_json(&outcome)?;
                    report(&session);
                }
                Err(error) => bail!("move failed: {error}"),
            }
        }
        Command::Reset => {
            let state = session.reset_puzzle().await;
            print_json(&state)?;
            report(&session);
        }
        Command::Solve => match session.solve_puzzle().await {
            Ok(state) => {
                print_json(&state)?;
                report(&session);
            }
            Err(error) => bail!("solve failed: {error}"),
        },
        Command::Validate => {
            let puzzle = read_puzzle_from_stdin()?;
            validate_draft(&puzzle).map_err(|error| anyhow::anyhow!("{error}"))?;
            info!("puzzle is valid");
        }
        Command::Configs(command) => run_configs(&mut session, command).await?,
    }

    Ok(())
}

async fn run_configs(session: &mut PuzzleSession, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::List => {
            let records = session.fetch_puzzle_configurations().await?;
            print_json(&records)?;
        }
        ConfigCommand::Get { id } => {
            let record = session.fetch_puzzle_configuration(id).await?;
            print_json(&record)?;
        }
        ConfigCommand::Save {
            name,
            file,
            no_activate,
        } => {
            let state = match file {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let puzzle: Puzzle = serde_json::from_str(&raw)
                        .with_context(|| format!("invalid puzzle JSON in {}", path.display()))?;
                    validate_draft(&puzzle).map_err(|error| anyhow::anyhow!("{error}"))?;
                    puzzle
                }
                None => session.load_puzzle().await,
            };
            let record = session
                .save_puzzle_configuration(SaveConfigRequest {
                    name,
                    state,
                    activate: !no_activate,
                })
                .await?;
            print_json(&record)?;
            report(session);
        }
        ConfigCommand::Update {
            id,
            file,
            name,
            activate,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let puzzle: Puzzle = serde_json::from_str(&raw)
                .with_context(|| format!("invalid puzzle JSON in {}", file.display()))?;
            validate_draft(&puzzle).map_err(|error| anyhow::anyhow!("{error}"))?;
            let record = session
                .update_puzzle_configuration(
                    id,
                    UpdateConfigRequest {
                        state: puzzle,
                        name,
                        activate,
                    },
                )
                .await?;
            print_json(&record)?;
            report(session);
        }
        ConfigCommand::Activate { id } => {
            let record = session.activate_puzzle_configuration(id).await?;
            print_json(&record)?;
            report(session);
        }
        ConfigCommand::Delete { id } => {
            let response = session.delete_puzzle_configuration(id).await?;
            print_json(&response)?;
            report(session);
        }
    }
    Ok(())
}

fn read_puzzle_from_stdin() -> Result<Puzzle> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read stdin")?;
    serde_json::from_str(&raw).context("invalid puzzle JSON on stdin")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Surfaces the session's notice and error after an operation.
fn report(session: &PuzzleSession) {
    if let Some(notice) = session.notice() {
        info!(notice, "session notice");
    }
    if let Some(error) = session.last_error() {
        warn!(error, "session error");
    }
    if session.offline_mode() {
        warn!("session is in offline mode");
    }
}
