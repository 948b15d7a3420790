// src/main.rs
//! Command-line toolkit for an Azure OpenAI vector store:
//! - upload a directory in batches (new or existing store)
//! - delete every data file on the service
//! - verify a store against a local directory
//! - chat with, or ask a single question of, a file-search assistant
//! - flatten an HTML documentation tree for upload
//!
//! Run without a subcommand for an interactive menu. Logs go to stderr and
//! are filtered with `RUST_LOG`.

mod chat;
mod cli;
mod client;
mod commands;
mod config;
mod delete;
mod extract;
mod ingest;
mod terminal;
mod upload;
mod verify;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as _;
use inquire::InquireError;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use cli::Cli;
use terminal::InquirePrompter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vstk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => match terminal::select_command() {
            Ok(command) => command,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) => return Err(e.into()),
        },
    };

    let mut prompter = InquirePrompter;
    let ok = commands::run(&cli.connection, command, &mut prompter).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
