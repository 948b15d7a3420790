//! commands.rs
//!
//! One handler per subcommand: gather missing arguments interactively, show
//! what is about to happen, confirm bulk or destructive work, run the
//! workflow against the live service and print its summary.
//!
//! Every handler returns whether the run succeeded; `main` turns that into
//! the exit code. A cancelled confirmation counts as success.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use inquire::InquireError;
use tracing::debug;

use crate::chat::ChatSession;
use crate::cli::{
    AskArgs, ChatArgs, Commands, ConnectionArgs, DeleteArgs, ExtractArgs, UploadArgs, VerifyArgs,
};
use crate::client::azure_client::{AzureClient, PollSettings};
use crate::client::llm_client::ResponsesClient;
use crate::config::{
    ChatSettings, ConfigError, Credentials, SecretsFile, mask_api_key, resolve_chat_settings,
    resolve_credentials,
};
use crate::terminal::{Prompter, banner, chat_loop};
use crate::upload::StoreTarget;
use crate::{delete, extract, upload, verify};

const CANCELLED: &str = "Operation cancelled.";

pub async fn run(
    connection: &ConnectionArgs,
    command: Commands,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    let outcome = match command {
        Commands::Upload(args) => upload_cmd(connection, args, prompter).await,
        Commands::DeleteAll(args) => delete_cmd(connection, args, prompter).await,
        Commands::Verify(args) => verify_cmd(connection, args, prompter).await,
        Commands::Chat(args) => chat_cmd(connection, args, prompter).await,
        Commands::Ask(args) => ask_cmd(connection, args, prompter).await,
        Commands::ExtractHtml(args) => extract_cmd(args, prompter),
    };
    match outcome {
        Err(e) if is_prompt_cancel(&e) => {
            println!("\n{CANCELLED}");
            Ok(true)
        }
        other => other,
    }
}

/// Escape or Ctrl+C at a prompt.
fn is_prompt_cancel(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let inquire = cause.downcast_ref::<InquireError>().or_else(|| {
            match cause.downcast_ref::<ConfigError>() {
                Some(ConfigError::Prompt(e)) => Some(e),
                _ => None,
            }
        });
        matches!(
            inquire,
            Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
        )
    })
}

fn load_secrets(connection: &ConnectionArgs) -> Result<SecretsFile> {
    Ok(SecretsFile::load(&connection.secrets)?)
}

fn credentials(
    connection: &ConnectionArgs,
    secrets: &SecretsFile,
    prompter: &mut dyn Prompter,
) -> Result<Credentials> {
    Ok(resolve_credentials(&connection.overrides(), secrets, prompter)?)
}

fn print_connection(creds: &Credentials) {
    println!("Endpoint: {}", creds.endpoint);
    println!("API version: {}", creds.api_version);
    println!("API key: {}", mask_api_key(&creds.api_key));
}

fn required_path(
    current: Option<PathBuf>,
    prompter: &mut dyn Prompter,
    message: &str,
) -> Result<PathBuf, InquireError> {
    match current {
        Some(p) => Ok(p),
        None => Ok(PathBuf::from(prompter.required_text(message, None)?)),
    }
}

/// Target store from the flags, or asked for interactively.
pub fn upload_target(
    args: &UploadArgs,
    prompter: &mut dyn Prompter,
) -> Result<StoreTarget, InquireError> {
    if let Some(id) = &args.store_id {
        return Ok(StoreTarget::Existing { id: id.clone() });
    }
    if let Some(name) = &args.store_name {
        return Ok(StoreTarget::New { name: name.clone() });
    }
    let choice = prompter.select(
        "Vector store:",
        vec![
            "Create a new vector store".to_string(),
            "Upload to existing vector store".to_string(),
        ],
    )?;
    if choice == 0 {
        let name = prompter.required_text("Enter a name for the new vector store:", None)?;
        Ok(StoreTarget::New { name })
    } else {
        let id = prompter.required_text(
            "Enter the existing Vector Store ID:",
            Some("e.g. vs_8K3mX9nP2wQ7vR5tA6bC4dE1"),
        )?;
        Ok(StoreTarget::Existing { id })
    }
}

async fn upload_cmd(
    connection: &ConnectionArgs,
    args: UploadArgs,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    banner("Bulk upload to vector store");
    let secrets = load_secrets(connection)?;
    let creds = credentials(connection, &secrets, prompter)?;
    let dir = required_path(
        args.dir.clone(),
        prompter,
        "Enter the directory path containing files to upload:",
    )?;
    let target = upload_target(&args, prompter)?;

    println!("\nConfiguration:");
    print_connection(&creds);
    println!("Directory: {}", dir.display());
    match &target {
        StoreTarget::New { name } => println!("Vector store: new, named '{name}'"),
        StoreTarget::Existing { id } => println!("Vector store: existing, ID {id}"),
    }
    println!("Batch size: {}", args.batch_size);

    if !args.yes && !prompter.confirm("\nProceed with the upload?")? {
        println!("{CANCELLED}");
        return Ok(true);
    }

    let client = AzureClient::new(&creds)?.with_poll_settings(PollSettings {
        interval: Duration::from_millis(args.poll_interval_ms),
        timeout: Duration::from_secs(args.poll_timeout_secs),
    });
    let report = upload::upload_directory(&client, &dir, &target, args.batch_size).await?;
    report.print_summary();

    if report.success() {
        println!("\n✓ Bulk upload completed successfully!");
    } else {
        println!("\n✗ Bulk upload completed with errors.");
    }
    Ok(report.success())
}

async fn delete_cmd(
    connection: &ConnectionArgs,
    args: DeleteArgs,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    banner("Delete all data files");
    let secrets = load_secrets(connection)?;
    let creds = credentials(connection, &secrets, prompter)?;

    println!("\nConfiguration:");
    print_connection(&creds);
    println!("\nWARNING: this permanently deletes ALL files on the service.");

    if !args.yes && !prompter.confirm("Are you sure you want to continue?")? {
        println!("{CANCELLED}");
        return Ok(true);
    }

    let client = AzureClient::new(&creds)?;
    let report = delete::delete_all_files(&client).await?;
    report.print_summary();

    if report.success() {
        println!("\n✓ All files deleted successfully!");
    } else {
        println!("\n✗ Some files could not be deleted.");
    }
    Ok(report.success())
}

async fn verify_cmd(
    connection: &ConnectionArgs,
    args: VerifyArgs,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    banner("Verify vector store contents");
    let secrets = load_secrets(connection)?;
    let creds = credentials(connection, &secrets, prompter)?;

    let store_id = match args
        .store_id
        .clone()
        .or_else(|| secrets.azure_vector_store_id.clone())
        .filter(|s| !s.trim().is_empty())
    {
        Some(id) => id,
        None => prompter.required_text("Enter the Vector Store ID to verify:", None)?,
    };
    let dir = match args.dir.clone() {
        Some(d) => Some(d),
        None if args.yes => None,
        None => {
            let answer = prompter.optional_text(
                "Directory to compare against:",
                Some("leave empty to list the files in the store"),
            )?;
            let answer = answer.trim();
            (!answer.is_empty()).then(|| PathBuf::from(answer))
        }
    };

    println!("\nConfiguration:");
    print_connection(&creds);
    println!("Vector store ID: {store_id}");
    match &dir {
        Some(d) => println!("Directory: {}", d.display()),
        None => println!("Directory: none, listing the store's files"),
    }
    if !args.yes && !prompter.confirm("\nProceed with verification?")? {
        println!("{CANCELLED}");
        return Ok(true);
    }

    let client = AzureClient::new(&creds)?;
    let report = verify::verify_store(&client, &store_id, dir.as_deref()).await?;
    verify::print_report(&report);

    if report.success() {
        println!("\n✓ Verification passed.");
    } else {
        println!("\n✗ Verification failed.");
    }
    Ok(report.success())
}

fn assistant(creds: &Credentials, settings: &ChatSettings) -> Result<ResponsesClient> {
    let azure = AzureClient::new(creds)?;
    Ok(ResponsesClient::new(
        azure,
        settings.model.as_str(),
        settings.vector_store_id.as_str(),
    ))
}

fn chat_setup(
    connection: &ConnectionArgs,
    args: &ChatArgs,
    prompter: &mut dyn Prompter,
) -> Result<(Credentials, ChatSettings)> {
    let secrets = load_secrets(connection)?;
    let creds = credentials(connection, &secrets, prompter)?;
    let settings = resolve_chat_settings(
        args.model.as_deref(),
        args.store_id.as_deref(),
        &secrets,
        prompter,
    )?;
    Ok((creds, settings))
}

async fn chat_cmd(
    connection: &ConnectionArgs,
    args: ChatArgs,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    let (creds, settings) = chat_setup(connection, &args, prompter)?;
    let client = assistant(&creds, &settings)?;
    banner(&format!(
        "Chat (model {}, store {})",
        settings.model, settings.vector_store_id
    ));

    let mut session = ChatSession::new(&settings);
    chat_loop(&mut session, &client, prompter).await?;
    Ok(true)
}

async fn ask_cmd(
    connection: &ConnectionArgs,
    args: AskArgs,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    let (creds, settings) = chat_setup(connection, &args.chat, prompter)?;
    let client = assistant(&creds, &settings)?;
    let query = match args.query.filter(|q| !q.trim().is_empty()) {
        Some(q) => q,
        None => prompter.required_text("Your question:", None)?,
    };

    let mut session = ChatSession::new(&settings);
    print!("Assistant: ");
    let _ = io::stdout().flush();
    let mut on_delta = |delta: &str| {
        print!("{delta}");
        let _ = io::stdout().flush();
    };

    let outcome = tokio::select! {
        r = session.submit(&client, &query, &mut on_delta) => r.context("the assistant could not answer")?,
        _ = tokio::signal::ctrl_c() => {
            println!("\n[reply cancelled]");
            return Ok(false);
        }
    };
    println!();

    if let Some(turn) = outcome {
        debug!(response = %turn.reply.response_id, chars = turn.reply.text.len(), "answered");
        if turn.suggestions_refreshed {
            println!("\nYou could also ask:");
            for s in session.suggestions() {
                println!("  - {s}");
            }
        }
    }
    Ok(true)
}

fn extract_cmd(args: ExtractArgs, prompter: &mut dyn Prompter) -> Result<bool> {
    banner("Extract and rename HTML files");
    let source = required_path(
        args.source,
        prompter,
        "Enter the source directory to search for HTML files:",
    )?;
    let dest = required_path(
        args.dest,
        prompter,
        "Enter the destination directory for the renamed files:",
    )?;

    println!("\nSource: {}", source.display());
    println!("Destination: {}", dest.display());
    if !args.yes && !prompter.confirm("Proceed with the extraction?")? {
        println!("{CANCELLED}");
        return Ok(true);
    }

    let report = extract::extract_and_rename(&source, &dest)?;
    report.print_summary(&dest);
    Ok(true)
}
