use std::fmt::{Display, Formatter};
use std::io::{self, Write};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::CustomUserError;
use inquire::validator::Validation;
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text};
use tracing::debug;

use crate::chat::{ChatSession, Role};
use crate::cli::{AskArgs, ChatArgs, Commands, DeleteArgs, ExtractArgs, UploadArgs, VerifyArgs};
use crate::client::Assistant;

/// Exact answer that confirms a bulk or destructive operation.
pub const CONFIRMATION_WORD: &str = "YES";

const ASK_OWN_QUESTION: &str = "Ask something else…";
const QUIT: &str = "Quit";

/// Everything the toolkit asks the user interactively goes through this seam.
pub trait Prompter {
    /// Masked input (API keys).
    fn secret(&mut self, message: &str) -> Result<String, InquireError>;

    /// Non-blank input, trimmed; re-asks while blank.
    fn required_text(&mut self, message: &str, help: Option<&str>)
    -> Result<String, InquireError>;

    /// Free input, returned as typed.
    fn optional_text(&mut self, message: &str, help: Option<&str>)
    -> Result<String, InquireError>;

    /// Index of the chosen option.
    fn select(&mut self, message: &str, options: Vec<String>) -> Result<usize, InquireError>;

    /// True only when the user types exactly `YES`.
    fn confirm(&mut self, message: &str) -> Result<bool, InquireError> {
        let answer = self.optional_text(
            &format!("{message} Type '{CONFIRMATION_WORD}' to confirm:"),
            None,
        )?;
        Ok(answer == CONFIRMATION_WORD)
    }
}

pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn secret(&mut self, message: &str) -> Result<String, InquireError> {
        Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
    }

    fn required_text(
        &mut self,
        message: &str,
        help: Option<&str>,
    ) -> Result<String, InquireError> {
        let mut text = Text::new(message).with_validator(
            |s: &str| -> Result<Validation, CustomUserError> {
                if s.trim().is_empty() {
                    Ok(Validation::Invalid("A value is required.".into()))
                } else {
                    Ok(Validation::Valid)
                }
            },
        );
        if let Some(help) = help {
            text = text.with_help_message(help);
        }
        Ok(text.prompt()?.trim().to_string())
    }

    fn optional_text(
        &mut self,
        message: &str,
        help: Option<&str>,
    ) -> Result<String, InquireError> {
        let mut text = Text::new(message);
        if let Some(help) = help {
            text = text.with_help_message(help);
        }
        text.prompt()
    }

    fn select(&mut self, message: &str, options: Vec<String>) -> Result<usize, InquireError> {
        Ok(Select::new(message, options).raw_prompt()?.index)
    }
}

// -------- progress output --------

/// Bar over `len` items. Hidden automatically when stdout is not a terminal.
pub fn progress_bar(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template = format!("{{spinner}} [{{bar:40}}] {{pos}}/{{len}} {unit} {{wide_msg}}");
    pb.set_style(
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Print a line above the bar. Unlike `ProgressBar::println` this still
/// prints when the bar is hidden.
pub fn say(pb: &ProgressBar, line: impl Display) {
    pb.suspend(|| println!("{line}"));
}

pub fn banner(title: &str) {
    println!("\n{}", "=".repeat(50));
    println!("{title}");
    println!("{}", "=".repeat(50));
}

// -------- interactive menu --------

#[derive(Debug, Clone, Copy)]
enum Mode {
    Upload,
    Verify,
    Chat,
    Ask,
    DeleteAll,
    ExtractHtml,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Mode::Upload => "Upload a directory to a vector store",
            Mode::Verify => "Verify vector store contents",
            Mode::Chat => "Chat with the vector store",
            Mode::Ask => "Ask a single question",
            Mode::DeleteAll => "Delete all data files",
            Mode::ExtractHtml => "Extract and rename HTML files",
        };
        f.write_str(label)
    }
}

/// Used when `vstk` runs without a subcommand.
pub fn select_command() -> Result<Commands, InquireError> {
    let mode = Select::new(
        "Select operation:",
        vec![
            Mode::Upload,
            Mode::Verify,
            Mode::Chat,
            Mode::Ask,
            Mode::DeleteAll,
            Mode::ExtractHtml,
        ],
    )
    .prompt()?;

    Ok(match mode {
        Mode::Upload => Commands::Upload(UploadArgs::default()),
        Mode::Verify => Commands::Verify(VerifyArgs::default()),
        Mode::Chat => Commands::Chat(ChatArgs::default()),
        Mode::Ask => Commands::Ask(AskArgs::default()),
        Mode::DeleteAll => Commands::DeleteAll(DeleteArgs::default()),
        Mode::ExtractHtml => Commands::ExtractHtml(ExtractArgs::default()),
    })
}

// -------- chat front-end --------

fn print_message(role: Role, content: &str) {
    println!("\n{role}: {content}");
}

fn is_interrupt(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

/// Interactive chat until the user quits. Ctrl+C while a reply is streaming
/// abandons that reply only.
pub async fn chat_loop(
    session: &mut ChatSession,
    assistant: &dyn Assistant,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    for message in session.messages() {
        print_message(message.role, &message.content);
    }

    loop {
        let mut options: Vec<String> = session.suggestions().to_vec();
        options.push(ASK_OWN_QUESTION.to_string());
        options.push(QUIT.to_string());

        println!();
        let choice = match prompter.select("Pick a suggestion or ask your own:", options.clone()) {
            Ok(i) => i,
            Err(e) if is_interrupt(&e) => break,
            Err(e) => return Err(e.into()),
        };
        // options: three suggestions, then "ask", then "quit"
        let input = match choice {
            0..=2 => options[choice].clone(),
            3 => match prompter.optional_text("Your question:", None) {
                Ok(text) => text,
                Err(e) if is_interrupt(&e) => continue,
                Err(e) => return Err(e.into()),
            },
            _ => break,
        };
        if input.trim().is_empty() {
            continue;
        }

        print_message(Role::User, input.trim());
        print!("\n{}: ", Role::Assistant);
        let _ = io::stdout().flush();

        let mut on_delta = |delta: &str| {
            print!("{delta}");
            let _ = io::stdout().flush();
        };
        debug!(previous = ?session.previous_response_id(), "submitting turn");
        let outcome = tokio::select! {
            r = session.submit(assistant, &input, &mut on_delta) => r,
            _ = tokio::signal::ctrl_c() => {
                println!("\n[reply cancelled]");
                continue;
            }
        };
        println!();

        match outcome {
            Ok(Some(turn)) => {
                debug!(response = %turn.reply.response_id, "turn complete");
                if !turn.suggestions_refreshed {
                    println!("(could not load new suggestions; showing the previous ones)");
                }
            }
            Ok(None) => {}
            Err(e) => println!("\n✗ The assistant could not answer: {e}"),
        }
    }

    println!("Goodbye!");
    Ok(())
}
