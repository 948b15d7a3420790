use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CredentialOverrides;
use crate::upload::DEFAULT_BATCH_SIZE;

#[derive(Parser)]
#[command(name = "vstk", version)]
#[command(
    about = "Bulk upload, delete, verify and chat with an Azure OpenAI vector store",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Runs the interactive menu when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    #[arg(long, global = true, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AZURE_OPENAI_ENDPOINT",
        help = "Resource endpoint, e.g. https://your-service.openai.azure.com/"
    )]
    pub endpoint: Option<String>,

    #[arg(long, global = true, env = "AZURE_OPENAI_API_VERSION")]
    pub api_version: Option<String>,

    #[arg(
        long,
        global = true,
        env = "VSTK_SECRETS",
        default_value = "secrets.toml",
        help = "TOML file holding credentials and chat settings"
    )]
    pub secrets: PathBuf,
}

impl ConnectionArgs {
    pub fn overrides(&self) -> CredentialOverrides {
        CredentialOverrides {
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            api_version: self.api_version.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Upload every file in a directory to a new or existing vector store")]
    Upload(UploadArgs),

    #[command(about = "Delete ALL data files from the service")]
    DeleteAll(DeleteArgs),

    #[command(about = "Check that a vector store holds every file of a directory")]
    Verify(VerifyArgs),

    #[command(about = "Interactive chat over a vector store")]
    Chat(ChatArgs),

    #[command(about = "Ask one question and stream the answer")]
    Ask(AskArgs),

    #[command(about = "Copy HTML files from a tree into one directory with flattened names")]
    ExtractHtml(ExtractArgs),
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(short, long, help = "Directory containing the files to upload")]
    pub dir: Option<PathBuf>,

    #[arg(long, conflicts_with = "store_id", help = "Create a new vector store with this name")]
    pub store_name: Option<String>,

    #[arg(long, help = "Upload into this existing vector store")]
    pub store_id: Option<String>,

    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = parse_batch_size,
        help = "Files per upload request"
    )]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1000, help = "Delay between file batch status checks")]
    pub poll_interval_ms: u64,

    #[arg(long, default_value_t = 1800, help = "Give up waiting on a file batch after this long")]
    pub poll_timeout_secs: u64,

    #[arg(short, long, help = "Skip the confirmation prompt")]
    pub yes: bool,
}

impl Default for UploadArgs {
    fn default() -> Self {
        Self {
            dir: None,
            store_name: None,
            store_id: None,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval_ms: 1000,
            poll_timeout_secs: 1800,
            yes: false,
        }
    }
}

fn parse_batch_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteArgs {
    #[arg(short, long, help = "Skip the confirmation prompt")]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct VerifyArgs {
    #[arg(long, env = "AZURE_VECTOR_STORE_ID")]
    pub store_id: Option<String>,

    #[arg(short, long, help = "Directory to verify against; omit to list the store")]
    pub dir: Option<PathBuf>,

    #[arg(short, long, help = "Skip the confirmation and the optional directory prompt")]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    #[arg(long, env = "AZURE_OPENAI_API_MODEL", help = "Model deployment name")]
    pub model: Option<String>,

    #[arg(long, env = "AZURE_VECTOR_STORE_ID")]
    pub store_id: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AskArgs {
    #[arg(help = "Question to ask; prompted for when omitted")]
    pub query: Option<String>,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExtractArgs {
    #[arg(long, help = "Tree to search for HTML files")]
    pub source: Option<PathBuf>,

    #[arg(long, help = "Directory receiving the renamed copies")]
    pub dest: Option<PathBuf>,

    #[arg(short, long, help = "Skip the confirmation prompt")]
    pub yes: bool,
}
