//! Command-line surface for `letterbox`.

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use letterbox::config::ConfigArgs;

#[derive(Parser, Debug)]
#[command(
    name = "letterbox",
    version,
    about = "Letterbox archive admin client",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Path to file containing the session token (takes precedence over env)
    #[arg(long, env = "LETTERBOX_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Session token from env (CLI flag intentionally disabled to avoid shell history leaks)
    #[arg(hide = true, env = "LETTERBOX_TOKEN")]
    pub token_env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Letters (list/show/delete)
    Letters(LettersArgs),
    /// Correspondences (list/show/delete)
    Correspondences(CorrespondencesArgs),
    /// Recipients (list/delete)
    Recipients(RecipientsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Cursor returned as `lastEvaluatedKey` by the previous page
    #[arg(long)]
    pub cursor: Option<String>,
}

#[derive(Parser, Debug)]
pub struct LettersArgs {
    #[command(subcommand)]
    pub action: LettersCmd,
}

#[derive(Subcommand, Debug)]
pub enum LettersCmd {
    /// List letters
    List(PageArgs),
    /// Show a letter
    Show { id: String },
    /// Delete a letter
    Delete {
        id: String,
        /// Correspondence whose cached detail embeds the letter
        #[arg(long)]
        correspondence: Option<String>,
    },
}

#[derive(Parser, Debug)]
pub struct CorrespondencesArgs {
    #[command(subcommand)]
    pub action: CorrespondencesCmd,
}

#[derive(Subcommand, Debug)]
pub enum CorrespondencesCmd {
    /// List correspondences
    List(PageArgs),
    /// Show a correspondence with its letters and recipients
    Show { id: String },
    /// Delete a correspondence
    Delete { id: String },
}

#[derive(Parser, Debug)]
pub struct RecipientsArgs {
    #[command(subcommand)]
    pub action: RecipientsCmd,
}

#[derive(Subcommand, Debug)]
pub enum RecipientsCmd {
    /// List recipients
    List(PageArgs),
    /// Delete a recipient
    Delete {
        id: String,
        /// Correspondence whose cached detail embeds the recipient
        #[arg(long)]
        correspondence: Option<String>,
    },
}
