//! Command-line interface for the `suliko` binary.

use crate::document::DocumentKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// suliko - translate text and documents with the Suliko service
#[derive(Debug, Parser)]
#[command(name = "suliko")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse the blog
    #[command(subcommand)]
    Blog(BlogCommand),

    #[command(flatten)]
    Service(ServiceCommand),
}

/// Commands that talk to the backend
#[derive(Debug, Subcommand)]
pub enum ServiceCommand {
    /// Text a verification code to a phone number
    SendCode {
        phone: String,
    },

    /// Log in with phone number and password
    Login {
        phone: String,
        /// Password (read from SULIKO_PASSWORD when omitted)
        #[arg(long, env = "SULIKO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Register(RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Manage your profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// List or manage translation languages
    #[command(subcommand)]
    Languages(LanguagesCommand),

    /// Translate text or documents
    #[command(subcommand)]
    Translate(TranslateCommand),

    /// Inspect an existing translation job
    #[command(subcommand)]
    Job(JobCommand),

    /// Review and apply AI suggestions for a finished job
    #[command(subcommand)]
    Suggestions(SuggestionsCommand),

    /// Administer user accounts
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    pub phone: String,
    /// Code received by SMS
    #[arg(long)]
    pub code: String,
    #[arg(long, env = "SULIKO_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub confirm_password: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Change profile fields; omitted fields keep their current value
    Update(ProfileArgs),
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum LanguagesCommand {
    /// List available languages
    List,
    /// Add a language (admin)
    Add {
        name: String,
        /// Georgian name of the language
        name_geo: String,
    },
    /// Delete a language by id (admin)
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum TranslateCommand {
    /// Translate a piece of text
    Text {
        text: String,
        /// Target language (id, English or Georgian name)
        #[arg(short, long)]
        to: String,
        /// Source language; detected by the server when omitted
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Translate a document and save the result
    Document {
        file: PathBuf,
        #[arg(short, long)]
        to: String,
        #[arg(short, long)]
        from: Option<String>,
        /// Processing pipeline; guessed from the extension when omitted
        #[arg(short, long, value_enum)]
        kind: Option<DocumentKind>,
        /// Where to write the translated document
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Show the current status
    Status { job_id: String },
    /// Wait for the job to finish
    Wait { job_id: String },
    /// Download the result
    Result {
        job_id: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List the AI suggestions for the job
    Suggestions { job_id: String },
}

#[derive(Debug, Subcommand)]
pub enum SuggestionsCommand {
    /// Decide on suggestions and apply the accepted ones
    Apply(SuggestionsArgs),
}

#[derive(Debug, Args)]
pub struct SuggestionsArgs {
    pub job_id: String,
    /// Suggestion ids to accept
    #[arg(long, value_delimiter = ',')]
    pub accept: Vec<String>,
    /// Suggestion ids to reject
    #[arg(long, value_delimiter = ',')]
    pub reject: Vec<String>,
    /// Replace a suggestion's text: ID=TEXT
    #[arg(long, value_parser = parse_edit)]
    pub edit: Vec<(String, String)>,
    /// Accept every suggestion not otherwise decided
    #[arg(long)]
    pub accept_all: bool,
}

fn parse_edit(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(id, text)| (id.trim().to_string(), text.to_string()))
        .filter(|(id, _)| !id.is_empty())
        .ok_or_else(|| format!("expected ID=TEXT, got '{}'", raw))
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Manage user accounts
    #[command(subcommand)]
    Users(UsersCommand),
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List users
    List {
        /// Filter by name, email or phone
        #[arg(short, long)]
        search: Option<String>,
        /// Sort by balance (repeat for descending)
        #[arg(long, action = clap::ArgAction::Count)]
        sort_balance: u8,
    },
    /// Set a user's balance
    SetBalance { user_id: String, balance: f64 },
    /// Delete a user
    Delete { user_id: String },
}

#[derive(Debug, Subcommand)]
pub enum BlogCommand {
    /// Search posts
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one post
    Show { slug: String },
    /// List categories
    Categories,
}

impl Cli {
    /// Log filter directive derived from -v / -q
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            "suliko_client=error"
        } else {
            match self.verbose {
                0 => "suliko_client=info",
                1 => "suliko_client=debug",
                _ => "suliko_client=trace",
            }
        }
    }
}
