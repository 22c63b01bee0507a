//! folio - terminal admin client for the portfolio content API.
//!
//! Signs an administrator in, keeps the session verified and refreshed, and
//! exposes the account operations of the admin panel (sessions, password
//! change, logout everywhere) and its content management (projects,
//! contact messages, site settings).

mod app;
mod prompt;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use folio_core::Config;

use app::App;

/// Prefix of the daily log files written when `log_to_file` is enabled
const LOG_FILE_PREFIX: &str = "folio.log";

#[derive(Parser)]
#[command(name = "folio", version, about = "Admin session client for the portfolio content API")]
struct Cli {
    /// Content API base URL (defaults to the configured URL)
    #[arg(long, global = true, env = "FOLIO_API_URL")]
    api_url: Option<String>,

    /// Keep credentials in memory only for this run
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with username and password
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Verify the stored session and show who is signed in
    Status,
    /// Keep the session alive until interrupted
    Watch,
    /// Sign out this device
    Logout,
    /// Sign out every device of the account
    LogoutAll,
    /// Change the account password (ends every session)
    ChangePassword,
    /// List active sessions of the account
    Sessions,
    /// Revoke one session by id
    Revoke { id: i64 },
    /// Print this device's identifier
    DeviceId,
    /// List projects
    Projects {
        /// Only this category ("All" for every category)
        #[arg(short, long)]
        category: Option<String>,
        /// Only featured (true) or non-featured (false) projects
        #[arg(long)]
        featured: Option<bool>,
    },
    /// Show one project in full
    Project { id: i64 },
    /// Create a project
    ProjectAdd(ProjectFields),
    /// Change fields of a project; omitted fields keep their value
    ProjectEdit {
        id: i64,
        #[command(flatten)]
        fields: ProjectFields,
    },
    /// Delete a project
    ProjectDelete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List contact messages, newest first
    Messages {
        #[arg(long)]
        unread: bool,
    },
    /// Mark a message as read (or unread with --unread)
    MessageRead {
        id: i64,
        #[arg(long)]
        unread: bool,
    },
    /// Delete a message
    MessageDelete {
        id: i64,
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the site settings
    Settings,
    /// Change site settings; omitted fields keep their value
    SettingsSet {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

/// Editable project fields given on the command line.
#[derive(Args, Debug, Default)]
pub struct ProjectFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Client name; pass an empty string to clear it
    #[arg(long)]
    pub client: Option<String>,
    /// Free-form date, e.g. "2023" or "Jan 2023"
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub featured: Option<bool>,
    /// Comma-separated tags; replaces the existing tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}. Using defaults.", e);
            Config::default()
        }
    };

    let log_dir = if config.log_to_file {
        Config::data_dir().ok()
    } else {
        None
    };
    let _guard = init_tracing(log_dir.as_deref());
    if config.log_to_file && log_dir.is_none() {
        warn!("No data directory available, file logging disabled");
    }

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let api_url = cli.api_url.unwrap_or_else(|| config.resolved_api_url());
    info!(api_url = %api_url, "folio starting");

    let mut app = App::new(config, api_url, cli.ephemeral)?;
    match cli.command {
        Command::Login { username } => app.login(username).await,
        Command::Status => app.status().await,
        Command::Watch => app.watch().await,
        Command::Logout => app.logout().await,
        Command::LogoutAll => app.logout_all().await,
        Command::ChangePassword => app.change_password().await,
        Command::Sessions => app.sessions().await,
        Command::Revoke { id } => app.revoke(id).await,
        Command::DeviceId => app.device_id(),
        Command::Projects { category, featured } => app.projects(category, featured).await,
        Command::Project { id } => app.project(id).await,
        Command::ProjectAdd(fields) => app.project_add(fields).await,
        Command::ProjectEdit { id, fields } => app.project_edit(id, fields).await,
        Command::ProjectDelete { id, yes } => app.project_delete(id, yes).await,
        Command::Messages { unread } => app.messages(unread).await,
        Command::MessageRead { id, unread } => app.message_read(id, !unread).await,
        Command::MessageDelete { id, yes } => app.message_delete(id, yes).await,
        Command::Settings => app.settings().await,
        Command::SettingsSet {
            title,
            description,
            email,
        } => app.settings_set(title, description, email).await,
    }
}
