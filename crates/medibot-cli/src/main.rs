//! MediBot CLI - a terminal front end for the MediBot health assistant.
//!
//! Sign in, keep your health profile up to date, and ask MediBot questions.
//! The session token lives in the OS keychain, so one login lasts until
//! `medibot logout`.

mod commands;
mod prompt;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medibot_core::models::Profile;
use medibot_core::{ApiClient, Config, KeyringStore, SessionManager};

// ============================================================================
// Constants
// ============================================================================

/// Log level when RUST_LOG is not set
const DEFAULT_LOG_FILTER: &str = "warn";

/// Log files are named `medibot.<date>.log`
const LOG_FILE_PREFIX: &str = "medibot";

#[derive(Parser)]
#[command(name = "medibot", version, about = "MediBot health assistant in your terminal")]
struct Cli {
    /// Backend URL (overrides the config file)
    #[arg(long, global = true, env = "MEDIBOT_API_URL")]
    api_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: Option<String>,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show whether you are signed in
    Status,
    /// Show or edit your health profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// Ask a single question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Interactive chat; type `exit` to leave
    Chat,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Print the cached profile
    Show {
        /// Fetch the latest profile from the server first
        #[arg(long)]
        refresh: bool,
    },
    /// Change one or more fields; unspecified fields are kept
    Update(ProfileArgs),
}

#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub age: Option<String>,
    #[arg(long)]
    pub gender: Option<String>,
    #[arg(long)]
    pub blood_group: Option<String>,
    #[arg(long)]
    pub medical_history: Option<String>,
}

impl ProfileArgs {
    pub fn into_profile(self) -> Profile {
        fn present(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        Profile {
            name: present(self.name),
            age: present(self.age),
            gender: present(self.gender),
            blood_group: present(self.blood_group),
            medical_history: present(self.medical_history),
        }
    }
}

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and, when the cache directory is usable, a daily file.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let file_appender = Config::log_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(dir)
            .ok()
    });
    let (file_layer, guard) = match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
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
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = config.api_base_url(), "MediBot CLI starting");

    let api = ApiClient::from_config(&config)?;
    let session = SessionManager::new(api, Arc::new(KeyringStore::default()));
    session.restore().await;

    let success = commands::run(cli.command, &session, &mut config, cli.json).await?;
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_profile_update_args() {
        let cli = Cli::try_parse_from([
            "medibot",
            "profile",
            "update",
            "--age",
            "31",
            "--blood-group",
            " ",
        ])
        .expect("parses");
        let Command::Profile {
            action: Some(ProfileAction::Update(args)),
        } = cli.command
        else {
            panic!("expected profile update");
        };
        let profile = args.into_profile();
        assert_eq!(profile.age.as_deref(), Some("31"));
        assert_eq!(profile.blood_group, None);
        assert_eq!(profile.name, None);
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::try_parse_from(["medibot", "--json", "ask", "is", "fever", "bad?"])
            .expect("parses");
        assert!(cli.json);
        let Command::Ask { question } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(question.join(" "), "is fever bad?");
    }
}
