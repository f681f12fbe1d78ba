//! campus - command-line client for the campus administration portal.
//!
//! Logs in against the portal API, keeps the session in the configured
//! credential store, and issues authenticated requests with transparent
//! token refresh.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use campus_core::{ApiClient, ApiError, Config, CredentialBackend, Endpoints, TerminationReason};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name in cache directory
const LOG_FILE: &str = "campus.log";

/// Password source for non-interactive logins
const PASSWORD_ENV: &str = "CAMPUS_PASSWORD";

/// Exit status when the command failed because the session ended
const SESSION_ENDED_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "campus", version, about = "Campus portal API client")]
struct Cli {
    /// API base URL (overrides config file and CAMPUS_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Where to keep the session credentials
    #[arg(long, global = true, value_enum)]
    store: Option<StoreArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreArg {
    Keyring,
    File,
    /// Kept only for this invocation; nothing is saved for later commands
    Memory,
}

impl From<StoreArg> for CredentialBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Keyring => CredentialBackend::Keyring,
            StoreArg::File => CredentialBackend::File,
            StoreArg::Memory => CredentialBackend::Memory,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Revoke the refresh token and clear the stored session
    Logout,
    /// Show the cached session user
    Whoami,
    /// GET one or more paths (fetched concurrently)
    Get {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// POST a JSON body
    Post { path: String, body: String },
    /// PUT a JSON body
    Put { path: String, body: String },
    /// DELETE a resource
    Delete { path: String },
    /// Ask the server whether the current user holds a permission
    Can { code: String },
}

/// Initialize the tracing subscriber for logging.
/// Returns the guard that flushes the file writer on drop.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

fn session_ended(reason: TerminationReason) {
    let why = match reason {
        TerminationReason::Expired => "Your session expired",
        TerminationReason::Rejected => "The server rejected your session",
    };
    eprintln!("{}. Run `campus login` to sign in again.", why);
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).context("Request body must be valid JSON")
}

fn read_password(username: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")
}

fn read_username(config: &Config) -> Result<String> {
    if let Some(ref last) = config.last_username {
        return Ok(last.clone());
    }
    eprint!("Username: ");
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let username = line.trim().to_string();
    anyhow::ensure!(!username.is_empty(), "Username is required");
    Ok(username)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(store) = cli.store {
        config.credential_backend = store.into();
    }
    let endpoints = match cli.base_url {
        Some(ref url) => Endpoints::new(url.as_str()),
        None => config.endpoints(),
    };

    let _log_guard = init_tracing(config.cache_dir().ok());
    info!(base_url = %endpoints.base_url(), "campus starting");

    let client = ApiClient::from_config(&config)?
        .with_endpoints(endpoints)
        .on_session_terminated(session_ended);

    let status = exit_status(run(cli.command, &client, &mut config).await)?;
    Ok(ExitCode::from(status))
}

/// Map a command result to the process exit status. `main` returns it
/// instead of calling `process::exit` so the log guard is dropped.
fn exit_status(result: Result<()>) -> Result<u8> {
    match result {
        Ok(()) => Ok(0),
        Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_session_terminated) => {
            // The hook already told the user what to do.
            debug!(error = %e, "Command ended with session termination");
            Ok(SESSION_ENDED_EXIT)
        }
        Err(e) => Err(e),
    }
}

async fn run(command: Command, client: &ApiClient, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { username } => {
            let username = match username {
                Some(username) => username,
                None => read_username(config)?,
            };
            let password = read_password(&username)?;
            let login = client.login(&username, &password).await?;
            eprintln!(
                "Logged in as {} ({} portal)",
                login.user.display_name(),
                login.user.primary_role().as_str()
            );
            config.last_username = Some(username);
            config.save()?;
        }
        Command::Logout => {
            client.logout().await?;
            eprintln!("Logged out");
        }
        Command::Whoami => match client.restore_session()? {
            Some(user) => print_json(&serde_json::to_value(&user)?)?,
            None => eprintln!("Not logged in"),
        },
        Command::Get { paths } => {
            let results = join_all(paths.iter().map(|path| client.get::<Value>(path))).await;
            for (path, result) in paths.iter().zip(results) {
                let value = result.with_context(|| format!("GET {} failed", path))?;
                print_json(&value)?;
            }
        }
        Command::Post { path, body } => {
            let value: Value = client.post(&path, &parse_body(&body)?).await?;
            print_json(&value)?;
        }
        Command::Put { path, body } => {
            let value: Value = client.put(&path, &parse_body(&body)?).await?;
            print_json(&value)?;
        }
        Command::Delete { path } => {
            let value: Value = client.delete(&path).await?;
            print_json(&value)?;
        }
        Command::Can { code } => {
            let allowed = client.check_permission(&code).await?;
            println!("{}", if allowed { "yes" } else { "no" });
        }
    }
    Ok(())
}
