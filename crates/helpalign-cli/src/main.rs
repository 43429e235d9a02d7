//! HelpAlign CLI - restore, log in and log out HelpAlign sessions.
//!
//! On start the saved patient and provider tokens are validated against the
//! backend and the result is printed. `login` and `logout` manage one role
//! at a time.

mod display;

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use helpalign_core::auth::SessionBootstrap;
use helpalign_core::{Config, Role};

// ============================================================================
// Constants
// ============================================================================

/// Directory for an additional log file
const LOG_DIR_ENV: &str = "HELPALIGN_LOG_DIR";

const LOG_FILE: &str = "helpalign.log";

const USERNAME_ENV: &str = "HELPALIGN_USERNAME";

const PASSWORD_ENV: &str = "HELPALIGN_PASSWORD";

const USAGE: &str = "\
Usage:
  helpalign [status]                         Restore saved sessions and show who is signed in
  helpalign login <patient|provider> [email] Sign in and save the session
  helpalign logout <patient|provider>        Sign out and forget the saved session
  helpalign --help                           Show this message

Environment:
  HELPALIGN_API_URL    Backend base URL (overrides config)
  HELPALIGN_USERNAME   Email to sign in with
  HELPALIGN_PASSWORD   Password to sign in with
  HELPALIGN_LOG_DIR    Also write logs to <dir>/helpalign.log
  RUST_LOG             Log filter (default: warn)";

#[derive(Debug, PartialEq)]
enum Command {
    Status,
    Login { role: Role, username: Option<String> },
    Logout { role: Role },
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut args = args.iter().map(String::as_str);
    let command = match args.next() {
        None | Some("status") => Command::Status,
        Some("-h") | Some("--help") | Some("help") => Command::Help,
        Some("login") => {
            let role: Role = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("login needs a role: patient or provider"))?
                .parse()?;
            Command::Login {
                role,
                username: args.next().map(str::to_string),
            }
        }
        Some("logout") => {
            let role: Role = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("logout needs a role: patient or provider"))?
                .parse()?;
            Command::Logout { role }
        }
        Some(other) => anyhow::bail!("Unknown command '{}'\n\n{}", other, USAGE),
    };

    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected argument '{}'\n\n{}", extra, USAGE);
    }
    Ok(command)
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the log file on drop and must be held until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
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
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _log_guard = init_tracing();
    info!("HelpAlign starting");

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            let mut c = Config::default();
            c.apply_env_overrides();
            c
        }
    };
    info!(api = %config.api_base_url, store = ?config.token_store, "Config loaded");

    let bootstrap = SessionBootstrap::from_config(&config)?;

    println!("HelpAlign");
    println!("Aligning you with your care\n");

    let result = match command {
        Command::Status => status(&bootstrap).await,
        Command::Login { role, username } => login(&bootstrap, &mut config, role, username).await,
        Command::Logout { role } => logout(&bootstrap, role).await,
        Command::Help => Ok(()),
    };

    info!("HelpAlign shutting down");
    result
}

async fn status(bootstrap: &SessionBootstrap) -> Result<()> {
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; never cancel
            std::future::pending::<()>().await;
        }
    };

    let Some(snapshot) = bootstrap.run_until(shutdown).await else {
        eprintln!("Interrupted.");
        return Ok(());
    };

    for role in Role::ALL {
        let session = snapshot.get(role);
        if let Some(name) = session.profile().and_then(|p| p.display_name()) {
            println!("Hello, {}!", name);
        }
        println!("  {}", display::role_line(role, session));

        // A token that survived a failed check was kept because the backend
        // could not be reached.
        if !session.is_logged_in() {
            let kept = match bootstrap.store().get(role.storage_key()) {
                Ok(token) => token.is_some(),
                Err(e) => {
                    warn!(%role, error = %e, "Failed to read saved sign-in");
                    false
                }
            };
            if kept {
                let saved = match bootstrap.store().stored_at(role.storage_key()) {
                    Ok(at) => at
                        .map(|at| format!(", saved {}", display::age_display(Utc::now() - at)))
                        .unwrap_or_default(),
                    Err(e) => {
                        warn!(%role, error = %e, "Failed to read when sign-in was saved");
                        String::new()
                    }
                };
                println!("    Could not reach HelpAlign; keeping your saved sign-in{}", saved);
            }
        }
    }

    if !snapshot.any_logged_in() {
        println!("\nAre you visiting as a patient or a care provider?");
        println!("Run `helpalign login patient` or `helpalign login provider` to sign in.");
    }
    Ok(())
}

async fn login(
    bootstrap: &SessionBootstrap,
    config: &mut Config,
    role: Role,
    username: Option<String>,
) -> Result<()> {
    let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
        Some(u) => u,
        None => prompt_username(config.last_username.as_deref())?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(p) if !p.is_empty() => p,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    println!("Signing in as {}...", role.display_name());

    match bootstrap.login(role, &username, &password).await {
        Ok(profile) => {
            config.last_username = Some(username.trim().to_string());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }

            let name = profile.display_name().unwrap_or_else(|| username.trim().to_string());
            println!("Hello, {}!", name);
            info!(%role, "Login successful");
            Ok(())
        }
        Err(e) => {
            error!(%role, error = %e, "Login failed");
            Err(anyhow::anyhow!(display::login_error_message(&e)))
        }
    }
}

fn prompt_username(last_username: Option<&str>) -> Result<String> {
    match last_username {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match last_username {
        Some(last) if input.is_empty() => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

async fn logout(bootstrap: &SessionBootstrap, role: Role) -> Result<()> {
    bootstrap
        .logout(role)
        .await
        .context("Failed to clear saved sign-in")?;
    println!("Signed out of your {} account.", role.display_name());
    Ok(())
}
