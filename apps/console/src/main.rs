use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, ConsoleServices, SessionError};
use shared::domain::Severity;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Command-line front end for the inventory management API")]
struct Args {
    /// Overrides the configured API base url for this run.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the API version endpoint.
    Status,
    /// Acquire a token and store it locally.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Revoke server-side tokens and forget the local one.
    Logout,
    /// Report whether a token is stored.
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut settings = load_settings().context("failed to load console settings")?;
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }
    let mut services =
        ConsoleServices::start(settings).context("failed to start console services")?;

    let outcome = run(&services, args.command).await;
    print_notifications(&services);
    services.shutdown();
    outcome
}

async fn run(services: &ConsoleServices, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let status = services.api_status.check().await;
            if !status.is_api_up {
                bail!(
                    "API at {} is down: {}",
                    services.api.base_url(),
                    status.error.unwrap_or_default()
                );
            }
            let version = status.version.unwrap_or_default();
            println!(
                "API at {} is up: {}",
                services.api.base_url(),
                serde_json::to_string(&version)?
            );
        }
        Command::Login { email, password } => {
            let _loading = services.overlay.hold("Signing in...");
            match services.session.login(&email, &password).await {
                Ok(_) => println!("Logged in as {email}"),
                Err(SessionError::Transport(failure)) => {
                    for entry in services.errors.handle_validation_error(&failure, Some("login")) {
                        eprintln!("  {}: {}", entry.field, entry.message);
                    }
                    bail!("login failed");
                }
                Err(other) => return Err(other).context("login failed"),
            }
        }
        Command::Logout => {
            services.session.logout().await.context("logout failed")?;
            println!("Logged out");
        }
        Command::Whoami => match services.session.token().await? {
            Some(token) => println!("Authenticated (token {})", mask(&token)),
            None => println!("Not logged in"),
        },
    }
    Ok(())
}

fn print_notifications(services: &ConsoleServices) {
    for message in services.notifications.messages() {
        match message.severity {
            Severity::Error => eprintln!("[{}] {}", message.severity, message.text),
            Severity::Warning | Severity::Info => {
                println!("[{}] {}", message.severity, message.text)
            }
        }
    }
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}...")
}
