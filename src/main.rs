use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use authflow::oauth::{clear_credentials, default_credentials_path, load_credentials};
use authflow::{obtain_access_token, AuthflowError, Settings};

#[derive(Parser)]
#[command(
    name = "authflow",
    version,
    about = "Acquire OAuth access tokens for command-line tools via browser login"
)]
struct Cli {
    /// Identity provider base URL, e.g. https://auth.example.com
    #[arg(long, env = "AUTHFLOW_OAUTH_HOST", global = true)]
    oauth_host: Option<String>,

    /// OAuth client id (UUID)
    #[arg(long, env = "AUTHFLOW_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Browser login timeout in seconds
    #[arg(long, env = "AUTHFLOW_AUTH_TIMEOUT", default_value_t = 300, global = true)]
    auth_timeout: u64,

    /// Credential file location (defaults to ~/.authflow-credentials.json)
    #[arg(long, env = "AUTHFLOW_CREDENTIALS_FILE", global = true)]
    credentials_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Force a fresh browser login, replacing any stored credentials
    Login,

    /// Print a currently valid access token, acquiring one if needed
    Token,

    /// Report stored-credential validity without any network call
    Status,

    /// Remove stored credentials
    Logout,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("AUTHFLOW_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", "Error:".red());
        std::process::exit(1);
    }
}

fn settings(cli: &Cli) -> Result<Settings, AuthflowError> {
    let oauth_host = cli
        .oauth_host
        .clone()
        .ok_or_else(|| AuthflowError::Validation {
            field: "oauth_host",
            detail: "set --oauth-host or AUTHFLOW_OAUTH_HOST".into(),
        })?;
    let client_id = cli
        .client_id
        .clone()
        .ok_or_else(|| AuthflowError::Validation {
            field: "client_id",
            detail: "set --client-id or AUTHFLOW_CLIENT_ID".into(),
        })?;

    let mut settings = Settings::new(oauth_host, client_id)
        .with_auth_timeout(Duration::from_secs(cli.auth_timeout));
    if let Some(path) = &cli.credentials_file {
        settings = settings.with_credentials_path(path.clone());
    }
    Ok(settings)
}

fn credentials_path(cli: &Cli) -> PathBuf {
    cli.credentials_file
        .clone()
        .unwrap_or_else(default_credentials_path)
}

async fn run(cli: Cli) -> Result<(), AuthflowError> {
    match &cli.command {
        Commands::Login => {
            let settings = settings(&cli)?;
            obtain_access_token(&settings, true).await?;
            println!("{} Authentication successful", "✓".green());
            println!(
                "Credentials saved to {}",
                settings.credentials_path.display()
            );
            Ok(())
        }
        Commands::Token => {
            let settings = settings(&cli)?;
            let token = obtain_access_token(&settings, false).await?;
            println!("{token}");
            Ok(())
        }
        Commands::Status => {
            let path = credentials_path(&cli);
            match load_credentials(&path) {
                None => println!("{} no stored credentials", "✗".red()),
                Some(creds) => {
                    let validation = creds.token_set.validate();
                    if validation.is_valid {
                        println!("{} stored access token is valid", "✓".green());
                    } else if validation.needs_refresh {
                        println!(
                            "{} stored access token expired; a refresh token is available",
                            "!".yellow()
                        );
                    } else {
                        println!(
                            "{} stored access token expired; browser login required",
                            "✗".red()
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Logout => {
            let path = credentials_path(&cli);
            if clear_credentials(&path)? {
                println!("{} Credentials cleared from {}", "✓".green(), path.display());
            } else {
                println!("No stored credentials found");
            }
            Ok(())
        }
    }
}
