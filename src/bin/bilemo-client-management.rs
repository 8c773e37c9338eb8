//! BileMo API Client Management CLI Tool
//!
//! Creates and deletes BileMo API clients through the server's client endpoints.
//! The server must run with `ENABLE_CLIENT_API=true`.
//!
//! ## Usage Examples
//!
//! ### Create a client
//! ```bash
//! bilemo-client-management --base-url http://localhost:8080 create \
//!   --redirect-uri "https://shop.example/callback" \
//!   --grant-type password \
//!   --name "shop"
//! ```
//!
//! ### Delete a client
//! ```bash
//! bilemo-client-management --base-url http://localhost:8080 delete \
//!   --client-id "client_id_here" \
//!   --client-secret "client_secret_here"
//! ```
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error (network, parsing, etc.)
//! - 2: Client management error
//! - 3: Authentication error

use bilemo::oauth::{CreateClientRequest, CreateClientResponse, DeleteClientRequest};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::process;

/// Grant types a client can be created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GrantType {
    /// Resource owner password credentials (also enables refresh_token)
    Password,
    RefreshToken,
    ClientCredentials,
    AuthorizationCode,
}

impl GrantType {
    fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::AuthorizationCode => "authorization_code",
        }
    }
}

#[derive(Parser)]
#[command(
    name = "bilemo-client-management",
    about = "BileMo API Client Management CLI Tool",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[arg(
        long,
        default_value = "http://localhost:8080",
        help = "Base URL of the BileMo server"
    )]
    base_url: String,

    #[arg(short, long, help = "Enable verbose output for debugging")]
    verbose: bool,

    #[arg(
        long,
        value_enum,
        default_value = "json",
        help = "Output format for responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Json,
    JsonPretty,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new API client
    Create(CreateArgs),
    /// Delete an API client
    Delete(DeleteArgs),
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long, help = "Unique client name, usable as clientName on /login")]
    name: Option<String>,

    #[arg(long = "redirect-uri", help = "Absolute redirect URI")]
    redirect_uri: String,

    #[arg(long = "grant-type", value_enum, default_value = "password")]
    grant_type: GrantType,
}

#[derive(Args)]
struct DeleteArgs {
    #[arg(long, help = "Public client identifier ({id}_{random_id})")]
    client_id: String,

    #[arg(long, help = "Client secret")]
    client_secret: String,

    #[arg(long, help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Debug)]
enum AppError {
    Network(reqwest::Error),
    Json(serde_json::Error),
    ClientManagement(String),
    Authentication(String),
    General(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Network(_) | AppError::Json(_) | AppError::General(_) => 1,
            AppError::ClientManagement(_) => 2,
            AppError::Authentication(_) => 3,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Network(err) => write!(f, "Network error: {}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::ClientManagement(msg) => write!(f, "Client management error: {}", msg),
            AppError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            AppError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Create(args) => create_client(&cli, args).await,
        Commands::Delete(args) => delete_client(&cli, args).await,
    };

    match result {
        Ok(()) => process::exit(0),
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(err.exit_code());
        }
    }
}

/// Describe an error body returned by the server
fn error_description(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error_description")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

async fn create_client(cli: &Cli, args: &CreateArgs) -> Result<(), AppError> {
    if cli.verbose {
        eprintln!("Creating new API client on BileMo server: {}", cli.base_url);
    }

    let request = CreateClientRequest {
        redirect_uri: Some(args.redirect_uri.clone()),
        grant_type: Some(args.grant_type.as_str().to_string()),
        name: args.name.clone(),
    };

    if cli.verbose {
        eprintln!("Create request: {}", serde_json::to_string_pretty(&request)?);
    }

    let client = Client::new();
    let url = format!("{}/createClient", cli.base_url.trim_end_matches('/'));

    let response = client.post(&url).json(&request).send().await?;

    if cli.verbose {
        eprintln!("Response status: {}", response.status());
    }

    match response.status() {
        StatusCode::OK | StatusCode::CREATED => {
            let created: CreateClientResponse = response.json().await?;
            output_response(&cli.format, &created)?;
            Ok(())
        }
        StatusCode::NOT_FOUND => Err(AppError::General(
            "Client API is disabled on this server (ENABLE_CLIENT_API)".to_string(),
        )),
        status => {
            let error_text = response.text().await?;
            Err(AppError::ClientManagement(format!(
                "Client creation failed with status {}: {}",
                status,
                error_description(&error_text)
            )))
        }
    }
}

async fn delete_client(cli: &Cli, args: &DeleteArgs) -> Result<(), AppError> {
    if !args.yes {
        println!(
            "Are you sure you want to delete client '{}'? Its tokens are revoked and its users detached. (y/N)",
            args.client_id
        );
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::General(format!("Failed to read confirmation: {}", e)))?;

        let input = input.trim().to_lowercase();
        if input != "y" && input != "yes" {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    if cli.verbose {
        eprintln!("Deleting client: {}", args.client_id);
    }

    let client = Client::new();
    let url = format!(
        "{}/clients/{}",
        cli.base_url.trim_end_matches('/'),
        args.client_id
    );

    let response = client
        .delete(&url)
        .json(&DeleteClientRequest {
            client_secret: args.client_secret.clone(),
        })
        .send()
        .await?;

    if cli.verbose {
        eprintln!("Response status: {}", response.status());
    }

    match response.status() {
        StatusCode::NO_CONTENT => {
            println!("Client '{}' deleted successfully.", args.client_id);
            Ok(())
        }
        StatusCode::FORBIDDEN => Err(AppError::Authentication(
            "Client secret or identifier does not match".to_string(),
        )),
        StatusCode::NOT_FOUND => Err(AppError::ClientManagement(format!(
            "Client '{}' not found",
            args.client_id
        ))),
        status => {
            let error_text = response.text().await?;
            Err(AppError::ClientManagement(format!(
                "Failed to delete client with status {}: {}",
                status,
                error_description(&error_text)
            )))
        }
    }
}

/// Output response data in the specified format
fn output_response<T: Serialize>(format: &OutputFormat, data: &T) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(data)?);
        }
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Table => {
            let json_value: Value = serde_json::to_value(data)?;
            if let Value::Object(map) = json_value {
                for (key, val) in map {
                    match val {
                        Value::String(s) => println!("{}: {}", key, s),
                        other => println!("{}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}
