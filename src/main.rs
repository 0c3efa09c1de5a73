use anyhow::Result;
use ccm::commands;
use ccm::config::{Config, ConfigOptions};
use ccm::notify::ConsoleNotifier;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// ccm - Carbon-credit marketplace API client
///
/// Sends requests to the marketplace API, retrying transient failures
/// (network errors, 408, 429 and 5xx responses) with exponential backoff.
///
/// If the CCM_TOKEN environment variable is set, it is used for authentication
/// instead of the stored token.
///
/// Examples:
///   ccm request /projects
///   ccm request /credits -X POST -d '{"project_id": 1, "tonnes": 5}'
///   ccm auth set <TOKEN>
#[derive(Parser, Debug)]
#[command(author, version = env!("CCM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (defaults to http://localhost:3000/api; also via CCM_API_URL)
    #[arg(long = "api-url", env = "CCM_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// File the auth token is stored in (also via CCM_TOKEN_FILE)
    #[arg(long = "token-file", env = "CCM_TOKEN_FILE", value_name = "PATH", global = true)]
    pub token_file: Option<PathBuf>,

    /// Retries after the first attempt for transient failures
    #[arg(long = "max-retries", value_name = "N", global = true)]
    pub max_retries: Option<u32>,

    /// Delay before the first retry; doubles on each further retry
    #[arg(long = "retry-delay-ms", value_name = "MS", global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a request to the API and print the response
    Request(RequestArgs),

    /// Manage the stored auth token
    #[command(subcommand)]
    Auth(AuthCommands),
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// Endpoint relative to the API URL, or an absolute URL
    #[arg(value_name = "ENDPOINT")]
    pub endpoint: String,

    /// HTTP method
    #[arg(long = "method", short = 'X', default_value = "GET")]
    pub method: String,

    /// Request body
    #[arg(long = "data", short = 'd', value_name = "BODY")]
    pub data: Option<String>,

    /// Extra header in 'Name: value' form; may be repeated
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,
}

#[derive(clap::Subcommand, Debug)]
enum AuthCommands {
    /// Store a token
    Set {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Remove the stored token
    Clear,
    /// Show which token requests will use
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = Config::new(
        ccm::runtime::RealRuntime,
        ConfigOptions {
            api_url: cli.api_url,
            token_file: cli.token_file,
            max_retries: cli.max_retries,
            retry_delay_ms: cli.retry_delay_ms,
        },
    )?;
    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::Request(args) => {
            let options = commands::build_options(&args.method, args.data, &args.headers)?;
            let client = config.client()?;
            let succeeded = commands::request(
                &config,
                &client,
                &args.endpoint,
                options,
                &mut stdout,
                &ConsoleNotifier,
            )
            .await?;
            if !succeeded {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Auth(AuthCommands::Set { token }) => {
            commands::auth_set(&config, &token, &mut stdout)?
        }
        Commands::Auth(AuthCommands::Clear) => commands::auth_clear(&config, &mut stdout)?,
        Commands::Auth(AuthCommands::Status) => commands::auth_status(&config, &mut stdout)?,
    }
    Ok(ExitCode::SUCCESS)
}
