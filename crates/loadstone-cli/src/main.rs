// crates/loadstone-cli/src/main.rs
// ============================================================================
// Module: Loadstone CLI Entry Point
// Description: One-shot ad-hoc load runs and the HTTP server command.
// Purpose: Drive the run coordinator from the terminal.
// Dependencies: clap, loadstone-core, loadstone-runtime, loadstone-server,
//               thiserror, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! A bare invocation runs one ad-hoc load against `--url` and prints the
//! aggregate; the process exits zero only for a completed run. The `server`
//! subcommand exposes the full operation set over HTTP against a durable
//! catalog database.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod printer;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use loadstone_core::HttpMethod;
use loadstone_core::MetricHub;
use loadstone_core::RunRequest;
use loadstone_core::StreamEvent;
use loadstone_core::ValidationError;
use loadstone_runtime::CatalogStore;
use loadstone_runtime::CatalogStoreConfig;
use loadstone_runtime::RunCoordinator;
use loadstone_runtime::StartError;
use loadstone_runtime::StoreError;
use loadstone_server::ServerConfig;
use loadstone_server::ServerError;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::printer::AnsiResultWriter;
use crate::printer::ResultWriter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "loadstone", version, about = "HTTP load generator with a persistent catalog")]
struct Cli {
    /// One-shot run flags, used when no subcommand is given.
    #[command(flatten)]
    run: RunArgs,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Expose the full operation set over HTTP.
    Server(ServerCommand),
}

/// Flags for the one-shot ad-hoc run.
#[derive(Args, Debug)]
struct RunArgs {
    /// Target URL.
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// HTTP method.
    #[arg(long, value_name = "METHOD", default_value = "GET")]
    method: String,
    /// Concurrent virtual users.
    #[arg(long, default_value_t = 10)]
    users: u32,
    /// Total request budget (ignored when --duration is set).
    #[arg(long, default_value_t = 100)]
    requests: u64,
    /// Wall-clock duration in seconds.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,
    /// Request body.
    #[arg(long, value_name = "BODY")]
    body: Option<String>,
    /// Content type for the request body.
    #[arg(long = "content-type", value_name = "TYPE", default_value = "application/json")]
    content_type: String,
    /// Skip TLS certificate verification.
    #[arg(long, action = ArgAction::SetTrue)]
    insecure: bool,
}

/// Configuration for the `server` command.
#[derive(Args, Debug)]
struct ServerCommand {
    /// Port to bind.
    #[arg(long, default_value_t = loadstone_server::DEFAULT_PORT)]
    port: u16,
    /// Path to the catalog database.
    #[arg(long, value_name = "PATH", default_value = "loadstone.db")]
    database: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Top-level CLI errors.
#[derive(Debug, Error)]
enum CliError {
    /// One-shot mode needs a target URL.
    #[error("--url is required (or use the `server` subcommand)")]
    MissingUrl,
    /// The run request failed admission checks.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The run could not be started.
    #[error(transparent)]
    Start(#[from] StartError),
    /// The catalog store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The HTTP server failed.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// Async runtime bootstrap failed.
    #[error("runtime start failed: {0}")]
    Runtime(String),
    /// The event stream ended before a terminal event arrived.
    #[error("event stream closed before the run finished")]
    StreamClosed,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Server(command)) => run_server_command(&command),
        None => run_once(&cli.run),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the fmt subscriber honoring `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

// ============================================================================
// SECTION: One-Shot Run
// ============================================================================

/// Runs one ad-hoc load and prints the aggregate.
fn run_once(args: &RunArgs) -> Result<ExitCode, CliError> {
    let request = build_request(args)?;
    let store = CatalogStore::open_in_memory()?;
    let coordinator = RunCoordinator::new(store, Arc::new(MetricHub::new()));
    let subscription = coordinator.subscribe();
    let token = coordinator.start_ad_hoc_run(&request)?;
    println!("running against {} ({} users)...", request.url, request.users);

    let writer = AnsiResultWriter;
    loop {
        match subscription.recv() {
            Some(StreamEvent::TestCompleted {
                aggregate,
            }) => {
                writer.write_results(&aggregate);
                return Ok(ExitCode::SUCCESS);
            }
            Some(StreamEvent::TestError {
                error, ..
            }) => {
                eprintln!("run {token} failed: {error}");
                return Ok(ExitCode::FAILURE);
            }
            Some(StreamEvent::AuthenticationFailed {
                error, ..
            }) => {
                eprintln!("authentication failed: {error}");
                // The pipeline follows up with TestError; keep draining.
            }
            Some(_) => {}
            None => return Err(CliError::StreamClosed),
        }
    }
}

/// Builds the ad-hoc run request from the CLI flags.
fn build_request(args: &RunArgs) -> Result<RunRequest, CliError> {
    let url = args.url.clone().ok_or(CliError::MissingUrl)?;
    let method = HttpMethod::parse(&args.method)?;
    let (requests, duration_secs) = match args.duration {
        Some(duration) => (None, Some(duration)),
        None => (Some(args.requests), None),
    };
    Ok(RunRequest {
        url,
        method,
        users: args.users,
        requests,
        duration_secs,
        body: args.body.clone(),
        content_type: args.content_type.clone(),
        headers: None,
        insecure_tls: args.insecure,
        auth: None,
    })
}

// ============================================================================
// SECTION: Server Command
// ============================================================================

/// Opens the durable catalog and serves the operation set over HTTP.
fn run_server_command(command: &ServerCommand) -> Result<ExitCode, CliError> {
    let store = CatalogStore::open(&CatalogStoreConfig::new(&command.database))?;
    let coordinator = Arc::new(RunCoordinator::new(store, Arc::new(MetricHub::new())));
    let config = ServerConfig {
        port: command.port,
        ..ServerConfig::default()
    };
    info!(database = %command.database.display(), port = command.port, "starting server");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Runtime(err.to_string()))?;
    runtime.block_on(loadstone_server::run_server(&config, coordinator))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            url: Some("http://127.0.0.1:9000/load".to_string()),
            method: "get".to_string(),
            users: 10,
            requests: 100,
            duration: None,
            body: None,
            content_type: "application/json".to_string(),
            insecure: false,
        }
    }

    #[test]
    fn defaults_produce_a_budget_request() {
        let request = build_request(&args()).unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.requests, Some(100));
        assert_eq!(request.duration_secs, None);
    }

    #[test]
    fn duration_flag_overrides_the_budget() {
        let mut flags = args();
        flags.duration = Some(30);
        let request = build_request(&flags).unwrap();
        assert_eq!(request.requests, None);
        assert_eq!(request.duration_secs, Some(30));
    }

    #[test]
    fn missing_url_is_an_error() {
        let mut flags = args();
        flags.url = None;
        assert!(matches!(build_request(&flags), Err(CliError::MissingUrl)));
    }

    #[test]
    fn unknown_method_is_an_explicit_error() {
        let mut flags = args();
        flags.method = "BREW".to_string();
        assert!(matches!(
            build_request(&flags),
            Err(CliError::Validation(ValidationError::UnknownMethod(_)))
        ));
    }

    #[test]
    fn cli_definition_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
