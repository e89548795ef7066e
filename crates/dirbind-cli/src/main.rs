//! Dirbind - directory search-then-bind authentication
//!
//! Looks a user up in an LDAP directory and verifies their password by
//! binding as the matched entry.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::authenticate::PasswordInput;
use commands::{CommandContext, EXIT_SUCCESS, EXIT_USAGE};
use dirbind_core::LoggingConfig;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirbind")]
#[command(author = "Dirbind Team")]
#[command(version = dirbind_core::VERSION)]
#[command(about = "Authenticate users against an LDAP directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRBIND_CONFIG")]
    config: Option<String>,

    /// Directory host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Directory port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Search base DN
    #[arg(long, global = true)]
    base_dn: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate a user and print the matched directory entry
    Authenticate {
        /// Username substituted into the user filter
        username: String,

        /// Password for the user
        #[arg(long, env = "DIRBIND_PASSWORD", hide_env_values = true, conflicts_with = "password_stdin")]
        password: Option<String>,

        /// Read the password from the first line of stdin
        #[arg(long)]
        password_stdin: bool,
    },

    /// Validate the directory configuration without connecting
    CheckConfig,

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
        // --help and --version
        Err(e) => e.exit(),
    };

    ExitCode::from(exit_status(run(cli).await))
}

/// Exit status for a finished command; errors never reached the directory
fn exit_status(result: Result<u8>) -> u8 {
    match result {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_USAGE
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let overrides = config::Overrides {
        host: cli.host.clone(),
        port: cli.port,
        base_dn: cli.base_dn.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = config::load(cli.config.as_deref(), &overrides)?;

    init_logging(&config.logging);
    debug!("Loaded configuration: {:?}", config.directory);

    let ctx = CommandContext {
        config,
        output_format: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Authenticate {
            username,
            password,
            password_stdin,
        } => {
            let input = match (password, password_stdin) {
                (_, true) => Some(PasswordInput::Stdin),
                (Some(value), false) => Some(PasswordInput::Value(value)),
                (None, false) => None,
            };
            commands::authenticate::execute(&ctx, &username, input).await
        }
        Commands::CheckConfig => {
            commands::check_config::execute(&ctx)?;
            Ok(EXIT_SUCCESS)
        }
        Commands::Version => {
            println!("dirbind {}", dirbind_core::VERSION);
            Ok(EXIT_SUCCESS)
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // Logs go to stderr so command output on stdout stays parseable.
    // A subscriber may already be installed under test.
    let _ = if logging.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };
}
