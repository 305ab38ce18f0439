mod commands;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use gantry_core::{init_logging_from_settings, ConfigError, GantryResult, Settings, SqlType};
use gantry_orm::MigrationDirection;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::*;

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(about = "Ordered schema migrations with rollback on failure")]
#[command(version)]
struct Cli {
    /// Directory holding SQL migration files (overrides MIGRATIONS_DIR)
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Database connection URL (overrides SQL_URI and SQL_TYPE)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a fresh encryption key and HMAC secret key
    Generate,

    /// Migration management
    Migrate {
        #[command(subcommand)]
        migrate_command: MigrateCommands,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommands {
    /// Apply one migration, even if it is already recorded
    Up {
        /// Migration id
        id: String,
    },

    /// Roll back one migration and remove its record
    Down {
        /// Migration id
        id: String,
    },

    /// Apply every pending migration
    Run,

    /// Show migration status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new migration
    Create {
        /// Migration name
        name: String,
    },
}

/// Parse arguments, tolerating bad input.
///
/// Help and version are printed; anything else unparseable is logged and
/// treated as "nothing requested".
fn parse_args<I, T>(args: I) -> Option<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    match Cli::try_parse_from(&args) {
        Ok(cli) => Some(cli),
        Err(err) => {
            match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    let _ = err.print();
                }
                kind => {
                    let args: Vec<String> = args
                        .iter()
                        .map(|arg| arg.to_string_lossy().into_owned())
                        .collect();
                    tracing::warn!(args = ?args, reason = %kind, "Invalid cli args");
                }
            }
            None
        }
    }
}

/// Fold command-line overrides into the environment settings
fn apply_overrides(settings: &mut Settings, cli: &Cli) -> Result<(), ConfigError> {
    if let Some(dir) = &cli.migrations_dir {
        settings.migrations_dir = dir.clone();
    }

    if let Some(url) = &cli.database_url {
        settings.sql_type = SqlType::from_url(url).ok_or_else(|| {
            ConfigError::invalid_value("--database-url", url, "a postgres:// or sqlite: URL")
        })?;
        settings.sql_uri = url.clone();
    }

    settings.validate()
}

async fn dispatch(cli: Cli, mut settings: Settings) -> GantryResult<()> {
    apply_overrides(&mut settings, &cli)?;

    match cli.command {
        Commands::Generate => {
            generate::run().await?;
        }
        Commands::Migrate { migrate_command } => match migrate_command {
            MigrateCommands::Up { id } => {
                migrate::manual(&settings, &id, MigrationDirection::Up).await?;
            }
            MigrateCommands::Down { id } => {
                migrate::manual(&settings, &id, MigrationDirection::Down).await?;
            }
            MigrateCommands::Run => {
                migrate::run(&settings).await?;
            }
            MigrateCommands::Status { json } => {
                migrate::status(&settings, json).await?;
            }
            MigrateCommands::Create { name } => {
                migrate::create(&settings, &name).await?;
            }
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging_from_settings(&settings) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    tracing::debug!(
        app_name = %settings.app_name,
        environment = %settings.environment,
        version = %settings.app_version,
        git_sha = %settings.git_sha,
        "Settings loaded"
    );

    let Some(cli) = parse_args(std::env::args_os()) else {
        return ExitCode::SUCCESS;
    };

    match dispatch(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}
