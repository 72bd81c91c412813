//! Consult CLI main entry point

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Sample output must work without a loadable configuration
    if let Some(Commands::Config {
        config_cmd: ConfigCommands::Sample,
    }) = &cli.command
    {
        return commands::config_sample_command();
    }

    let config = commands::load_config(cli.config.as_ref())?;

    // Initialize tracing
    match &cli.log_level {
        Some(level) => consult_logging::init_simple_tracing(level)?,
        None => consult_logging::init_logging_from_config(&config.logging)?,
    }

    info!("Consult CLI starting against {}", config.http.base_url);

    // Dispatch to command handlers
    match &cli.command {
        Some(Commands::Get {
            path,
            query,
            no_cache,
        }) => commands::get_command(&config, path, query, *no_cache).await,
        Some(Commands::Post { path, data }) => {
            commands::post_command(&config, path, data.as_ref()).await
        }
        Some(Commands::Login { email, password }) => {
            commands::login_command(&config, email, password).await
        }
        Some(Commands::Logout) => commands::logout_command(&config).await,
        Some(Commands::Upload { to, file }) => commands::upload_command(&config, to, file).await,
        Some(Commands::Download { path, output }) => {
            commands::download_command(&config, path, output).await
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Sample => commands::config_sample_command(),
            ConfigCommands::Show { format } => commands::config_show_command(&config, format),
            ConfigCommands::Validate { config_file } => {
                commands::config_validate_command(config_file)
            }
        },
        None => {
            warn!("No command specified");
            println!("No command specified. Use --help to see available commands.");
            Ok(())
        }
    }
}
