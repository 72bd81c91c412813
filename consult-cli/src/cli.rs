//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// GET a path and print the JSON response
    Get {
        /// Path relative to the base URL
        path: String,

        /// Query parameter (example: --query page=2)
        #[arg(long, value_name = "NAME=VALUE")]
        query: Vec<String>,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// POST a JSON body and print the JSON response
    Post {
        /// Path relative to the base URL
        path: String,

        /// JSON body (example: --data='{"email":"ada@example.com"}')
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },

    /// Sign in and keep the session for later commands
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,

        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Upload a file as multipart form data
    Upload {
        /// Path relative to the base URL
        #[arg(long, value_name = "PATH", default_value = "/files/upload")]
        to: String,

        /// File to send
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Download a response body to a file
    Download {
        /// Path relative to the base URL
        path: String,

        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a sample configuration file
    Sample,

    /// Show the configuration in use
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_with_query() {
        let cli = Cli::try_parse_from([
            "consult",
            "--log-level",
            "debug",
            "get",
            "/patient/doctors",
            "--query",
            "page=2",
            "--query",
            "specialty=cardiology",
            "--no-cache",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Commands::Get {
                path,
                query,
                no_cache,
            }) => {
                assert_eq!(path, "/patient/doctors");
                assert_eq!(query, vec!["page=2", "specialty=cardiology"]);
                assert!(no_cache);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn test_parse_login_and_config_sample() {
        let cli = Cli::try_parse_from([
            "consult",
            "login",
            "--email",
            "ada@example.com",
            "--password",
            "secret",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Login { .. })));

        let cli = Cli::try_parse_from(["consult", "config", "sample"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                config_cmd: ConfigCommands::Sample
            })
        ));
    }
}
