//! Glean - Code-quality metrics puller
//!
//! # Usage
//!
//! ```bash
//! # Current measures of a component (default category)
//! glean pull my_project
//!
//! # Full measure history from a self-hosted server
//! glean pull my_project --base-url https://sonar.example.com --category history
//!
//! # Record responses, then replay them offline
//! glean pull my_project --archive-path sonar.json
//! glean pull my_project --archive-path sonar.json --fetch-archive
//! ```

mod cmd;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Glean - Code-quality metrics puller
#[derive(Parser, Debug)]
#[command(name = "glean")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (defaults apply if it does not exist)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull items of one component from SonarQube
    Pull(cmd::pull::PullArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (level, format) = logging::resolve(cli.log_level.as_deref(), cli.config.as_deref())?;
    logging::init(&level, format)?;

    match cli.command {
        Command::Pull(args) => cmd::pull::run(args, cli.config.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_global_args() {
        let cli = Cli::try_parse_from([
            "glean",
            "--config",
            "glean.toml",
            "pull",
            "c01",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("glean.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Pull(_)));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["glean"]).is_err());
    }
}
