// src/cli.rs
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Push gym session logs to Strava activity descriptions", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log progress to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update the description of the day's Strava activity from a session log
    Update {
        /// CSV export of the log sheet
        file: PathBuf,
        /// Cells holding the session, in A1 notation (e.g. "B12:F15").
        /// Defaults to the last 4 non-empty rows.
        #[arg(short, long)]
        range: Option<String>,
        /// Print the activity link instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show what would be sent, without contacting the importer
    Preview {
        /// CSV export of the log sheet
        file: PathBuf,
        /// Cells holding the session, in A1 notation (e.g. "B12:F15")
        #[arg(short, long)]
        range: Option<String>,
    },
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion script
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_update_with_range() {
        let cli = Cli::try_parse_from(["session-log", "-v", "update", "log.csv", "-r", "A12:F15", "--no-browser"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Update { file, range, no_browser } => {
                assert_eq!(file, PathBuf::from("log.csv"));
                assert_eq!(range.as_deref(), Some("A12:F15"));
                assert!(no_browser);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
