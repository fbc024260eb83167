//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::io::stdout;
use tracing_subscriber::EnvFilter;

use session_log_lib::{AppService, SessionLog, SubmissionOutcome, TerminalPresenter};

fn main() -> Result<()> {
    let cli_args = cli::parse_args();
    init_tracing(cli_args.verbose);

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();

        eprintln!("Generating completion script for {}...", shell); // Print to stderr
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    // Initialize the application service (loads config)
    let service = AppService::initialize().context("Failed to initialize application service")?;

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Update {
            file,
            range,
            no_browser,
        } => {
            let selection = service.load_session_range(&file, range.as_deref())?;
            let mut presenter =
                TerminalPresenter::stdio(service.config.open_browser && !no_browser);
            match service.update_strava_description(&selection, &mut presenter)? {
                SubmissionOutcome::Updated(activity) => {
                    println!("Updated Strava activity {}.", activity.id);
                }
                SubmissionOutcome::Declined => {
                    println!("Left the existing description untouched.");
                }
                SubmissionOutcome::Invalid(_) | SubmissionOutcome::Rejected { .. } => {
                    bail!("Strava activity was not updated.");
                }
            }
        }
        cli::Commands::Preview { file, range } => {
            let selection = service.load_session_range(&file, range.as_deref())?;
            match service.preview(&selection) {
                Ok(log) => {
                    let header_color = session_log_lib::parse_color(&service.config.theme.header_color)
                        .map(Color::from)
                        .unwrap_or(Color::Green); // Fallback
                    print_session_table(&log, header_color);
                    println!("{}", log.summary());
                }
                Err(e) => bail!("Invalid session log: {}", e),
            }
        }
        cli::Commands::ConfigPath => {
            println!("{}", service.get_config_path().display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_session_table(log: &SessionLog, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(header_color),
            Cell::new("Exercise").fg(header_color),
            Cell::new("Target reps").fg(header_color),
            Cell::new("Sets").fg(header_color),
        ]);

    for (i, exercise) in log.exercises.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&exercise.name),
            Cell::new(&exercise.target_reps),
            Cell::new(exercise.sets),
        ]);
    }

    let window_start = Local
        .timestamp_opt(log.time_window.day_start, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M %Z").to_string())
        .unwrap_or_else(|| log.time_window.day_start.to_string());
    println!("Session of {} (window starts {})", log.date.format("%Y-%m-%d"), window_start);
    println!("{table}");
}
