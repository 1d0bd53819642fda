//! dupfinder CLI: parse flags, merge config, wire up logging and Ctrl-C,
//! run the pipeline, redraw the monitor periodically, and write the report.
//! Grounded on `original_source/main.go`'s top-level sequencing, with the
//! teacher's `engine::arg_parser`/`utils::logger::setup_logging` argument and
//! logging conventions kept as-is.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use log::{error, info};

use dupfinder::cancel::CancellationToken;
use dupfinder::cli::Cli;
use dupfinder::config::{Config, load_config_file};
use dupfinder::utils::logger::setup_logging;
use dupfinder::{find_duplicates_with_handle, monitor, report};

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match load_config_file(&cli.config).and_then(|file| Config::build(file, &cli).map_err(Into::into)) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    if let Err(e) = cancel.install_ctrlc() {
        error!("failed to install Ctrl-C handler: {e}");
        return ExitCode::FAILURE;
    }

    let start = Instant::now();
    let (meta_register, handle) = find_duplicates_with_handle(config.clone(), cancel.clone());

    while !handle.is_finished() {
        std::thread::sleep(config.stats_update_rate);
        if handle.is_finished() {
            break;
        }
        print!("{}", monitor::render_heartbeat(start.elapsed(), &meta_register));
    }
    let outcome = match handle.join() {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("pipeline thread panicked");
            return ExitCode::FAILURE;
        }
    };

    print!("{}", monitor::render_duplicates_summary(&outcome.groups));
    print!("{}", monitor::render_error_summary(&outcome.error_counts));

    if config.is_dry {
        info!("dry run: skipping report write");
    } else {
        match report::write_report(
            &outcome.groups,
            &config.output_dir,
            &config.output_file_prefix,
            config.output_groups_per_file,
            outcome.completed,
            std::time::SystemTime::now(),
        ) {
            Ok(written) => {
                for w in &written {
                    println!(
                        "{} {:?} ({} groups, {} files)",
                        "wrote".green(),
                        w.path,
                        w.groups_written,
                        w.files_written
                    );
                }
            }
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
