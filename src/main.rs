mod cli;
mod commands;
mod engine;
mod facts;
mod paths;
mod privilege;
mod resource;
mod runner;
mod schema;
mod state;
mod ui;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, args),
        Command::Plan(args) => commands::plan::run(&ctx, args).map(|()| ExitCode::SUCCESS),
        Command::Facts(args) => commands::facts::run(&ctx, args).map(|()| ExitCode::SUCCESS),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "converge", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            ui::error(&format!("{:#}", err));
            // Platform and graph rejections happen before anything is touched
            if err.downcast_ref::<declarative::RunError>().is_some() {
                ExitCode::from(commands::EXIT_REJECTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
