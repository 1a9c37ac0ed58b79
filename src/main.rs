use anyhow::Result;
use clap::Parser;
use sed_opal::args::Cli;
use sed_opal::{logging, SystemBackend};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let code = match sed_opal::run(&SystemBackend, &cli.command) {
        Ok(outcome) => {
            if let Some(report) = &outcome.report {
                println!("{report}");
            }
            println!("{}", outcome.completion);
            outcome.completion.exit_code()
        }
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    };
    // Statuses and errno values all fit in a byte.
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
