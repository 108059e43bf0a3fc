use clap::Parser;
use demod::config::{Cli, Command, LogFormat};
use demod::ui::{logging, ProgressReporter};
use demod::{Config, SyncOptions};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let args = match cli.command {
        Command::Version => {
            println!("demod v{}", demod::VERSION);
            return Ok(());
        }
        Command::Sync(args) => args,
    };

    // The bar only makes sense next to human-readable logs
    let reporter = match cli.format {
        LogFormat::Text => ProgressReporter::new(),
        LogFormat::Json => ProgressReporter::hidden(),
    };
    logging::init(cli.format, cli.verbose, reporter.writer())?;

    // Validates immediately; nothing is fetched for a broken config
    let config = Config::load(&cli.config)?;
    let options = SyncOptions::from(&args);

    demod::commands::sync::run(&config, &options, reporter)?;
    Ok(())
}
