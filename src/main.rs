use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use osfl::pipeline::{Config, Pipeline, PipelineError};

/// OSFL — a small register-machine scripting language.
#[derive(Parser, Debug)]
#[command(name = "osfl", version, about, disable_version_flag = true)]
struct Cli {
    /// Source file to run (conventionally `.osfl`)
    input_file: PathBuf,

    /// Output file (reserved; unused by the core)
    #[arg(short = 'o', value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Enable debug diagnostics (bytecode listing, instruction traces)
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Disable optimizations (reserved)
    #[arg(long = "no-optimize")]
    no_optimize: bool,

    /// Print version information
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.debug {
        logger.filter_level(log::LevelFilter::Trace);
    }
    logger.init();

    let config = Config {
        input_file: Some(cli.input_file.clone()),
        output_file: cli.output_file,
        debug_mode: cli.debug,
        optimize: !cli.no_optimize,
        ..Config::default()
    };

    let mut pipeline = Pipeline::new(config);
    match pipeline.run_file(&cli.input_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

/// One diagnostic on stderr: the location line (when the stage has one)
/// followed by the message.
fn report(err: &PipelineError) {
    if let Some(location) = err.location() {
        eprintln!(
            "Error in {} at line {}, column {}:",
            location.file, location.line, location.column
        );
    }
    eprintln!("Error: {}", err);
}
