//! chartstep - render pipeline environment values into chart values files and run helm

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod display;
mod error;
mod exit_codes;
mod helm;

use config::StepArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "chartstep")]
#[command(version)]
#[command(about = "Render pipeline environment values into chart values files and run helm operations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render values files, then run the requested operation or the default chain
    Run {
        #[command(flatten)]
        step: StepArgs,

        /// Print helm commands instead of running them
        #[arg(long, env = "CHARTSTEP_DRY_RUN")]
        dry_run: bool,

        /// Write step telemetry (JSON) to this file
        #[arg(long, env = "CHARTSTEP_TELEMETRY_OUT")]
        telemetry_out: Option<PathBuf>,
    },

    /// Render values files in place without running helm
    Render {
        #[command(flatten)]
        step: StepArgs,
    },

    /// List the keys of the pipeline environment
    Cpe {
        #[command(flatten)]
        step: StepArgs,

        /// Show values too
        #[arg(long)]
        values: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("chartstep=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "chartstep=info".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    let result: Result<(), CliError> = match &cli.command {
        Commands::Run {
            step,
            dry_run,
            telemetry_out,
        } => commands::run::run(step, *dry_run, telemetry_out.as_deref()).await,
        Commands::Render { step } => commands::render::run(step),
        Commands::Cpe { step, values } => commands::cpe::run(step, *values),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
