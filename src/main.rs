use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use xml_to_xsd::{Cli, ConfigError, ConfigManager, HarvestError, Output, Pipeline, VerbosityLevel};

/// Exit status for runtime and inference failures
const EXIT_FAILURE: u8 = 1;
/// Exit status for configuration errors
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            exit_code(&error)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = ConfigManager::load_config(cli)
        .await
        .context("invalid configuration")?;

    let verbosity = VerbosityLevel::from_flags(config.output.verbose, config.output.quiet);
    init_logging(verbosity);

    let pipeline = Pipeline::from_config(&config)?;
    let report = pipeline.run().await?;

    let output = Output::new(config.output.format.into(), verbosity);
    print!(
        "{}",
        output
            .format_report(&report)
            .context("failed to render run report")?
    );

    Ok(())
}

/// `RUST_LOG` wins; otherwise the level follows verbosity. Logs go to stderr.
fn init_logging(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(error: &anyhow::Error) -> ExitCode {
    let is_config_error = error.downcast_ref::<ConfigError>().is_some()
        || matches!(
            error.downcast_ref::<HarvestError>(),
            Some(HarvestError::Config(_))
        );

    if is_config_error {
        ExitCode::from(EXIT_CONFIG_ERROR)
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}
