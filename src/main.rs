use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use workload_submit::cli::commands::{RunCommand, ValidateCommand};
use workload_submit::cli::output::*;
use workload_submit::cli::{Cli, Command};
use workload_submit::shell::RunnerConfig;
use workload_submit::{
    CommandRunner, CraneRegistry, HttpManifestFetcher, Settings, SubmissionPipeline,
    SubprocessRunner,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the flag
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match &cli.command {
        Command::Run(cmd) => run_workload(cmd, settings).await?,
        Command::Validate(cmd) => validate_request(cmd)?,
    }

    Ok(())
}

async fn run_workload(cmd: &RunCommand, settings: Settings) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SubprocessRunner::new(
        RunnerConfig::new().with_timeout(settings.command_timeout_secs),
    ));
    let registry = Arc::new(CraneRegistry::new(runner.clone()));
    let fetcher = Arc::new(
        HttpManifestFetcher::new(Duration::from_secs(settings.command_timeout_secs))
            .context("Failed to create HTTP client")?,
    );

    let printer = EventPrinter::new();
    let pipeline = SubmissionPipeline::new(runner, registry, fetcher, settings)
        .with_event_handler(move |event| printer.handle(event));

    let request = cmd.request.to_request();
    match pipeline.submit_job(&request).await {
        Ok(report) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\n{}", format_report(&report));
            }
            Ok(())
        }
        Err(e) => {
            let chain = anyhow::Error::new(e);
            error!("{:#}", chain);
            eprintln!("\n{} {}", CROSS, style("Submission failed").red().bold());
            for cause in chain.chain() {
                eprintln!("  {}", cause);
            }
            std::process::exit(1);
        }
    }
}

fn validate_request(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workload request...", INFO);

    let request = cmd.request.to_request();
    match request.validate() {
        Ok(source) => {
            println!("{} Request is valid", CHECK);
            println!("  Image source: {}", style(format!("{:?}", source)).cyan());
            println!("\n{}", serde_json::to_string_pretty(&request)?);
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}
