use clap::{CommandFactory, Parser};
use dirwatch::cli::{run, Cli, Invocation, UsageError};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let invocation = Invocation::detect(&cli, std::env::vars());

    // The debug switch may also come from the environment or the config file.
    let debug = cli.debug
        || cli
            .settings(std::env::vars())
            .map(|s| s.debug_enabled())
            .unwrap_or(false);
    if let Err(e) = dirwatch::logging::init(debug, cli.logfile.as_deref()) {
        eprintln!("Failed to initialise logging: {e:#}");
        return ExitCode::from(invocation.exit_code(false));
    }
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) if e.is::<UsageError>() => {
            tracing::error!(error = %e, "Nothing to do");
            let _ = Cli::command().print_help();
        }
        Err(e) => tracing::error!(error = %format!("{e:#}"), "CLI exited with error"),
    }
    ExitCode::from(invocation.exit_code(result.is_ok()))
}
