use std::process::ExitCode;

use clap::Parser;
use sharedeploy::cli::{self, Cli};
use sharedeploy::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        return match settings.to_toml() {
            Ok(toml) => {
                print!("{toml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: failed to render settings: {e}");
                ExitCode::FAILURE
            }
        };
    }

    logging::init_with_config(&settings.logging);

    match cli::run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
