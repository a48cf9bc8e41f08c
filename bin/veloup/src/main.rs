//! veloup deploys the Velodrome protocol to a network and wires it together, resuming
//! from its ledger whenever a previous run stopped halfway.

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use veloup_deploy::{OrchestratorConfig, plan::standard, render_plan};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match &cli.command {
        Command::Plan => {
            let plan = standard::deployment_plan()?;
            let wiring = standard::wiring_plan()?;
            println!("{}", render_plan(&plan, &wiring));
            Ok(ExitCode::SUCCESS)
        }
        Command::Status(target) => {
            let config = OrchestratorConfig::load(&cli.config, &target.overrides())?;
            let report = veloup_deploy::status(&config)?;
            println!("{report}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Deploy(args) => {
            let config = OrchestratorConfig::load(&cli.config, &args.overrides())?;

            tracing::info!(
                config_path = %cli.config.display(),
                network = %config.network,
                environment = %config.environment,
                ledger = %config.ledger_path().display(),
                "Loaded deployment configuration"
            );

            let report = veloup_deploy::deploy(&config, args.force).await?;
            println!("{report}");

            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
