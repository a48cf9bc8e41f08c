use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use url::Url;
use veloup_deploy::{ConfigOverrides, Environment, VELOUP_CONFIG_FILENAME};

#[derive(Parser)]
#[command(name = "veloup")]
#[command(
    author,
    version,
    about = "Deploy and wire the Velodrome protocol, resumably"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "VELOUP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Veloup.toml configuration file, or the directory holding one.
    ///
    /// A missing file is fine as long as flags and VELOUP_* variables provide every
    /// required value.
    #[arg(long, global = true, alias = "conf", env = "VELOUP_CONFIG", default_value = VELOUP_CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy every missing component, then apply every missing wiring step.
    Deploy(DeployArgs),
    /// Show what the ledger records for a network.
    Status(TargetArgs),
    /// Print the deployment plan and the wiring steps.
    Plan,
}

/// Which deployment to act on.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// The network to deploy to (optimism, avalanche).
    #[arg(short, long, env = "VELOUP_NETWORK")]
    pub network: Option<String>,

    /// Which network table to use. There is no default.
    #[arg(short, long = "env", env = "VELOUP_ENVIRONMENT")]
    pub environment: Option<Environment>,

    /// The ledger file. Defaults to deployments/<network>-<env>.json.
    #[arg(long, env = "VELOUP_LEDGER")]
    pub ledger: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    /// The JSON-RPC endpoint of the target chain.
    #[arg(long, alias = "rpc", env = "VELOUP_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// The account transactions are sent from. The node must be able to sign for it.
    #[arg(long, env = "VELOUP_FROM")]
    pub from: Option<Address>,

    /// The directory holding the compiled artifacts.
    #[arg(long, env = "VELOUP_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// A TOML file overriding fields of the network table.
    #[arg(long, env = "VELOUP_NETWORK_OVERRIDES")]
    pub network_overrides: Option<PathBuf>,

    /// Resume a ledger written for a different plan or network table.
    #[arg(long, env = "VELOUP_FORCE", default_value_t = false)]
    pub force: bool,
}

impl TargetArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            network: self.network.clone(),
            environment: self.environment,
            ledger: self.ledger.clone(),
            ..Default::default()
        }
    }
}

impl DeployArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            rpc_url: self.rpc_url.clone(),
            from: self.from,
            artifacts: self.artifacts.clone(),
            network_overrides: self.network_overrides.clone(),
            ..self.target.overrides()
        }
    }
}
