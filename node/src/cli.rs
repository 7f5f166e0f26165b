//! # CLI Interface
//!
//! Defines the command-line argument structure for `knowhub-node` using
//! `clap` derive. Three subcommands: `init`, `run` and `version`. Every
//! flag that matters in a container has an environment fallback.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use knowhub_contracts::deployment::BootstrapConfig;
use knowhub_protocol::config::{
    DEFAULT_DEPLOYER_LABEL, DEFAULT_HUB_LABEL, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT,
};
use knowhub_protocol::units::parse_units;
use knowhub_protocol::Address;

/// `--pool` default, in tokens. Parsed like any user-supplied amount.
const DEFAULT_POOL: &str = "10000";

/// Knowledge Hub node.
///
/// Hosts one hub deployment, commits every operation to disk before
/// acknowledging it, and serves the REST + WebSocket API and Prometheus
/// metrics.
#[derive(Parser, Debug)]
#[command(
    name = "knowhub-node",
    about = "Knowledge Hub node",
    version,
    propagate_version = true
)]
pub struct KnowhubNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "KNOWHUB_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap a fresh deployment into the data directory.
    Init(InitArgs),
    /// Serve the deployment in the data directory.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Who owns the ledger and what the hub is called.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Ledger owner identity. Defaults to the address derived from
    /// the label `deployer`.
    #[arg(long, env = "KNOWHUB_DEPLOYER", value_parser = parse_address)]
    pub deployer: Option<Address>,

    /// Label the hub's own identity is derived from.
    #[arg(long, env = "KNOWHUB_HUB_LABEL", default_value = DEFAULT_HUB_LABEL)]
    pub hub_label: String,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Data directory to initialize.
    #[arg(long, short = 'd', env = "KNOWHUB_DATA_DIR", default_value = ".knowhub")]
    pub data_dir: PathBuf,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Reward pool minted into the hub, in tokens (decimals allowed).
    #[arg(long, default_value = DEFAULT_POOL, value_parser = parse_token_amount)]
    pub pool: u128,

    /// Testing balance as `address=tokens`. Repeatable.
    #[arg(long = "fund", value_parser = parse_funding)]
    pub fund: Vec<(Address, u128)>,

    /// Replace an existing deployment.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Data directory holding the deployment snapshot.
    ///
    /// A default deployment is bootstrapped when the directory is empty.
    #[arg(long, short = 'd', env = "KNOWHUB_DATA_DIR", default_value = ".knowhub")]
    pub data_dir: PathBuf,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Port for the REST + WebSocket API.
    #[arg(long, env = "KNOWHUB_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "KNOWHUB_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Address to bind both listeners to.
    #[arg(long, env = "KNOWHUB_BIND", default_value = "0.0.0.0")]
    pub bind: String,
}

impl IdentityArgs {
    fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            deployer: self
                .deployer
                .clone()
                .unwrap_or_else(|| Address::derive(DEFAULT_DEPLOYER_LABEL)),
            hub: Address::derive(&self.hub_label),
            ..BootstrapConfig::default()
        }
    }
}

impl InitArgs {
    /// The bootstrap parameters these flags describe.
    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            initial_pool: self.pool,
            test_balances: self.fund.clone(),
            ..self.identity.bootstrap_config()
        }
    }
}

impl RunArgs {
    /// Parameters for the default deployment bootstrapped on an empty
    /// data directory.
    pub fn bootstrap_config(&self) -> BootstrapConfig {
        self.identity.bootstrap_config()
    }
}

fn parse_address(s: &str) -> Result<Address, String> {
    Address::new(s).map_err(|e| e.to_string())
}

fn parse_token_amount(s: &str) -> Result<u128, String> {
    parse_units(s).map_err(|e| e.to_string())
}

/// Parses `address=tokens`.
fn parse_funding(s: &str) -> Result<(Address, u128), String> {
    let (address, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected address=tokens, got {s:?}"))?;
    Ok((parse_address(address)?, parse_token_amount(amount)?))
}
