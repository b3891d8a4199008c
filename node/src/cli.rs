//! # CLI Interface
//!
//! Defines the command-line argument structure for `peridot-node` using
//! `clap` derive. Supports three subcommands: `run`, `status`, and
//! `version`. Every `run` option can also be set through the environment.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use peridot_protocol::config::{
    DEFAULT_CLI_PATH, DEFAULT_CLI_READ_IDENTITY, DEFAULT_CONFIRMATION_POLLS, DEFAULT_NETWORK,
    DEFAULT_RPC_URL, TESTNET_PASSPHRASE,
};
use peridot_protocol::{GatewayConfig, InvokerKind};

use crate::logging::LogFormat;

/// Peridot vault gateway node.
///
/// Serves the dashboard's deposit, withdraw, faucet, balance and statistics
/// endpoints on top of the Peridot Soroban contracts, and exposes
/// Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "peridot-node",
    about = "Peridot vault gateway node",
    version,
    propagate_version = true
)]
pub struct PeridotNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the gateway binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway.
    Run(Box<RunArgs>),
    /// Query the health of a running gateway.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Contract invocation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InvokerArg {
    /// Shell out to the `stellar` CLI.
    Cli,
    /// Build transactions in process over Soroban RPC.
    Sdk,
}

impl From<InvokerArg> for InvokerKind {
    fn from(arg: InvokerArg) -> Self {
        match arg {
            InvokerArg::Cli => InvokerKind::Cli,
            InvokerArg::Sdk => InvokerKind::Sdk,
        }
    }
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address to bind the API and metrics listeners to.
    #[arg(long, env = "PERIDOT_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the dashboard API.
    #[arg(long, env = "PERIDOT_API_PORT", default_value_t = 3001)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "PERIDOT_METRICS_PORT", default_value_t = 9742)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "PERIDOT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Contract invocation backend.
    #[arg(long, env = "PERIDOT_INVOKER", value_enum, default_value_t = InvokerArg::Sdk)]
    pub invoker: InvokerArg,

    /// Stellar network name passed to the CLI backend.
    #[arg(long, env = "PERIDOT_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Soroban RPC endpoint.
    #[arg(long, env = "PERIDOT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Network passphrase transactions are signed for.
    #[arg(long, env = "PERIDOT_NETWORK_PASSPHRASE", default_value = TESTNET_PASSPHRASE)]
    pub network_passphrase: String,

    /// Vault contract id (`C...`).
    #[arg(long, env = "PERIDOT_VAULT_CONTRACT")]
    pub vault_contract: Option<String>,

    /// PDOT token contract id (`C...`).
    #[arg(long, env = "PERIDOT_TOKEN_CONTRACT")]
    pub token_contract: Option<String>,

    /// Account allowed to mint faucet tokens (`G...`).
    #[arg(long, env = "PERIDOT_MINTER_ADDRESS")]
    pub minter_address: Option<String>,

    /// Secret seed of the minter account (`S...`).
    ///
    /// **Never pass this flag on a shared machine.** Prefer the environment.
    #[arg(long, env = "PERIDOT_MINTER_SECRET", hide_env_values = true)]
    pub minter_secret: Option<String>,

    /// Path to the `stellar` CLI binary.
    #[arg(long, env = "PERIDOT_CLI_PATH", default_value = DEFAULT_CLI_PATH)]
    pub cli_path: String,

    /// CLI identity used as the source of read-only calls.
    #[arg(long, env = "PERIDOT_CLI_READ_IDENTITY", default_value = DEFAULT_CLI_READ_IDENTITY)]
    pub cli_read_identity: String,

    /// How many times to poll for a submitted transaction.
    #[arg(long, env = "PERIDOT_CONFIRMATION_POLLS", default_value_t = DEFAULT_CONFIRMATION_POLLS)]
    pub confirmation_polls: u32,

    /// Milliseconds between confirmation polls.
    #[arg(long, env = "PERIDOT_CONFIRMATION_INTERVAL_MS", default_value_t = 1000)]
    pub confirmation_interval_ms: u64,

    /// API key for the assistant chat. Canned replies are used without one.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = peridot_protocol::chat::DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    /// Chat model.
    #[arg(long, env = "OPENAI_MODEL", default_value = peridot_protocol::chat::DEFAULT_CHAT_MODEL)]
    pub openai_model: String,
}

impl RunArgs {
    /// The gateway configuration these arguments describe.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            network: self.network.clone(),
            rpc_url: self.rpc_url.clone(),
            network_passphrase: self.network_passphrase.clone(),
            vault_contract: self.vault_contract.clone(),
            token_contract: self.token_contract.clone(),
            minter_address: self.minter_address.clone(),
            minter_secret: self.minter_secret.clone(),
            cli_path: self.cli_path.clone(),
            cli_read_identity: self.cli_read_identity.clone(),
            confirmation_polls: self.confirmation_polls,
            confirmation_interval: Duration::from_millis(self.confirmation_interval_ms),
        }
    }
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running gateway.
    #[arg(long, default_value = "http://127.0.0.1:3001")]
    pub url: String,
}
