//! # Gateway Configuration & Constants
//!
//! Network parameters, fee constants, and the [`GatewayConfig`] structure
//! the gateway is constructed with.
//!
//! Contract ids and the faucet signing secret are supplied once at startup
//! and validated there. Values that are merely absent do not stop the node;
//! the operations that need them fail with
//! [`GatewayError::Configuration`] instead.

use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::soroban::keys::{parse_account_id, parse_contract_id, Signer};

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Network selector passed to the contract CLI.
pub const DEFAULT_NETWORK: &str = "testnet";

/// Public Soroban RPC endpoint for testnet.
pub const DEFAULT_RPC_URL: &str = "https://soroban-testnet.stellar.org";

/// Passphrase that binds signatures to testnet.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Minimum inclusion fee, in stroops. Used for simulations and user builds.
pub const BASE_FEE: u32 = 100;

/// Inclusion fee for server-signed contract calls, in stroops.
pub const SIGNED_CALL_FEE: u32 = 100_000;

/// Seconds a built transaction stays valid on the ledger.
pub const TX_VALIDITY_SECS: u64 = 30;

/// Source account for read-only simulations: the all-zero ed25519 key,
/// `GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF`.
pub const SIMULATION_ACCOUNT: [u8; 32] = [0u8; 32];

/// Sequence number of [`SIMULATION_ACCOUNT`].
pub const SIMULATION_SEQUENCE: i64 = 0;

/// How many times a pending submission is checked before it is reported as
/// submitted-but-unconfirmed.
pub const DEFAULT_CONFIRMATION_POLLS: u32 = 5;

/// Delay between confirmation checks.
pub const DEFAULT_CONFIRMATION_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Contract CLI
// ---------------------------------------------------------------------------

/// Contract CLI binary looked up on `PATH`.
pub const DEFAULT_CLI_PATH: &str = "stellar";

/// CLI identity used as `--source` for read-only invocations.
pub const DEFAULT_CLI_READ_IDENTITY: &str = "alice";

// ---------------------------------------------------------------------------
// Gateway configuration
// ---------------------------------------------------------------------------

/// Which backend executes contract calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerKind {
    /// Shell out to the contract CLI.
    Cli,
    /// Build transactions in-process and talk to Soroban RPC directly.
    Sdk,
}

impl InvokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvokerKind::Cli => "cli",
            InvokerKind::Sdk => "sdk",
        }
    }
}

/// Everything the gateway needs to reach the vault and token contracts.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Network name handed to the CLI (`testnet`, `mainnet`, ...).
    pub network: String,
    /// Soroban RPC endpoint.
    pub rpc_url: String,
    /// Network passphrase used for signing and transaction hashes.
    pub network_passphrase: String,
    /// Vault contract id (`C...`).
    pub vault_contract: Option<String>,
    /// PDOT token contract id (`C...`).
    pub token_contract: Option<String>,
    /// Public address of the faucet minter (`G...`).
    pub minter_address: Option<String>,
    /// Secret seed of the faucet minter (`S...`). Never logged.
    pub minter_secret: Option<String>,
    /// Path to the contract CLI binary.
    pub cli_path: String,
    /// CLI identity used for read-only calls.
    pub cli_read_identity: String,
    /// Confirmation checks after a submission reports `PENDING`.
    pub confirmation_polls: u32,
    /// Delay between confirmation checks.
    pub confirmation_interval: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("network_passphrase", &self.network_passphrase)
            .field("vault_contract", &self.vault_contract)
            .field("token_contract", &self.token_contract)
            .field("minter_address", &self.minter_address)
            .field("minter_secret", &self.minter_secret.as_ref().map(|_| "<redacted>"))
            .field("cli_path", &self.cli_path)
            .field("cli_read_identity", &self.cli_read_identity)
            .field("confirmation_polls", &self.confirmation_polls)
            .field("confirmation_interval", &self.confirmation_interval)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            network_passphrase: TESTNET_PASSPHRASE.to_string(),
            vault_contract: None,
            token_contract: None,
            minter_address: None,
            minter_secret: None,
            cli_path: DEFAULT_CLI_PATH.to_string(),
            cli_read_identity: DEFAULT_CLI_READ_IDENTITY.to_string(),
            confirmation_polls: DEFAULT_CONFIRMATION_POLLS,
            confirmation_interval: DEFAULT_CONFIRMATION_INTERVAL,
        }
    }
}

/// Outcome of [`GatewayConfig::validate`]: the settings that are missing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigReport {
    pub missing: Vec<&'static str>,
}

impl GatewayConfig {
    /// Checks the configuration once at startup.
    ///
    /// Malformed values are fatal. Missing values are returned in the report
    /// so the caller can log them; operations that need them will fail with
    /// a configuration error on first use.
    pub fn validate(&self) -> Result<ConfigReport> {
        if self.network_passphrase.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "network passphrase must not be empty".into(),
            ));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(GatewayError::Configuration("RPC URL must not be empty".into()));
        }

        let mut report = ConfigReport::default();

        match non_empty(&self.vault_contract) {
            Some(id) => {
                parse_contract_id(id).map_err(|e| config_err("vault contract", e))?;
            }
            None => report.missing.push("vault contract"),
        }
        match non_empty(&self.token_contract) {
            Some(id) => {
                parse_contract_id(id).map_err(|e| config_err("token contract", e))?;
            }
            None => report.missing.push("token contract"),
        }
        match non_empty(&self.minter_address) {
            Some(addr) => {
                parse_account_id(addr).map_err(|e| config_err("minter address", e))?;
            }
            None => report.missing.push("minter address"),
        }
        match non_empty(&self.minter_secret) {
            Some(secret) => {
                let signer = Signer::from_secret(secret).map_err(|e| config_err("minter secret", e))?;
                if let Some(addr) = non_empty(&self.minter_address) {
                    if signer.address() != addr {
                        return Err(GatewayError::Configuration(
                            "minter secret does not belong to the minter address".into(),
                        ));
                    }
                }
            }
            None => report.missing.push("minter secret"),
        }

        Ok(report)
    }

    /// Vault contract id, or a configuration error.
    pub fn vault_contract(&self) -> Result<&str> {
        non_empty(&self.vault_contract)
            .ok_or_else(|| GatewayError::Configuration("Vault contract not configured".into()))
    }

    /// Token contract id, or a configuration error.
    pub fn token_contract(&self) -> Result<&str> {
        non_empty(&self.token_contract)
            .ok_or_else(|| GatewayError::Configuration("Token contract not configured".into()))
    }

    /// The faucet signing identity. All three of token contract, minter
    /// address and minter secret must be present.
    pub fn minter(&self) -> Result<Signer> {
        match (
            non_empty(&self.token_contract),
            non_empty(&self.minter_address),
            non_empty(&self.minter_secret),
        ) {
            (Some(_), Some(_), Some(secret)) => Signer::from_secret(secret),
            _ => Err(GatewayError::Configuration("Server configuration error".into())),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn config_err(what: &str, e: GatewayError) -> GatewayError {
    GatewayError::Configuration(format!("invalid {}: {}", what, e))
}
