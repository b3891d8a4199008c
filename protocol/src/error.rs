//! Error taxonomy for gateway operations.
//!
//! Every operation the gateway performs returns a [`GatewayError`] on
//! failure. The variants split into three groups:
//!
//! - **local** — [`GatewayError::Validation`], [`GatewayError::InvalidAmount`]
//!   and [`GatewayError::Configuration`] are detected before any external call.
//! - **external** — execution, simulation, submission and transport failures
//!   reported by the CLI, the Soroban RPC node or the chat provider.
//! - **decode** — [`GatewayError::Decode`] is only produced on read paths and
//!   callers are expected to swallow it into a zero balance.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Errors that can occur while serving a vault or token operation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// A required request field was missing or empty.
    #[error("{0}")]
    Validation(String),

    /// A human-readable amount did not parse as a finite non-negative number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A contract id or signing secret needed by the operation is not configured.
    #[error("{0}")]
    Configuration(String),

    /// The contract CLI exited non-zero or printed something unexpected.
    #[error("contract execution failed: {message}")]
    ExecutionFailure {
        message: String,
        stdout: String,
        stderr: String,
    },

    /// The RPC node could not simulate the transaction.
    #[error("simulation failed: {0}")]
    SimulationFailure(String),

    /// A submitted transaction was rejected or failed on-ledger.
    #[error("submission failed: {message}")]
    SubmissionFailure {
        message: String,
        /// Transaction hash, when the node assigned one before rejecting it.
        hash: Option<String>,
    },

    /// A read result could not be decoded into the expected numeric shape.
    #[error("could not decode contract result: {message}")]
    Decode { message: String, raw: String },

    /// HTTP or JSON-RPC transport failure talking to an external service.
    #[error("transport error: {0}")]
    Transport(String),

    /// Building or parsing an XDR structure failed.
    #[error("xdr error: {0}")]
    Xdr(String),

    /// The chat completion provider failed.
    #[error("chat provider error: {0}")]
    Chat(String),
}

impl GatewayError {
    /// `true` for errors caused by the caller's input (HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidAmount(_))
    }

    /// Short machine-readable label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::Configuration(_) => "configuration",
            Self::ExecutionFailure { .. } => "execution",
            Self::SimulationFailure(_) => "simulation",
            Self::SubmissionFailure { .. } => "submission",
            Self::Decode { .. } => "decode",
            Self::Transport(_) => "transport",
            Self::Xdr(_) => "xdr",
            Self::Chat(_) => "chat",
        }
    }

    /// Captured stdout/stderr of a failed CLI run, if this error carries them.
    pub fn process_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::ExecutionFailure { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

impl From<stellar_xdr::curr::Error> for GatewayError {
    fn from(e: stellar_xdr::curr::Error) -> Self {
        Self::Xdr(e.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
