//! # Contract Invocation
//!
//! One capability with interchangeable backends: invoke a function on a
//! named Soroban contract and get back a uniform [`InvocationResult`].
//!
//! - [`cli::CliInvoker`] shells out to the `stellar` CLI.
//! - [`sdk::SdkInvoker`] builds, simulates and submits transactions in
//!   process over Soroban RPC.
//!
//! Callers construct a [`ContractCall`] per request and never look at which
//! backend served it.
//!
//! ## Execution modes
//!
//! | Mode        | Source                 | Output                               |
//! |-------------|------------------------|--------------------------------------|
//! | `BuildOnly` | end-user account       | unsigned base64 envelope             |
//! | `Simulate`  | read-only dummy/alias  | decoded return value                 |
//! | `Submit`    | server signing identity| submitted transaction hash           |

pub mod cli;
pub mod sdk;
#[cfg(any(test, feature = "testutils"))]
pub mod stub;

use std::fmt;

use async_trait::async_trait;

use crate::error::{GatewayError, Result};

pub use cli::CliInvoker;
pub use sdk::SdkInvoker;
#[cfg(any(test, feature = "testutils"))]
pub use stub::StubInvoker;

// ---------------------------------------------------------------------------
// Call description
// ---------------------------------------------------------------------------

/// What the backend should do with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Assemble an unsigned transaction for the caller's wallet to sign.
    BuildOnly,
    /// Dry-run the call and return its value. Never changes ledger state.
    Simulate,
    /// Sign with the server identity and submit.
    Submit,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildOnly => "build_only",
            Self::Simulate => "simulate",
            Self::Submit => "submit",
        }
    }
}

/// Who a transaction is sourced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSource {
    /// No real account: the backend's read identity.
    ReadOnly,
    /// An end-user `G...` account. The server never signs for it.
    Account(String),
    /// The server-held signing identity (faucet minting only).
    ServerSigner,
}

/// A typed contract argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Address(String),
    I128(i128),
    U128(u128),
    U64(u64),
    U32(u32),
    Bool(bool),
    Symbol(String),
    String(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(s) | Self::Symbol(s) | Self::String(s) => f.write_str(s),
            Self::I128(v) => write!(f, "{}", v),
            Self::U128(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A named argument. Order matters: the SDK passes arguments positionally,
/// the CLI as `--name value` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArg {
    pub name: String,
    pub value: ArgValue,
}

impl ContractArg {
    pub fn new(name: impl Into<String>, value: ArgValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A single contract invocation, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract_id: String,
    pub function: String,
    pub args: Vec<ContractArg>,
    pub mode: ExecutionMode,
    pub source: CallSource,
}

impl ContractCall {
    /// A read-only call.
    pub fn simulate(contract_id: &str, function: &str) -> Self {
        Self::new(contract_id, function, ExecutionMode::Simulate, CallSource::ReadOnly)
    }

    /// An unsigned transaction sourced from `user`.
    pub fn build_only(contract_id: &str, function: &str, user: &str) -> Self {
        Self::new(
            contract_id,
            function,
            ExecutionMode::BuildOnly,
            CallSource::Account(user.to_string()),
        )
    }

    /// A transaction signed and submitted by the server identity.
    pub fn submit(contract_id: &str, function: &str) -> Self {
        Self::new(contract_id, function, ExecutionMode::Submit, CallSource::ServerSigner)
    }

    fn new(contract_id: &str, function: &str, mode: ExecutionMode, source: CallSource) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            function: function.to_string(),
            args: Vec::new(),
            mode,
            source,
        }
    }

    pub fn arg(mut self, name: &str, value: ArgValue) -> Self {
        self.args.push(ContractArg::new(name, value));
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A decoded contract return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeValue {
    Void,
    Bool(bool),
    Int(i128),
    UInt(u128),
    Text(String),
    Address(String),
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Text(s) | Self::Address(s) => f.write_str(s),
        }
    }
}

/// What an invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutput {
    /// Base64 `TransactionEnvelope`, unsigned.
    Envelope(String),
    Value(NativeValue),
    Submitted { hash: Option<String> },
}

/// Uniform result of any backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// The external response as received (CLI stdout or base64 XDR).
    pub raw: String,
    pub output: InvocationOutput,
}

impl InvocationResult {
    pub fn envelope(&self) -> Result<&str> {
        match &self.output {
            InvocationOutput::Envelope(xdr) => Ok(xdr),
            other => Err(self.unexpected("an envelope", other)),
        }
    }

    pub fn value(&self) -> Result<&NativeValue> {
        match &self.output {
            InvocationOutput::Value(v) => Ok(v),
            other => Err(self.unexpected("a value", other)),
        }
    }

    pub fn submitted_hash(&self) -> Result<Option<&str>> {
        match &self.output {
            InvocationOutput::Submitted { hash } => Ok(hash.as_deref()),
            other => Err(self.unexpected("a submission", other)),
        }
    }

    fn unexpected(&self, wanted: &str, got: &InvocationOutput) -> GatewayError {
        GatewayError::Decode {
            message: format!("expected {}, got {:?}", wanted, got),
            raw: self.raw.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend interface
// ---------------------------------------------------------------------------

/// A contract-invocation backend.
#[async_trait]
pub trait ContractInvoker: Send + Sync {
    async fn invoke(&self, call: &ContractCall) -> Result<InvocationResult>;

    /// Short name for logs, metrics and `/health`.
    fn strategy(&self) -> &'static str;
}
