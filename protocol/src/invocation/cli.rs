//! Subprocess backend: drives the `stellar` CLI.
//!
//! ```text
//! stellar contract invoke --id <contract> [--source <source>] --network <network> \
//!     [--build-only] -- <function> --<arg> <value> ...
//! ```
//!
//! The CLI is handed separate argv entries, never a shell string, so
//! addresses and amounts cannot inject shell syntax. The server signing
//! secret never appears on argv, where any local user could read it; it
//! reaches the CLI through `STELLAR_ACCOUNT` in the child's environment.

use async_trait::async_trait;
use tokio::process::Command;

use super::{
    CallSource, ContractCall, ContractInvoker, ExecutionMode, InvocationOutput, InvocationResult,
    NativeValue,
};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::soroban::xdr::envelope_from_base64;

/// Environment variable the CLI reads its source account from.
pub const SOURCE_ACCOUNT_ENV: &str = "STELLAR_ACCOUNT";

/// Invokes contracts through the `stellar` command-line tool.
#[derive(Clone)]
pub struct CliInvoker {
    program: String,
    network: String,
    read_identity: String,
    signer_secret: Option<String>,
}

impl CliInvoker {
    pub fn new(program: impl Into<String>, network: impl Into<String>, read_identity: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            network: network.into(),
            read_identity: read_identity.into(),
            signer_secret: None,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            program: config.cli_path.clone(),
            network: config.network.clone(),
            read_identity: config.cli_read_identity.clone(),
            signer_secret: config.minter_secret.clone().filter(|s| !s.trim().is_empty()),
        }
    }

    /// Secret the CLI signs `Submit` calls with.
    pub fn with_signer_secret(mut self, secret: impl Into<String>) -> Self {
        self.signer_secret = Some(secret.into());
        self
    }

    fn signer_secret(&self) -> Result<&str> {
        self.signer_secret
            .as_deref()
            .ok_or_else(|| GatewayError::Configuration("Server signing identity not configured".into()))
    }

    /// The argv passed to the CLI, program excluded.
    pub fn command_args(&self, call: &ContractCall) -> Result<Vec<String>> {
        let mut args: Vec<String> = vec![
            "contract".into(),
            "invoke".into(),
            "--id".into(),
            call.contract_id.clone(),
        ];
        match &call.source {
            CallSource::ReadOnly => args.extend(["--source".into(), self.read_identity.clone()]),
            CallSource::Account(address) => args.extend(["--source".into(), address.clone()]),
            CallSource::ServerSigner => {
                self.signer_secret()?;
            }
        }
        args.extend(["--network".into(), self.network.clone()]);
        if call.mode == ExecutionMode::BuildOnly {
            args.push("--build-only".into());
        }
        args.push("--".into());
        args.push(call.function.clone());
        for arg in &call.args {
            args.push(format!("--{}", arg.name));
            args.push(arg.value.to_string());
        }
        Ok(args)
    }

    /// The full child process for `call`, argv and environment included.
    fn command(&self, call: &ContractCall) -> Result<Command> {
        let mut command = Command::new(&self.program);
        command.args(self.command_args(call)?).kill_on_drop(true);
        if call.source == CallSource::ServerSigner {
            command.env(SOURCE_ACCOUNT_ENV, self.signer_secret()?);
        }
        Ok(command)
    }
}

impl std::fmt::Debug for CliInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliInvoker")
            .field("program", &self.program)
            .field("network", &self.network)
            .field("read_identity", &self.read_identity)
            .field("signer_secret", &self.signer_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl ContractInvoker for CliInvoker {
    async fn invoke(&self, call: &ContractCall) -> Result<InvocationResult> {
        let mut command = self.command(call)?;
        tracing::info!(
            contract = %call.contract_id,
            function = %call.function,
            mode = call.mode.as_str(),
            "invoking contract via cli"
        );

        let output = command
            .output()
            .await
            .map_err(|e| GatewayError::ExecutionFailure {
                message: format!("failed to run {}: {}", self.program, e),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::debug!(%stdout, %stderr, status = %output.status, "cli finished");

        if !output.status.success() {
            return Err(GatewayError::ExecutionFailure {
                message: format!("{} exited with {}", self.program, output.status),
                stdout,
                stderr,
            });
        }

        let result = match call.mode {
            ExecutionMode::BuildOnly => match trailing_envelope(&stdout) {
                Some(envelope) => InvocationResult {
                    output: InvocationOutput::Envelope(envelope.to_string()),
                    raw: stdout,
                },
                None => {
                    return Err(GatewayError::ExecutionFailure {
                        message: "Failed to extract transaction XDR".into(),
                        stdout,
                        stderr,
                    })
                }
            },
            ExecutionMode::Simulate => match parse_integer_output(&stdout) {
                Some(value) => InvocationResult {
                    output: InvocationOutput::Value(NativeValue::Int(value)),
                    raw: stdout,
                },
                None => {
                    return Err(GatewayError::Decode {
                        message: "expected a bare integer".into(),
                        raw: stdout,
                    })
                }
            },
            ExecutionMode::Submit => {
                let hash = find_transaction_hash(&stderr).or_else(|| find_transaction_hash(&stdout));
                InvocationResult {
                    output: InvocationOutput::Submitted { hash },
                    raw: stdout,
                }
            }
        };
        Ok(result)
    }

    fn strategy(&self) -> &'static str {
        "cli"
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// The last non-empty line of `stdout`, if it decodes as a transaction
/// envelope.
pub fn trailing_envelope(stdout: &str) -> Option<&str> {
    let line = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    envelope_from_base64(line).ok().map(|_| line)
}

/// Parses read output of the form `123`, `"123"` or `-5`.
pub fn parse_integer_output(stdout: &str) -> Option<i128> {
    let trimmed = stdout.trim();
    let unquoted = match trimmed.strip_prefix('"') {
        Some(rest) => rest.strip_suffix('"')?,
        None => trimmed,
    };
    let digits = unquoted.strip_prefix('-').unwrap_or(unquoted);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    unquoted.parse().ok()
}

/// First standalone 64-hex-digit token in `text`.
pub fn find_transaction_hash(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
}
