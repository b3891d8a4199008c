//! In-process backend: builds Soroban transactions and talks to Soroban RPC.
//!
//! - **Simulate** sources the transaction from the all-zero dummy account at
//!   sequence 0. Simulation does not check sequence numbers or signatures, so
//!   no real account is needed to read contract state.
//! - **BuildOnly** loads the user's account, simulates to obtain the resource
//!   footprint and auth entries, and returns the assembled envelope unsigned.
//! - **Submit** does the same from the server signer's account, signs and
//!   submits, then polls for confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use stellar_xdr::curr::Transaction;

use super::{CallSource, ContractCall, ContractInvoker, ExecutionMode, InvocationOutput, InvocationResult};
use crate::config::{
    GatewayConfig, BASE_FEE, SIGNED_CALL_FEE, SIMULATION_ACCOUNT, SIMULATION_SEQUENCE, TX_VALIDITY_SECS,
};
use crate::error::{GatewayError, Result};
use crate::soroban::keys::parse_account_id;
use crate::soroban::rpc::SimulateTransactionResponse;
use crate::soroban::xdr::{
    assemble, build_transaction, envelope_to_base64, from_scval, invoke_contract_op, scval_from_base64,
    sign_transaction, unsigned_envelope,
};
use crate::soroban::{Signer, SorobanRpcClient};

/// Invokes contracts by building transactions in process.
#[derive(Debug, Clone)]
pub struct SdkInvoker {
    rpc: Arc<SorobanRpcClient>,
    network_passphrase: String,
    signer: Option<Signer>,
}

impl SdkInvoker {
    pub fn new(rpc: Arc<SorobanRpcClient>, network_passphrase: impl Into<String>) -> Self {
        Self {
            rpc,
            network_passphrase: network_passphrase.into(),
            signer: None,
        }
    }

    /// Uses the configured minter, if complete, as the server signer.
    pub fn from_config(config: &GatewayConfig, rpc: Arc<SorobanRpcClient>) -> Self {
        Self {
            rpc,
            network_passphrase: config.network_passphrase.clone(),
            signer: config.minter().ok(),
        }
    }

    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    fn signer(&self) -> Result<&Signer> {
        self.signer
            .as_ref()
            .ok_or_else(|| GatewayError::Configuration("Server signing identity not configured".into()))
    }

    fn valid_until() -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        now + TX_VALIDITY_SECS
    }

    async fn simulate(&self, tx: &Transaction) -> Result<SimulateTransactionResponse> {
        let sim = self.rpc.simulate_transaction(&unsigned_envelope(tx.clone())).await?;
        if !sim.is_success() {
            let message = sim.error.unwrap_or_default();
            tracing::warn!(error = %message, "simulation failed");
            return Err(GatewayError::SimulationFailure(message));
        }
        Ok(sim)
    }

    async fn read(&self, call: &ContractCall) -> Result<InvocationResult> {
        let source = match &call.source {
            CallSource::ReadOnly => SIMULATION_ACCOUNT,
            CallSource::Account(address) => parse_account_id(address)?,
            CallSource::ServerSigner => self.signer()?.public_key(),
        };
        let op = invoke_contract_op(&call.contract_id, &call.function, &call.args)?;
        let tx = build_transaction(source, SIMULATION_SEQUENCE, BASE_FEE, op, Self::valid_until())?;

        let sim = self.simulate(&tx).await?;
        let result = sim
            .results
            .first()
            .ok_or_else(|| GatewayError::SimulationFailure("No result from contract".into()))?;
        let value = from_scval(&scval_from_base64(&result.xdr)?)?;
        tracing::debug!(function = %call.function, %value, "simulated read");

        Ok(InvocationResult {
            raw: result.xdr.clone(),
            output: InvocationOutput::Value(value),
        })
    }

    async fn build_only(&self, call: &ContractCall) -> Result<InvocationResult> {
        let address = match &call.source {
            CallSource::Account(address) => address.clone(),
            CallSource::ServerSigner => self.signer()?.address(),
            CallSource::ReadOnly => {
                return Err(GatewayError::Validation(
                    "build-only calls need a source account".into(),
                ))
            }
        };
        let op = invoke_contract_op(&call.contract_id, &call.function, &call.args)?;
        let account = self.rpc.get_account(&address).await?;
        let tx = build_transaction(account.account_id, account.sequence, BASE_FEE, op, Self::valid_until())?;

        let sim = self.simulate(&tx).await?;
        let assembled = assemble(tx, &sim)?;
        let envelope = envelope_to_base64(&unsigned_envelope(assembled))?;
        tracing::info!(function = %call.function, source = %address, "built unsigned transaction");

        Ok(InvocationResult {
            raw: envelope.clone(),
            output: InvocationOutput::Envelope(envelope),
        })
    }

    async fn submit(&self, call: &ContractCall) -> Result<InvocationResult> {
        if call.source != CallSource::ServerSigner {
            return Err(GatewayError::Validation(
                "only the server signing identity can submit".into(),
            ));
        }
        let signer = self.signer()?;
        let op = invoke_contract_op(&call.contract_id, &call.function, &call.args)?;
        let account = self.rpc.get_account(&signer.address()).await?;
        let tx = build_transaction(
            signer.public_key(),
            account.sequence,
            SIGNED_CALL_FEE,
            op,
            Self::valid_until(),
        )?;

        let sim = self.simulate(&tx).await?;
        let assembled = assemble(tx, &sim)?;
        let signed = envelope_to_base64(&sign_transaction(assembled, signer, &self.network_passphrase)?)?;

        let submitted = self.rpc.submit_and_confirm(&signed).await?;
        tracing::info!(
            function = %call.function,
            hash = %submitted.hash,
            confirmed = submitted.confirmed,
            "submitted signed transaction"
        );

        Ok(InvocationResult {
            raw: signed,
            output: InvocationOutput::Submitted {
                hash: Some(submitted.hash),
            },
        })
    }
}

#[async_trait]
impl ContractInvoker for SdkInvoker {
    async fn invoke(&self, call: &ContractCall) -> Result<InvocationResult> {
        match call.mode {
            ExecutionMode::Simulate => self.read(call).await,
            ExecutionMode::BuildOnly => self.build_only(call).await,
            ExecutionMode::Submit => self.submit(call).await,
        }
    }

    fn strategy(&self) -> &'static str {
        "sdk"
    }
}
