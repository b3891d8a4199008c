//! # Gateway Operations
//!
//! The vault and token operations the dashboard calls. Every operation
//! follows the same pipeline:
//!
//! ```text
//! validate request -> convert amounts -> invoke contract -> map result
//! ```
//!
//! Two error policies coexist on purpose:
//!
//! - **writes are strict.** Missing fields and unparsable amounts are
//!   rejected before anything leaves the process.
//! - **reads are lenient.** A read whose result cannot be decoded reports a
//!   balance of `"0"` instead of failing, so the dashboard keeps rendering.

pub mod types;

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::invocation::{ArgValue, ContractCall, ContractInvoker, NativeValue};
use crate::soroban::keys::parse_account_id;
use crate::soroban::xdr::transaction_hash;
use crate::soroban::TransactionRelay;
use crate::units::{
    from_fixed_point, from_fixed_point_int, FixedPoint, EXCHANGE_RATE_DECIMALS, MINT_AMOUNT_UNITS,
    TOKEN_DECIMALS,
};

pub use types::*;

/// Marker the token contract's WASM trap carries when `mint` hits a bug.
const UNREACHABLE_MARKER: &str = "UnreachableCodeReached";
/// Host error code for a failed `require_auth`.
const AUTH_FAILURE_MARKER: &str = "0x7D82D5";

/// Serves vault and token operations against a configured invoker.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    invoker: Arc<dyn ContractInvoker>,
    relay: Arc<dyn TransactionRelay>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        invoker: Arc<dyn ContractInvoker>,
        relay: Arc<dyn TransactionRelay>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            invoker,
            relay,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Name of the invocation strategy in use.
    pub fn strategy(&self) -> &'static str {
        self.invoker.strategy()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Builds an unsigned `deposit` transaction for the user to sign.
    pub async fn deposit(&self, req: DepositRequest) -> Result<DepositResponse> {
        let (user, amount) = match (present(&req.user_address), req.amount.filter(|a| !a.is_blank())) {
            (Some(user), Some(amount)) => (user, amount),
            _ => return Err(validation("User address and amount are required")),
        };
        validate_address(user)?;
        let units = positive_units(&amount)?;
        let vault = self.config.vault_contract()?;

        tracing::info!(user, amount = %amount, units, "building deposit transaction");
        let call = ContractCall::build_only(vault, "deposit", user)
            .arg("user", ArgValue::Address(user.to_string()))
            .arg("amount", ArgValue::U128(units));
        let result = self.invoker.invoke(&call).await?;

        Ok(DepositResponse {
            success: true,
            transaction_xdr: result.envelope()?.to_string(),
            amount,
        })
    }

    /// Builds an unsigned `withdraw` transaction for the user to sign.
    pub async fn withdraw(&self, req: WithdrawRequest) -> Result<WithdrawResponse> {
        let (user, amount) = match (
            present(&req.user_address),
            req.p_token_amount.filter(|a| !a.is_blank()),
        ) {
            (Some(user), Some(amount)) => (user, amount),
            _ => return Err(validation("User address and pToken amount are required")),
        };
        validate_address(user)?;
        let units = positive_units(&amount)?;
        let vault = self.config.vault_contract()?;

        tracing::info!(user, amount = %amount, units, "building withdraw transaction");
        let call = ContractCall::build_only(vault, "withdraw", user)
            .arg("user", ArgValue::Address(user.to_string()))
            .arg("ptoken_amount", ArgValue::U128(units));
        let result = self.invoker.invoke(&call).await?;
        let envelope = result.envelope()?;

        Ok(WithdrawResponse {
            success: true,
            message: format!("Withdrawal of {} pTokens ready for signing", amount),
            transaction_hash: transaction_hash(envelope, &self.config.network_passphrase)?,
            transaction_xdr: envelope.to_string(),
        })
    }

    /// Mints the fixed faucet amount to `user_address`, signed by the server
    /// identity.
    pub async fn mint_tokens(&self, req: MintRequest) -> Result<MintResponse> {
        let user = present(&req.user_address).ok_or_else(|| validation("User address is required"))?;
        validate_address(user)?;
        // Checked before anything is signed.
        self.config.minter()?;
        let token = self.config.token_contract()?;

        tracing::info!(user, units = MINT_AMOUNT_UNITS, "minting faucet tokens");
        let call = ContractCall::submit(token, "mint")
            .arg("to", ArgValue::Address(user.to_string()))
            .arg("amount", ArgValue::I128(MINT_AMOUNT_UNITS as i128));

        let result = self.invoker.invoke(&call).await.map_err(translate_mint_failure)?;
        let hash = result.submitted_hash()?.map(str::to_string);
        tracing::info!(user, hash = ?hash, "mint submitted");

        Ok(MintResponse {
            success: true,
            message: "Successfully minted 1000 PDOT tokens".into(),
            transaction_hash: hash,
        })
    }

    /// Relays a wallet-signed envelope to the network.
    pub async fn submit_transaction(&self, req: SubmitTransactionRequest) -> Result<SubmitTransactionResponse> {
        let xdr = present(&req.signed_tx_xdr).ok_or_else(|| validation("Signed transaction XDR is required"))?;
        let submitted = self.relay.submit_signed(xdr).await?;
        tracing::info!(hash = %submitted.hash, confirmed = submitted.confirmed, "relayed signed transaction");

        Ok(SubmitTransactionResponse {
            success: true,
            transaction_hash: submitted.hash,
            message: if submitted.confirmed {
                "Transaction submitted successfully".into()
            } else {
                "Transaction submitted, awaiting confirmation".into()
            },
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// PDOT token balance. Simulation and decode failures report `"0"`
    /// with diagnostics instead of failing.
    pub async fn token_balance(&self, address: Option<&str>) -> Result<TokenBalanceResponse> {
        let address = present_str(address).ok_or_else(|| validation("Address parameter is required"))?;
        validate_address(address)?;
        let token = self.config.token_contract()?;

        let call = ContractCall::simulate(token, "balance").arg("id", ArgValue::Address(address.to_string()));
        let outcome = match self.invoker.invoke(&call).await {
            Ok(result) => result
                .value()
                .and_then(|v| Ok((to_decimal(v, TOKEN_DECIMALS)?, v.to_string()))),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((balance, raw)) => Ok(TokenBalanceResponse {
                balance,
                address: address.to_string(),
                error: None,
                debug: Some(serde_json::json!({
                    "rawValue": raw,
                    "contractId": token,
                    "success": true,
                })),
            }),
            Err(e @ (GatewayError::SimulationFailure(_) | GatewayError::Decode { .. })) => {
                tracing::warn!(address, error = %e, "token balance unavailable, reporting zero");
                Ok(TokenBalanceResponse {
                    balance: "0".into(),
                    address: address.to_string(),
                    error: Some(match e {
                        GatewayError::SimulationFailure(_) => "Contract simulation failed".into(),
                        _ => "No result from contract".into(),
                    }),
                    debug: Some(serde_json::json!({ "detail": e.to_string() })),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// The user's deposited principal in the vault.
    pub async fn vault_balance(&self, address: Option<&str>) -> Result<VaultBalanceResponse> {
        self.vault_read("get_user_balance", address).await
    }

    /// The user's pToken holdings in the vault.
    pub async fn ptoken_balance(&self, address: Option<&str>) -> Result<VaultBalanceResponse> {
        self.vault_read("get_ptoken_balance", address).await
    }

    async fn vault_read(&self, function: &str, address: Option<&str>) -> Result<VaultBalanceResponse> {
        let address = present_str(address).ok_or_else(|| validation("Address parameter is required"))?;
        validate_address(address)?;
        let vault = self.config.vault_contract()?;

        let call = ContractCall::simulate(vault, function).arg("user", ArgValue::Address(address.to_string()));
        let (balance, raw_output) = match self.invoker.invoke(&call).await {
            Ok(result) => {
                let balance = result.value().and_then(|v| to_decimal(v, TOKEN_DECIMALS)).unwrap_or_else(|e| {
                    tracing::warn!(function, address, error = %e, "undecodable vault read, reporting zero");
                    "0".into()
                });
                (balance, result.raw)
            }
            Err(GatewayError::Decode { message, raw }) => {
                tracing::warn!(function, address, %message, "undecodable vault read, reporting zero");
                ("0".into(), raw)
            }
            Err(e) => return Err(e),
        };

        Ok(VaultBalanceResponse {
            balance,
            address: address.to_string(),
            raw_output,
        })
    }

    /// Vault-wide totals. The three reads run concurrently and each one
    /// that fails reports `"0"` on its own.
    pub async fn vault_stats(&self) -> Result<VaultStats> {
        let vault = self.config.vault_contract()?;

        let (deposited, ptokens, rate) = tokio::join!(
            self.read_scaled(vault, "get_total_deposited", TOKEN_DECIMALS),
            self.read_scaled(vault, "get_total_ptokens", TOKEN_DECIMALS),
            self.read_scaled(vault, "get_exchange_rate", EXCHANGE_RATE_DECIMALS),
        );

        Ok(VaultStats {
            total_deposited: deposited,
            total_p_tokens: ptokens,
            exchange_rate: rate,
            user_share: "0".into(),
        })
    }

    async fn read_scaled(&self, contract: &str, function: &str, exponent: u32) -> String {
        let call = ContractCall::simulate(contract, function);
        let decoded = match self.invoker.invoke(&call).await {
            Ok(result) => result.value().and_then(|v| to_decimal(v, exponent)),
            Err(e) => Err(e),
        };
        decoded.unwrap_or_else(|e| {
            tracing::warn!(function, error = %e, "vault stat unavailable, reporting zero");
            "0".into()
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("strategy", &self.invoker.strategy())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validation(message: &str) -> GatewayError {
    GatewayError::Validation(message.to_string())
}

fn present(value: &Option<String>) -> Option<&str> {
    present_str(value.as_deref())
}

fn present_str(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn validate_address(address: &str) -> Result<()> {
    parse_account_id(address).map(|_| ())
}

fn positive_units(amount: &types::AmountInput) -> Result<u128> {
    let fixed = FixedPoint::token(&amount.to_string())?;
    if fixed.is_zero() {
        return Err(GatewayError::InvalidAmount(format!(
            "{} is below the smallest unit",
            amount
        )));
    }
    Ok(fixed.value)
}

/// Renders an integer contract value in human units.
fn to_decimal(value: &NativeValue, exponent: u32) -> Result<String> {
    match value {
        NativeValue::Int(v) => Ok(from_fixed_point_int(*v, exponent)),
        NativeValue::UInt(v) => Ok(from_fixed_point(&v.to_string(), exponent)),
        other => Err(GatewayError::Decode {
            message: "expected an integer".into(),
            raw: other.to_string(),
        }),
    }
}

/// Rewrites known contract failures of `mint` into messages an operator can
/// act on.
pub fn translate_mint_failure(error: GatewayError) -> GatewayError {
    let text = match &error {
        GatewayError::ExecutionFailure { message, stdout, stderr } => format!("{} {} {}", message, stdout, stderr),
        other => other.to_string(),
    };
    if text.contains(UNREACHABLE_MARKER) {
        GatewayError::SubmissionFailure {
            message: "Token contract has implementation issues - contact admin".into(),
            hash: None,
        }
    } else if text.contains(AUTH_FAILURE_MARKER) {
        GatewayError::SubmissionFailure {
            message: "Authorization failed - insufficient permissions".into(),
            hash: None,
        }
    } else {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TESTNET_PASSPHRASE;
    use crate::invocation::{CallSource, ExecutionMode, StubInvoker};
    use crate::soroban::keys::tests::{TEST_ADDRESS, TEST_CONTRACT, TEST_SECRET, TEST_USER};
    use crate::soroban::xdr::{build_transaction, envelope_to_base64, invoke_contract_op, unsigned_envelope};
    use crate::soroban::StubRelay;

    fn configured() -> GatewayConfig {
        GatewayConfig {
            vault_contract: Some(TEST_CONTRACT.into()),
            token_contract: Some(TEST_CONTRACT.into()),
            minter_address: Some(TEST_ADDRESS.into()),
            minter_secret: Some(TEST_SECRET.into()),
            ..GatewayConfig::default()
        }
    }

    fn gateway(config: GatewayConfig, stub: StubInvoker) -> (Gateway, Arc<StubInvoker>) {
        let stub = Arc::new(stub);
        let gw = Gateway::new(config, stub.clone(), Arc::new(StubRelay::new()));
        (gw, stub)
    }

    fn sample_envelope() -> String {
        let op = invoke_contract_op(TEST_CONTRACT, "withdraw", &[]).unwrap();
        let tx = build_transaction(parse_account_id(TEST_USER).unwrap(), 1, 100, op, 0).unwrap();
        envelope_to_base64(&unsigned_envelope(tx)).unwrap()
    }

    fn deposit(user: Option<&str>, amount: Option<AmountInput>) -> DepositRequest {
        DepositRequest {
            user_address: user.map(str::to_string),
            amount,
        }
    }

    #[tokio::test]
    async fn deposit_returns_unsigned_envelope() {
        let (gw, stub) = gateway(configured(), StubInvoker::new().with_envelope("deposit", "AAAAdeposit"));
        let resp = gw
            .deposit(deposit(Some(TEST_USER), Some(AmountInput::Text("1.5".into()))))
            .await
            .unwrap();

        assert!(resp.success);
        assert_eq!(resp.transaction_xdr, "AAAAdeposit");
        assert_eq!(resp.amount, AmountInput::Text("1.5".into()));

        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].mode, ExecutionMode::BuildOnly);
        assert_eq!(calls[0].source, CallSource::Account(TEST_USER.into()));
        assert_eq!(calls[0].args[1].value, ArgValue::U128(1_500_000_000));
    }

    #[tokio::test]
    async fn deposit_validates_before_invoking() {
        let (gw, stub) = gateway(configured(), StubInvoker::new());

        for req in [
            deposit(None, Some(AmountInput::Text("1".into()))),
            deposit(Some(TEST_USER), None),
            deposit(Some(""), Some(AmountInput::Text("1".into()))),
            deposit(Some(TEST_USER), Some(AmountInput::Number(0.into()))),
            deposit(Some(TEST_USER), Some(AmountInput::Text("abc".into()))),
            deposit(Some(TEST_USER), Some(AmountInput::Text("0.0000000001".into()))),
            deposit(Some("not-an-address"), Some(AmountInput::Text("1".into()))),
        ] {
            let err = gw.deposit(req).await.unwrap_err();
            assert!(err.is_client_error(), "{:?}", err);
        }
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn deposit_without_vault_is_configuration_error() {
        let (gw, stub) = gateway(GatewayConfig::default(), StubInvoker::new());
        let err = gw
            .deposit(deposit(Some(TEST_USER), Some(AmountInput::Text("1".into()))))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m == "Vault contract not configured"));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn withdraw_builds_real_transaction() {
        let envelope = sample_envelope();
        let (gw, stub) = gateway(configured(), StubInvoker::new().with_envelope("withdraw", &envelope));
        let resp = gw
            .withdraw(WithdrawRequest {
                user_address: Some(TEST_USER.into()),
                p_token_amount: Some(AmountInput::Text("2".into())),
            })
            .await
            .unwrap();

        assert!(resp.success);
        assert_eq!(resp.transaction_xdr, envelope);
        assert_eq!(resp.transaction_hash, transaction_hash(&envelope, TESTNET_PASSPHRASE).unwrap());
        assert_eq!(stub.calls()[0].args[1], crate::invocation::ContractArg::new("ptoken_amount", ArgValue::U128(2_000_000_000)));
    }

    #[tokio::test]
    async fn mint_submits_fixed_amount_from_server_signer() {
        let hash = "f".repeat(64);
        let (gw, stub) = gateway(configured(), StubInvoker::new().with_submitted("mint", &hash));
        let resp = gw
            .mint_tokens(MintRequest {
                user_address: Some(TEST_USER.into()),
            })
            .await
            .unwrap();

        assert_eq!(resp.transaction_hash.as_deref(), Some(hash.as_str()));
        let call = &stub.calls()[0];
        assert_eq!(call.mode, ExecutionMode::Submit);
        assert_eq!(call.source, CallSource::ServerSigner);
        assert_eq!(call.args[1].value, ArgValue::I128(1_000_000_000_000));
    }

    #[tokio::test]
    async fn mint_without_secrets_never_invokes() {
        let config = GatewayConfig {
            token_contract: Some(TEST_CONTRACT.into()),
            ..GatewayConfig::default()
        };
        let (gw, stub) = gateway(config, StubInvoker::new().with_submitted("mint", "h"));
        let err = gw
            .mint_tokens(MintRequest {
                user_address: Some(TEST_USER.into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m == "Server configuration error"));
        assert_eq!(stub.call_count(), 0);
    }

    #[test]
    fn mint_failure_markers_are_translated() {
        let err = translate_mint_failure(GatewayError::SimulationFailure(
            "HostError: Error(WasmVm, InvalidAction) UnreachableCodeReached".into(),
        ));
        assert!(err.to_string().contains("implementation issues"));

        let err = translate_mint_failure(GatewayError::ExecutionFailure {
            message: "exit 1".into(),
            stdout: String::new(),
            stderr: "Error(Auth, 0x7D82D5)".into(),
        });
        assert!(err.to_string().contains("Authorization failed"));

        let err = translate_mint_failure(GatewayError::Transport("timeout".into()));
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn token_balance_converts_units() {
        let (gw, _) = gateway(
            configured(),
            StubInvoker::new().with_value("balance", NativeValue::Int(2_500_000_000)),
        );
        let resp = gw.token_balance(Some(TEST_USER)).await.unwrap();
        assert_eq!(resp.balance, "2.5");
        assert_eq!(resp.address, TEST_USER);
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn token_balance_defaults_to_zero_on_decode_failure() {
        let (gw, _) = gateway(
            configured(),
            StubInvoker::new().with_error(
                "balance",
                GatewayError::Decode {
                    message: "garbage".into(),
                    raw: "???".into(),
                },
            ),
        );
        let resp = gw.token_balance(Some(TEST_USER)).await.unwrap();
        assert_eq!(resp.balance, "0");
        assert!(resp.error.is_some());

        let (gw, _) = gateway(configured(), StubInvoker::new().with_value("balance", NativeValue::Text("x".into())));
        assert_eq!(gw.token_balance(Some(TEST_USER)).await.unwrap().balance, "0");
    }

    #[tokio::test]
    async fn token_balance_transport_failure_is_an_error() {
        let (gw, _) = gateway(
            configured(),
            StubInvoker::new().with_error("balance", GatewayError::Transport("connection refused".into())),
        );
        assert!(matches!(
            gw.token_balance(Some(TEST_USER)).await,
            Err(GatewayError::Transport(_))
        ));
        assert!(gw.token_balance(None).await.unwrap_err().is_client_error());
    }

    #[tokio::test]
    async fn vault_balance_is_lenient_on_decode() {
        let (gw, _) = gateway(
            configured(),
            StubInvoker::new().with_error(
                "get_user_balance",
                GatewayError::Decode {
                    message: "not a number".into(),
                    raw: "oops\n".into(),
                },
            ),
        );
        let resp = gw.vault_balance(Some(TEST_USER)).await.unwrap();
        assert_eq!(resp.balance, "0");
        assert_eq!(resp.raw_output, "oops\n");
    }

    #[tokio::test]
    async fn ptoken_balance_reads_ptoken_function() {
        let (gw, stub) = gateway(
            configured(),
            StubInvoker::new().with_value("get_ptoken_balance", NativeValue::UInt(1_000_000_000)),
        );
        let resp = gw.ptoken_balance(Some(TEST_USER)).await.unwrap();
        assert_eq!(resp.balance, "1");
        assert_eq!(resp.raw_output, "1000000000");
        assert_eq!(stub.calls()[0].args[0].name, "user");
    }

    #[tokio::test]
    async fn vault_balance_surfaces_execution_failures() {
        let (gw, _) = gateway(
            configured(),
            StubInvoker::new().with_error(
                "get_user_balance",
                GatewayError::ExecutionFailure {
                    message: "exit 1".into(),
                    stdout: "".into(),
                    stderr: "network unreachable".into(),
                },
            ),
        );
        let err = gw.vault_balance(Some(TEST_USER)).await.unwrap_err();
        assert_eq!(err.process_output(), Some(("", "network unreachable")));
    }

    #[tokio::test]
    async fn vault_stats_defaults_failed_fields() {
        let (gw, stub) = gateway(
            configured(),
            StubInvoker::new()
                .with_value("get_total_deposited", NativeValue::Int(12_500_000_000))
                .with_error("get_total_ptokens", GatewayError::SimulationFailure("trap".into()))
                .with_value("get_exchange_rate", NativeValue::Int(1_050_000)),
        );
        let stats = gw.vault_stats().await.unwrap();
        assert_eq!(stats.total_deposited, "12.5");
        assert_eq!(stats.total_p_tokens, "0");
        assert_eq!(stats.exchange_rate, "1.05");
        assert_eq!(stats.user_share, "0");
        assert_eq!(stub.call_count(), 3);
    }

    #[tokio::test]
    async fn submit_transaction_relays_envelope() {
        let relay = Arc::new(StubRelay::new());
        let gw = Gateway::new(configured(), Arc::new(StubInvoker::new()), relay.clone());
        let resp = gw
            .submit_transaction(SubmitTransactionRequest {
                signed_tx_xdr: Some("AAAAsigned".into()),
            })
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.transaction_hash.len(), 64);
        assert_eq!(relay.submitted(), vec!["AAAAsigned".to_string()]);

        let err = gw
            .submit_transaction(SubmitTransactionRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
