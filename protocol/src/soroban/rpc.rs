//! # Soroban RPC Client
//!
//! A small JSON-RPC 2.0 client for the Soroban RPC methods the gateway
//! uses. Request and response bodies mirror the RPC's camelCase wire names.
//!
//! | Method                | Used for                                   |
//! |-----------------------|--------------------------------------------|
//! | `getLedgerEntries`    | account sequence lookup                    |
//! | `simulateTransaction` | reads, resource estimation, auth recording |
//! | `sendTransaction`     | submission                                 |
//! | `getTransaction`      | confirmation polling                       |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, PublicKey, ReadXdr,
    TransactionEnvelope, Uint256, WriteXdr,
};

use super::keys::parse_account_id;
use super::xdr::{envelope_from_base64, envelope_to_base64};
use super::{SubmittedTransaction, TransactionRelay};
use crate::config::{DEFAULT_CONFIRMATION_INTERVAL, DEFAULT_CONFIRMATION_POLLS};
use crate::error::{GatewayError, Result};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesResponse {
    #[serde(default)]
    entries: Option<Vec<LedgerEntryResult>>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntryResult {
    xdr: String,
}

/// An account as loaded from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_id: [u8; 32],
    /// Current sequence number; the next transaction uses `sequence + 1`.
    pub sequence: i64,
}

/// Per-invocation result inside a simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulateHostFunctionResult {
    /// Base64 `SorobanAuthorizationEntry` values to attach before signing.
    #[serde(default)]
    pub auth: Vec<String>,
    /// Base64 `ScVal` return value.
    pub xdr: String,
}

/// Result of `simulateTransaction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    #[serde(default)]
    pub error: Option<String>,
    /// Base64 `SorobanTransactionData`.
    #[serde(default)]
    pub transaction_data: Option<String>,
    /// Stroops, rendered as a string by the RPC.
    #[serde(default)]
    pub min_resource_fee: Option<serde_json::Value>,
    #[serde(default)]
    pub results: Vec<SimulateHostFunctionResult>,
    #[serde(default)]
    pub latest_ledger: u32,
}

impl SimulateTransactionResponse {
    pub fn is_success(&self) -> bool {
        self.error.as_deref().map_or(true, str::is_empty)
    }

    /// The resource fee, accepting either a string or a number on the wire.
    pub fn min_resource_fee(&self) -> Result<u64> {
        match &self.min_resource_fee {
            None => Ok(0),
            Some(serde_json::Value::String(s)) => s.parse().map_err(|_| {
                GatewayError::SimulationFailure(format!("invalid minResourceFee {:?}", s))
            }),
            Some(serde_json::Value::Number(n)) => n.as_u64().ok_or_else(|| {
                GatewayError::SimulationFailure(format!("invalid minResourceFee {}", n))
            }),
            Some(other) => Err(GatewayError::SimulationFailure(format!(
                "invalid minResourceFee {}",
                other
            ))),
        }
    }
}

/// Submission status reported by `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

/// Result of `sendTransaction`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: SendStatus,
    pub hash: String,
    /// Base64 `TransactionResult` when `status` is `ERROR`.
    #[serde(default)]
    pub error_result_xdr: Option<String>,
    #[serde(default)]
    pub latest_ledger: u32,
}

/// Ledger status reported by `getTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    NotFound,
    Failed,
}

/// Result of `getTransaction`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,
    #[serde(default)]
    pub result_xdr: Option<String>,
    #[serde(default)]
    pub ledger: Option<u32>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// JSON-RPC client for a Soroban RPC node.
#[derive(Debug)]
pub struct SorobanRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    confirmation_polls: u32,
    confirmation_interval: Duration,
}

impl SorobanRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
            confirmation_polls: DEFAULT_CONFIRMATION_POLLS,
            confirmation_interval: DEFAULT_CONFIRMATION_INTERVAL,
        }
    }

    /// Sets how long [`Self::submit_and_confirm`] waits for a pending
    /// transaction to land.
    pub fn with_confirmation(mut self, polls: u32, interval: Duration) -> Self {
        self.confirmation_polls = polls;
        self.confirmation_interval = interval;
        self
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::debug!(method, url = %self.url, "soroban rpc call");
        let response = self.http.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!(
                "{} returned HTTP {}: {}",
                method, status, body
            )));
        }

        let envelope: JsonRpcResponse<R> = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(GatewayError::Transport(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }
        envelope
            .result
            .ok_or_else(|| GatewayError::Transport(format!("{} returned no result", method)))
    }

    /// Loads an account's current sequence number.
    pub async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        let key_bytes = parse_account_id(address)?;
        let key = LedgerKey::Account(LedgerKeyAccount {
            account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key_bytes))),
        });
        let params = serde_json::json!({ "keys": [key.to_xdr_base64(Limits::none())?] });

        let response: LedgerEntriesResponse = self.call("getLedgerEntries", params).await?;
        let entry = response
            .entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Transport(format!("account {} not found", address)))?;

        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())? {
            LedgerEntryData::Account(account) => Ok(AccountInfo {
                account_id: key_bytes,
                sequence: account.seq_num.0,
            }),
            _ => Err(GatewayError::Xdr(format!(
                "ledger entry for {} is not an account",
                address
            ))),
        }
    }

    pub async fn simulate_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<SimulateTransactionResponse> {
        let params = serde_json::json!({ "transaction": envelope_to_base64(envelope)? });
        self.call("simulateTransaction", params).await
    }

    pub async fn send_transaction(&self, envelope_b64: &str) -> Result<SendTransactionResponse> {
        let params = serde_json::json!({ "transaction": envelope_b64 });
        self.call("sendTransaction", params).await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse> {
        let params = serde_json::json!({ "hash": hash });
        self.call("getTransaction", params).await
    }

    /// Submits a signed envelope and waits (bounded) for it to land.
    ///
    /// `ERROR` and `TRY_AGAIN_LATER` are failures. A transaction still
    /// unknown after the configured polls is returned unconfirmed.
    pub async fn submit_and_confirm(&self, envelope_b64: &str) -> Result<SubmittedTransaction> {
        let sent = self.send_transaction(envelope_b64).await?;
        tracing::info!(hash = %sent.hash, status = ?sent.status, "transaction sent");

        match sent.status {
            SendStatus::Error => Err(GatewayError::SubmissionFailure {
                message: sent
                    .error_result_xdr
                    .unwrap_or_else(|| "Unknown error".to_string()),
                hash: Some(sent.hash),
            }),
            SendStatus::TryAgainLater => Err(GatewayError::SubmissionFailure {
                message: "RPC node asked to try again later".to_string(),
                hash: Some(sent.hash),
            }),
            SendStatus::Pending | SendStatus::Duplicate => self.await_confirmation(sent.hash).await,
        }
    }

    async fn await_confirmation(&self, hash: String) -> Result<SubmittedTransaction> {
        for attempt in 1..=self.confirmation_polls {
            tokio::time::sleep(self.confirmation_interval).await;
            match self.get_transaction(&hash).await {
                Ok(tx) => match tx.status {
                    TransactionStatus::Success => {
                        tracing::info!(%hash, ledger = ?tx.ledger, "transaction confirmed");
                        return Ok(SubmittedTransaction { hash, confirmed: true });
                    }
                    TransactionStatus::Failed => {
                        return Err(GatewayError::SubmissionFailure {
                            message: tx
                                .result_xdr
                                .unwrap_or_else(|| "transaction failed on-ledger".to_string()),
                            hash: Some(hash),
                        });
                    }
                    TransactionStatus::NotFound => {
                        tracing::debug!(%hash, attempt, "transaction not yet visible");
                    }
                },
                Err(e) => tracing::warn!(%hash, attempt, error = %e, "confirmation check failed"),
            }
        }
        Ok(SubmittedTransaction {
            hash,
            confirmed: false,
        })
    }
}

#[async_trait]
impl TransactionRelay for SorobanRpcClient {
    async fn submit_signed(&self, envelope_xdr: &str) -> Result<SubmittedTransaction> {
        envelope_from_base64(envelope_xdr)
            .map_err(|e| GatewayError::Validation(format!("malformed transaction envelope: {}", e)))?;
        self.submit_and_confirm(envelope_xdr.trim()).await
    }
}
