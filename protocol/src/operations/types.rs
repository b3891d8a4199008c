//! Request and response bodies for gateway operations.
//!
//! Field names follow the dashboard's camelCase JSON. Request fields are
//! optional at the serde level so that a missing field becomes a
//! [`GatewayError::Validation`](crate::error::GatewayError::Validation)
//! rather than a deserialization rejection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An amount as sent by the client: either a JSON string or a JSON number.
/// It is echoed back exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    /// `true` for the inputs a client treats as "not provided": `""`, `0`.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.as_f64() == Some(0.0),
        }
    }
}

impl fmt::Display for AmountInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s.trim()),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault writes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub user_address: Option<String>,
    pub amount: Option<AmountInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub success: bool,
    /// Unsigned base64 envelope for the user's wallet to sign.
    pub transaction_xdr: String,
    pub amount: AmountInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub user_address: Option<String>,
    pub p_token_amount: Option<AmountInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    pub success: bool,
    pub message: String,
    /// Hash the transaction will have once signed and submitted.
    pub transaction_hash: String,
    pub transaction_xdr: String,
}

// ---------------------------------------------------------------------------
// Faucet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub user_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintResponse {
    pub success: bool,
    pub message: String,
    pub transaction_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// `?address=` query string of the balance endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceQuery {
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceResponse {
    pub balance: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBalanceResponse {
    pub balance: String,
    pub address: String,
    pub raw_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStats {
    pub total_deposited: String,
    pub total_p_tokens: String,
    pub exchange_rate: String,
    /// Computed by the client.
    pub user_share: String,
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
    pub signed_tx_xdr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionResponse {
    pub success: bool,
    pub transaction_hash: String,
    pub message: String,
}
