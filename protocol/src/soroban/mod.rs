//! # Soroban
//!
//! Client-side plumbing for the Soroban smart-contract platform: strkey
//! parsing and signing ([`keys`]), transaction construction over the raw XDR
//! types ([`xdr`]) and the JSON-RPC client ([`rpc`]).

pub mod keys;
pub mod rpc;
pub mod xdr;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error::Result;

pub use keys::Signer;
pub use rpc::SorobanRpcClient;

/// A transaction accepted by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    /// Hex transaction hash.
    pub hash: String,
    /// Whether the transaction was seen in a closed ledger before we stopped
    /// polling.
    pub confirmed: bool,
}

/// Forwards an already-signed envelope to the network.
#[async_trait]
pub trait TransactionRelay: Send + Sync {
    async fn submit_signed(&self, envelope_xdr: &str) -> Result<SubmittedTransaction>;
}

#[cfg(any(test, feature = "testutils"))]
pub use stub::StubRelay;

#[cfg(any(test, feature = "testutils"))]
mod stub {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::GatewayError;

    /// In-memory relay that records what it was given.
    #[derive(Debug, Default)]
    pub struct StubRelay {
        failure: Option<GatewayError>,
        submitted: Mutex<Vec<String>>,
    }

    impl StubRelay {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every submission fails with `error`.
        pub fn failing(error: GatewayError) -> Self {
            Self {
                failure: Some(error),
                submitted: Mutex::new(Vec::new()),
            }
        }

        pub fn submitted(&self) -> Vec<String> {
            self.submitted.lock().clone()
        }
    }

    #[async_trait]
    impl TransactionRelay for StubRelay {
        async fn submit_signed(&self, envelope_xdr: &str) -> Result<SubmittedTransaction> {
            self.submitted.lock().push(envelope_xdr.to_string());
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            let digest = <sha2::Sha256 as sha2::Digest>::digest(envelope_xdr.as_bytes());
            Ok(SubmittedTransaction {
                hash: hex::encode(digest),
                confirmed: true,
            })
        }
    }
}
