//! Strkey parsing and the server-side signing identity.
//!
//! Stellar renders keys as base32 "strkeys" with a version byte and a CRC16
//! checksum: `G...` for account public keys, `S...` for secret seeds and
//! `C...` for contract ids. Parsing is delegated to `stellar-strkey`.

use ed25519_dalek::{Signer as _, SigningKey};

use crate::error::{GatewayError, Result};

/// Decodes a `G...` account address into its raw ed25519 public key.
pub fn parse_account_id(address: &str) -> Result<[u8; 32]> {
    stellar_strkey::ed25519::PublicKey::from_string(address.trim())
        .map(|pk| pk.0)
        .map_err(|e| GatewayError::Validation(format!("invalid account address {:?}: {}", address, e)))
}

/// Decodes a `C...` contract id into its raw 32-byte hash.
pub fn parse_contract_id(contract: &str) -> Result<[u8; 32]> {
    stellar_strkey::Contract::from_string(contract.trim())
        .map(|c| c.0)
        .map_err(|e| GatewayError::Validation(format!("invalid contract id {:?}: {}", contract, e)))
}

/// Renders a raw ed25519 public key as a `G...` address.
pub fn encode_account_id(key: &[u8; 32]) -> String {
    stellar_strkey::ed25519::PublicKey(*key).to_string()
}

/// Renders a raw contract hash as a `C...` contract id.
pub fn encode_contract_id(id: &[u8; 32]) -> String {
    stellar_strkey::Contract(*id).to_string()
}

/// An ed25519 key pair the server signs with. Only the faucet minter uses
/// one; user transactions are never signed here.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    /// Parses an `S...` secret seed.
    pub fn from_secret(secret: &str) -> Result<Self> {
        let seed = stellar_strkey::ed25519::PrivateKey::from_string(secret.trim())
            .map_err(|_| GatewayError::Configuration("malformed signing secret".into()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed.0),
        })
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// The `G...` address of this key.
    pub fn address(&self) -> String {
        encode_account_id(&self.public_key())
    }

    /// Last four bytes of the public key, used as the signature hint.
    pub fn hint(&self) -> [u8; 4] {
        let pk = self.public_key();
        [pk[28], pk[29], pk[30], pk[31]]
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
