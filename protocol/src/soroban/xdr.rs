//! # Soroban Transaction Plumbing
//!
//! Everything needed to turn a [`ContractCall`] into a Soroban transaction
//! envelope and back, using the `stellar-xdr` types directly:
//!
//! 1. [`invoke_contract_op`] encodes the call as a single
//!    `InvokeHostFunction` operation with positional [`ScVal`] arguments.
//! 2. [`build_transaction`] wraps it with a source account, fee, sequence
//!    number and a validity window.
//! 3. [`assemble`] applies a simulation's resource footprint, resource fee
//!    and authorization entries, the same way client SDKs "prepare" a
//!    transaction.
//! 4. [`sign_transaction`] signs the network-bound payload hash.
//!
//! The hash a transaction will have on-ledger is known before signing, so
//! [`transaction_hash`] works on unsigned envelopes too.

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    AccountId, DecoratedSignature, Hash, HostFunction, Int128Parts, InvokeContractArgs,
    InvokeHostFunctionOp, Limits, Memo, MuxedAccount, Operation, OperationBody, Preconditions,
    PublicKey, ReadXdr, ScAddress, ScString, ScSymbol, ScVal, SequenceNumber, Signature,
    SignatureHint, SorobanAuthorizationEntry, SorobanTransactionData, TimeBounds, TimePoint,
    Transaction, TransactionEnvelope, TransactionExt, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, TransactionV1Envelope, UInt128Parts, Uint256,
    VecM, WriteXdr,
};

use super::keys::{encode_account_id, encode_contract_id, parse_account_id, parse_contract_id, Signer};
use super::rpc::SimulateTransactionResponse;
use crate::error::{GatewayError, Result};
use crate::invocation::{ArgValue, ContractArg, NativeValue};

// ---------------------------------------------------------------------------
// Value codec
// ---------------------------------------------------------------------------

/// Builds an [`ScAddress`] from a `G...` account or `C...` contract strkey.
pub fn sc_address(strkey: &str) -> Result<ScAddress> {
    let s = strkey.trim();
    if s.starts_with('C') {
        Ok(ScAddress::Contract(Hash(parse_contract_id(s)?)))
    } else {
        Ok(account_sc_address(parse_account_id(s)?))
    }
}

fn account_id(key: [u8; 32]) -> AccountId {
    AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))
}

fn account_sc_address(key: [u8; 32]) -> ScAddress {
    ScAddress::Account(account_id(key))
}

/// Encodes a host-side argument into the contract's native value encoding.
pub fn to_scval(value: &ArgValue) -> Result<ScVal> {
    Ok(match value {
        ArgValue::Address(addr) => ScVal::Address(sc_address(addr)?),
        ArgValue::I128(v) => ScVal::I128(Int128Parts {
            hi: (*v >> 64) as i64,
            lo: *v as u64,
        }),
        ArgValue::U128(v) => ScVal::U128(UInt128Parts {
            hi: (*v >> 64) as u64,
            lo: *v as u64,
        }),
        ArgValue::U64(v) => ScVal::U64(*v),
        ArgValue::U32(v) => ScVal::U32(*v),
        ArgValue::Bool(v) => ScVal::Bool(*v),
        ArgValue::Symbol(s) => ScVal::Symbol(ScSymbol(s.as_str().try_into()?)),
        ArgValue::String(s) => ScVal::String(ScString(s.as_str().try_into()?)),
    })
}

/// Decodes a contract return value into a host-side value.
///
/// Only the shapes the vault and token contracts return are supported;
/// anything else is a [`GatewayError::Decode`].
pub fn from_scval(value: &ScVal) -> Result<NativeValue> {
    let unsupported = |what: &str| GatewayError::Decode {
        message: format!("unsupported return type {}", what),
        raw: value.to_xdr_base64(Limits::none()).unwrap_or_default(),
    };

    Ok(match value {
        ScVal::Void => NativeValue::Void,
        ScVal::Bool(b) => NativeValue::Bool(*b),
        ScVal::U32(v) => NativeValue::Int(i128::from(*v)),
        ScVal::I32(v) => NativeValue::Int(i128::from(*v)),
        ScVal::U64(v) => NativeValue::Int(i128::from(*v)),
        ScVal::I64(v) => NativeValue::Int(i128::from(*v)),
        ScVal::I128(parts) => NativeValue::Int((i128::from(parts.hi) << 64) | i128::from(parts.lo)),
        ScVal::U128(parts) => NativeValue::UInt((u128::from(parts.hi) << 64) | u128::from(parts.lo)),
        ScVal::String(s) => NativeValue::Text(String::from_utf8_lossy(s.0.as_vec()).into_owned()),
        ScVal::Symbol(s) => NativeValue::Text(String::from_utf8_lossy(s.0.as_vec()).into_owned()),
        ScVal::Address(addr) => NativeValue::Address(address_strkey(addr).ok_or_else(|| unsupported("address"))?),
        ScVal::Map(_) => return Err(unsupported("map")),
        ScVal::Vec(_) => return Err(unsupported("vec")),
        ScVal::Bytes(_) => return Err(unsupported("bytes")),
        _ => return Err(unsupported("value")),
    })
}

#[allow(unreachable_patterns)]
fn address_strkey(addr: &ScAddress) -> Option<String> {
    match addr {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))) => {
            Some(encode_account_id(key))
        }
        ScAddress::Contract(Hash(id)) => Some(encode_contract_id(id)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Transaction building
// ---------------------------------------------------------------------------

/// Encodes a contract call as a single `InvokeHostFunction` operation.
pub fn invoke_contract_op(contract_id: &str, function: &str, args: &[ContractArg]) -> Result<Operation> {
    let args: Vec<ScVal> = args.iter().map(|a| to_scval(&a.value)).collect::<Result<_>>()?;

    Ok(Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(InvokeContractArgs {
                contract_address: ScAddress::Contract(Hash(parse_contract_id(contract_id)?)),
                function_name: ScSymbol(function.try_into()?),
                args: args.try_into()?,
            }),
            auth: VecM::default(),
        }),
    })
}

/// Wraps an operation in a transaction.
///
/// `current_sequence` is the source account's sequence number as stored on
/// the ledger; the transaction uses the next one. The transaction is valid
/// until `valid_until` (unix seconds).
pub fn build_transaction(
    source: [u8; 32],
    current_sequence: i64,
    fee: u32,
    operation: Operation,
    valid_until: u64,
) -> Result<Transaction> {
    Ok(Transaction {
        source_account: MuxedAccount::Ed25519(Uint256(source)),
        fee,
        seq_num: SequenceNumber(current_sequence + 1),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(valid_until),
        }),
        memo: Memo::None,
        operations: vec![operation].try_into()?,
        ext: TransactionExt::V0,
    })
}

/// Applies a successful simulation to a transaction: soroban resource data,
/// resource fee on top of the inclusion fee, and the authorization entries
/// the simulation recorded (unless the operation already carries some).
pub fn assemble(mut tx: Transaction, sim: &SimulateTransactionResponse) -> Result<Transaction> {
    if let Some(err) = sim.error.as_deref().filter(|e| !e.is_empty()) {
        return Err(GatewayError::SimulationFailure(err.to_string()));
    }

    let data_b64 = sim
        .transaction_data
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| GatewayError::SimulationFailure("simulation returned no transaction data".into()))?;
    let data = SorobanTransactionData::from_xdr_base64(data_b64, Limits::none())?;

    let fee = u64::from(tx.fee).saturating_add(sim.min_resource_fee()?);
    tx.fee = u32::try_from(fee)
        .map_err(|_| GatewayError::SimulationFailure(format!("resource fee {} exceeds u32", fee)))?;

    if let Some(result) = sim.results.first() {
        let auth = result
            .auth
            .iter()
            .map(|entry| SorobanAuthorizationEntry::from_xdr_base64(entry, Limits::none()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ops = tx.operations.to_vec();
        if let Some(Operation {
            body: OperationBody::InvokeHostFunction(op),
            ..
        }) = ops.first_mut()
        {
            if op.auth.is_empty() {
                op.auth = auth.try_into()?;
            }
        }
        tx.operations = ops.try_into()?;
    }

    tx.ext = TransactionExt::V1(data);
    Ok(tx)
}

// ---------------------------------------------------------------------------
// Envelopes, hashing and signing
// ---------------------------------------------------------------------------

/// Wraps a transaction in an envelope with no signatures.
pub fn unsigned_envelope(tx: Transaction) -> TransactionEnvelope {
    TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    })
}

pub fn envelope_to_base64(envelope: &TransactionEnvelope) -> Result<String> {
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

pub fn envelope_from_base64(b64: &str) -> Result<TransactionEnvelope> {
    Ok(TransactionEnvelope::from_xdr_base64(b64.trim(), Limits::none())?)
}

/// `sha256(passphrase)`: the id every signature is bound to.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// Hash of the signature payload. This is both what gets signed and the
/// transaction's on-ledger hash.
pub fn signature_payload_hash(tx: &Transaction, passphrase: &str) -> Result<[u8; 32]> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(network_id(passphrase)),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    let bytes = payload.to_xdr(Limits::none())?;
    Ok(Sha256::digest(&bytes).into())
}

/// Signs `tx` and returns the signed envelope.
pub fn sign_transaction(tx: Transaction, signer: &Signer, passphrase: &str) -> Result<TransactionEnvelope> {
    let hash = signature_payload_hash(&tx, passphrase)?;
    let signature = DecoratedSignature {
        hint: SignatureHint(signer.hint()),
        signature: Signature(signer.sign(&hash).to_vec().try_into()?),
    };
    Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: vec![signature].try_into()?,
    }))
}

/// Hex transaction hash of a base64 envelope, signed or not.
pub fn transaction_hash(envelope_b64: &str, passphrase: &str) -> Result<String> {
    match envelope_from_base64(envelope_b64)? {
        TransactionEnvelope::Tx(env) => Ok(hex::encode(signature_payload_hash(&env.tx, passphrase)?)),
        _ => Err(GatewayError::Xdr("only v1 transaction envelopes are supported".into())),
    }
}

/// Decodes a base64 [`ScVal`] as returned in a simulation result.
pub fn scval_from_base64(b64: &str) -> Result<ScVal> {
    ScVal::from_xdr_base64(b64, Limits::none()).map_err(|e| GatewayError::Decode {
        message: e.to_string(),
        raw: b64.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
