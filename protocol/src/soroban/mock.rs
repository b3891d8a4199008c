//! Scripted Soroban RPC node served by axum on a loopback port.
//!
//! Each method replies from its own queue. The last reply of a queue
//! repeats, so a single scripted `NOT_FOUND` answers every poll.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, ExtensionPoint, LedgerEntryData, LedgerFootprint, Limits, PublicKey,
    ScVal, SequenceNumber, SorobanResources, SorobanTransactionData, Thresholds, Uint256, VecM, WriteXdr,
};

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<Value>>,
    received: Vec<(String, Value)>,
}

/// Handle on a running mock node.
#[derive(Clone)]
pub(crate) struct MockRpc {
    url: String,
    script: Arc<Mutex<Script>>,
}

impl MockRpc {
    /// Binds `127.0.0.1:0` and serves until the test runtime shuts down.
    pub(crate) async fn start() -> Self {
        let script = Arc::new(Mutex::new(Script::default()));
        let app = Router::new()
            .route("/", post(dispatch))
            .with_state(Arc::clone(&script));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        Self {
            url: format!("http://{}", addr),
            script,
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Queues `result` as the next reply to `method`.
    pub(crate) fn reply(&self, method: &str, result: Value) -> &Self {
        self.script
            .lock()
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Params of every call to `method`, oldest first.
    pub(crate) fn params(&self, method: &str) -> Vec<Value> {
        self.script
            .lock()
            .received
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

async fn dispatch(State(script): State<Arc<Mutex<Script>>>, Json(request): Json<Value>) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let mut script = script.lock();
    script.received.push((method.clone(), request["params"].clone()));

    let reply = script.replies.get_mut(&method).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });

    Json(match reply {
        Some(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
        None => json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": -32601, "message": format!("method not found: {}", method) },
        }),
    })
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `getLedgerEntries` result for an account at `sequence`.
pub(crate) fn account_entries(key: [u8; 32], sequence: i64) -> Value {
    let entry = LedgerEntryData::Account(AccountEntry {
        account_id: stellar_xdr::curr::AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key))),
        balance: 10_000_000_000,
        seq_num: SequenceNumber(sequence),
        num_sub_entries: 0,
        inflation_dest: None,
        flags: 0,
        home_domain: Default::default(),
        thresholds: Thresholds([1, 0, 0, 0]),
        signers: VecM::default(),
        ext: AccountEntryExt::V0,
    });
    json!({
        "entries": [{ "xdr": entry.to_xdr_base64(Limits::none()).unwrap() }],
        "latestLedger": 100,
    })
}

pub(crate) fn soroban_data() -> SorobanTransactionData {
    SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint {
                read_only: VecM::default(),
                read_write: VecM::default(),
            },
            instructions: 2_000,
            read_bytes: 200,
            write_bytes: 100,
        },
        resource_fee: 5_000,
    }
}

/// Successful `simulateTransaction` result returning `value`.
pub(crate) fn simulation(value: ScVal) -> Value {
    json!({
        "transactionData": soroban_data().to_xdr_base64(Limits::none()).unwrap(),
        "minResourceFee": "5000",
        "results": [{ "auth": [], "xdr": value.to_xdr_base64(Limits::none()).unwrap() }],
        "latestLedger": 100,
    })
}
