//! # Dashboard API
//!
//! Builds the axum router that exposes the gateway's HTTP interface to the
//! Peridot dashboard. All endpoints share application state through axum's
//! `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                              |
//! |--------|------------------------|------------------------------------------|
//! | GET    | `/health`              | Liveness probe                           |
//! | POST   | `/deposit`             | Unsigned vault deposit transaction       |
//! | POST   | `/withdraw`            | Unsigned vault withdraw transaction      |
//! | POST   | `/mint-tokens`         | Faucet: mint 1000 PDOT                   |
//! | POST   | `/submit-transaction`  | Relay a wallet-signed transaction        |
//! | GET    | `/token-balance`       | PDOT balance of `?address=`              |
//! | GET    | `/vault-balance`       | Vault deposit of `?address=`             |
//! | GET    | `/ptoken-balance`      | pToken holdings of `?address=`           |
//! | GET    | `/vault-stats`         | Vault totals and exchange rate           |
//! | POST   | `/chat`                | Assistant chat                           |
//!
//! Missing or invalid input is a 400. Every other failure is a 500 whose
//! body carries whatever diagnostics the failure produced.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use peridot_protocol::chat::{ChatProvider, ChatRequest};
use peridot_protocol::operations::{
    BalanceQuery, DepositRequest, MintRequest, SubmitTransactionRequest, WithdrawRequest,
};
use peridot_protocol::{Gateway, GatewayError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The gateway's reported version string.
    pub version: String,
    /// Vault and token operations.
    pub gateway: Gateway,
    /// Assistant chat backend.
    pub chat: Arc<dyn ChatProvider>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/deposit", post(deposit_handler))
        .route("/withdraw", post(withdraw_handler))
        .route("/mint-tokens", post(mint_tokens_handler))
        .route("/submit-transaction", post(submit_transaction_handler))
        .route("/token-balance", get(token_balance_handler))
        .route("/vault-balance", get(vault_balance_handler))
        .route("/ptoken-balance", get(ptoken_balance_handler))
        .route("/vault-stats", get(vault_stats_handler))
        .route("/chat", post(chat_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Gateway software version.
    pub version: String,
    /// Stellar network name.
    pub network: String,
    /// Contract invocation backend in use.
    pub invoker: String,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Generic error body returned by read endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn status_for(err: &GatewayError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn outcome<T>(result: &Result<T, GatewayError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}

fn bad_body(rejection: JsonRejection) -> GatewayError {
    GatewayError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

/// Error body of the write endpoints: `{success: false, error, details?}`.
///
/// `action` names what failed, e.g. "build deposit transaction".
fn write_error(err: GatewayError, action: &str, fallback: &str) -> Response {
    let status = status_for(&err);
    let body = match &err {
        GatewayError::Validation(_) | GatewayError::InvalidAmount(_) | GatewayError::Configuration(_) => {
            json!({ "success": false, "error": err.to_string() })
        }
        GatewayError::ExecutionFailure { stdout, stderr, .. } => json!({
            "success": false,
            "error": format!("Failed to {}", action),
            "details": { "stdout": stdout, "stderr": stderr },
        }),
        GatewayError::SubmissionFailure { message, hash } => json!({
            "success": false,
            "error": message,
            "transactionHash": hash,
        }),
        other => json!({
            "success": false,
            "error": fallback,
            "details": other.to_string(),
        }),
    };
    (status, Json(body)).into_response()
}

/// Error body of the read endpoints: `{error, details?}`.
fn read_error(err: GatewayError, action: &str, fallback: &str) -> Response {
    let status = status_for(&err);
    let body = match &err {
        GatewayError::Validation(_) | GatewayError::InvalidAmount(_) | GatewayError::Configuration(_) => {
            json!({ "error": err.to_string() })
        }
        GatewayError::ExecutionFailure { stdout, stderr, .. } => json!({
            "error": format!("Failed to {}", action),
            "details": { "stdout": stdout, "stderr": stderr },
        }),
        other => json!({ "error": fallback, "details": other.to_string() }),
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the gateway is alive.
///
/// This is a liveness probe. It does not contact the RPC node.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok".into(),
        version: state.version.clone(),
        network: state.gateway.config().network.clone(),
        invoker: state.gateway.strategy().into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `POST /deposit` — builds an unsigned deposit for the user's wallet.
async fn deposit_handler(
    State(state): State<AppState>,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(req)) => state.gateway.deposit(req).await,
        Err(rejection) => Err(bad_body(rejection)),
    };
    state.metrics.record_request("deposit", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "deposit failed");
            write_error(e, "build deposit transaction", "Failed to process deposit")
        }
    }
}

/// `POST /withdraw` — builds an unsigned withdrawal for the user's wallet.
async fn withdraw_handler(
    State(state): State<AppState>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(req)) => state.gateway.withdraw(req).await,
        Err(rejection) => Err(bad_body(rejection)),
    };
    state.metrics.record_request("withdraw", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "withdraw failed");
            write_error(e, "build withdraw transaction", "Failed to process withdrawal")
        }
    }
}

/// `POST /mint-tokens` — faucet mint signed by the server identity.
async fn mint_tokens_handler(
    State(state): State<AppState>,
    body: Result<Json<MintRequest>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(req)) => state.gateway.mint_tokens(req).await,
        Err(rejection) => Err(bad_body(rejection)),
    };
    state.metrics.record_request("mint_tokens", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "mint failed");
            write_error(e, "mint tokens", "Failed to mint tokens")
        }
    }
}

/// `POST /submit-transaction` — relays a wallet-signed envelope.
async fn submit_transaction_handler(
    State(state): State<AppState>,
    body: Result<Json<SubmitTransactionRequest>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(req)) => state.gateway.submit_transaction(req).await,
        Err(rejection) => Err(bad_body(rejection)),
    };
    state.metrics.record_request("submit_transaction", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "transaction relay failed");
            write_error(e, "submit transaction", "Failed to submit transaction")
        }
    }
}

/// `GET /token-balance?address=` — PDOT balance.
///
/// Decode and simulation problems come back as 200 with balance `"0"`.
/// Only transport-level failures are a 500, and they still carry a
/// balance of `"0"`.
async fn token_balance_handler(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Response {
    let result = state.gateway.token_balance(query.address.as_deref()).await;
    state.metrics.record_request("token_balance", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) if e.is_client_error() || matches!(e, GatewayError::Configuration(_)) => {
            (status_for(&e), Json(ErrorResponse { error: e.to_string() })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "token balance failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "balance": "0",
                    "error": format!("Failed to fetch token balance: {}", e),
                    "debug": {
                        "errorKind": e.kind(),
                        "errorMessage": e.to_string(),
                        "contractId": state.gateway.config().token_contract.clone(),
                    },
                })),
            )
                .into_response()
        }
    }
}

/// `GET /vault-balance?address=` — the user's deposited principal.
async fn vault_balance_handler(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Response {
    let result = state.gateway.vault_balance(query.address.as_deref()).await;
    state.metrics.record_request("vault_balance", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "vault balance failed");
            read_error(e, "query vault balance", "Failed to fetch vault balance")
        }
    }
}

/// `GET /ptoken-balance?address=` — the user's pToken holdings.
async fn ptoken_balance_handler(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Response {
    let result = state.gateway.ptoken_balance(query.address.as_deref()).await;
    state.metrics.record_request("ptoken_balance", outcome(&result));

    match result {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ptoken balance failed");
            read_error(e, "query pToken balance", "Failed to fetch pToken balance")
        }
    }
}

/// `GET /vault-stats` — vault totals. Individual failed reads report `"0"`.
async fn vault_stats_handler(State(state): State<AppState>) -> Response {
    let result = state.gateway.vault_stats().await;
    state.metrics.record_request("vault_stats", outcome(&result));

    match result {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "vault stats failed");
            read_error(e, "query vault statistics", "Failed to fetch vault statistics")
        }
    }
}

/// `POST /chat` — one assistant reply.
async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) if req.message.as_deref().is_some_and(|m| !m.trim().is_empty()) => req,
        _ => {
            state.metrics.record_request("chat", "validation");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Message is required".into(),
                }),
            )
                .into_response();
        }
    };

    let result = state.chat.complete(&req).await;
    state.metrics.record_request("chat", outcome(&result));

    match result {
        Ok(message) => (StatusCode::OK, Json(json!({ "message": message }))).into_response(),
        Err(e) => {
            tracing::error!(provider = state.chat.name(), error = %e, "chat completion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate response".into(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use peridot_protocol::chat::FallbackChat;
    use peridot_protocol::invocation::{NativeValue, StubInvoker};
    use peridot_protocol::soroban::StubRelay;
    use peridot_protocol::GatewayConfig;
    use tower::ServiceExt;

    const USER: &str = "GAQVF6GRTN4R2JCFGJBOCXZOVNWLPT72PNVF5UYAS6LA4BUYQHNRET46";
    const CONTRACT: &str = "CADQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQP5KR";
    const MINTER: &str = "GB43KVROR7TFJ6KAPCYRF2FJROTZAH4FHLTJLPWX4DRZCC5NASLGITR6";
    const MINTER_SECRET: &str = "SAAQEAYEAUDAOCAJBIFQYDIOB4IBCEQTCQKRMFYYDENBWHA5DYPSBF5K";

    fn configured() -> GatewayConfig {
        GatewayConfig {
            vault_contract: Some(CONTRACT.into()),
            token_contract: Some(CONTRACT.into()),
            minter_address: Some(MINTER.into()),
            minter_secret: Some(MINTER_SECRET.into()),
            ..GatewayConfig::default()
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatProvider for FailingChat {
        async fn complete(&self, _request: &ChatRequest) -> peridot_protocol::Result<String> {
            Err(GatewayError::Chat("upstream 503".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Builds a router over a scripted invoker and returns the invoker for
    /// call assertions.
    fn test_router_with(config: GatewayConfig, stub: StubInvoker) -> (Router, Arc<StubInvoker>) {
        let stub = Arc::new(stub);
        let gateway = Gateway::new(config, stub.clone(), Arc::new(StubRelay::new()));
        let state = AppState {
            version: "0.1.0-test".into(),
            gateway,
            chat: Arc::new(FallbackChat),
            metrics: Arc::new(crate::metrics::GatewayMetrics::new().unwrap()),
        };
        (create_router(state), stub)
    }

    fn test_router(stub: StubInvoker) -> (Router, Arc<StubInvoker>) {
        test_router_with(configured(), stub)
    }

    /// Sends a GET request and returns (status, parsed JSON body).
    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Sends a POST request with JSON body and returns (status, parsed JSON body).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    // -- Health ---------------------------------------------------------------

    #[tokio::test]
    async fn health_reports_network_and_invoker() {
        let (router, _) = test_router(StubInvoker::new());
        let (status, json) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["network"], "testnet");
        assert_eq!(json["invoker"], "stub");
    }

    // -- Deposit --------------------------------------------------------------

    #[tokio::test]
    async fn deposit_missing_fields_is_400_without_invocation() {
        let (router, stub) = test_router(StubInvoker::new().with_envelope("deposit", "AAAA"));

        let (status, json) = post_json(&router, "/deposit", json!({ "amount": "1" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "User address and amount are required");

        let (status, _) = post_json(&router, "/deposit", json!({ "userAddress": USER })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn deposit_returns_stubbed_envelope() {
        let (router, _) = test_router(StubInvoker::new().with_envelope("deposit", "AAAAAgAAAAA="));
        let (status, json) = post_json(
            &router,
            "/deposit",
            json!({ "userAddress": USER, "amount": "1.5" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!({ "success": true, "transactionXdr": "AAAAAgAAAAA=", "amount": "1.5" })
        );
    }

    #[tokio::test]
    async fn deposit_echoes_numeric_amount() {
        let (router, _) = test_router(StubInvoker::new().with_envelope("deposit", "AAAA"));
        let (status, json) =
            post_json(&router, "/deposit", json!({ "userAddress": USER, "amount": 2 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["amount"], 2);
    }

    #[tokio::test]
    async fn deposit_execution_failure_carries_process_output() {
        let (router, _) = test_router(StubInvoker::new().with_error(
            "deposit",
            GatewayError::ExecutionFailure {
                message: "exit status 1".into(),
                stdout: "".into(),
                stderr: "error: account not found".into(),
            },
        ));
        let (status, json) = post_json(
            &router,
            "/deposit",
            json!({ "userAddress": USER, "amount": "1" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to build deposit transaction");
        assert_eq!(json["details"]["stderr"], "error: account not found");
    }

    #[tokio::test]
    async fn deposit_without_vault_is_500() {
        let (router, stub) = test_router_with(GatewayConfig::default(), StubInvoker::new());
        let (status, json) = post_json(
            &router,
            "/deposit",
            json!({ "userAddress": USER, "amount": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Vault contract not configured");
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (router, _) = test_router(StubInvoker::new());
        let req = Request::builder()
            .method("POST")
            .uri("/deposit")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    // -- Withdraw -------------------------------------------------------------

    #[tokio::test]
    async fn withdraw_requires_ptoken_amount() {
        let (router, _) = test_router(StubInvoker::new());
        let (status, json) =
            post_json(&router, "/withdraw", json!({ "userAddress": USER })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "User address and pToken amount are required");
    }

    // -- Mint -----------------------------------------------------------------

    #[tokio::test]
    async fn mint_without_secrets_is_configuration_500() {
        let config = GatewayConfig {
            token_contract: Some(CONTRACT.into()),
            ..GatewayConfig::default()
        };
        let (router, stub) = test_router_with(config, StubInvoker::new().with_submitted("mint", "h"));
        let (status, json) =
            post_json(&router, "/mint-tokens", json!({ "userAddress": USER })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "success": false, "error": "Server configuration error" }));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn mint_returns_hash() {
        let hash = "0".repeat(64);
        let (router, _) = test_router(StubInvoker::new().with_submitted("mint", &hash));
        let (status, json) =
            post_json(&router, "/mint-tokens", json!({ "userAddress": USER })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Successfully minted 1000 PDOT tokens");
        assert_eq!(json["transactionHash"], hash);
    }

    #[tokio::test]
    async fn mint_translates_contract_trap() {
        let (router, _) = test_router(StubInvoker::new().with_error(
            "mint",
            GatewayError::SimulationFailure("Error(WasmVm, InvalidAction) UnreachableCodeReached".into()),
        ));
        let (status, json) =
            post_json(&router, "/mint-tokens", json!({ "userAddress": USER })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Token contract has implementation issues - contact admin");
    }

    // -- Reads ----------------------------------------------------------------

    #[tokio::test]
    async fn token_balance_decode_failure_is_200_zero() {
        let (router, _) = test_router(StubInvoker::new().with_error(
            "balance",
            GatewayError::Decode {
                message: "unsupported return type map".into(),
                raw: "AAAAEQ==".into(),
            },
        ));
        let (status, json) = get(&router, &format!("/token-balance?address={}", USER)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["balance"], "0");
        assert_eq!(json["address"], USER);
    }

    #[tokio::test]
    async fn token_balance_transport_failure_is_500_zero() {
        let (router, _) = test_router(
            StubInvoker::new().with_error("balance", GatewayError::Transport("connection refused".into())),
        );
        let (status, json) = get(&router, &format!("/token-balance?address={}", USER)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["balance"], "0");
    }

    #[tokio::test]
    async fn token_balance_requires_address() {
        let (router, _) = test_router(StubInvoker::new());
        let (status, json) = get(&router, "/token-balance").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Address parameter is required");
    }

    #[tokio::test]
    async fn vault_balance_converts_units() {
        let (router, _) = test_router(
            StubInvoker::new().with_value("get_user_balance", NativeValue::Int(1_000_000_000)),
        );
        let (status, json) = get(&router, &format!("/vault-balance?address={}", USER)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["balance"], "1");
        assert_eq!(json["rawOutput"], "1000000000");
    }

    #[tokio::test]
    async fn vault_balance_execution_failure_has_details() {
        let (router, _) = test_router(StubInvoker::new().with_error(
            "get_user_balance",
            GatewayError::ExecutionFailure {
                message: "exit status 1".into(),
                stdout: "".into(),
                stderr: "network error".into(),
            },
        ));
        let (status, json) = get(&router, &format!("/vault-balance?address={}", USER)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to query vault balance");
        assert_eq!(json["details"]["stderr"], "network error");
    }

    #[tokio::test]
    async fn ptoken_balance_is_served() {
        let (router, _) = test_router(
            StubInvoker::new().with_value("get_ptoken_balance", NativeValue::Int(250_000_000)),
        );
        let (status, json) = get(&router, &format!("/ptoken-balance?address={}", USER)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["balance"], "0.25");
    }

    #[tokio::test]
    async fn vault_stats_survives_one_failed_read() {
        let (router, _) = test_router(
            StubInvoker::new()
                .with_value("get_total_deposited", NativeValue::Int(5_000_000_000))
                .with_value("get_total_ptokens", NativeValue::Int(4_000_000_000))
                .with_error("get_exchange_rate", GatewayError::SimulationFailure("trap".into())),
        );
        let (status, json) = get(&router, "/vault-stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!({
                "totalDeposited": "5",
                "totalPTokens": "4",
                "exchangeRate": "0",
                "userShare": "0",
            })
        );
    }

    // -- Relay ----------------------------------------------------------------

    #[tokio::test]
    async fn submit_transaction_requires_xdr() {
        let (router, _) = test_router(StubInvoker::new());
        let (status, json) = post_json(&router, "/submit-transaction", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Signed transaction XDR is required");

        let (status, json) =
            post_json(&router, "/submit-transaction", json!({ "signedTxXdr": "AAAA" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn rejected_relay_is_500_with_hash() {
        let relay = StubRelay::failing(GatewayError::SubmissionFailure {
            message: "tx_bad_seq".into(),
            hash: Some("ab".repeat(32)),
        });
        let gateway = Gateway::new(configured(), Arc::new(StubInvoker::new()), Arc::new(relay));
        let state = AppState {
            version: "0.1.0-test".into(),
            gateway,
            chat: Arc::new(FallbackChat),
            metrics: Arc::new(crate::metrics::GatewayMetrics::new().unwrap()),
        };
        let metrics = state.metrics.clone();
        let router = create_router(state);

        let (status, json) =
            post_json(&router, "/submit-transaction", json!({ "signedTxXdr": "AAAA" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "tx_bad_seq");
        assert_eq!(json["transactionHash"], "ab".repeat(32));
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["submit_transaction", "submission"])
                .get(),
            1
        );
    }

    // -- Chat -----------------------------------------------------------------

    #[tokio::test]
    async fn chat_requires_message() {
        let (router, _) = test_router(StubInvoker::new());
        let (status, json) = post_json(&router, "/chat", json!({ "history": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Message is required");
    }

    #[tokio::test]
    async fn chat_falls_back_without_provider() {
        let (router, _) = test_router(StubInvoker::new());
        let (status, json) =
            post_json(&router, "/chat", json!({ "message": "hi", "history": [] })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn chat_provider_failure_is_500() {
        let gateway = Gateway::new(configured(), Arc::new(StubInvoker::new()), Arc::new(StubRelay::new()));
        let router = create_router(AppState {
            version: "0.1.0-test".into(),
            gateway,
            chat: Arc::new(FailingChat),
            metrics: Arc::new(crate::metrics::GatewayMetrics::new().unwrap()),
        });
        let (status, json) = post_json(&router, "/chat", json!({ "message": "hi" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to generate response");
    }
}
