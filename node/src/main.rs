// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Peridot Gateway Node
//!
//! Entry point for the `peridot-node` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the configured contract invoker
//! into the gateway, and serves the dashboard API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the gateway
//! - `status`  — query a running gateway's health endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use peridot_protocol::chat::{ChatProvider, FallbackChat, OpenAiChat};
use peridot_protocol::invocation::{CliInvoker, SdkInvoker};
use peridot_protocol::soroban::SorobanRpcClient;
use peridot_protocol::{ContractInvoker, Gateway, InvokerKind};

use cli::{Commands, PeridotNodeCli};
use metrics::{GatewayMetrics, InstrumentedInvoker};

/// Timeout for the `status` subcommand's health request.
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PeridotNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(*args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the gateway: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    let invoker_kind = InvokerKind::from(args.invoker);
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        network = %args.network,
        rpc_url = %args.rpc_url,
        invoker = invoker_kind.as_str(),
        "starting peridot-node"
    );

    // --- Configuration ---
    let config = args.gateway_config();
    let report = config.validate().context("invalid gateway configuration")?;
    for setting in &report.missing {
        tracing::warn!(setting, "not configured; operations that need it will fail");
    }

    // --- Metrics ---
    let gateway_metrics =
        Arc::new(GatewayMetrics::new().context("failed to register metrics")?);

    // --- Contract invocation ---
    let rpc = Arc::new(
        SorobanRpcClient::new(config.rpc_url.clone())
            .with_confirmation(config.confirmation_polls, config.confirmation_interval),
    );
    let backend: Arc<dyn ContractInvoker> = match invoker_kind {
        InvokerKind::Cli => Arc::new(CliInvoker::from_config(&config)),
        InvokerKind::Sdk => Arc::new(SdkInvoker::from_config(&config, Arc::clone(&rpc))),
    };
    let invoker = Arc::new(InstrumentedInvoker::new(backend, Arc::clone(&gateway_metrics)));

    // --- Chat ---
    let chat: Arc<dyn ChatProvider> = match args.openai_api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Arc::new(
            OpenAiChat::new(key)
                .with_base_url(args.openai_base_url.clone())
                .with_model(args.openai_model.clone()),
        ),
        _ => {
            tracing::info!("no chat API key configured, using canned replies");
            Arc::new(FallbackChat)
        }
    };
    tracing::info!(provider = chat.name(), "chat provider ready");

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        gateway: Gateway::new(config, invoker, rpc),
        chat,
        metrics: Arc::clone(&gateway_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&gateway_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("peridot-node stopped");
    Ok(())
}

/// Queries a running gateway's health endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(STATUS_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let resp = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;
    let status = resp.status();
    let body: serde_json::Value = resp
        .json()
        .await
        .with_context(|| format!("unexpected response from {}", url))?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        anyhow::bail!("gateway answered {}", status);
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("peridot-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the corresponding branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
