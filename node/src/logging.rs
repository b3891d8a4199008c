//! # Structured Logging
//!
//! Gateway logs go to stderr through `tracing-subscriber`. Operations log
//! contract ids, user addresses, amounts and transaction hashes as
//! structured fields; the minter secret is never a field.
//!
//! stdout is left to `peridot-node status` and `peridot-node version`.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set. `tower_http=debug` logs one
/// span per dashboard request.
pub const DEFAULT_FILTER: &str = "peridot_node=info,peridot_protocol=info,tower_http=debug";

/// Log output format, selected with `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored lines with source locations, for running the gateway locally.
    Pretty,
    /// One JSON object per event, for shipping to a log collector.
    Json,
}

/// Installs the global subscriber. Must run once, before the gateway is
/// wired up, so configuration warnings are captured.
///
/// `RUST_LOG` replaces `default_filter` entirely, e.g. to trace every
/// Soroban RPC call:
///
/// ```text
/// RUST_LOG=peridot_protocol=debug,peridot_node=info
/// ```
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    tracing::debug!(?format, "logging ready");
}
