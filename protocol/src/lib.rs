// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Peridot Gateway — Core Library
//!
//! Server-side operations behind the Peridot vault dashboard. The vault and
//! the PDOT token are Soroban smart contracts; this crate builds the
//! contract calls for them, runs those calls through one of two
//! interchangeable backends, and maps the results into the dashboard's
//! JSON shapes.
//!
//! ## Architecture
//!
//! - **units** — Fixed-point amount conversion (9 decimals for tokens,
//!   6 for the exchange rate).
//! - **invocation** — The `ContractInvoker` interface and its CLI and
//!   in-process backends.
//! - **soroban** — Soroban RPC client, strkeys, signing and XDR
//!   transaction plumbing.
//! - **operations** — Deposit, withdraw, faucet mint, balance and
//!   statistics reads, signed-transaction relay.
//! - **chat** — The dashboard's assistant chat provider.
//! - **config** — Network constants and the validated gateway
//!   configuration.
//! - **error** — The error taxonomy shared by all of the above.
//!
//! ## Signing
//!
//! User transactions are only ever *built* here. The user's wallet signs
//! them. The one server-held key is the faucet minter.

pub mod chat;
pub mod config;
pub mod error;
pub mod invocation;
pub mod operations;
pub mod soroban;
pub mod units;

pub use config::{GatewayConfig, InvokerKind};
pub use error::{GatewayError, Result};
pub use invocation::{ContractCall, ContractInvoker, InvocationResult};
pub use operations::Gateway;
