//! Client kit for Openfort embedded wallets.
//!
//! The kit layers wallet connection and email authentication on top of the
//! Openfort backend. It exposes three facilities:
//!
//! - [`registry`] — a process-wide holder of one configured [`Client`],
//!   initialized once at application bootstrap.
//! - [`verification`] — the two-phase email verification flow, driven by the
//!   query parameters of the redirect URL the user lands on.
//! - [`transports`] — pure construction of per-chain RPC transport fallback
//!   lists for the wallet connector layer.
//!
//! # Example
//!
//! ```no_run
//! use openfort_kit::{registry, ClientConfig, Environment};
//!
//! let config = ClientConfig::new("pk_test_123").with_environment(Environment::Staging);
//! let client = registry::get_or_init(Some(config)).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The Openfort environment a client targets.
///
/// Generally an app/client will run against a single environment for its
/// whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Pre-production backend for development and testing.
    Staging,
    /// Live backend.
    Production,
}

mod error;
pub use error::*;

mod config;
pub use config::*;

mod client;
pub use client::*;

pub mod registry;
pub mod transports;
pub mod verification;

// private modules
mod request;
