//! Client for the [Start2Pay](https://start2pay.com) payment gateway API.
//!
//! The gateway authenticates every command twice: the payload carries a
//! `signature` computed over its canonical JSON text, and the HTTP request itself
//! is authenticated with HTTP Digest against a challenge fetched just before.
//! Both must be bit-exact with what the gateway computes on its side.
//!
//! # Modules
//!
//! - [`params`]: parameter trees with canonical (byte-sorted) key order.
//! - [`json`]: the gateway's JSON text dialect, used for signing.
//! - [`signature`]: request signatures and callback verification.
//! - [`digest`]: Digest challenge parsing and `Authorization` computation.
//! - [`envelope`]: extraction of the JSON payload from command responses.
//! - [`config`]: configuration file, environment references, credentials.
//! - [`client`]: [`Start2PayClient`], which runs the whole exchange.
//!
//! # Features
//!
//! - `telemetry`: opens a `tracing` span per command and records its outcome
//!   as `otel.status_code`.

pub mod client;
pub mod config;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod json;
pub mod params;
pub mod signature;

pub use client::{CONTEXT_CREATE_PATH, PaymentDirection, Start2PayClient};
pub use config::{Config, ConfigError, Credentials};
pub use error::{Error, TransportError};
pub use json::JsonDialect;
pub use params::{ParamTree, ParamValue, canonicalize};
pub use signature::{SignedRequest, sign, verify_callback};
