//! Crate-level error type.

use http::StatusCode;

use crate::config::ConfigError;
use crate::digest::ChallengeError;
use crate::envelope::ProtocolError;
use crate::signature::SignatureError;

/// Failures of the HTTP exchange with the gateway.
///
/// `context` names the request that failed, e.g. `"POST challenge probe"`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("URL join error: {context}: {source}")]
    UrlJoin {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Any failure of a gateway operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}
