//! HTTP Digest authentication, client side.
//!
//! The gateway answers an unauthenticated request with a `WWW-Authenticate:
//! Digest ...` challenge. [`challenge`] turns that header into a
//! [`DigestChallenge`]; [`response`] computes the `Authorization` header for the
//! next request (MD5, `qop=auth`, nonce count 1).
//!
//! Challenges are single-use: every command fetches a fresh one.

pub mod challenge;
pub mod response;

pub use challenge::*;
pub use response::*;

/// Errors raised while interpreting a Digest challenge.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Server response carries no WWW-Authenticate: Digest challenge")]
    MissingHeader,
    #[error("Digest challenge lacks the '{0}' directive")]
    MissingDirective(&'static str),
    #[error("Digest challenge does not offer qop=auth (offered: {0})")]
    UnsupportedQop(String),
    #[error("Unsupported Digest algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
