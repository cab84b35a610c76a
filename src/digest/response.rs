//! The `Authorization: Digest ...` header.

use md5::{Digest, Md5};
use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use super::DigestChallenge;

/// Nonce count. Challenges are never reused, so this is always the first use.
pub const NONCE_COUNT: &str = "00000001";

/// Client nonce used by [`Cnonce::default`].
pub const DEFAULT_CNONCE: &str = "0a4f113b";

/// How the client nonce is chosen for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cnonce {
    /// The same value on every request.
    Fixed(String),
    /// 16 random hex digits per request.
    Random,
}

impl Default for Cnonce {
    fn default() -> Self {
        Cnonce::Fixed(DEFAULT_CNONCE.to_string())
    }
}

/// `"random"` (any case) selects [`Cnonce::Random`]; any other text is fixed.
impl FromStr for Cnonce {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("random") {
            Ok(Cnonce::Random)
        } else {
            Ok(Cnonce::Fixed(s.to_string()))
        }
    }
}

impl Cnonce {
    pub fn generate(&self) -> String {
        match self {
            Cnonce::Fixed(value) => value.clone(),
            Cnonce::Random => format!("{:016x}", rand::random::<u64>()),
        }
    }
}

/// A computed Digest response, ready to be rendered as an `Authorization` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestAuthorization {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub cnonce: String,
    pub nc: String,
    pub qop: String,
    pub response: String,
    pub opaque: String,
    pub algorithm: String,
}

impl DigestAuthorization {
    /// Answers `challenge` for a `method` request to `uri` (the request path).
    pub fn compute(
        challenge: &DigestChallenge,
        username: &str,
        password: &str,
        method: &http::Method,
        uri: &str,
        cnonce: String,
    ) -> Self {
        let ha1 = md5_hex(&format!("{username}:{}:{password}", challenge.realm));
        let ha2 = md5_hex(&format!("{}:{uri}", method.as_str()));
        let response = md5_hex(&format!(
            "{ha1}:{}:{NONCE_COUNT}:{cnonce}:{}:{ha2}",
            challenge.nonce, challenge.qop
        ));
        tracing::trace!(realm = %challenge.realm, uri, "Computed digest response");
        Self {
            username: username.to_string(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            cnonce,
            nc: NONCE_COUNT.to_string(),
            qop: challenge.qop.clone(),
            response,
            opaque: challenge.opaque.clone(),
            algorithm: challenge.algorithm.clone(),
        }
    }
}

impl Display for DigestAuthorization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", cnonce=\"{}\", nc={}, qop=\"{}\", response=\"{}\", opaque=\"{}\", algorithm=\"{}\"",
            self.username,
            self.realm,
            self.nonce,
            self.uri,
            self.cnonce,
            self.nc,
            self.qop,
            self.response,
            self.opaque,
            self.algorithm
        )
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}
