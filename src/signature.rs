//! Request signatures and callback verification.
//!
//! Outbound commands carry a `signature` field: the lowercase hex SHA-256 of the
//! canonical JSON text of the payload with the signing salt appended. This is a
//! plain hash over a concatenated string, not an HMAC.
//!
//! Inbound callbacks are verified against the callback salt, but the gateway
//! hashes a *doubly* JSON-encoded payload there: the payload without its
//! `signature` is encoded to text, and that text is encoded again as a JSON
//! string literal before the salt is appended. This looks accidental, but it is
//! what the gateway computes, so it is reproduced exactly.

use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::json::{self, JsonDialect};
use crate::params::{ParamTree, ParamValue};

/// Name of the field holding the signature, in both directions.
pub const SIGNATURE_FIELD: &str = "signature";

/// Errors from verifying a callback payload.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Callback payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Callback payload is not a JSON object")]
    NotAnObject,
}

/// Computes the request signature of `tree` with `salt`.
///
/// `tree` must not already contain a `signature` field if the result is meant
/// for the gateway; the signature never covers itself.
pub fn sign(tree: &ParamTree, salt: &str, dialect: JsonDialect) -> String {
    sha256_hex(&tree.to_json(dialect), salt)
}

/// Verifies the signature of a callback body sent by the gateway.
///
/// Returns `Ok(false)` when the signature is absent, not a string, or does not
/// match. Malformed JSON and non-object payloads are errors, never `false`.
pub fn verify_callback(
    json_payload: &str,
    callback_salt: &str,
    dialect: JsonDialect,
) -> Result<bool, SignatureError> {
    let payload: Value = serde_json::from_str(json_payload)?;
    let Value::Object(mut fields) = payload else {
        return Err(SignatureError::NotAnObject);
    };
    let provided = match fields.shift_remove(SIGNATURE_FIELD) {
        Some(Value::String(signature)) => signature,
        _ => {
            tracing::debug!("Callback payload has no string signature field");
            return Ok(false);
        }
    };
    let expected = callback_signature(&Value::Object(fields), callback_salt, dialect);
    Ok(bool::from(provided.as_bytes().ct_eq(expected.as_bytes())))
}

/// The signature the gateway puts on a callback carrying `fields`.
///
/// `fields` must not contain the signature itself; map order is significant.
pub fn callback_signature(fields: &Value, callback_salt: &str, dialect: JsonDialect) -> String {
    let encoded = json::encode_value(fields, dialect);
    let double_encoded = json::encode_str(&encoded, dialect);
    sha256_hex(&double_encoded, callback_salt)
}

fn sha256_hex(text: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// A canonical payload together with its signature.
///
/// Built by [`SignedRequest::new`], which computes the signature over the tree
/// before the `signature` field exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    params: ParamTree,
    signature: String,
}

impl SignedRequest {
    /// Signs `params`. An existing `signature` entry is dropped first.
    pub fn new(mut params: ParamTree, salt: &str, dialect: JsonDialect) -> Self {
        params.remove(SIGNATURE_FIELD);
        let signature = sign(&params, salt, dialect);
        Self { params, signature }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The signed parameters, without the signature field.
    pub fn params(&self) -> &ParamTree {
        &self.params
    }

    /// The full payload as sent: parameters plus the `signature` field.
    pub fn payload(&self) -> ParamTree {
        self.params
            .clone()
            .with(SIGNATURE_FIELD, ParamValue::from(self.signature.as_str()))
    }

    /// Form-encoded request body including the signature.
    pub fn to_form_body(&self) -> String {
        self.payload().to_form_body()
    }
}
