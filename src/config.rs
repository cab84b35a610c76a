//! Client configuration.
//!
//! Configuration is a JSON document:
//!
//! ```json
//! {
//!   "auth": {
//!     "host": "https://api.start2pay.com",
//!     "username": "$S2P_USERNAME",
//!     "password": "${S2P_PASSWORD}",
//!     "salt": "$S2P_SALT",
//!     "callback_salt": "$S2P_CALLBACK_SALT"
//!   },
//!   "display_options": { "language": "ru", "iframe": true },
//!   "available_payment_systems": { "in": ["visa"], "out": [] },
//!   "cnonce": "0a4f113b",
//!   "timeout_secs": 30
//! }
//! ```
//!
//! String values under `auth`, and `cnonce`, may reference environment variables
//! with `$VAR` or `${VAR}`; see [`LiteralOrEnv`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::client::PaymentDirection;
use crate::digest::Cnonce;
use crate::params::ParamValue;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing or empty auth field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid gateway host {0:?}: {1}")]
    InvalidHost(String, #[source] url::ParseError),
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Full client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub display_options: DisplayOptions,
    #[serde(default)]
    pub available_payment_systems: AvailablePaymentSystems,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnonce: Option<LiteralOrEnv<Cnonce>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            auth,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config: Config = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Validated credentials. Fails before any network call when a field is
    /// missing or empty, or when the host is not a URL.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let auth = &self.auth;
        Credentials::new(
            required("host", &auth.host)?,
            required("username", &auth.username)?,
            required("password", &auth.password)?,
            required("salt", &auth.salt)?,
            required("callback_salt", &auth.callback_salt)?,
        )
    }

    /// Client nonce strategy; the fixed default when not configured.
    pub fn cnonce(&self) -> Cnonce {
        self.cnonce
            .as_ref()
            .map(|cnonce| cnonce.inner().clone())
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn required(
    name: &'static str,
    value: &Option<LiteralOrEnv<String>>,
) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.inner().clone()),
        _ => Err(ConfigError::MissingField(name)),
    }
}

/// The `auth` section. Every field is required; emptiness is checked by
/// [`Config::credentials`] rather than at parse time.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub host: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub username: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub password: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub salt: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub callback_salt: Option<LiteralOrEnv<String>>,
}

impl AuthConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        salt: impl Into<String>,
        callback_salt: impl Into<String>,
    ) -> Self {
        let literal = |value: String| Some(LiteralOrEnv::from_literal(value));
        Self {
            host: literal(host.into()),
            username: literal(username.into()),
            password: literal(password.into()),
            salt: literal(salt.into()),
            callback_salt: literal(callback_salt.into()),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("salt", &redacted(&self.salt))
            .field("callback_salt", &redacted(&self.callback_salt))
            .finish()
    }
}

fn redacted<T>(value: &Option<T>) -> &'static str {
    if value.is_some() { "<redacted>" } else { "<unset>" }
}

/// Defaults for the `display_options` mapping of a payment context.
///
/// Each is copied into the request only when the caller left that key blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iframe: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_additional_tabs: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_payment_currency: Option<ParamValue>,
}

impl DisplayOptions {
    /// Configured, non-blank defaults by key.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        [
            ("language", &self.language),
            ("iframe", &self.iframe),
            ("theme", &self.theme),
            ("device", &self.device),
            ("message", &self.message),
            ("description", &self.description),
            ("close_additional_tabs", &self.close_additional_tabs),
            ("disable_payment_currency", &self.disable_payment_currency),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .filter(|value| !value.is_blank())
                .map(|value| (key, value))
        })
    }
}

/// Payment systems offered on the gateway form, per direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailablePaymentSystems {
    #[serde(rename = "in", default)]
    pub incoming: Vec<String>,
    #[serde(rename = "out", default)]
    pub outgoing: Vec<String>,
}

impl AvailablePaymentSystems {
    pub fn for_direction(&self, direction: PaymentDirection) -> &[String] {
        match direction {
            PaymentDirection::In => &self.incoming,
            PaymentDirection::Out => &self.outgoing,
        }
    }
}

/// Validated connection credentials. Immutable; shared between clones of a
/// client.
#[derive(Clone)]
pub struct Credentials(Arc<CredentialsInner>);

struct CredentialsInner {
    host: Url,
    username: String,
    password: String,
    salt: String,
    callback_salt: String,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        salt: impl Into<String>,
        callback_salt: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |name: &'static str, value: String| {
            if value.is_empty() {
                Err(ConfigError::MissingField(name))
            } else {
                Ok(value)
            }
        };
        let host = non_empty("host", host.into())?;
        let username = non_empty("username", username.into())?;
        let password = non_empty("password", password.into())?;
        let salt = non_empty("salt", salt.into())?;
        let callback_salt = non_empty("callback_salt", callback_salt.into())?;
        let host = Url::parse(&host).map_err(|e| ConfigError::InvalidHost(host.clone(), e))?;
        Ok(Self(Arc::new(CredentialsInner {
            host,
            username,
            password,
            salt,
            callback_salt,
        })))
    }

    pub fn host(&self) -> &Url {
        &self.0.host
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }

    pub fn password(&self) -> &str {
        &self.0.password
    }

    pub fn salt(&self) -> &str {
        &self.0.salt
    }

    pub fn callback_salt(&self) -> &str {
        &self.0.callback_salt
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.0.host.as_str())
            .field("username", &self.0.username)
            .field("password", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("callback_salt", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Environment Variable Resolution
// ============================================================================

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"https://api.start2pay.com"`
/// - Simple env var: `"$S2P_SALT"`
/// - Braced env var: `"${S2P_SALT}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if `s` is `$VAR` or `${VAR}`.
    fn env_var_name(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Some(braced)
        } else {
            s.strip_prefix('$').filter(|name| {
                !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
            })
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for LiteralOrEnv<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = match Self::env_var_name(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?,
            None => s,
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl Serialize for LiteralOrEnv<String> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl Serialize for LiteralOrEnv<Cnonce> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.0 {
            Cnonce::Fixed(value) => serializer.serialize_str(value),
            Cnonce::Random => serializer.serialize_str("random"),
        }
    }
}
