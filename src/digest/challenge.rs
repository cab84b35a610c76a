//! Parsing of raw header blocks and Digest challenges.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::str::FromStr;

use super::ChallengeError;

/// Key under which [`parse_headers`] stores the status line.
pub const HTTP_CODE_KEY: &str = "http_code";

/// Name of the challenge header.
pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";

static DIGEST_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*digest\b").expect("valid regex"));

/// Parses a raw HTTP header block (`\r\n`-separated) into a map.
///
/// The first non-empty line is the status line and is stored under
/// [`HTTP_CODE_KEY`]. Every other line is split on the first `": "`; lines
/// without that separator are skipped. Later duplicates overwrite earlier ones.
///
/// ```rust
/// use start2pay::digest::{parse_headers, HTTP_CODE_KEY};
///
/// let headers = parse_headers("HTTP/1.1 401 Unauthorized\r\nServer: nginx\r\n\r\n");
/// assert_eq!(headers[HTTP_CODE_KEY], "HTTP/1.1 401 Unauthorized");
/// assert_eq!(headers["Server"], "nginx");
/// ```
pub fn parse_headers(text: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    let mut lines = text.split("\r\n").filter(|line| !line.is_empty());
    if let Some(status_line) = lines.next() {
        headers.insert(HTTP_CODE_KEY.to_string(), status_line.to_string());
    }
    for line in lines {
        if let Some((key, value)) = line.split_once(": ") {
            headers.insert(key.to_string(), value.to_string());
        }
    }
    headers
}

/// Looks up a header in a [`parse_headers`] map, ignoring ASCII case.
pub fn header_ignore_case<'a>(
    headers: &'a HashMap<String, String>,
    name: &str,
) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Whether a `WWW-Authenticate` value uses the `Digest` scheme.
pub fn is_digest_challenge(header_value: &str) -> bool {
    DIGEST_SCHEME.is_match(header_value)
}

/// Picks the first `Digest` challenge out of several `WWW-Authenticate` values.
///
/// ```rust
/// use start2pay::digest::select_digest_challenge;
///
/// let offered = [r#"Basic realm="r""#, r#"Digest realm="r", nonce="n", qop="auth""#];
/// assert_eq!(select_digest_challenge(offered), Some(offered[1]));
/// assert_eq!(select_digest_challenge([r#"Basic realm="r""#]), None);
/// ```
pub fn select_digest_challenge<'a, I>(values: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().find(|value| is_digest_challenge(value))
}

/// Directives of a `WWW-Authenticate: Digest` challenge.
///
/// `opaque` and `algorithm` are empty strings when the server did not send them.
/// `qop` is always `auth`: [`parse_challenge`] rejects challenges that do not
/// offer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: String,
    pub opaque: String,
    pub algorithm: String,
}

/// Parses the value of a `WWW-Authenticate` header.
///
/// A leading `Digest` token is stripped case-insensitively. Directives are
/// separated by commas outside double quotes, split on their first `=`, and
/// surrounding quotes are removed from values.
///
/// ```rust
/// use start2pay::digest::parse_challenge;
///
/// let challenge = parse_challenge(r#"Digest realm="x", nonce="y", qop="auth""#).unwrap();
/// assert_eq!(challenge.realm, "x");
/// assert_eq!(challenge.nonce, "y");
/// assert_eq!(challenge.qop, "auth");
/// assert_eq!(challenge.opaque, "");
/// assert_eq!(challenge.algorithm, "");
/// ```
pub fn parse_challenge(header_value: &str) -> Result<DigestChallenge, ChallengeError> {
    let directives = parse_directives(&DIGEST_SCHEME.replace(header_value, ""));
    let directive = |name: &str| {
        directives
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    };

    let realm = directive("realm").ok_or(ChallengeError::MissingDirective("realm"))?;
    let nonce = directive("nonce").ok_or(ChallengeError::MissingDirective("nonce"))?;
    let offered_qop = directive("qop").ok_or(ChallengeError::MissingDirective("qop"))?;
    let opaque = directive("opaque").unwrap_or_default();
    let algorithm = directive("algorithm").unwrap_or_default();

    let qop = select_qop(&offered_qop)?;
    if !algorithm.is_empty() && !algorithm.eq_ignore_ascii_case("MD5") {
        return Err(ChallengeError::UnsupportedAlgorithm(algorithm));
    }

    Ok(DigestChallenge {
        realm,
        nonce,
        qop,
        opaque,
        algorithm,
    })
}

impl FromStr for DigestChallenge {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_challenge(s)
    }
}

/// Picks `auth` out of a possibly comma-separated qop offer.
fn select_qop(offered: &str) -> Result<String, ChallengeError> {
    offered
        .split(',')
        .map(str::trim)
        .find(|option| option.eq_ignore_ascii_case("auth"))
        .map(str::to_string)
        .ok_or_else(|| ChallengeError::UnsupportedQop(offered.to_string()))
}

/// Splits `key=value, key="value, with comma"` into trimmed, unquoted pairs.
fn parse_directives(input: &str) -> Vec<(String, String)> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => pieces.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    pieces.push(current);

    pieces
        .iter()
        .filter_map(|piece| {
            let (key, value) = piece.trim().split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
