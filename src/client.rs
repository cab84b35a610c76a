//! A client for the Start2Pay gateway API.
//!
//! Every command runs the same pipeline:
//!
//! 1. merge configured defaults into the caller's parameters;
//! 2. canonicalize and sign them;
//! 3. `POST` the command path without credentials to obtain a fresh Digest
//!    challenge;
//! 4. `POST` again with `Authorization: Digest ...` and the form-encoded, signed
//!    payload;
//! 5. take the JSON payload out of the response envelope.
//!
//! There are no retries and challenges are never cached.
//!
//! ## Example
//!
//! ```rust,no_run
//! use start2pay::{Credentials, ParamTree, Start2PayClient};
//!
//! # async fn run() -> Result<(), start2pay::Error> {
//! let credentials = Credentials::new(
//!     "https://api.start2pay.com",
//!     "merchant",
//!     "password",
//!     "salt",
//!     "callback-salt",
//! )?;
//! let client = Start2PayClient::from_credentials(credentials);
//! let context = client
//!     .get_context(ParamTree::new().with("amount", 100i64).with("currency", "RUB"))
//!     .await?;
//! println!("{context}");
//! # Ok(())
//! # }
//! ```

use http::{Method, header};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::config::{AvailablePaymentSystems, Config, ConfigError, Credentials, DisplayOptions};
use crate::digest::{
    self, ChallengeError, Cnonce, DigestAuthorization, DigestChallenge, parse_challenge,
    parse_headers,
};
use crate::envelope::parse_envelope;
use crate::error::{Error, TransportError};
use crate::json::JsonDialect;
use crate::params::{self, ParamTree, ParamValue};
use crate::signature::{self, SignatureError, SignedRequest};

/// Path of the "create payment context" command.
pub const CONTEXT_CREATE_PATH: &str = "/pay_context/create";

const PAYMENT_DIRECTION_FIELD: &str = "payment_direction";
const DISPLAY_OPTIONS_FIELD: &str = "display_options";
const AVAILABLE_PAYMENT_SYSTEMS_FIELD: &str = "available_payment_systems";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Direction of a payment: money coming in (deposit) or going out (payout).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PaymentDirection {
    #[default]
    In,
    Out,
}

impl PaymentDirection {
    /// The value sent in the `payment_direction` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDirection::In => "IN",
            PaymentDirection::Out => "OUT",
        }
    }
}

impl Display for PaymentDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown payment direction {0:?}, expected 'in' or 'out'")]
pub struct UnknownDirection(String);

impl FromStr for PaymentDirection {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("in") {
            Ok(PaymentDirection::In)
        } else if s.eq_ignore_ascii_case("out") {
            Ok(PaymentDirection::Out)
        } else {
            Err(UnknownDirection(s.to_string()))
        }
    }
}

/// Stage of a command in flight. Logged at `trace` level on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Merging,
    Signing,
    Challenging,
    Authenticating,
    ParsingResponse,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Merging => "merging",
            Stage::Signing => "signing",
            Stage::Challenging => "challenging",
            Stage::Authenticating => "authenticating",
            Stage::ParsingResponse => "parsing_response",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn transition(stage: Stage, uri: &str) {
    tracing::trace!(stage = %stage, uri, "Command stage");
}

/// Start2Pay gateway client.
///
/// Cheap to clone; clones share the HTTP connection pool and the credentials.
#[derive(Clone, Debug)]
pub struct Start2PayClient {
    credentials: Credentials,
    display_options: DisplayOptions,
    available_payment_systems: AvailablePaymentSystems,
    cnonce: Cnonce,
    dialect: JsonDialect,
    timeout: Option<Duration>,
    client: Client,
}

impl Start2PayClient {
    /// Builds a client from a full configuration.
    ///
    /// Fails with [`ConfigError::MissingField`] when any credential is missing or
    /// empty. No request is made.
    pub fn try_new(config: &Config) -> Result<Self, ConfigError> {
        let credentials = config.credentials()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ConfigError::HttpClient)?;
        Ok(Self {
            credentials,
            display_options: config.display_options.clone(),
            available_payment_systems: config.available_payment_systems.clone(),
            cnonce: config.cnonce(),
            dialect: JsonDialect::default(),
            timeout: config.timeout(),
            client,
        })
    }

    /// Builds a client with no configured defaults.
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            display_options: DisplayOptions::default(),
            available_payment_systems: AvailablePaymentSystems::default(),
            cnonce: Cnonce::default(),
            dialect: JsonDialect::default(),
            timeout: None,
            client: Client::new(),
        }
    }

    pub fn with_display_options(&self, display_options: DisplayOptions) -> Self {
        let mut this = self.clone();
        this.display_options = display_options;
        this
    }

    pub fn with_available_payment_systems(&self, systems: AvailablePaymentSystems) -> Self {
        let mut this = self.clone();
        this.available_payment_systems = systems;
        this
    }

    pub fn with_cnonce(&self, cnonce: Cnonce) -> Self {
        let mut this = self.clone();
        this.cnonce = cnonce;
        this
    }

    /// Selects the JSON text flavor signatures are computed over.
    pub fn with_dialect(&self, dialect: JsonDialect) -> Self {
        let mut this = self.clone();
        this.dialect = dialect;
        this
    }

    /// Sets a timeout for every request.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Creates a payment context: an incoming-payment command to
    /// [`CONTEXT_CREATE_PATH`].
    pub async fn get_context(&self, params: ParamTree) -> Result<Value, Error> {
        self.send_command(params, CONTEXT_CREATE_PATH, PaymentDirection::In)
            .await
    }

    /// Sends a signed, Digest-authenticated command and returns the JSON payload
    /// of the response.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "start2pay.send_command",
            skip_all,
            fields(
                uri = %uri,
                direction = %direction,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty
            ),
            err
        )
    )]
    pub async fn send_command(
        &self,
        params: ParamTree,
        uri: &str,
        direction: PaymentDirection,
    ) -> Result<Value, Error> {
        transition(Stage::Idle, uri);
        let result = self.run_command(params, uri, direction).await;
        match &result {
            Ok(_) => transition(Stage::Done, uri),
            Err(err) => {
                transition(Stage::Failed, uri);
                tracing::debug!(uri, error = %err, "Gateway command failed");
            }
        }
        record_result_on_span(&result);
        result
    }

    /// Merges defaults and signs `params` for `direction`, without any I/O.
    pub fn prepare_command(&self, params: ParamTree, direction: PaymentDirection) -> SignedRequest {
        let params = self.merge_defaults(params, direction);
        SignedRequest::new(params, self.credentials.salt(), self.dialect)
    }

    /// Verifies a callback body against the configured callback salt.
    pub fn verify_callback(&self, json_payload: &str) -> Result<bool, SignatureError> {
        signature::verify_callback(json_payload, self.credentials.callback_salt(), self.dialect)
    }

    async fn run_command(
        &self,
        params: ParamTree,
        uri: &str,
        direction: PaymentDirection,
    ) -> Result<Value, Error> {
        transition(Stage::Merging, uri);
        let params = self.merge_defaults(params, direction);

        transition(Stage::Signing, uri);
        let signed = SignedRequest::new(params, self.credentials.salt(), self.dialect);

        let url = self
            .credentials
            .host()
            .join(uri)
            .map_err(|e| TransportError::UrlJoin {
                context: "Failed to construct command URL",
                source: e,
            })?;

        transition(Stage::Challenging, uri);
        let challenge = self.fetch_challenge(&url).await?;

        transition(Stage::Authenticating, uri);
        let authorization = DigestAuthorization::compute(
            &challenge,
            self.credentials.username(),
            self.credentials.password(),
            &Method::POST,
            &url[url::Position::BeforePath..],
            self.cnonce.generate(),
        );
        let body = self.post_authenticated(&url, &authorization, &signed).await?;

        transition(Stage::ParsingResponse, uri);
        Ok(parse_envelope(&body)?)
    }

    /// Fills defaults into blank fields. Caller-supplied, non-blank values win.
    fn merge_defaults(&self, mut params: ParamTree, direction: PaymentDirection) -> ParamTree {
        params.fill_if_blank(PAYMENT_DIRECTION_FIELD, direction.as_str());
        self.merge_display_options(&mut params);
        self.merge_payment_systems(&mut params, direction);
        params
    }

    fn merge_display_options(&self, params: &mut ParamTree) {
        let mut defaults = self.display_options.entries().peekable();
        if defaults.peek().is_none() {
            return;
        }
        let options = params
            .entry(DISPLAY_OPTIONS_FIELD.to_string())
            .or_insert(ParamValue::Null);
        if options.is_blank() {
            *options = ParamValue::Map(Default::default());
        }
        let Some(options) = options.as_map_mut() else {
            tracing::warn!("Caller display_options is not a mapping, defaults not applied");
            return;
        };
        for (key, value) in defaults {
            params::fill_if_blank(options, key, value.clone());
        }
    }

    fn merge_payment_systems(&self, params: &mut ParamTree, direction: PaymentDirection) {
        let configured = self.available_payment_systems.for_direction(direction);
        if configured.is_empty() {
            return;
        }
        let systems = params
            .entry(AVAILABLE_PAYMENT_SYSTEMS_FIELD.to_string())
            .or_insert(ParamValue::Null);
        if systems.is_blank() {
            *systems = ParamValue::List(Vec::new());
        }
        let Some(systems) = systems.as_list_mut() else {
            tracing::warn!(
                "Caller available_payment_systems is not a list, defaults not applied"
            );
            return;
        };
        systems.extend(configured.iter().map(|name| ParamValue::from(name.as_str())));
    }

    fn post(&self, url: &Url) -> RequestBuilder {
        let mut req = self.client.post(url.clone());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req
    }

    /// Unauthenticated probe. The challenge is the first `Digest` value among the
    /// `WWW-Authenticate` headers or, failing that, from a raw header block in
    /// the body.
    async fn fetch_challenge(&self, url: &Url) -> Result<DigestChallenge, Error> {
        let context = "POST challenge probe";
        let response = self
            .post(url)
            .send()
            .await
            .map_err(|e| TransportError::Http { context, source: e })?;
        let status = response.status();
        let from_header = digest::select_digest_challenge(
            response
                .headers()
                .get_all(header::WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
        .map(str::to_string);
        let challenge = match from_header {
            Some(value) => value,
            None => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| TransportError::ResponseBodyRead { context, source: e })?;
                let headers = parse_headers(&body);
                digest::header_ignore_case(&headers, digest::WWW_AUTHENTICATE)
                    .filter(|value| digest::is_digest_challenge(value))
                    .map(str::to_string)
                    .ok_or(ChallengeError::MissingHeader)?
            }
        };
        tracing::debug!(%status, "Received digest challenge");
        Ok(parse_challenge(&challenge)?)
    }

    async fn post_authenticated(
        &self,
        url: &Url,
        authorization: &DigestAuthorization,
        signed: &SignedRequest,
    ) -> Result<String, TransportError> {
        let context = "POST authenticated command";
        let response = self
            .post(url)
            .header(header::AUTHORIZATION, authorization.to_string())
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(signed.to_form_body())
            .send()
            .await
            .map_err(|e| TransportError::Http { context, source: e })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::ResponseBodyRead { context, source: e })?;
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                context,
                status,
                body,
            });
        }
        Ok(body)
    }
}

/// Records the outcome of a command on the current span.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
        }
    }
}

#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header_exists, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const CHALLENGE: &str = r#"Digest realm="api@start2pay", nonce="abc123nonce", qop="auth""#;
    const EXPECTED_AUTHORIZATION: &str = "Digest username=\"merchant\", realm=\"api@start2pay\", nonce=\"abc123nonce\", uri=\"/pay_context/create\", cnonce=\"0a4f113b\", nc=00000001, qop=\"auth\", response=\"c405baafa30b6a15dbedb6765abe4c72\", opaque=\"\", algorithm=\"\"";

    struct HeaderIs(http::HeaderName, &'static str);

    impl Match for HeaderIs {
        fn matches(&self, request: &Request) -> bool {
            request
                .headers
                .get(&self.0)
                .and_then(|value| value.to_str().ok())
                == Some(self.1)
        }
    }

    fn client_for(server: &MockServer) -> Start2PayClient {
        let credentials =
            Credentials::new(server.uri(), "merchant", "pa55", "s3cr3t", "cb-salt").unwrap();
        Start2PayClient::from_credentials(credentials)
    }

    fn order() -> ParamTree {
        params::canonicalize(json!({
            "amount": 100,
            "currency": "RUB",
            "customer": {"id": "42", "email": "a/b@example.com"},
        }))
        .unwrap()
    }

    async fn mount_probe(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(CONTEXT_CREATE_PATH))
            .respond_with(template)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_context_full_exchange() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let expected_body = client
            .prepare_command(order(), PaymentDirection::In)
            .to_form_body();

        Mock::given(method("POST"))
            .and(path(CONTEXT_CREATE_PATH))
            .and(HeaderIs(header::AUTHORIZATION, EXPECTED_AUTHORIZATION))
            .and(HeaderIs(header::CONTENT_TYPE, FORM_CONTENT_TYPE))
            .and(body_string(expected_body))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("HTTP/1.1 200 OK\n\r{\"id\":\"ctx-1\",\"url\":\"https:\\/\\/pay\"}"),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_probe(
            &server,
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE),
        )
        .await;

        let response = client.get_context(order()).await.unwrap();
        assert_eq!(response, json!({"id": "ctx-1", "url": "https://pay"}));
    }

    #[tokio::test]
    async fn test_challenge_read_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTEXT_CREATE_PATH))
            .and(HeaderIs(header::AUTHORIZATION, EXPECTED_AUTHORIZATION))
            .respond_with(ResponseTemplate::new(200).set_body_string("x\n\r{\"ok\":true}"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        let raw_headers = format!(
            "HTTP/1.1 401 Unauthorized\r\nServer: cloudflare\r\nWWW-Authenticate: {CHALLENGE}\r\n\r\n"
        );
        mount_probe(&server, ResponseTemplate::new(200).set_body_string(raw_headers)).await;

        let response = client_for(&server).get_context(order()).await.unwrap();
        assert_eq!(response, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_missing_challenge() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(401).set_body_string("denied")).await;

        let err = client_for(&server).get_context(order()).await.unwrap_err();
        assert!(matches!(err, Error::Challenge(ChallengeError::MissingHeader)));
    }

    #[tokio::test]
    async fn test_digest_challenge_picked_among_several() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTEXT_CREATE_PATH))
            .and(HeaderIs(header::AUTHORIZATION, EXPECTED_AUTHORIZATION))
            .respond_with(ResponseTemplate::new(200).set_body_string("x\n\r{\"ok\":true}"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_probe(
            &server,
            ResponseTemplate::new(401)
                .append_header("WWW-Authenticate", "Basic realm=\"api@start2pay\"")
                .append_header("WWW-Authenticate", CHALLENGE),
        )
        .await;

        let response = client_for(&server).get_context(order()).await.unwrap();
        assert_eq!(response, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_non_digest_challenge_only() {
        let server = MockServer::start().await;
        mount_probe(
            &server,
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Basic realm=\"r\""),
        )
        .await;

        let err = client_for(&server).get_context(order()).await.unwrap_err();
        assert!(matches!(err, Error::Challenge(ChallengeError::MissingHeader)));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTEXT_CREATE_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("WWW-Authenticate", CHALLENGE)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).with_timeout(Duration::from_millis(200));
        let err = client.get_context(order()).await.unwrap_err();
        match err {
            Error::Transport(TransportError::Http { context, source }) => {
                assert_eq!(context, "POST challenge probe");
                assert!(source.is_timeout());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_configured_timeout_applies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTEXT_CREATE_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("WWW-Authenticate", CHALLENGE)
                    .set_delay(Duration::from_secs(4)),
            )
            .mount(&server)
            .await;

        let mut config = Config::new(crate::config::AuthConfig::new(
            server.uri(),
            "merchant",
            "pa55",
            "s3cr3t",
            "cb-salt",
        ));
        config.timeout_secs = Some(1);
        let client = Start2PayClient::try_new(&config).unwrap();
        assert_eq!(client.timeout(), Some(Duration::from_secs(1)));

        let err = client.get_context(order()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Http { source, .. }) if source.is_timeout()
        ));
    }

    #[tokio::test]
    async fn test_incomplete_challenge() {
        let server = MockServer::start().await;
        mount_probe(
            &server,
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Digest realm=\"r\""),
        )
        .await;

        let err = client_for(&server).get_context(order()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Challenge(ChallengeError::MissingDirective("nonce"))
        ));
    }

    #[tokio::test]
    async fn test_response_without_separator_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_probe(
            &server,
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE),
        )
        .await;

        let err = client_for(&server).get_context(order()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(crate::envelope::ProtocolError::MissingSeparator)
        ));
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_probe(
            &server,
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE),
        )
        .await;

        let err = client_for(&server).get_context(order()).await.unwrap_err();
        match err {
            Error::Transport(TransportError::HttpStatus { status, body, .. }) => {
                assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_send_command_uses_its_path_in_digest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payout/create"))
            .and(header_exists("Authorization"))
            .and(|request: &Request| {
                request
                    .headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .is_some_and(|value| value.contains("uri=\"/payout/create\""))
            })
            .respond_with(ResponseTemplate::new(200).set_body_string("\n\r[]"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payout/create"))
            .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", CHALLENGE))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .send_command(order(), "/payout/create", PaymentDirection::Out)
            .await
            .unwrap();
        assert_eq!(response, json!([]));
    }

    #[test]
    fn test_merge_fills_only_blank_fields() {
        let credentials = Credentials::new(
            "https://api.start2pay.com",
            "merchant",
            "pa55",
            "s3cr3t",
            "cb-salt",
        )
        .unwrap();
        let client = Start2PayClient::from_credentials(credentials)
            .with_display_options(DisplayOptions {
                language: Some("ru".into()),
                iframe: Some(true.into()),
                theme: Some("".into()),
                ..Default::default()
            })
            .with_available_payment_systems(AvailablePaymentSystems {
                incoming: vec!["visa".to_string()],
                outgoing: vec!["payout-card".to_string()],
            });

        let params = order()
            .with("display_options", ParamTree::new().with("language", "en"))
            .with("available_payment_systems", vec!["qiwi"]);
        let signed = client.prepare_command(params, PaymentDirection::In);
        let payload = signed.params();
        assert_eq!(payload["payment_direction"], ParamValue::from("IN"));
        assert_eq!(
            payload["display_options"],
            ParamValue::from(ParamTree::new().with("language", "en").with("iframe", true))
        );
        assert_eq!(
            payload["available_payment_systems"],
            ParamValue::from(vec!["qiwi", "visa"])
        );

        let out = client.prepare_command(
            order().with("payment_direction", "IN"),
            PaymentDirection::Out,
        );
        assert_eq!(out.params()["payment_direction"], ParamValue::from("IN"));
        assert_eq!(
            out.params()["available_payment_systems"],
            ParamValue::from(vec!["payout-card"])
        );
    }

    #[test]
    fn test_merge_leaves_malformed_caller_values() {
        let credentials = Credentials::new(
            "https://api.start2pay.com",
            "merchant",
            "pa55",
            "s3cr3t",
            "cb-salt",
        )
        .unwrap();
        let client = Start2PayClient::from_credentials(credentials)
            .with_display_options(DisplayOptions {
                language: Some("ru".into()),
                ..Default::default()
            })
            .with_available_payment_systems(AvailablePaymentSystems {
                incoming: vec!["visa".to_string()],
                outgoing: Vec::new(),
            });
        let params = order()
            .with("display_options", "compact")
            .with("available_payment_systems", "visa");
        let signed = client.prepare_command(params, PaymentDirection::In);
        assert_eq!(signed.params()["display_options"], ParamValue::from("compact"));
        assert_eq!(
            signed.params()["available_payment_systems"],
            ParamValue::from("visa")
        );
    }

    #[test]
    fn test_prepare_command_without_defaults_matches_plain_signature() {
        let credentials = Credentials::new(
            "https://api.start2pay.com",
            "merchant",
            "pa55",
            "s3cr3t",
            "cb-salt",
        )
        .unwrap();
        let client = Start2PayClient::from_credentials(credentials);
        let params = order().with("payment_direction", "IN");
        let signed = client.prepare_command(params.clone(), PaymentDirection::In);
        assert_eq!(
            signed.signature(),
            signature::sign(&params, "s3cr3t", JsonDialect::Gateway)
        );
    }

    #[test]
    fn test_try_new_rejects_missing_credentials() {
        let config = Config::new(crate::config::AuthConfig::new(
            "https://api.start2pay.com",
            "merchant",
            "",
            "s3cr3t",
            "cb-salt",
        ));
        assert!(matches!(
            Start2PayClient::try_new(&config),
            Err(ConfigError::MissingField("password"))
        ));
    }

    #[test]
    fn test_payment_direction_parsing() {
        assert_eq!("in".parse::<PaymentDirection>().unwrap(), PaymentDirection::In);
        assert_eq!("OUT".parse::<PaymentDirection>().unwrap(), PaymentDirection::Out);
        assert!("sideways".parse::<PaymentDirection>().is_err());
    }
}
