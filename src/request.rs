// Authenticated request engine shared by both client variants.
//
// Builds the target URL, attaches auth headers, issues the call under a
// hard timeout, classifies the outcome into the crate error taxonomy,
// and retries the connection-error category with exponential backoff.
// The variant-specific parts (URL shape, token source, body preparation)
// are supplied through the `Connector` trait.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Maximum attempts for a single logical request (1 initial + 2 retries).
pub const MAX_REQUEST_ATTEMPTS: u32 = 3;

// ── Connector ────────────────────────────────────────────────────────

/// Capability contract a client variant provides to the request engine.
///
/// The engine owns the mechanics (timeout, retry, classification); the
/// connector owns the policy (where requests go, how they authenticate,
/// what gets injected into the body).
pub(crate) trait Connector: Sync {
    fn engine(&self) -> &RequestEngine;

    /// Build the absolute URL for `path`, optionally overriding the
    /// scheme (used to derive the WebSocket handshake URL).
    fn url_for(&self, path: &str, scheme: Option<&str>) -> Result<Url, Error>;

    /// Headers for an authenticated request. Obtaining them may refresh
    /// the token, so this runs once per attempt.
    async fn auth_headers(&self) -> Result<HeaderMap, Error>;

    /// Hook for variants that carry the token in the request body rather
    /// than a header. The default passes the body through untouched.
    fn prepare_body(&self, body: Body) -> Body {
        body
    }

    /// Host name used in diagnostics.
    fn host(&self) -> &str;
}

// ── Request descriptor ───────────────────────────────────────────────

/// Request payload shape. The gateway speaks form-encoded bodies, the
/// cloud speaks JSON.
#[derive(Debug, Clone)]
pub enum Body {
    Form(BTreeMap<String, String>),
    Json(Value),
}

/// One request, built per call and never persisted.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub(crate) path: String,
    pub(crate) method: Method,
    pub(crate) params: Vec<(String, Value)>,
    pub(crate) body: Option<Body>,
    /// Caller-supplied headers; these win over engine-set defaults.
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) scheme: Option<&'static str>,
    /// `false` skips auth headers and body preparation entirely
    /// (the gateway login call must not recurse into token refresh).
    pub(crate) authenticated: bool,
}

impl RequestDescriptor {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
            scheme: None,
            authenticated: true,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_params(mut self, params: Vec<(String, Value)>) -> Self {
        self.params = params;
        self
    }

    pub fn with_form(mut self, form: BTreeMap<String, String>) -> Self {
        self.body = Some(Body::Form(form));
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.body = Some(Body::Json(json));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Decoded response body: JSON when the server says so, raw text otherwise.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Unwrap the JSON variant, or fail with the raw body attached.
    pub fn into_json(self) -> Result<Value, Error> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(body) => Err(Error::Deserialization {
                message: "expected a JSON response".into(),
                body,
            }),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

// ── Retry policy ─────────────────────────────────────────────────────

/// Exponential backoff settings for the connection-error category.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_REQUEST_ATTEMPTS,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
        }
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * jitter`, jitter in [0.75, 1.25].
fn backoff_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(16) as i32);
    let capped = base.min(policy.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number. Not random,
    // but enough to spread out synchronized clients.
    let jitter = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    Duration::from_secs_f64((capped * jitter).max(0.0))
}

// ── Engine ───────────────────────────────────────────────────────────

/// Owns the connection pool, the per-attempt timeout, and the retry policy.
pub struct RequestEngine {
    http: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RequestEngine {
    pub(crate) fn new(config: &TransportConfig, retry: RetryPolicy) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            timeout: config.timeout,
            retry,
        })
    }
}

/// Issue a request, retrying the connection-error category up to the
/// configured number of attempts. Timeout and authentication errors are
/// surfaced immediately.
pub(crate) async fn dispatch<C: Connector>(
    connector: &C,
    desc: &RequestDescriptor,
) -> Result<Payload, Error> {
    let retry = &connector.engine().retry;
    let mut attempt: u32 = 0;

    loop {
        match send_once(connector, desc).await {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                let delay = backoff_delay(attempt, retry);
                warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    host = %connector.host(),
                    path = %desc.path,
                    "retrying after connection error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Single attempt: URL, headers, timeout, classification.
async fn send_once<C: Connector>(connector: &C, desc: &RequestDescriptor) -> Result<Payload, Error> {
    let engine = connector.engine();
    let url = connector.url_for(&desc.path, desc.scheme)?;

    let mut headers = if desc.authenticated {
        connector.auth_headers().await?
    } else {
        base_headers()
    };
    // Caller-supplied headers override engine defaults.
    for (name, value) in &desc.headers {
        let name: HeaderName = name
            .parse()
            .map_err(|e| Error::other(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::other(format!("invalid header value for {name}: {e}")))?;
        headers.insert(name, value);
    }

    debug!(method = %desc.method, %url, "sending request");

    let mut request = engine
        .http
        .request(desc.method.clone(), url.clone())
        .headers(headers);

    if !desc.params.is_empty() {
        request = request.query(&normalize_params(&desc.params));
    }

    let body = desc.body.clone().map(|b| {
        if desc.authenticated {
            connector.prepare_body(b)
        } else {
            b
        }
    });
    match body {
        Some(Body::Form(form)) => request = request.form(&form),
        Some(Body::Json(json)) => request = request.json(&json),
        None => {}
    }

    let timeout_secs = engine.timeout.as_secs();
    let response = match tokio::time::timeout(engine.timeout, request.send()).await {
        Err(_) => return Err(Error::Timeout { timeout_secs }),
        Ok(Err(e)) => return Err(classify_transport_error(&e, timeout_secs)),
        Ok(Ok(response)) => response,
    };

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("HTTP {status} from {url}"),
        });
    }

    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let text = match tokio::time::timeout(engine.timeout, response.text()).await {
        Err(_) => return Err(Error::Timeout { timeout_secs }),
        Ok(Err(e)) => return Err(classify_transport_error(&e, timeout_secs)),
        Ok(Ok(text)) => text,
    };

    if !status.is_success() {
        return Err(Error::Connection {
            message: format!("HTTP {status} from {url}: {}", preview(&text)),
        });
    }

    if is_json {
        let value = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&text)),
            body: text.clone(),
        })?;
        Ok(Payload::Json(value))
    } else {
        Ok(Payload::Text(text))
    }
}

/// Defaults for unauthenticated calls (gateway login).
fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(crate::transport::USER_AGENT),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers
}

/// The API requires string booleans in query parameters, not native ones.
fn normalize_params(params: &[(String, Value)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Bool(b) => b.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Map a reqwest error onto the crate taxonomy. TLS failures are fished
/// out of the source chain; reqwest does not expose them structurally.
fn classify_transport_error(e: &reqwest::Error, timeout_secs: u64) -> Error {
    if e.is_timeout() {
        return Error::Timeout { timeout_secs };
    }

    let mut chain = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }

    let lowered = chain.to_lowercase();
    if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl") {
        Error::ConnectionSsl { message: chain }
    } else {
        Error::Connection { message: chain }
    }
}

fn preview(body: &str) -> &str {
    let cut = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_params_become_lowercase_strings() {
        let params = vec![
            ("force".to_owned(), Value::Bool(true)),
            ("dry_run".to_owned(), Value::Bool(false)),
            ("name".to_owned(), json!("kitchen")),
            ("dimmer".to_owned(), json!(42)),
        ];

        let normalized = normalize_params(&params);

        assert_eq!(normalized[0], ("force".to_owned(), "true".to_owned()));
        assert_eq!(normalized[1], ("dry_run".to_owned(), "false".to_owned()));
        assert_eq!(normalized[2], ("name".to_owned(), "kitchen".to_owned()));
        assert_eq!(normalized[3], ("dimmer".to_owned(), "42".to_owned()));
    }

    #[test]
    fn backoff_increases_and_caps() {
        let policy = RetryPolicy::default();

        let d0 = backoff_delay(0, &policy);
        let d1 = backoff_delay(1, &policy);
        assert!(d1 > d0, "d1 ({d1:?}) should exceed d0 ({d0:?})");

        let d20 = backoff_delay(20, &policy);
        // Jitter can stretch the cap by up to 25%.
        assert!(d20 <= policy.max_delay.mul_f64(1.25) + Duration::from_millis(1));
    }

    #[test]
    fn payload_into_json() {
        let json = Payload::Json(json!({"status": "ok"}));
        assert_eq!(json.into_json().unwrap()["status"], "ok");

        let text = Payload::Text("pong".into());
        assert!(matches!(
            text.into_json(),
            Err(Error::Deserialization { body, .. }) if body == "pong"
        ));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(preview(&long).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}
