// Local gateway client.
//
// Username/password variant: a session token is obtained from the
// gateway's `login` call, cached with its TTL, and re-acquired
// transparently when it expires or the gateway invalidates it.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::request::{
    Body, Connector, Payload, RequestDescriptor, RequestEngine, RetryPolicy, dispatch,
};
use crate::token::{LOCAL_TOKEN_EXPIRES_IN, SessionToken, TokenCell, ws_subprotocol};
use crate::transport::TransportConfig;
use crate::websocket::{EventStream, SUBSCRIPTION_EVENT_TYPES, WS_EVENTS_PATH, WsHandshake};

/// Default HTTPS port of the gateway webservice.
pub const GATEWAY_DEFAULT_PORT: u16 = 443;

// ── Internals ────────────────────────────────────────────────────────

pub(crate) struct GatewayInner {
    engine: RequestEngine,
    host: String,
    port: u16,
    tls: bool,
    username: String,
    password: SecretString,
    token: TokenCell,
    events: EventStream,
}

impl GatewayInner {
    /// `POST /login`; a success response carries the session token.
    async fn login(&self) -> Result<(), Error> {
        let mut form = BTreeMap::new();
        form.insert("username".to_owned(), self.username.clone());
        form.insert("password".to_owned(), self.password.expose_secret().to_owned());

        let payload = dispatch(
            self,
            &RequestDescriptor::post("login").with_form(form).unauthenticated(),
        )
        .await?;
        let value = payload.into_json()?;

        let success = value.get("success").and_then(Value::as_bool) == Some(true);
        let token = value.get("token").and_then(Value::as_str);
        match (success, token) {
            (true, Some(token)) => {
                debug!(host = %self.host, "gateway login succeeded");
                self.token
                    .store(SessionToken::expiring(token, LOCAL_TOKEN_EXPIRES_IN));
                Ok(())
            }
            _ => {
                self.token.clear();
                Err(Error::Authentication {
                    message: format!("gateway {} rejected the credentials", self.host),
                })
            }
        }
    }

    /// The cached token, or a fresh one via `login` when absent or
    /// within the clock-skew margin of expiry.
    ///
    /// Boxed because `login` dispatches through the engine, whose auth
    /// path lands back here; the `unauthenticated` descriptor breaks
    /// the cycle at runtime, but the future type needs an indirection.
    async fn ensure_valid_token(&self) -> Result<Arc<SessionToken>, Error> {
        if let Some(token) = self.token.valid() {
            return Ok(token);
        }
        Box::pin(self.login()).await?;
        self.token.valid().ok_or_else(|| Error::Authentication {
            message: "login succeeded but no usable token was stored".into(),
        })
    }

    /// Invoke a gateway action. A rejected token triggers exactly one
    /// forced re-login followed by a single repeat of the call.
    ///
    /// Always posts a form body, even for data-less actions, so the
    /// session token rides in the body on every authenticated call.
    pub(crate) async fn exec_action(
        &self,
        action: &str,
        data: Option<BTreeMap<String, String>>,
    ) -> Result<Value, Error> {
        let desc = RequestDescriptor::post(action).with_form(data.unwrap_or_default());

        self.ensure_valid_token().await?;
        let payload = match dispatch(self, &desc).await {
            Ok(payload) => payload,
            Err(e) if e.is_authentication() => {
                debug!(%action, "token rejected, re-authenticating");
                self.token.clear();
                self.login().await?;
                dispatch(self, &desc).await?
            }
            Err(e) => return Err(e),
        };

        check_success(action, payload)
    }
}

impl Connector for GatewayInner {
    fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    fn url_for(&self, path: &str, scheme: Option<&str>) -> Result<Url, Error> {
        // A WebSocket override maps to ws/wss following the TLS setting;
        // plain requests use http/https the same way.
        let scheme = match scheme {
            Some(s) if s.starts_with("ws") => {
                if self.tls { "wss" } else { "ws" }
            }
            Some(s) => s,
            None => {
                if self.tls { "https" } else { "http" }
            }
        };
        let base = Url::parse(&format!("{scheme}://{}:{}/", self.host, self.port))?;
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    async fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let token = self.ensure_valid_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(crate::transport::USER_AGENT),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.token)).map_err(
            |e| Error::Authentication {
                message: format!("session token is not a valid header value: {e}"),
            },
        )?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }

    /// Older gateway firmwares read the token from the request body, so
    /// it is injected there as well.
    fn prepare_body(&self, body: Body) -> Body {
        let Some(token) = self.token.current() else {
            return body;
        };
        match body {
            Body::Form(mut form) => {
                form.insert("token".to_owned(), token.token.clone());
                Body::Form(form)
            }
            Body::Json(mut value) => {
                if let Some(map) = value.as_object_mut() {
                    map.insert("token".to_owned(), Value::String(token.token.clone()));
                }
                Body::Json(value)
            }
        }
    }

    fn host(&self) -> &str {
        &self.host
    }
}

/// The gateway wraps every action result in `{"success": bool, ...}`.
fn check_success(action: &str, payload: Payload) -> Result<Value, Error> {
    let value = payload.into_json()?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let msg = value
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(Error::other(format!("gateway action {action} failed: {msg}")));
    }
    Ok(value)
}

// ── Builder ──────────────────────────────────────────────────────────

/// Builder for [`LocalGateway`].
#[must_use]
pub struct LocalGatewayBuilder {
    host: String,
    port: u16,
    tls: bool,
    username: String,
    password: SecretString,
    transport: TransportConfig,
    retry: RetryPolicy,
}

impl LocalGatewayBuilder {
    fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: GATEWAY_DEFAULT_PORT,
            tls: false,
            username: username.into(),
            password: SecretString::from(password.into()),
            transport: TransportConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Speak https/wss to the gateway. Off by default; most gateways
    /// ship with a self-signed certificate (see [`TransportConfig`]).
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<LocalGateway, Error> {
        if self.host.is_empty() {
            return Err(Error::other("gateway host must not be empty"));
        }

        let inner = Arc::new(GatewayInner {
            engine: RequestEngine::new(&self.transport, self.retry)?,
            host: self.host.clone(),
            port: self.port,
            tls: self.tls,
            username: self.username,
            password: self.password,
            token: TokenCell::new(None),
            events: EventStream::new(self.host),
        });

        Ok(LocalGateway {
            outputs: super::Outputs::new(Arc::clone(&inner)),
            lights: super::Lights::new(Arc::clone(&inner)),
            sensors: super::Sensors::new(Arc::clone(&inner)),
            shutters: super::Shutters::new(Arc::clone(&inner)),
            thermostats: super::Thermostats::new(Arc::clone(&inner)),
            groupactions: super::GroupActions::new(Arc::clone(&inner)),
            inner,
        })
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for the webservice of a gateway on the local network.
pub struct LocalGateway {
    inner: Arc<GatewayInner>,
    pub outputs: super::Outputs,
    pub lights: super::Lights,
    pub sensors: super::Sensors,
    pub shutters: super::Shutters,
    pub thermostats: super::Thermostats,
    pub groupactions: super::GroupActions,
}

impl LocalGateway {
    pub fn builder(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> LocalGatewayBuilder {
        LocalGatewayBuilder::new(host, username, password)
    }

    /// Client with default transport settings.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::builder(host, username, password).build()
    }

    /// Authenticate eagerly. Optional: every call logs in on demand.
    pub async fn login(&self) -> Result<(), Error> {
        self.inner.login().await
    }

    /// Install an externally obtained session token with its remaining
    /// TTL, bypassing `login`.
    pub fn store_token(&self, token: impl Into<String>, ttl: std::time::Duration) {
        self.inner.token.store(SessionToken::expiring(token, ttl));
    }

    /// Invoke a raw gateway action with optional form data. Known
    /// actions are wrapped by the resource facades.
    pub async fn exec_action(
        &self,
        action: &str,
        data: Option<BTreeMap<String, String>>,
    ) -> Result<Value, Error> {
        self.inner.exec_action(action, data).await
    }

    /// Authenticated GET against the gateway webservice.
    pub async fn get(&self, path: &str) -> Result<Payload, Error> {
        dispatch(&*self.inner, &RequestDescriptor::get(path)).await
    }

    pub async fn get_version(&self) -> Result<Value, Error> {
        self.inner.exec_action("get_version", None).await
    }

    pub async fn get_status(&self) -> Result<Value, Error> {
        self.inner.exec_action("get_status", None).await
    }

    // ── Event stream ─────────────────────────────────────────────────

    /// `true` iff the event-stream socket is open.
    pub fn connected(&self) -> bool {
        self.inner.events.connected()
    }

    /// Open the live-event WebSocket. No-op when already connected.
    pub async fn connect(&self) -> Result<(), Error> {
        if self.connected() {
            return Ok(());
        }

        let token = self.inner.ensure_valid_token().await?;
        let url = self.inner.url_for(WS_EVENTS_PATH, Some("wss"))?;
        let origin_scheme = if self.inner.tls { "https" } else { "http" };
        let origin = format!("{origin_scheme}://{}:{}", self.inner.host, self.inner.port);

        let handshake = WsHandshake {
            url,
            subprotocol: ws_subprotocol(&token.token),
            origin: Some(origin),
            subscription: Some(json!({
                "action": "set_subscription",
                "types": SUBSCRIPTION_EVENT_TYPES,
            })),
        };

        self.inner.events.connect(handshake).await
    }

    /// Blocking receive loop; every inbound event is passed to `handler`
    /// as decoded JSON. See [`EventStream::listen`] for termination
    /// semantics.
    pub async fn listen<F>(&self, handler: F) -> Result<(), Error>
    where
        F: FnMut(Value),
    {
        self.inner.events.listen(handler).await
    }

    /// Close the event-stream socket. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.events.disconnect().await;
    }

    /// Close the client: tears down the event stream and drops the
    /// cached token. The connection pool is released on drop.
    pub async fn close(&self) {
        self.disconnect().await;
        self.inner.token.clear();
    }
}
