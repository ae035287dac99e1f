// Cloud API client.
//
// OAuth2 bearer-token variant: the access token is obtained out-of-band
// (client-credentials flow) and handed in either as a static string or
// as an async refresh callback invoked before every authenticated call.

use std::sync::{Arc, RwLock};

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::request::{Connector, Payload, RequestDescriptor, RequestEngine, RetryPolicy, dispatch};
use crate::token::{SessionToken, TokenCell, TokenRefresher, ws_subprotocol};
use crate::transport::TransportConfig;
use crate::websocket::{
    EventStream, SUBSCRIPTION_EVENT_TYPES, WS_EVENTS_PATH, WsHandshake,
};

use super::{
    GroupActions, Installations, Lights, Outputs, Sensors, Shutters, Thermostats,
};

/// Hosted API root, including the versioned prefix.
pub const CLOUD_API_URL: &str = "https://cloud.openmotics.com/api/v1.1";

/// OAuth2 token endpoint, relative to the API root.
pub const CLOUD_API_TOKEN_PATH: &str = "/authentication/oauth2/token";

/// OAuth2 authorization endpoint, relative to the API root.
pub const CLOUD_API_AUTHORIZATION_PATH: &str = "/authentication/oauth2/authorize";

/// Scope string for the client-credentials flow.
pub const CLOUD_OAUTH_SCOPE: &str = "control view configure";

// ── Internals ────────────────────────────────────────────────────────

pub(crate) struct CloudInner {
    engine: RequestEngine,
    base_url: Url,
    host: String,
    token: TokenCell,
    refresher: Option<TokenRefresher>,
    installation_id: RwLock<Option<u32>>,
    events: EventStream,
}

impl CloudInner {
    pub(crate) fn installation_id(&self) -> Option<u32> {
        *self
            .installation_id
            .read()
            .expect("installation id lock poisoned")
    }

    /// Resource path scoped to the configured installation.
    pub(crate) fn installation_path(&self, suffix: &str) -> Result<String, Error> {
        let id = self.installation_id().ok_or_else(|| {
            Error::other("no installation id configured; call set_installation_id first")
        })?;
        Ok(format!("/base/installations/{id}{suffix}"))
    }

    /// Refresh (when a callback is configured) and return the current token.
    async fn ensure_token(&self) -> Result<Arc<SessionToken>, Error> {
        if let Some(refresh) = &self.refresher {
            let fresh = refresh().await?;
            self.token.store(SessionToken::bearer(fresh));
        }
        self.token.current().ok_or_else(|| Error::Authentication {
            message: "no access token available; supply a token or a refresh callback".into(),
        })
    }
}

impl Connector for CloudInner {
    fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    fn url_for(&self, path: &str, scheme: Option<&str>) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}"))?;
        if let Some(scheme) = scheme {
            url.set_scheme(scheme)
                .map_err(|()| Error::other(format!("cannot switch URL scheme to {scheme:?}")))?;
        }
        Ok(url)
    }

    async fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let token = self.ensure_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(crate::transport::USER_AGENT),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.token))
            .map_err(|e| Error::Authentication {
                message: format!("access token is not a valid header value: {e}"),
            })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }

    fn host(&self) -> &str {
        &self.host
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Builder for [`CloudClient`].
#[must_use]
pub struct CloudClientBuilder {
    token: Option<String>,
    refresher: Option<TokenRefresher>,
    base_url: String,
    installation_id: Option<u32>,
    transport: TransportConfig,
    retry: RetryPolicy,
}

impl CloudClientBuilder {
    fn new() -> Self {
        Self {
            token: None,
            refresher: None,
            base_url: CLOUD_API_URL.to_owned(),
            installation_id: None,
            transport: TransportConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Static access token, used as-is when no refresh callback is set.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Async callback invoked before every authenticated request to
    /// produce a usable token. The callback is responsible for its own
    /// caching and short-circuiting.
    pub fn token_refresher(mut self, refresher: TokenRefresher) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Override the API root (testing, staging environments).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Installation to scope resource calls to.
    pub fn installation_id(mut self, id: u32) -> Self {
        self.installation_id = Some(id);
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

    pub fn build(self) -> Result<CloudClient, Error> {
        let base_url = Url::parse(&self.base_url)?;
        let host = base_url
            .host_str()
            .ok_or_else(|| Error::other(format!("base URL {base_url} has no host")))?
            .to_owned();

        let inner = Arc::new(CloudInner {
            engine: RequestEngine::new(&self.transport, self.retry)?,
            base_url,
            host: host.clone(),
            token: TokenCell::new(self.token),
            refresher: self.refresher,
            installation_id: RwLock::new(self.installation_id),
            events: EventStream::new(host),
        });

        Ok(CloudClient {
            installations: Installations::new(Arc::clone(&inner)),
            outputs: Outputs::new(Arc::clone(&inner)),
            lights: Lights::new(Arc::clone(&inner)),
            sensors: Sensors::new(Arc::clone(&inner)),
            shutters: Shutters::new(Arc::clone(&inner)),
            thermostats: Thermostats::new(Arc::clone(&inner)),
            groupactions: GroupActions::new(Arc::clone(&inner)),
            inner,
        })
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for the hosted OpenMotics cloud API.
///
/// Resource facades are plain fields (`client.outputs.get_all()`, ...);
/// each one is a thin veneer over the shared request engine.
pub struct CloudClient {
    inner: Arc<CloudInner>,
    pub installations: Installations,
    pub outputs: Outputs,
    pub lights: Lights,
    pub sensors: Sensors,
    pub shutters: Shutters,
    pub thermostats: Thermostats,
    pub groupactions: GroupActions,
}

impl CloudClient {
    pub fn builder() -> CloudClientBuilder {
        CloudClientBuilder::new()
    }

    /// Client with a static token and default transport settings.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        Self::builder().token(token).build()
    }

    pub fn installation_id(&self) -> Option<u32> {
        self.inner.installation_id()
    }

    /// Scope subsequent resource calls to this installation.
    pub fn set_installation_id(&self, id: u32) {
        *self
            .inner
            .installation_id
            .write()
            .expect("installation id lock poisoned") = Some(id);
    }

    // ── Raw request surface ──────────────────────────────────────────

    /// Authenticated GET; returns decoded JSON or raw text depending on
    /// the response content type.
    pub async fn get(&self, path: &str) -> Result<Payload, Error> {
        dispatch(&*self.inner, &RequestDescriptor::get(path)).await
    }

    /// Authenticated GET with query parameters. Boolean values are
    /// transmitted as the strings `"true"`/`"false"`.
    pub async fn get_with_params(
        &self,
        path: &str,
        params: Vec<(String, Value)>,
    ) -> Result<Payload, Error> {
        dispatch(
            &*self.inner,
            &RequestDescriptor::get(path).with_params(params),
        )
        .await
    }

    /// Authenticated POST with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> Result<Payload, Error> {
        dispatch(&*self.inner, &RequestDescriptor::post(path).with_json(body)).await
    }

    /// Authenticated request from a prebuilt descriptor, for endpoints
    /// the typed facades do not cover.
    pub async fn request(&self, desc: &RequestDescriptor) -> Result<Payload, Error> {
        dispatch(&*self.inner, desc).await
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

        if self.inner.refresher.is_none() && self.inner.token.current().is_none() {
            return Err(Error::other(
                "no token or refresh callback configured; the event stream cannot authenticate",
            ));
        }

        let token = self.inner.ensure_token().await?;
        let url = self.inner.url_for(WS_EVENTS_PATH, Some("wss"))?;
        let origin = format!("https://{}", self.inner.host);

        let handshake = WsHandshake {
            url,
            subprotocol: ws_subprotocol(&token.token),
            origin: Some(origin),
            subscription: Some(self.subscription_message()),
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

    /// Close the client: tears down the event stream. The connection
    /// pool is released on drop.
    pub async fn close(&self) {
        self.disconnect().await;
    }

    /// Canonical subscription message, sent right after the handshake.
    fn subscription_message(&self) -> Value {
        let installation_ids: Vec<String> = self
            .installation_id()
            .map(|id| vec![id.to_string()])
            .unwrap_or_default();
        debug!(?installation_ids, "building event subscription");
        json!({
            "action": "set_subscription",
            "types": SUBSCRIPTION_EVENT_TYPES,
            "installation_ids": installation_ids,
        })
    }
}
