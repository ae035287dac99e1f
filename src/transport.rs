// Shared transport configuration for building reqwest::Client instances.
//
// Both the cloud and local-gateway clients share TLS, timeout, and
// connection-pool settings through this module. A caller-supplied pool is
// reused as-is; otherwise one is built from the TLS settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// `User-Agent` sent on every HTTP request and WebSocket handshake.
pub const USER_AGENT: &str = concat!("openmotics-rs/", env!("CARGO_PKG_VERSION"));

/// Default hard timeout for a single request attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// TLS verification mode.
///
/// The cloud API is always verified against the system roots; the local
/// gateway usually runs with a self-signed certificate, so
/// [`DangerAcceptInvalid`](TlsMode::DangerAcceptInvalid) or a custom CA
/// are common there.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the bundled webpki root store.
    #[default]
    System,
    /// Trust a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed gateways).
    DangerAcceptInvalid,
}

/// Transport settings shared by both client variants.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Hard per-attempt timeout enforced by the request engine.
    pub timeout: Duration,
    /// Caller-supplied connection pool. When `None`, the client builds
    /// and owns its own pool.
    pub http: Option<reqwest::Client>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            http: None,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Reuse an existing `reqwest::Client` instead of building one.
    ///
    /// The TLS mode is ignored in that case; the supplied pool keeps
    /// whatever settings it was built with.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Return the configured pool, or build one from the TLS settings.
    ///
    /// The request timeout is deliberately not set on the pool itself --
    /// the request engine enforces it per attempt so that an elapsed
    /// timeout can be classified distinctly from transport failures.
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, Error> {
        if let Some(http) = &self.http {
            return Ok(http.clone());
        }

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path).map_err(|e| Error::ConnectionSsl {
                    message: format!("failed to read CA cert: {e}"),
                })?;
                let cert =
                    reqwest::Certificate::from_pem(&cert_pem).map_err(|e| Error::ConnectionSsl {
                        message: format!("invalid CA cert: {e}"),
                    })?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder.build().map_err(|e| Error::Connection {
            message: format!("failed to build HTTP client: {e}"),
        })
    }
}
