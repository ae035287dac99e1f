use thiserror::Error;

/// Top-level error type for the `openmotics` crate.
///
/// Every failure mode across both transport variants is expressed here:
/// no raw `reqwest` or `tungstenite` errors escape the crate. The kinds
/// mirror how the API behaves in practice -- timeouts are surfaced
/// immediately, connection-category errors are retried by the request
/// engine, authentication errors trigger a single re-login on the gateway.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were rejected, a token could not be obtained, or the
    /// server answered 401/403.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The request did not complete within the configured timeout.
    /// Never retried automatically.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// DNS failure, refused connection, non-2xx HTTP status other than
    /// 401/403, or a broken WebSocket handshake. Retried with backoff.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// TLS handshake or certificate validation failure. Distinguished
    /// from [`Connection`](Self::Connection) for diagnostics; the retry
    /// policy is identical.
    #[error("TLS error: {message}")]
    ConnectionSsl { message: String },

    /// The event-stream socket was closed by the peer during `listen`.
    #[error("Connection to the OpenMotics WebSocket on {host} has been closed")]
    ConnectionClosed { host: String },

    /// URL construction failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A successful response could not be decoded. Carries the raw body
    /// for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Caller misconfiguration or any condition not covered above.
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    pub(crate) fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns `true` for the connection-error category that the request
    /// engine retries with exponential backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::ConnectionSsl { .. })
    }

    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_connection_category_only() {
        assert!(
            Error::Connection {
                message: "refused".into()
            }
            .is_retryable()
        );
        assert!(
            Error::ConnectionSsl {
                message: "expired cert".into()
            }
            .is_retryable()
        );

        assert!(!Error::Timeout { timeout_secs: 8 }.is_retryable());
        assert!(
            !Error::Authentication {
                message: "bad token".into()
            }
            .is_retryable()
        );
        assert!(
            !Error::ConnectionClosed {
                host: "gw.local".into()
            }
            .is_retryable()
        );
        assert!(!Error::other("misuse").is_retryable());
    }

    #[test]
    fn authentication_predicate() {
        assert!(
            Error::Authentication {
                message: "401".into()
            }
            .is_authentication()
        );
        assert!(
            !Error::Connection {
                message: "503".into()
            }
            .is_authentication()
        );
    }
}
