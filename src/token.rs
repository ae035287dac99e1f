// Credential/token management shared by both client variants.
//
// The token cell is the one piece of mutable state shared between the
// request path and the event-stream path, so updates are atomic swaps:
// last refresh wins, readers never observe a half-written token.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;

use crate::error::Error;

/// Server-side TTL of a gateway session token.
pub const LOCAL_TOKEN_EXPIRES_IN: Duration = Duration::from_secs(3600);

/// Safety margin for clock skew: a token this close to expiry is treated
/// as already expired and refreshed before use.
pub const CLOCK_OUT_OF_SYNC_MAX_SEC: Duration = Duration::from_secs(20);

/// Async callback that produces a fresh OAuth2 access token.
///
/// Invoked before every authenticated cloud request; the callback itself
/// is responsible for caching and short-circuiting.
pub type TokenRefresher =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<String, Error>> + Send>> + Send + Sync>;

/// An opaque bearer token, optionally with a known expiry instant.
#[derive(Debug, Clone)]
pub(crate) struct SessionToken {
    pub token: String,
    expires_at: Option<Instant>,
}

impl SessionToken {
    /// A token without client-side expiry tracking (cloud bearer tokens
    /// are refreshed by the caller-supplied callback instead).
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_owned(),
            expires_at: None,
        }
    }

    /// A token expiring `ttl` from now (gateway session tokens).
    pub fn expiring(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into().trim().to_owned(),
            expires_at: Some(Instant::now() + ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => Instant::now() + CLOCK_OUT_OF_SYNC_MAX_SEC >= expires_at,
        }
    }
}

/// Lock-free cell holding the current token.
#[derive(Default)]
pub(crate) struct TokenCell {
    inner: ArcSwapOption<SessionToken>,
}

impl TokenCell {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            inner: ArcSwapOption::from(initial.map(|t| Arc::new(SessionToken::bearer(t)))),
        }
    }

    pub fn current(&self) -> Option<Arc<SessionToken>> {
        self.inner.load_full()
    }

    /// The current token, unless it is absent or within the clock-skew
    /// margin of expiry.
    pub fn valid(&self) -> Option<Arc<SessionToken>> {
        self.current().filter(|t| !t.is_expired())
    }

    pub fn store(&self, token: SessionToken) {
        self.inner.store(Some(Arc::new(token)));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }
}

/// `Sec-WebSocket-Protocol` value carrying the bearer token, as the API
/// expects it: `authorization.bearer.<base64(token)>`. Unpadded, since
/// `=` is not a valid character in a subprotocol token.
pub(crate) fn ws_subprotocol(token: &str) -> String {
    format!("authorization.bearer.{}", BASE64.encode(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_never_expires() {
        let token = SessionToken::bearer("abc");
        assert!(!token.is_expired());
    }

    #[test]
    fn token_within_skew_margin_is_expired() {
        let fresh = SessionToken::expiring("abc", Duration::from_secs(3600));
        assert!(!fresh.is_expired());

        let stale = SessionToken::expiring("abc", Duration::from_secs(5));
        assert!(stale.is_expired(), "5s left is inside the 20s margin");

        let dead = SessionToken::expiring("abc", Duration::ZERO);
        assert!(dead.is_expired());
    }

    #[test]
    fn cell_swap_and_clear() {
        let cell = TokenCell::new(None);
        assert!(cell.current().is_none());
        assert!(cell.valid().is_none());

        cell.store(SessionToken::expiring("first", LOCAL_TOKEN_EXPIRES_IN));
        assert_eq!(cell.valid().unwrap().token, "first");

        // Last refresh wins.
        cell.store(SessionToken::expiring("second", LOCAL_TOKEN_EXPIRES_IN));
        assert_eq!(cell.valid().unwrap().token, "second");

        cell.clear();
        assert!(cell.current().is_none());
    }

    #[test]
    fn token_is_trimmed() {
        let token = SessionToken::bearer("  abc \n");
        assert_eq!(token.token, "abc");
    }

    #[test]
    fn subprotocol_encodes_token_without_padding() {
        assert_eq!(ws_subprotocol("abc"), "authorization.bearer.YWJj");
        // 4 bytes would pad under plain base64; the header value must not.
        assert_eq!(ws_subprotocol("abcd"), "authorization.bearer.YWJjZA");
        assert!(!ws_subprotocol("abcd").contains('='));
    }
}
