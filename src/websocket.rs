//! Live-event streaming over the `/ws/events` WebSocket endpoint.
//!
//! The lifecycle is explicit: `Disconnected -> connect() -> Connected ->
//! listen() -> Disconnected`, with `disconnect()` reachable from any
//! state and idempotent. There is at most one live socket per stream;
//! a second `connect` while connected is a no-op.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use url::Url;

use crate::error::Error;

/// Fixed event-stream path on both the cloud API and the gateway.
pub const WS_EVENTS_PATH: &str = "/ws/events";

/// Keepalive ping interval while listening.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Event types carried in the canonical subscription message.
pub const SUBSCRIPTION_EVENT_TYPES: &[&str] = &[
    "OUTPUT_CHANGE",
    "SENSOR_CHANGE",
    "SHUTTER_CHANGE",
    "THERMOSTAT_CHANGE",
    "THERMOSTAT_GROUP_CHANGE",
    "VENTILATION_CHANGE",
];

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Handshake ────────────────────────────────────────────────────────

/// Prepared WebSocket handshake, built by the owning client from its
/// token manager. The bearer token rides in the subprotocol value
/// (`authorization.bearer.<base64(token)>`), not an `Authorization`
/// header -- that is what the server expects.
#[derive(Debug, Clone)]
pub(crate) struct WsHandshake {
    pub url: Url,
    pub subprotocol: String,
    pub origin: Option<String>,
    /// Sent as the first text frame after the socket opens.
    pub subscription: Option<Value>,
}

// ── EventStream ──────────────────────────────────────────────────────

/// Connection state for one client's event stream.
///
/// The socket sits behind an async mutex held for the whole `listen`
/// loop; `disconnect` goes through a cancellation token so it can stop
/// a running loop without contending for the socket.
pub struct EventStream {
    host: String,
    socket: tokio::sync::Mutex<Option<WsStream>>,
    connected: AtomicBool,
    cancel: Mutex<CancellationToken>,
    heartbeat: Duration,
}

enum LoopEnd {
    Cancelled,
    ClosedByPeer,
    Fault(Error),
}

impl EventStream {
    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            socket: tokio::sync::Mutex::new(None),
            connected: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    /// `true` iff a live socket handle exists.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Open the socket and send the subscription message.
    ///
    /// No-op when already connected. Handshake or DNS failure maps to a
    /// connection error naming the attempted URL.
    pub(crate) async fn connect(&self, handshake: WsHandshake) -> Result<(), Error> {
        if self.connected() {
            return Ok(());
        }

        let uri: tungstenite::http::Uri =
            handshake
                .url
                .as_str()
                .parse()
                .map_err(|e| Error::Connection {
                    message: format!("invalid WebSocket URL {}: {e}", handshake.url),
                })?;

        let mut request = ClientRequestBuilder::new(uri)
            .with_sub_protocol(&handshake.subprotocol)
            .with_header("User-Agent", crate::transport::USER_AGENT);
        if let Some(origin) = &handshake.origin {
            request = request.with_header("Origin", origin);
        }

        debug!(url = %handshake.url, "opening event stream");

        let (mut socket, _response) = connect_async(request)
            .await
            .map_err(|e| classify_handshake_error(e, &handshake.url))?;

        if let Some(subscription) = &handshake.subscription {
            socket
                .send(Message::Text(subscription.to_string().into()))
                .await
                .map_err(|e| Error::Connection {
                    message: format!("failed to send event subscription: {e}"),
                })?;
        }

        *self.socket.lock().await = Some(socket);
        *self.cancel.lock().expect("cancel lock poisoned") = CancellationToken::new();
        self.connected.store(true, Ordering::SeqCst);

        info!(host = %self.host, "event stream connected");
        Ok(())
    }

    /// Receive loop: each inbound text frame is decoded as JSON and
    /// passed to `handler`.
    ///
    /// Runs until the peer closes the socket (`ConnectionClosed`), a
    /// stream fault occurs (`Connection`), or [`disconnect`](Self::disconnect)
    /// cancels it (returns `Ok`). Calling this while disconnected is a
    /// caller error and performs no I/O.
    pub async fn listen<F>(&self, mut handler: F) -> Result<(), Error>
    where
        F: FnMut(Value),
    {
        let cancel = self.cancel.lock().expect("cancel lock poisoned").clone();

        let mut guard = self.socket.lock().await;
        let Some(socket) = guard.as_mut() else {
            return Err(Error::other(format!(
                "not connected to the OpenMotics WebSocket on {}",
                self.host
            )));
        };

        let end = run_loop(socket, &cancel, self.heartbeat, &mut handler).await;

        self.connected.store(false, Ordering::SeqCst);
        match end {
            LoopEnd::Cancelled => {
                if let Some(mut socket) = guard.take() {
                    let _ = socket.close(None).await;
                }
                Ok(())
            }
            LoopEnd::ClosedByPeer => {
                *guard = None;
                Err(Error::ConnectionClosed {
                    host: self.host.clone(),
                })
            }
            LoopEnd::Fault(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    /// Close the socket. Idempotent; a no-op when not connected.
    pub async fn disconnect(&self) {
        if !self.connected() {
            return;
        }

        // Stops a running listen loop, which closes the socket itself.
        self.cancel.lock().expect("cancel lock poisoned").cancel();

        // Nobody listening: close the socket directly.
        if let Ok(mut guard) = self.socket.try_lock() {
            if let Some(mut socket) = guard.take() {
                let _ = socket.close(None).await;
            }
            self.connected.store(false, Ordering::SeqCst);
        }

        debug!(host = %self.host, "event stream disconnected");
    }
}

async fn run_loop<F>(
    socket: &mut WsStream,
    cancel: &CancellationToken,
    heartbeat: Duration,
    handler: &mut F,
) -> LoopEnd
where
    F: FnMut(Value),
{
    let start = tokio::time::Instant::now() + heartbeat;
    let mut ping = tokio::time::interval_at(start, heartbeat);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return LoopEnd::Cancelled,
            _ = ping.tick() => {
                trace!("sending keepalive ping");
                if let Err(e) = socket.send(Message::Ping(Vec::new().into())).await {
                    return LoopEnd::Fault(Error::Connection {
                        message: format!("keepalive ping failed: {e}"),
                    });
                }
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                    Ok(value) => handler(value),
                    Err(e) => debug!(error = %e, "ignoring non-JSON text frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = &frame {
                        debug!(code = %frame.code, reason = %frame.reason, "close frame received");
                    }
                    return LoopEnd::ClosedByPeer;
                }
                Some(Ok(_)) => {
                    // Ping/Pong/Binary -- tungstenite answers pings itself.
                }
                Some(Err(e)) => {
                    return LoopEnd::Fault(Error::Connection {
                        message: format!("event stream fault: {e}"),
                    });
                }
                None => return LoopEnd::ClosedByPeer,
            }
        }
    }
}

fn classify_handshake_error(e: tungstenite::Error, url: &Url) -> Error {
    match e {
        tungstenite::Error::Tls(e) => Error::ConnectionSsl {
            message: format!("TLS failure on WebSocket handshake with {url}: {e}"),
        },
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            Error::Authentication {
                message: format!("WebSocket handshake with {url} rejected: {}", response.status()),
            }
        }
        other => Error::Connection {
            message: format!("WebSocket handshake with {url} failed: {other}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_disconnected() {
        let stream = EventStream::new("gw.local");
        assert!(!stream.connected());
    }

    #[tokio::test]
    async fn listen_without_connect_is_a_caller_error() {
        let stream = EventStream::new("gw.local");

        let err = stream.listen(|_| {}).await.unwrap_err();
        assert!(
            matches!(err, Error::Other { ref message } if message.contains("gw.local")),
            "expected Other naming the host, got: {err:?}"
        );
    }

    #[tokio::test]
    async fn disconnect_when_disconnected_is_a_no_op() {
        let stream = EventStream::new("gw.local");
        stream.disconnect().await;
        stream.disconnect().await;
        assert!(!stream.connected());
    }

    #[tokio::test]
    async fn connect_rejects_unresolvable_host() {
        let stream = EventStream::new("does-not-exist.invalid");
        let handshake = WsHandshake {
            url: Url::parse("wss://does-not-exist.invalid/ws/events").unwrap(),
            subprotocol: crate::token::ws_subprotocol("abc"),
            origin: None,
            subscription: None,
        };

        let err = stream.connect(handshake).await.unwrap_err();
        assert!(
            matches!(err, Error::Connection { ref message } if message.contains("does-not-exist.invalid")),
            "expected Connection naming the URL, got: {err:?}"
        );
        assert!(!stream.connected());
    }
}
