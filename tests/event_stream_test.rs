// Integration tests for the live-event stream against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use openmotics::gateway::LocalGateway;
use openmotics::{Error, LOCAL_TOKEN_EXPIRES_IN};

// ── Helpers ─────────────────────────────────────────────────────────

async fn bound_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn gateway_on(port: u16) -> LocalGateway {
    let gateway = LocalGateway::builder("127.0.0.1", "admin", "hunter2")
        .port(port)
        .build()
        .unwrap();
    gateway.store_token("ws-token", LOCAL_TOKEN_EXPIRES_IN);
    gateway
}

/// The server must echo the requested subprotocol or the client rejects
/// the handshake.
fn echo_subprotocol(req: &Request, mut resp: Response) -> Result<Response, ErrorResponse> {
    if let Some(proto) = req.headers().get("sec-websocket-protocol").cloned() {
        resp.headers_mut().insert("sec-websocket-protocol", proto);
    }
    Ok(resp)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscribe_receive_and_peer_close() {
    let (listener, port) = bound_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();

        let mut subprotocol = None;
        let callback = |req: &Request, resp: Response| {
            subprotocol = req
                .headers()
                .get("sec-websocket-protocol")
                .map(|v| v.to_str().unwrap().to_owned());
            echo_subprotocol(req, resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        let subscription = ws.next().await.unwrap().unwrap().into_text().unwrap();
        ws.send(Message::Text(
            r#"{"type":"OUTPUT_CHANGE","data":{"id":5,"status":{"on":true}}}"#.into(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();

        (subprotocol, subscription)
    });

    let gateway = gateway_on(port);
    gateway.connect().await.unwrap();
    assert!(gateway.connected());

    let mut events = Vec::new();
    let err = gateway.listen(|event| events.push(event)).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed { .. }), "got: {err:?}");
    assert!(!gateway.connected());

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "OUTPUT_CHANGE");
    assert_eq!(events[0]["data"]["id"], 5);

    let (subprotocol, subscription) = server.await.unwrap();
    let subprotocol = subprotocol.unwrap();
    assert_eq!(
        subprotocol,
        format!("authorization.bearer.{}", BASE64.encode("ws-token"))
    );
    assert!(!subprotocol.contains('='), "got: {subprotocol}");
    assert!(subscription.contains("set_subscription"));
    assert!(subscription.contains("OUTPUT_CHANGE"));
}

#[tokio::test]
async fn test_disconnect_stops_a_running_listen() {
    let (listener, port) = bound_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_hdr_async(stream, echo_subprotocol).await.unwrap();
        // Drain frames until the client closes.
        while let Some(Ok(frame)) = ws.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    });

    let gateway = Arc::new(gateway_on(port));
    gateway.connect().await.unwrap();

    // A second connect while connected is a no-op.
    gateway.connect().await.unwrap();
    assert!(gateway.connected());

    let listening = Arc::clone(&gateway);
    let listen_task = tokio::spawn(async move { listening.listen(|_| {}).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    gateway.disconnect().await;

    let result = tokio::time::timeout(Duration::from_secs(2), listen_task)
        .await
        .expect("listen did not stop after disconnect")
        .unwrap();
    assert!(result.is_ok(), "got: {result:?}");
    assert!(!gateway.connected());

    server.await.unwrap();
}

#[tokio::test]
async fn test_rejected_handshake_is_an_authentication_error() {
    let (listener, port) = bound_listener().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let reject = |_req: &Request, _resp: Response| -> Result<Response, ErrorResponse> {
            Err(tokio_tungstenite::tungstenite::http::Response::builder()
                .status(401)
                .body(None)
                .unwrap())
        };
        let _ = accept_hdr_async(stream, reject).await;
    });

    let gateway = gateway_on(port);
    let err = gateway.connect().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
    assert!(!gateway.connected());
}

#[tokio::test]
async fn test_disconnect_without_listen_closes_the_socket() {
    let (listener, port) = bound_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_hdr_async(stream, echo_subprotocol).await.unwrap();
        // Subscription frame, then the close initiated by disconnect().
        let _ = ws.next().await;
        while let Some(Ok(frame)) = ws.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    });

    let gateway = gateway_on(port);
    gateway.connect().await.unwrap();
    gateway.disconnect().await;
    assert!(!gateway.connected());

    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server never saw the close frame")
        .unwrap();
}
