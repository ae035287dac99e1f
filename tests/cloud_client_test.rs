// Integration tests for `CloudClient` using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use openmotics::cloud::CloudClient;
use openmotics::{Error, RequestDescriptor, RetryPolicy, TokenRefresher, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

async fn setup(installation_id: u32) -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let client = CloudClient::builder()
        .token("cloud-token")
        .base_url(server.uri())
        .installation_id(installation_id)
        .retry(fast_retry())
        .build()
        .unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_outputs_get_all() {
    let (server, client) = setup(21).await;

    let body = json!({
        "data": [
            {
                "id": 18,
                "name": "Vijver",
                "type": "OUTLET",
                "status": {"on": true, "locked": false, "value": 100}
            },
            {"id": 19, "name": "Garage", "type": "LIGHT", "status": {"on": false}}
        ]
    });

    Mock::given(method("GET"))
        .and(path("/base/installations/21/outputs"))
        .and(header("authorization", "Bearer cloud-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let outputs = client.outputs.get_all().await.unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].name.as_deref(), Some("Vijver"));
    assert!(outputs[0].is_on());
    assert!(!outputs[1].is_on());
}

#[tokio::test]
async fn test_turn_on_clamps_the_dimmer_value() {
    let (server, client) = setup(21).await;

    Mock::given(method("POST"))
        .and(path("/base/installations/21/outputs/18/turn_on"))
        .and(body_json(json!({"value": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.outputs.turn_on(18, Some(250)).await.unwrap();
}

#[tokio::test]
async fn test_thermostat_setpoint() {
    let (server, client) = setup(21).await;

    Mock::given(method("POST"))
        .and(path("/base/installations/21/thermostats/units/3/setpoint"))
        .and(body_json(json!({"temperature": 21.5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.thermostats.set_temperature(3, 21.5).await.unwrap();
}

#[tokio::test]
async fn test_bool_query_params_become_strings() {
    let (server, client) = setup(21).await;

    Mock::given(method("GET"))
        .and(path("/base/installations"))
        .and(query_param("include_status", "true"))
        .and(query_param("archived", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .get_with_params(
            "/base/installations",
            vec![
                ("include_status".to_owned(), json!(true)),
                ("archived".to_owned(), json!(false)),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_descriptor_headers_override_engine_defaults() {
    let (server, client) = setup(21).await;

    Mock::given(method("GET"))
        .and(path("/export"))
        .and(query_param("limit", "5"))
        .and(header("accept", "text/csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("id;name"))
        .expect(1)
        .mount(&server)
        .await;

    let desc = RequestDescriptor::get("/export")
        .with_param("limit", 5)
        .with_header("Accept", "text/csv");
    let payload = client.request(&desc).await.unwrap();
    assert_eq!(payload.as_text(), Some("id;name"));
}

#[tokio::test]
async fn test_text_responses_come_back_raw() {
    let (server, client) = setup(21).await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let payload = client.get("/health").await.unwrap();
    assert_eq!(payload.as_text(), Some("pong"));
}

// ── Token lifecycle ─────────────────────────────────────────────────

#[tokio::test]
async fn test_refresher_runs_before_every_request() {
    let server = MockServer::start().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let refresher: TokenRefresher = Arc::new(move || {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("fresh-token".to_owned())
        })
    });

    let client = CloudClient::builder()
        .token_refresher(refresher)
        .base_url(server.uri())
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/base/installations"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(2)
        .mount(&server)
        .await;

    client.installations.get_all().await.unwrap();
    client.installations.get_all().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_token_is_an_authentication_error() {
    let server = MockServer::start().await;
    let client = CloudClient::builder()
        .base_url(server.uri())
        .build()
        .unwrap();

    let err = client.get("/base/installations").await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
}

// ── Retry & error classification ────────────────────────────────────

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (server, client) = setup(21).await;

    Mock::given(method("GET"))
        .and(path("/base/installations/21/outputs"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/base/installations/21/outputs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let outputs = client.outputs.get_all().await.unwrap();
    assert!(outputs.is_empty());
}

#[tokio::test]
async fn test_retries_stop_at_the_attempt_cap() {
    let (server, client) = setup(21).await;

    Mock::given(method("GET"))
        .and(path("/base/installations/21/outputs"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.outputs.get_all().await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let (server, client) = setup(21).await;

    Mock::given(method("GET"))
        .and(path("/base/installations/21/outputs"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.outputs.get_all().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_slow_responses_hit_the_engine_timeout() {
    let server = MockServer::start().await;
    let client = CloudClient::builder()
        .token("cloud-token")
        .base_url(server.uri())
        .transport(TransportConfig::default().with_timeout(Duration::from_millis(150)))
        .retry(fast_retry())
        .build()
        .unwrap();

    // A timeout is surfaced immediately, never retried.
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get("/slow").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_connect_without_credentials_is_a_caller_error() {
    let server = MockServer::start().await;
    let client = CloudClient::builder()
        .base_url(server.uri())
        .build()
        .unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, Error::Other { .. }), "got: {err:?}");
    assert!(!client.connected());
}
