//! Integration tests for middleware functionality.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stowage::middleware::{ConcurrencyLimitLayer, LoggingLayer};
use stowage::{
    Body, Error, HeaderMap, HeaderValue, HyperTransport, Method, Request, Result, Transport, header,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header as header_is, method, path},
};

fn get(server: &MockServer, route: &str) -> Request {
    let url = url::Url::parse(&format!("{}{route}", server.uri())).expect("url");
    Request::new(Method::GET, url, HeaderMap::new(), Body::Empty)
}

/// Test that the signer sees every request and its header reaches the server.
#[tokio::test]
async fn test_signer_adds_authorization() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/signed"))
        .and(header_is("Authorization", "q-sign-algorithm=sha1&q-signature=abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let transport = HyperTransport::builder()
        .with_signer(move |request: &mut Request| -> Result<()> {
            seen.fetch_add(1, Ordering::SeqCst);
            request.headers_mut().insert(
                header::AUTHORIZATION,
                HeaderValue::from_static("q-sign-algorithm=sha1&q-signature=abc"),
            );
            Ok(())
        })
        .build();

    for _ in 0..2 {
        let response = transport.execute(get(&mock_server, "/signed")).await.expect("response");
        assert!(response.is_success());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test that a signing failure stops the request before it is sent.
#[tokio::test]
async fn test_signer_failure_is_returned() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let transport = HyperTransport::builder()
        .with_signer(|_: &mut Request| -> Result<()> {
            Err(Error::configuration("credentials expired"))
        })
        .build();

    let result = transport.execute(get(&mock_server, "/never")).await;

    let err = result.expect_err("signing error");
    assert!(err.is_configuration());
}

/// Test that logging middleware doesn't break request/response flow.
#[tokio::test]
async fn test_logging_middleware() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/logged"))
        .respond_with(ResponseTemplate::new(200).set_body_string("logged"))
        .mount(&mock_server)
        .await;

    let transport = HyperTransport::builder().with_debug_logging().build();

    let response = transport.execute(get(&mock_server, "/logged")).await.expect("response");
    let response = response.collect().await.expect("body");

    assert_eq!(response.body().as_ref(), b"logged");
}

/// Test that the transport returns error statuses without retrying.
#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = HyperTransport::builder().with_defaults().build();

    let response = transport.execute(get(&mock_server, "/error")).await.expect("response");

    assert_eq!(response.status(), 503);
    assert!(response.is_server_error());
}

/// Test multiple middleware composed together.
#[tokio::test]
async fn test_middleware_composition() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/composed"))
        .and(header_is("Authorization", "token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    // Compose: concurrency limit -> signer -> logging
    let transport = HyperTransport::builder()
        .layer(ConcurrencyLimitLayer::new(4))
        .with_signer(|request: &mut Request| -> Result<()> {
            request
                .headers_mut()
                .insert(header::AUTHORIZATION, HeaderValue::from_static("token"));
            Ok(())
        })
        .layer(LoggingLayer::new())
        .build();

    let response = transport.execute(get(&mock_server, "/composed")).await.expect("response");

    assert!(response.is_success());
}
