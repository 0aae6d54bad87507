//! Pin client against a mock IPFS HTTP API.

use std::time::Duration;

use bytes::Bytes;
use snapie_ipfs::{AddRetry, ContentStore, IpfsPinClient, PinConfig, PinError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> IpfsPinClient {
    IpfsPinClient::new(&PinConfig {
        api_url: server.uri().parse().unwrap(),
        timeout_secs: 5,
    })
    .unwrap()
    .with_retry(AddRetry {
        max_retries: 2,
        base_delay: Duration::ZERO,
    })
}

#[tokio::test]
async fn pin_posts_to_add_and_returns_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .and(query_param("pin", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"Name":"clip.webm","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"11"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let cid = client(&server)
        .pin(Bytes::from_static(b"hello audio"), Some("clip.webm"))
        .await
        .unwrap();
    assert_eq!(cid.as_str(), "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("hello audio"));
    assert!(body.contains("filename=\"clip.webm\""));
}

#[tokio::test]
async fn pin_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(500).set_body_string("repo full"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .pin(Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();
    match err {
        PinError::Api { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "repo full");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn pin_rejects_response_without_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Name":"x"}"#))
        .mount(&server)
        .await;

    let err = client(&server)
        .pin(Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PinError::Response { .. }));
}

#[tokio::test]
async fn pin_retries_while_proxy_reports_node_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"Name":"x","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"1"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let cid = client(&server).pin(Bytes::from_static(b"x"), None).await.unwrap();
    assert_eq!(cid.as_str(), "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
}

#[tokio::test]
async fn pin_gives_up_after_retries_on_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .pin(Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PinError::Api { status: 502, .. }), "{err:?}");
}

#[tokio::test]
async fn pin_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(400).set_body_string("file argument required"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .pin(Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PinError::Api { status: 400, .. }), "{err:?}");
}
