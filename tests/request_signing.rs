//! Request authentication integration tests

mod common;

use common::{gateway, test_config};
use serde_json::json;
use siga_client::auth::{
    HEADER_HMAC_ALGORITHM, HEADER_SERVICE_UUID, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};
use siga_client::{ApiGateway, DigestFile, Endpoint, RequestAuthenticator, SigaError, SigningSession};
use std::sync::Arc;

fn find_header<'a>(request: &'a siga_client::HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn header<'a>(request: &'a siga_client::HttpRequest, name: &str) -> &'a str {
    find_header(request, name).unwrap_or_else(|| panic!("missing header {}", name))
}

#[test]
fn test_every_request_carries_valid_signature() {
    let (gateway, transport) = gateway();
    transport
        .respond(200, json!({ "containerId": "c1" }))
        .respond(200, json!({ "dataFiles": [] }));

    let open = SigningSession::new(&gateway)
        .create_container(&[DigestFile::new("a.txt", 5, b"hello")])
        .unwrap();
    open.container().data_files().unwrap();

    let authenticator = RequestAuthenticator::new(Arc::new(test_config().credentials));
    let before = chrono::Utc::now().timestamp();

    for request in transport.requests() {
        assert_eq!(header(&request, HEADER_SERVICE_UUID), "a7fd7728-a3ea-4975-bfab-f240a67e894f");
        assert_eq!(header(&request, HEADER_HMAC_ALGORITHM), "HmacSHA256");

        let timestamp: i64 = header(&request, HEADER_TIMESTAMP).parse().unwrap();
        assert!((before - timestamp).abs() < 60);

        let path = reqwest::Url::parse(&request.url).unwrap().path().to_string();
        let body = request.body.clone().unwrap_or_default();
        let expected = authenticator.sign(request.method.as_str(), &path, &body, timestamp);
        assert_eq!(header(&request, HEADER_SIGNATURE), expected);
    }
}

#[test]
fn test_signed_body_is_sent_body() {
    let (gateway, transport) = gateway();
    transport.respond(200, json!({ "containerId": "c1" }));

    SigningSession::new(&gateway)
        .create_container(&[DigestFile::new("a.txt", 5, b"hello")])
        .unwrap();

    let request = &transport.requests()[0];
    let body = request.body.as_ref().unwrap();
    let timestamp: i64 = header(request, HEADER_TIMESTAMP).parse().unwrap();
    let authenticator = RequestAuthenticator::new(Arc::new(test_config().credentials));

    let mut reserialized = serde_json::to_vec_pretty(
        &serde_json::from_slice::<serde_json::Value>(body).unwrap(),
    )
    .unwrap();
    reserialized.push(b'\n');
    assert_ne!(
        authenticator.sign("POST", "/siga/hashcodecontainers", &reserialized, timestamp),
        header(request, HEADER_SIGNATURE)
    );
    assert_eq!(
        authenticator.sign("POST", "/siga/hashcodecontainers", body, timestamp),
        header(request, HEADER_SIGNATURE)
    );
}

#[test]
fn test_segments_that_change_path_are_rejected() {
    let (gateway, transport) = gateway();
    let err = gateway
        .get_container(Endpoint::Hashcode, "c1/../other")
        .unwrap_err();
    assert!(matches!(err, SigaError::SessionPrecondition(_)));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_dot_segments_and_escapes_are_rejected() {
    let (gateway, transport) = gateway();
    for id in ["..", ".", "a\\..\\..", "%2e%2e", "c1%2F..", "c1\n"] {
        let err = gateway.delete_container(Endpoint::Hashcode, id).unwrap_err();
        assert!(matches!(err, SigaError::SessionPrecondition(_)), "{:?} was accepted", id);
        assert!(gateway.api_uri("hashcodecontainers", &[id, "datafiles"]).is_err());
    }
    assert!(transport.requests().is_empty());
}

#[test]
fn test_resume_rejects_path_escaping_id() {
    let (gateway, transport) = gateway();
    let session = SigningSession::new(&gateway);
    assert!(matches!(session.resume(".."), Err(SigaError::SessionPrecondition(_))));
    assert!(matches!(session.resume("a\\.."), Err(SigaError::SessionPrecondition(_))));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_json_content_type_only_with_body() {
    let (gateway, transport) = gateway();
    transport
        .respond(200, json!({ "containerId": "c1" }))
        .respond(200, json!({ "dataFiles": [] }))
        .respond(200, json!({ "result": "OK" }));

    SigningSession::new(&gateway)
        .create_container(&[DigestFile::new("a.txt", 5, b"hello")])
        .unwrap();
    gateway.get_data_files(Endpoint::Hashcode, "c1").unwrap();
    gateway.delete_container(Endpoint::Hashcode, "c1").unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, reqwest::Method::POST);
    assert_eq!(find_header(&requests[0], "content-type"), Some("application/json"));
    assert_eq!(requests[1].method, reqwest::Method::GET);
    assert_eq!(find_header(&requests[1], "content-type"), None);
    assert_eq!(requests[2].method, reqwest::Method::DELETE);
    assert_eq!(find_header(&requests[2], "content-type"), None);
}

#[test]
fn test_trailing_slash_in_base_url() {
    let mut config = test_config();
    config.credentials.base_url = "https://siga.example.com/siga/".to_string();
    let transport = common::ScriptedTransport::new();
    let gateway = ApiGateway::with_transport(&config, Box::new(transport.clone())).unwrap();

    let uri = gateway.api_uri("hashcodecontainers", &["c1", "datafiles"]).unwrap();
    assert_eq!(uri.as_str(), "https://siga.example.com/siga/hashcodecontainers/c1/datafiles");
}

#[test]
fn test_invalid_base_url_is_configuration_error() {
    let mut config = test_config();
    config.credentials.base_url = "not a url".to_string();
    let result = ApiGateway::with_transport(&config, Box::new(common::ScriptedTransport::new()));
    assert!(matches!(result, Err(SigaError::Configuration(_))));
}
