//! ReqwestTransport against a local HTTP server

use contentstack_core::http::{ErrorCode, ErrorKind};
use contentstack_core::{ClientConfig, HttpClient, Params};
use mockito::Matcher;
use serde_json::{json, Value};

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

fn client(server: &mockito::ServerGuard, options: ClientConfig) -> HttpClient {
    let options = options.with_endpoint(format!("{}/v3", server.url()));
    HttpClient::new(&options).unwrap()
}

#[tokio::test]
async fn test_get_with_bracket_params_and_auth_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/content_types/blog/entries")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("include[]".into(), "author".into()),
            Matcher::UrlEncoded("locale".into(), "en-us".into()),
        ]))
        .match_header("api_key", "blt_key")
        .match_header("access_token", "cs_token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"entries":[{"uid":"blt1"}]}"#)
        .create_async()
        .await;

    let client = client(
        &server,
        ClientConfig::new()
            .with_api_key("blt_key")
            .with_access_token("cs_token"),
    );
    let data = client
        .get_data(
            "/content_types/blog/entries",
            params(json!({"include": ["author"], "locale": "en-us"})),
        )
        .await
        .unwrap();

    assert_eq!(data, json!({"entries": [{"uid": "blt1"}]}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_filter_is_sent_as_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/entries")
        .match_query(Matcher::UrlEncoded(
            "query".into(),
            r#"{"title":"hello"}"#.into(),
        ))
        .with_status(200)
        .with_body(r#"{"entries":[]}"#)
        .create_async()
        .await;

    let client = client(&server, ClientConfig::new());
    client
        .get_data("/entries", params(json!({"query": {"title": "hello"}})))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_long_url_is_sent_compact() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/entries")
        .match_query(Matcher::Regex("^include=field_000,field_001,".into()))
        .with_status(200)
        .with_body(r#"{"entries":[]}"#)
        .create_async()
        .await;

    let fields: Vec<Value> = (0..150).map(|i| json!(format!("field_{:03}", i))).collect();
    let client = client(&server, ClientConfig::new());
    client
        .get_data("/entries", params(json!({ "include": fields })))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_response_is_normalized() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v3/entries/missing")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error_message":"The requested entry doesn't exist.","error_code":141,"errors":{"uid":["is not valid."]}}"#)
        .create_async()
        .await;

    let client = client(&server, ClientConfig::new());
    let error = client
        .get_data("/entries/missing", Params::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::Http);
    assert_eq!(error.error_message, "The requested entry doesn't exist.");
    assert_eq!(error.error_code, ErrorCode::Number(141));
    assert_eq!(error.status, 404);
    assert_eq!(error.status_text.as_deref(), Some("Not Found"));
    assert_eq!(error.errors, Some(json!({"uid": ["is not valid."]})));
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v3/entries")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let client = client(&server, ClientConfig::new());
    let error = client.get_data("/entries", Params::new()).await.unwrap_err();
    assert_eq!(error.error_message, "Bad Gateway");
    assert_eq!(error.error_code, ErrorCode::Number(502));
}

#[tokio::test]
async fn test_rate_limited_until_limit() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/entries")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(r#"{"error_message":"Too many requests","error_code":429}"#)
        .expect(2)
        .create_async()
        .await;

    let client = client(&server, ClientConfig::new().with_retry_limit(2));
    let error = client.get_data("/entries", Params::new()).await.unwrap_err();

    assert_eq!(error.status, 429);
    assert_eq!(error.error_message, "Too many requests");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_success_body_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v3/entries")
        .with_status(200)
        .create_async()
        .await;

    let client = client(&server, ClientConfig::new());
    let error = client.get_data("/entries", Params::new()).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_connection_refused_is_a_network_error() {
    let options = ClientConfig::new().with_endpoint("http://127.0.0.1:1/v3");
    let client = HttpClient::new(&options).unwrap();

    let error = client.get_data("/entries", Params::new()).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Network);
    assert_eq!(error.status, 0);
    assert_eq!(error.error_code, ErrorCode::Text("NETWORK_ERROR".into()));
}
