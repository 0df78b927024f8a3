//! Integration tests for sessions and the top-level verbs over TCP

use napping::{
    Encoding, ErrorCategory, HttpMethod, NappingError, Opts, Params, Request, Session,
    SessionConfig, Userinfo,
};
use serde::{Deserialize, Serialize};
use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    foo: i32,
    bar: String,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
struct ApiError {
    status: u16,
    message: String,
}

/// Responds with the request body and the request's content type
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let content_type = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        ResponseTemplate::new(200).set_body_raw(request.body.clone(), &content_type)
    }
}

fn foo_item() -> Item {
    Item {
        foo: 111,
        bar: "foo".to_string(),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_get_with_params_and_existing_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("foo", "bar"))
        .and(query_param("page", "2"))
        .and(query_param("sort", "asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(foo_item()))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = Params::new();
    params.insert("foo".to_string(), "bar".to_string());
    params.insert("page".to_string(), "2".to_string());

    let mut item = Item::default();
    let url = format!("{}/items?page=1&sort=asc", server.uri());
    let response = napping::get(&url, Some(&params), &mut item, (), None)
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(item, foo_item());

    let received = server.received_requests().await.unwrap();
    let pages: Vec<String> = received[0]
        .url
        .query_pairs()
        .filter(|(k, _)| k == "page")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(pages, vec!["2".to_string()]);
}

#[tokio::test]
async fn test_post_encodes_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_json(foo_item()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let response = napping::post(
        &format!("{}/items", server.uri()),
        &foo_item(),
        (),
        (),
        None,
    )
    .await
    .unwrap();

    assert_eq!(response.status(), 201);
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_json_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(Echo)
        .mount(&server)
        .await;

    let session = Session::default_session().unwrap();
    let mut echoed = Item::default();
    session
        .put(&server.uri(), &foo_item(), &mut echoed, (), None)
        .await
        .unwrap();

    assert_eq!(echoed, foo_item());
}

#[tokio::test]
async fn test_xml_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(header("content-type", "application/xml"))
        .respond_with(Echo)
        .mount(&server)
        .await;

    let session = Session::new(SessionConfig::new().encoding(Encoding::Xml)).unwrap();
    let mut echoed = Item::default();
    let response = session
        .patch(&server.uri(), &foo_item(), &mut echoed, (), None)
        .await
        .unwrap();

    assert_eq!(echoed, foo_item());
    assert!(response.raw_text().starts_with("<Item>"));
}

#[tokio::test]
async fn test_error_response_fills_error_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "status": 500,
            "message": "Internal Server Error"
        })))
        .mount(&server)
        .await;

    let mut item = Item::default();
    let mut api_error = ApiError::default();
    let response = napping::get(&server.uri(), None, &mut item, &mut api_error, None)
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(api_error.status, 500);
    assert_eq!(api_error.message, "Internal Server Error");
    assert_eq!(item, Item::default());
}

#[tokio::test]
async fn test_basic_auth_with_unsafe_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(basic_auth("jtkirk", "Beam me up, Scotty!"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new(SessionConfig::new().unsafe_basic_auth(true)).unwrap();
    let opts = Opts::new().userinfo(Userinfo::new("jtkirk", "Beam me up, Scotty!"));
    let response = session
        .get(&server.uri(), None, (), (), Some(opts))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_basic_auth_refused_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let url = server.uri().replace("http://", "http://user:secret@");
    let err = napping::get(&url, None, (), (), None).await.unwrap_err();

    assert!(matches!(err, NappingError::UnsafeBasicAuth { .. }));
    assert_eq!(err.category(), ErrorCategory::Auth);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_defaults_and_request_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-api-version", "2"))
        .and(header("x-client", "napping-test"))
        .and(query_param("limit", "10"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let defaults = Opts::new()
        .try_header("X-Api-Version", "1")
        .unwrap()
        .try_header("X-Client", "napping-test")
        .unwrap()
        .param("limit", "10")
        .param("page", "1");
    let session = Session::new(SessionConfig::new().defaults(defaults)).unwrap();

    let call = Opts::new()
        .try_header("x-api-version", "2")
        .unwrap()
        .param("page", "3");
    session
        .get(&server.uri(), None, (), (), Some(call))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_raw_payload_sent_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(Echo)
        .mount(&server)
        .await;

    let bytes = vec![0u8, 1, 2, 254, 255];
    let session = Session::new(SessionConfig::new().log(true)).unwrap();
    init_tracing();

    let mut request = Request::new(HttpMethod::Post, server.uri())
        .raw_payload(bytes.clone())
        .opts(
            Opts::new()
                .try_header("Content-Type", "application/octet-stream")
                .unwrap(),
        );
    let response = session.send(&mut request).await.unwrap();

    assert_eq!(response.bytes(), bytes.as_slice());
    assert_eq!(request.status(), Some(200));
    assert!(request.timestamp().is_some());
}

#[tokio::test]
async fn test_raw_marker_with_value_payload() {
    let mut request = Request::new(HttpMethod::Post, "http://127.0.0.1:9/")
        .payload(foo_item())
        .mark_raw();
    let err = napping::send(&mut request).await.unwrap_err();
    assert!(matches!(err, NappingError::InvalidRawPayload));
    assert!(!request.is_sent());
}

#[tokio::test]
async fn test_expected_status_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202).set_body_json(foo_item()))
        .mount(&server)
        .await;

    let mut item = Item::default();
    let err = napping::delete(
        &server.uri(),
        &mut item,
        (),
        Some(Opts::new().expected_status(204)),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), Some(202));
    assert_eq!(item, foo_item());
}

#[tokio::test]
async fn test_head_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("OPTIONS"))
        .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, POST"))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::default_session().unwrap();
    let head = session.head(&server.uri(), (), (), None).await.unwrap();
    assert_eq!(head.status(), 200);

    let options = session.options(&server.uri(), (), (), None).await.unwrap();
    assert_eq!(options.header("Allow"), Some("GET, POST"));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = napping::get(&format!("http://{}/", addr), None, (), (), None)
        .await
        .unwrap_err();
    assert!(matches!(err, NappingError::Transport(_)));
    assert_eq!(err.category(), ErrorCategory::Connection);
}
