use std::collections::HashMap;
use wayward::http::request::{Method, Request, RequestBuilder};

fn request(version: &str, headers: &[(&str, &str)]) -> Request {
    Request {
        method: Method::GET,
        path: "/".to_string(),
        version: version.to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        params: HashMap::new(),
        body: vec![],
    }
}

#[test]
fn test_request_header_retrieval() {
    let req = request(
        "HTTP/1.1",
        &[("Host", "example.com"), ("Content-Type", "application/json")],
    );

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_header_case_insensitive_fallback() {
    let req = request("HTTP/1.1", &[("content-type", "text/html")]);

    assert_eq!(req.header("Content-Type"), Some("text/html"));
}

#[test]
fn test_request_content_length_parsing() {
    let req = request("HTTP/1.1", &[("Content-Length", "42")]);
    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing() {
    let req = request("HTTP/1.1", &[]);
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_content_length_invalid() {
    let req = request("HTTP/1.1", &[("Content-Length", "not-a-number")]);
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_builder_repeated_header_keeps_last_value() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("X-Token", "first")
        .header("x-token", "second")
        .build()
        .unwrap();

    assert_eq!(req.headers.len(), 1);
    assert_eq!(req.header("X-Token"), Some("second"));
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(Method::from_str("TRACE"), Some(Method::TRACE));
    assert_eq!(Method::from_str("INVALID"), None);
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
}

#[test]
fn test_request_method_display() {
    assert_eq!(Method::DELETE.to_string(), "DELETE");
}

#[test]
fn test_request_route_path_and_query() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/search?q=rust+lang&page=2")
        .build()
        .unwrap();

    assert_eq!(req.route_path(), "/search");
    assert_eq!(req.query(), Some("q=rust+lang&page=2"));
    assert_eq!(
        req.query_pairs(),
        vec![
            ("q".to_string(), "rust lang".to_string()),
            ("page".to_string(), "2".to_string()),
        ]
    );
}

#[test]
fn test_request_without_query() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/plain")
        .build()
        .unwrap();

    assert_eq!(req.route_path(), "/plain");
    assert_eq!(req.query(), None);
    assert!(req.query_pairs().is_empty());
}

#[test]
fn test_request_builder_defaults_and_errors() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .body("payload")
        .build()
        .unwrap();

    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.body, b"payload".to_vec());
    assert!(req.params.is_empty());

    assert_eq!(RequestBuilder::new().path("/").build().unwrap_err(), "method missing");
    assert_eq!(
        RequestBuilder::new().method(Method::GET).build().unwrap_err(),
        "path missing"
    );
}
