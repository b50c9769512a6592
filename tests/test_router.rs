use std::cell::RefCell;
use std::rc::Rc;

use wayward::http::request::{Method, Request, RequestBuilder};
use wayward::http::response::{Response, StatusCode, plain_text};
use wayward::routing::{Dispatch, RouteError, Router};

fn make_request(method: Method, path: &str) -> Request {
    RequestBuilder::new()
        .method(method)
        .path(path)
        .build()
        .unwrap()
}

fn respond(router: &Router, method: Method, path: &str) -> (Request, Result<Response, RouteError>) {
    let mut req = make_request(method, path);
    let mut res = Response::new();
    let outcome = router.dispatch(&mut req, &mut res).map(|()| res);
    (req, outcome)
}

/// Router whose handlers write their own pattern into the body.
fn tagging_router(patterns: &[&str]) -> Router {
    let mut router = Router::new();
    for pattern in patterns {
        let tag = pattern.to_string();
        router.get(pattern, move |_req, res| plain_text(res, tag.clone()));
    }
    router
}

fn body(outcome: Result<Response, RouteError>) -> String {
    String::from_utf8(outcome.unwrap().body).unwrap()
}

#[test]
fn test_routing_basic() {
    let hits = Rc::new(RefCell::new(Vec::new()));
    let mut router = Router::new();

    let log = Rc::clone(&hits);
    router.get("/", move |_req, _res| log.borrow_mut().push("root"));
    let log = Rc::clone(&hits);
    router.get("/foo", move |_req, _res| log.borrow_mut().push("foo"));

    respond(&router, Method::GET, "/").1.unwrap();
    assert_eq!(*hits.borrow(), vec!["root"]);

    respond(&router, Method::GET, "/foo").1.unwrap();
    assert_eq!(*hits.borrow(), vec!["root", "foo"]);

    let (_, outcome) = respond(&router, Method::GET, "/lol");
    assert!(matches!(outcome, Err(RouteError::NotFound { .. })));
    assert_eq!(*hits.borrow(), vec!["root", "foo"]);
}

#[test]
fn test_routing_capture() {
    let mut router = Router::new();
    let seen = Rc::new(RefCell::new(String::new()));
    let sink = Rc::clone(&seen);
    router.get("/foo/:id", move |req, _res| {
        *sink.borrow_mut() = req.param("id").unwrap_or_default().to_string();
    });

    let (req, outcome) = respond(&router, Method::GET, "/foo/123");

    assert!(outcome.is_ok());
    assert_eq!(*seen.borrow(), "123");
    assert_eq!(req.param("id"), Some("123"));
}

#[test]
fn test_routing_multiple_captures() {
    let mut router = Router::new();
    router.get("/users/:user/posts/:post", |req, res| {
        let text = format!("{}:{}", req.param("user").unwrap(), req.param("post").unwrap());
        plain_text(res, text);
    });

    let (_, outcome) = respond(&router, Method::GET, "/users/ada/posts/7");
    assert_eq!(body(outcome), "ada:7");
}

#[test]
fn test_routing_segment_count_must_match() {
    let router = tagging_router(&["/foo/:id"]);

    assert!(respond(&router, Method::GET, "/foo").1.is_err());
    assert!(respond(&router, Method::GET, "/foo/123/456").1.is_err());
    assert_eq!(body(respond(&router, Method::GET, "/foo/123").1), "/foo/:id");
}

#[test]
fn test_routing_registration_order_beats_specificity() {
    let router = tagging_router(&["/foo", "/:x"]);

    assert_eq!(body(respond(&router, Method::GET, "/foo").1), "/foo");
    assert_eq!(body(respond(&router, Method::GET, "/bar").1), "/:x");

    let reversed = tagging_router(&["/:x", "/foo"]);
    assert_eq!(body(respond(&reversed, Method::GET, "/foo").1), "/:x");
}

#[test]
fn test_routing_is_deterministic() {
    let router = tagging_router(&["/a/:x", "/a/b", "/:y/b", "/"]);

    for path in ["/a/b", "/c/b", "/", "/a/z"] {
        let first = body(respond(&router, Method::GET, path).1);
        for _ in 0..10 {
            assert_eq!(body(respond(&router, Method::GET, path).1), first);
        }
    }
}

#[test]
fn test_routing_trailing_and_double_slashes_ignored() {
    let router = tagging_router(&["/foo/bar"]);

    assert!(respond(&router, Method::GET, "/foo/bar/").1.is_ok());
    assert!(respond(&router, Method::GET, "//foo//bar").1.is_ok());
}

#[test]
fn test_routing_ignores_query_string() {
    let router = tagging_router(&["/search"]);

    let (req, outcome) = respond(&router, Method::GET, "/search?q=rust");
    assert!(outcome.is_ok());
    assert_eq!(req.query_pairs(), vec![("q".to_string(), "rust".to_string())]);
}

#[test]
fn test_routing_method_buckets() {
    let mut router = Router::new();
    router.get("/item", |_req, res| plain_text(res, "get"));
    router.post("/item", |_req, res| plain_text(res, "post"));

    assert_eq!(body(respond(&router, Method::GET, "/item").1), "get");
    assert_eq!(body(respond(&router, Method::POST, "/item").1), "post");

    // No bucket for DELETE at all
    let (_, outcome) = respond(&router, Method::DELETE, "/item");
    assert_eq!(
        outcome.unwrap_err(),
        RouteError::NotFound {
            method: Method::DELETE,
            path: "/item".to_string(),
        }
    );
}

#[test]
fn test_routing_empty_router_is_not_found() {
    let router = Router::new();

    assert!(router.is_empty());
    assert!(respond(&router, Method::GET, "/").1.is_err());
}

#[test]
fn test_routing_unmatched_leaves_captures_empty() {
    let router = tagging_router(&["/foo/:id"]);

    let (req, outcome) = respond(&router, Method::GET, "/bar/1");
    assert!(outcome.is_err());
    assert!(req.params.is_empty());
}

#[test]
fn test_routing_handler_sets_status() {
    let mut router = Router::new();
    router.put("/thing/:id", |_req, res| res.status = StatusCode::Created);

    let (_, outcome) = respond(&router, Method::PUT, "/thing/9");
    assert_eq!(outcome.unwrap().status, StatusCode::Created);
}

#[test]
fn test_lookup_and_len() {
    let mut router = tagging_router(&["/", "/a/:b"]);
    router.delete("/a/:b", |_req, _res| {});

    assert_eq!(router.len(), 3);
    assert_eq!(router.lookup(Method::GET, "/a/1"), Some("/a/:b"));
    assert_eq!(router.lookup(Method::GET, "/"), Some("/"));
    assert_eq!(router.lookup(Method::PATCH, "/"), None);
}

#[test]
fn test_route_error_display() {
    let err = RouteError::NotFound {
        method: Method::GET,
        path: "/missing".to_string(),
    };
    assert_eq!(err.to_string(), "no route for GET /missing");
}
