//! Route table and dispatch.
//!
//! # Responsibilities
//! - Compile and store routes per method, in registration order
//! - Select the first matching route for a request
//! - Record path captures and run the route's handler
//! - Report an explicit not-found instead of a silent default

use std::collections::HashMap;
use std::fmt;

use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::routing::matcher::{PathMatcher, split_path};

/// A route handler. Runs to completion on the event-loop thread and must not
/// block on I/O.
pub type Handler = Box<dyn Fn(&Request, &mut Response)>;

/// The seam between connections and whatever answers their requests.
pub trait Dispatch {
    /// Fills `res` for `req`, or reports that nothing handles the request.
    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<(), RouteError>;
}

/// Dispatch failures surfaced to the connection as HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No route of the request's method matches its path.
    NotFound { method: Method, path: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::NotFound { method, path } => {
                write!(f, "no route for {} {}", method, path)
            }
        }
    }
}

impl std::error::Error for RouteError {}

struct Route {
    matcher: PathMatcher,
    handler: Handler,
}

/// Ordered, first-match-wins request router.
///
/// # Example
///
/// ```
/// use wayward::http::request::{Method, RequestBuilder};
/// use wayward::http::response::{plain_text, Response};
/// use wayward::routing::{Dispatch, Router};
///
/// let mut router = Router::new();
/// router.get("/foo/:id", |req, res| {
///     plain_text(res, req.param("id").unwrap_or_default());
/// });
///
/// let mut req = RequestBuilder::new().method(Method::GET).path("/foo/123").build().unwrap();
/// let mut res = Response::new();
/// router.dispatch(&mut req, &mut res).unwrap();
/// assert_eq!(res.body, b"123");
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and appends it to the bucket for `method`.
    ///
    /// Routes are tried in the order they were registered.
    pub fn register<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + 'static,
    {
        tracing::debug!(%method, pattern, "Route registered");
        self.routes.entry(method).or_default().push(Route {
            matcher: PathMatcher::parse(pattern),
            handler: Box::new(handler),
        });
        self
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + 'static,
    {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + 'static,
    {
        self.register(Method::POST, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + 'static,
    {
        self.register(Method::PUT, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + 'static,
    {
        self.register(Method::DELETE, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) + 'static,
    {
        self.register(Method::PATCH, pattern, handler)
    }

    /// Total number of registered routes across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pattern of the route that would handle `method path`, if any.
    pub fn lookup(&self, method: Method, path: &str) -> Option<&str> {
        let segments = split_path(path);
        self.find(method, &segments).map(|route| route.matcher.pattern())
    }

    fn find(&self, method: Method, segments: &[&str]) -> Option<&Route> {
        self.routes
            .get(&method)?
            .iter()
            .find(|route| route.matcher.matches(segments))
    }
}

impl Dispatch for Router {
    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<(), RouteError> {
        let path = req.route_path().to_string();
        let segments = split_path(&path);

        let Some(route) = self.find(req.method, &segments) else {
            return Err(RouteError::NotFound {
                method: req.method,
                path,
            });
        };

        route.matcher.apply_captures(&segments, &mut req.params);
        (route.handler)(req, res);
        Ok(())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: HashMap<&Method, Vec<&str>> = self
            .routes
            .iter()
            .map(|(method, routes)| {
                (method, routes.iter().map(|r| r.matcher.pattern()).collect())
            })
            .collect();
        f.debug_struct("Router").field("routes", &patterns).finish()
    }
}
