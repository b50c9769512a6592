//! Request routing.
//!
//! # Data Flow
//! ```text
//! Registration (before serving):
//!     register(method, "/foo/:id", handler)
//!     → matcher.rs (compile pattern into component matchers)
//!     → appended to the method's bucket, in registration order
//!
//! Dispatch (per request):
//!     request path → "/"-separated non-empty segments
//!     → scan the method's bucket in order
//!     → first full match wins, captures written into request.params
//!     → handler(request, response)  |  RouteError::NotFound
//! ```
//!
//! # Design Decisions
//! - First match wins, by registration order only (no specificity ranking)
//! - Segment counts must be equal; no prefix or wildcard matching
//! - Trailing and doubled slashes are ignored (`/foo/` == `/foo`)
//! - A method with no routes is a plain not-found
//! - The table is filled before serving and only read afterwards

pub mod matcher;
pub mod router;

pub use matcher::{Component, PathMatcher};
pub use router::{Dispatch, RouteError, Router};
