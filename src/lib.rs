//! Wayward - a minimal embedded HTTP server.
//!
//! A single-threaded, event-driven engine that accepts connections on any
//! number of TCP or Unix-domain endpoints, drives each one through the HTTP/1.x
//! request/response cycle and dispatches requests to a first-match-wins router.
//!
//! ```no_run
//! use wayward::config::Config;
//! use wayward::http::response::plain_text;
//! use wayward::routing::Router;
//! use wayward::server::{Endpoint, Engine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut router = Router::new();
//! router.get("/", |_req, res| plain_text(res, "Hello, Wayward!"));
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
//! let local = tokio::task::LocalSet::new();
//! local.block_on(&runtime, async {
//!     let engine = Engine::new(router, &Config::default());
//!     engine.listen(&Endpoint::parse("[::]:3000")?).await?;
//!     engine.run(async { let _ = tokio::signal::ctrl_c().await; }).await
//! })
//! # }
//! ```

pub mod config;
pub mod http;
pub mod registry;
pub mod routing;
pub mod server;
