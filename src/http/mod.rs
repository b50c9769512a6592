//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.x side of the server: request and
//! response types, a streaming tokenizer, wire serialization and the
//! per-connection state machine.
//!
//! # Architecture
//!
//! - **`connection`**: The connection state machine driving read → dispatch → write
//! - **`parser`**: Streaming tokenizer reporting request pieces through callbacks
//! - **`request`**: HTTP request representation and helpers
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes and writes HTTP responses to the client
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │  Accepted   │
//!        └──────┬──────┘
//!               ▼
//!        ┌─────────────┐
//!        │   Reading   │ ← Feed bytes to the parser until a message completes
//!        └──────┬──────┘
//!               │ Message complete
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatching    │ ← Router fills a fresh response (404 if no route)
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send serialized response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closing → Closed
//! ```
//!
//! Read errors, peer hang-ups and close requests move straight to `Closing`.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
