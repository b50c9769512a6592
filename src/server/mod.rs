//! Serving: endpoints, listeners and the engine that owns them.
//!
//! ```text
//! Engine::listen(endpoint) ──► Listener::bind ──► accept_loop (one task per listener)
//!                                                    │ accepted stream
//!                                                    ▼
//!                                 Engine::adopt ──► Connection::run (one task per connection)
//!                                                    │ finished
//!                                                    ▼
//!                                   graveyard ──► reaper tick ──► unlinked from registry
//! ```

pub mod engine;
pub mod listener;
pub mod transport;

pub use engine::{ConnectionInfo, Engine, ListenerInfo};
pub use listener::Listener;
pub use transport::{Endpoint, Transport};
