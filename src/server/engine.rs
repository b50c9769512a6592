//! The engine: owner of every listener and connection.
//!
//! # Responsibilities
//! - Keep the listener and connection registries
//! - Turn accepted streams into registered, running connections
//! - Release finished connections on the next loop tick (the reaper)
//! - Shut down in order: stop accepting, close connections, release listeners
//!
//! Everything runs on one thread inside a [`tokio::task::LocalSet`]. Tasks
//! never hold a registry borrow across an `.await`, so the `RefCell`s below
//! are never contended.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionOptions, Phase};
use crate::registry::{Handle, Registry};
use crate::routing::Dispatch;
use crate::server::listener::{Listener, accept_loop};
use crate::server::transport::Endpoint;

struct ConnectionEntry {
    peer: String,
    phase: Rc<Cell<Phase>>,
    close: Rc<Notify>,
}

struct ListenerEntry {
    endpoint: Endpoint,
    local_addr: String,
    stop: Rc<Notify>,
}

impl ListenerEntry {
    fn release(self) {
        self.stop.notify_one();
        if let Endpoint::Unix(path) = &self.endpoint {
            if let Err(e) = std::fs::remove_file(path) {
                debug!(path = %path.display(), error = %e, "Could not remove socket file");
            }
        }
        info!(endpoint = %self.endpoint, "Listener released");
    }
}

/// Snapshot of one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub handle: Handle,
    pub peer: String,
    pub phase: Phase,
}

/// Snapshot of one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub handle: Handle,
    pub endpoint: Endpoint,
    pub local_addr: String,
}

struct Core {
    connections: RefCell<Registry<ConnectionEntry>>,
    listeners: RefCell<Registry<ListenerEntry>>,
    graveyard: RefCell<Vec<Handle>>,
    reaper: Notify,
    faults: mpsc::UnboundedSender<anyhow::Error>,
    fault_rx: RefCell<Option<mpsc::UnboundedReceiver<anyhow::Error>>>,
    dispatcher: Rc<dyn Dispatch>,
    options: ConnectionOptions,
    backlog: u32,
    shutdown_grace: Duration,
}

/// Handle to the engine. Clones share the same registries.
#[derive(Clone)]
pub struct Engine {
    core: Rc<Core>,
}

impl Engine {
    pub fn new<D>(dispatcher: D, config: &Config) -> Self
    where
        D: Dispatch + 'static,
    {
        let (faults, fault_rx) = mpsc::unbounded_channel();

        Self {
            core: Rc::new(Core {
                connections: RefCell::new(Registry::new()),
                listeners: RefCell::new(Registry::new()),
                graveyard: RefCell::new(Vec::new()),
                reaper: Notify::new(),
                faults,
                fault_rx: RefCell::new(Some(fault_rx)),
                dispatcher: Rc::new(dispatcher),
                options: ConnectionOptions {
                    recv_buffer_size: config.recv_buffer_size,
                    max_head_size: config.max_head_size,
                    max_body_size: config.max_body_size,
                },
                backlog: config.backlog,
                shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
            }),
        }
    }

    /// Binds `endpoint` and starts its accept loop.
    ///
    /// May be called before or while [`run`](Engine::run) is active, any
    /// number of times; all listeners feed the same connection registry.
    /// Must be called from within a `LocalSet`.
    pub async fn listen(&self, endpoint: &Endpoint) -> anyhow::Result<Handle> {
        let listener = Listener::bind(endpoint, self.core.backlog).await?;
        let stop = Rc::new(Notify::new());

        let handle = self.core.listeners.borrow_mut().link_back(ListenerEntry {
            endpoint: endpoint.clone(),
            local_addr: listener.local_addr().to_string(),
            stop: Rc::clone(&stop),
        });

        tokio::task::spawn_local(accept_loop(listener, self.clone(), handle, stop));
        Ok(handle)
    }

    /// Stops one listener's accept loop and releases it.
    pub fn unlisten(&self, handle: Handle) -> bool {
        let entry = self.core.listeners.borrow_mut().unlink(handle);
        match entry {
            Some(entry) => {
                entry.release();
                true
            }
            None => false,
        }
    }

    /// Registers an accepted stream and starts serving it.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn adopt<S>(&self, stream: S, peer: impl Into<String>) -> Handle
    where
        S: AsyncRead + AsyncWrite + Unpin + 'static,
    {
        let mut conn = Connection::new(
            stream,
            peer,
            Rc::clone(&self.core.dispatcher),
            self.core.options,
        );

        let handle = self.core.connections.borrow_mut().link_back(ConnectionEntry {
            peer: conn.peer().to_string(),
            phase: conn.phase_cell(),
            close: conn.close_signal(),
        });
        conn.set_handle(handle);
        debug!(conn = %handle, peer = %conn.peer(), "Connection registered");

        let core = Rc::clone(&self.core);
        tokio::task::spawn_local(async move {
            conn.run().await;
            drop(conn);
            // Release happens on the reaper's next tick, never from inside the task.
            core.graveyard.borrow_mut().push(handle);
            core.reaper.notify_one();
        });

        handle
    }

    /// Asks a connection to close. Returns false if it is already gone.
    pub fn close_connection(&self, handle: Handle) -> bool {
        match self.core.connections.borrow().get(handle) {
            Some(entry) => {
                entry.close.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.core.connections.borrow().len()
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }

    /// Live connections in registration order.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.core
            .connections
            .borrow()
            .iter()
            .map(|(handle, entry)| ConnectionInfo {
                handle,
                peer: entry.peer.clone(),
                phase: entry.phase.get(),
            })
            .collect()
    }

    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.core
            .listeners
            .borrow()
            .iter()
            .map(|(handle, entry)| ListenerInfo {
                handle,
                endpoint: entry.endpoint.clone(),
                local_addr: entry.local_addr.clone(),
            })
            .collect()
    }

    /// Reports an unrecoverable fault; [`run`](Engine::run) tears down and returns it.
    pub(crate) fn fault(&self, error: anyhow::Error) {
        // The receiver lives as long as the engine, so this cannot fail while it matters.
        let _ = self.core.faults.send(error);
    }

    /// Waits for the next reaper wake-up and releases finished connections.
    pub async fn tick(&self) {
        self.core.reaper.notified().await;
        self.reap();
    }

    fn reap(&self) {
        let dead = std::mem::take(&mut *self.core.graveyard.borrow_mut());
        let mut connections = self.core.connections.borrow_mut();

        for handle in dead {
            if let Some(entry) = connections.unlink(handle) {
                debug!(conn = %handle, peer = %entry.peer, "Connection released");
            }
        }
    }

    /// Serves until `shutdown` resolves or a listener faults, then tears down.
    ///
    /// Returns the fault, if that is what ended the loop. Must be awaited
    /// from within a `LocalSet`, and only once.
    pub async fn run<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut faults = self
            .core
            .fault_rx
            .borrow_mut()
            .take()
            .expect("Engine::run called more than once");

        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                Some(fault) = faults.recv() => break Err(fault),
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
                _ = self.tick() => {}
            }
        };

        self.teardown().await;
        outcome
    }

    /// Stop accepting, close every live connection, then release listeners.
    async fn teardown(&self) {
        for (_, entry) in self.core.listeners.borrow().iter() {
            entry.stop.notify_one();
        }

        for (_, entry) in self.core.connections.borrow().iter() {
            entry.close.notify_one();
        }

        let drained = tokio::time::timeout(self.core.shutdown_grace, async {
            loop {
                self.reap();
                if self.core.connections.borrow().is_empty() {
                    break;
                }
                self.core.reaper.notified().await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = self.connection_count(),
                "Connections still open after shutdown grace period"
            );
        }

        let released = self.core.listeners.borrow_mut().unlink_all();
        for entry in released {
            entry.release();
        }
    }
}
