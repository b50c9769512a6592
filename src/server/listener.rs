//! Listening endpoints and their accept loops.
//!
//! # Responsibilities
//! - Bind one TCP or Unix-domain endpoint (address reuse on TCP)
//! - Accept perpetually, handing each stream to the engine
//! - Treat a failed accept as fatal: the engine is told and shuts down

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket, UnixListener};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::registry::Handle;
use crate::server::engine::Engine;
use crate::server::transport::{Endpoint, Transport};

enum Acceptor {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// One bound, listening endpoint.
pub struct Listener {
    endpoint: Endpoint,
    local_addr: String,
    acceptor: Acceptor,
}

impl Listener {
    pub async fn bind(endpoint: &Endpoint, backlog: u32) -> anyhow::Result<Self> {
        let (acceptor, local_addr) = match endpoint {
            Endpoint::Tcp(addr) => {
                let resolved = tokio::net::lookup_host(addr.as_str())
                    .await
                    .with_context(|| format!("failed to resolve {}", addr))?
                    .next()
                    .with_context(|| format!("{} resolved to no addresses", addr))?;

                let socket = if resolved.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket.set_reuseaddr(true)?;
                socket
                    .bind(resolved)
                    .with_context(|| format!("failed to bind {}", resolved))?;
                let listener = socket
                    .listen(backlog)
                    .with_context(|| format!("failed to listen on {}", resolved))?;

                let local = listener.local_addr()?.to_string();
                (Acceptor::Tcp(listener), local)
            }

            Endpoint::Unix(path) => {
                remove_stale_socket(path)?;
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("failed to bind {}", path.display()))?;
                (Acceptor::Unix(listener), endpoint.to_string())
            }
        };

        info!(endpoint = %endpoint, local = %local_addr, "Listening");

        Ok(Self {
            endpoint: endpoint.clone(),
            local_addr,
            acceptor,
        })
    }

    /// Waits for the next inbound stream. Returns the stream and a peer label.
    pub async fn accept(&self) -> io::Result<(Transport, String)> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Transport::Tcp(stream), peer.to_string()))
            }
            Acceptor::Unix(listener) => {
                let (stream, peer) = listener.accept().await?;
                let label = match peer.as_pathname() {
                    Some(path) => format!("unix:{}", path.display()),
                    None => self.local_addr.clone(),
                };
                Ok((Transport::Unix(stream), label))
            }
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bound address as text (`ip:port`, or `unix:<path>`).
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }
}

/// Removes a leftover socket file from a previous run.
fn remove_stale_socket(path: &Path) -> anyhow::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(path = %path.display(), "Removing stale socket file");
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove stale socket {}", path.display()))
        }
        Ok(_) => anyhow::bail!("{} exists and is not a socket", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to inspect {}", path.display())),
    }
}

/// Accepts until stopped. Every accepted stream becomes a registered
/// connection before the next accept is armed.
pub(crate) async fn accept_loop(listener: Listener, engine: Engine, handle: Handle, stop: Rc<Notify>) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = stop.notified() => {
                debug!(listener = %handle, endpoint = %listener.endpoint, "Accept loop stopped");
                return;
            }
            res = listener.accept() => res,
        };

        match accepted {
            Ok((stream, peer)) => {
                info!("Accepted connection from {}", peer);
                engine.adopt(stream, peer);
            }
            Err(e) => {
                error!(listener = %handle, endpoint = %listener.endpoint, error = %e, "Accept failed");
                engine.fault(
                    anyhow::Error::new(e).context(format!("accept on {} failed", listener.endpoint)),
                );
                return;
            }
        }
    }
}
