use std::cell::Cell;
use std::collections::HashMap;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::http::parser::{MessageHead, ParseError, Parser, ParserEvents};
use crate::http::request::{Request, insert_header};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::registry::Handle;
use crate::routing::{Dispatch, RouteError};

/// Observable lifecycle position of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accepted,
    Reading,
    Dispatching,
    Writing,
    Closing,
    Closed,
}

enum ConnectionState {
    Accepted,
    Reading,
    Dispatching { request: Request, keep_alive: bool },
    Writing { writer: ResponseWriter, keep_alive: bool },
    Closing,
    Closed,
}

impl ConnectionState {
    fn phase(&self) -> Phase {
        match self {
            ConnectionState::Accepted => Phase::Accepted,
            ConnectionState::Reading => Phase::Reading,
            ConnectionState::Dispatching { .. } => Phase::Dispatching,
            ConnectionState::Writing { .. } => Phase::Writing,
            ConnectionState::Closing => Phase::Closing,
            ConnectionState::Closed => Phase::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub recv_buffer_size: usize,
    pub max_head_size: usize,
    pub max_body_size: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            recv_buffer_size: 1024,
            max_head_size: crate::http::parser::DEFAULT_MAX_HEAD_SIZE,
            max_body_size: crate::http::parser::DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// One accepted stream and everything needed to serve it.
///
/// The connection is driven one state transition at a time by [`step`];
/// [`run`] simply steps until `Closed`. Reading, dispatch and writing are
/// strictly sequential: the next read is only armed once the previous
/// response has been written out.
///
/// [`step`]: Connection::step
/// [`run`]: Connection::run
pub struct Connection<S> {
    label: String,
    peer: String,
    stream: S,
    input: BytesMut,
    recv_buffer_size: usize,
    parser: Parser,
    incoming: RequestAssembler,
    state: ConnectionState,
    phase: Rc<Cell<Phase>>,
    close: Rc<Notify>,
    dispatcher: Rc<dyn Dispatch>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        dispatcher: Rc<dyn Dispatch>,
        options: ConnectionOptions,
    ) -> Self {
        let peer = peer.into();
        Self {
            label: peer.clone(),
            peer,
            stream,
            input: BytesMut::with_capacity(options.recv_buffer_size),
            recv_buffer_size: options.recv_buffer_size.max(1),
            parser: Parser::with_limits(options.max_head_size, options.max_body_size),
            incoming: RequestAssembler::default(),
            state: ConnectionState::Accepted,
            phase: Rc::new(Cell::new(Phase::Accepted)),
            close: Rc::new(Notify::new()),
            dispatcher,
        }
    }

    /// Tags log lines with the connection's registry handle.
    pub fn set_handle(&mut self, handle: Handle) {
        self.label = handle.to_string();
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Shared view of the phase, kept current as the connection moves.
    pub fn phase_cell(&self) -> Rc<Cell<Phase>> {
        Rc::clone(&self.phase)
    }

    /// Signal that asks the connection to close before it reads or
    /// dispatches another request.
    ///
    /// A response already being written is finished first; pipelined
    /// requests still buffered are dropped.
    pub fn close_signal(&self) -> Rc<Notify> {
        Rc::clone(&self.close)
    }

    /// Drives the connection until it is closed. Faults are logged and end
    /// only this connection.
    pub async fn run(&mut self) {
        loop {
            match self.step().await {
                Ok(Phase::Closed) => break,
                Ok(_) => {}
                Err(e) => self.report(&e),
            }
        }
    }

    /// Performs one state transition and returns the phase entered.
    ///
    /// On error the connection has already moved to `Closing`; stepping again
    /// completes the close.
    pub async fn step(&mut self) -> anyhow::Result<Phase> {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

        let next = match state {
            ConnectionState::Accepted => Ok(ConnectionState::Reading),

            ConnectionState::Reading => self.read_request().await,

            ConnectionState::Dispatching { request, keep_alive } => {
                let response = self.dispatch(request);
                Ok(ConnectionState::Writing {
                    writer: ResponseWriter::new(response),
                    keep_alive,
                })
            }

            ConnectionState::Writing { mut writer, keep_alive } => {
                match writer.write_to_stream(&mut self.stream).await {
                    Ok(()) if keep_alive => Ok(ConnectionState::Reading),
                    Ok(()) => Ok(ConnectionState::Closing),
                    Err(e) => Err(e),
                }
            }

            ConnectionState::Closing => {
                // Nothing else is in flight; shutting down ends the write side.
                if let Err(e) = self.stream.shutdown().await {
                    debug!(conn = %self.label, error = %e, "Shutdown failed");
                }
                Ok(ConnectionState::Closed)
            }

            ConnectionState::Closed => Ok(ConnectionState::Closed),
        };

        match next {
            Ok(next) => {
                self.enter(next);
                Ok(self.phase())
            }
            Err(e) => {
                self.enter(ConnectionState::Closing);
                Err(e)
            }
        }
    }

    fn enter(&mut self, state: ConnectionState) {
        let phase = state.phase();
        if phase != self.phase.get() {
            debug!(conn = %self.label, from = ?self.phase.get(), to = ?phase, "Connection transition");
        }
        self.state = state;
        self.phase.set(phase);
    }

    async fn read_request(&mut self) -> anyhow::Result<ConnectionState> {
        loop {
            // Try parsing whatever we already have
            match self.parser.execute(&self.input, &mut self.incoming) {
                Ok(consumed) => self.input.advance(consumed),
                Err(e) => return Ok(self.reject(e)),
            }

            if let Some(request) = self.incoming.take_complete() {
                // A close request outranks anything still buffered.
                if self.close_requested().await {
                    debug!(conn = %self.label, "Dropping buffered request on close");
                    return Ok(ConnectionState::Closing);
                }
                return Ok(ConnectionState::Dispatching {
                    request,
                    keep_alive: self.parser.should_keep_alive(),
                });
            }

            // Read more data
            self.input.reserve(self.recv_buffer_size);
            let read = tokio::select! {
                biased;
                _ = self.close.notified() => None,
                n = self.stream.read_buf(&mut self.input) => Some(n),
            };

            let Some(n) = read else {
                debug!(conn = %self.label, "Read cancelled");
                return Ok(ConnectionState::Closing);
            };

            if n? == 0 {
                // Peer half-closed; flush the parser so a truncated message surfaces.
                self.parser.finish(&self.input)?;
                debug!(conn = %self.label, "Peer closed connection");
                return Ok(ConnectionState::Closing);
            }
        }
    }

    /// Consumes a pending close signal without waiting for one.
    async fn close_requested(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.close.notified() => true,
            _ = std::future::ready(()) => false,
        }
    }

    /// Answers a malformed request and closes afterwards.
    fn reject(&mut self, error: ParseError) -> ConnectionState {
        warn!(conn = %self.label, peer = %self.peer, error = %error, "Rejecting malformed request");

        self.input.clear();
        let status = match error {
            ParseError::HeadTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            ParseError::BodyTooLarge => StatusCode::PayloadTooLarge,
            ParseError::UnsupportedTransferEncoding => StatusCode::NotImplemented,
            _ => StatusCode::BadRequest,
        };
        ConnectionState::Writing {
            writer: ResponseWriter::new(Response::error(status)),
            keep_alive: false,
        }
    }

    fn dispatch(&self, mut req: Request) -> Response {
        let mut res = Response::new();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.dispatcher.dispatch(&mut req, &mut res)
        }));

        let res = match outcome {
            Ok(Ok(())) => res,
            Ok(Err(RouteError::NotFound { .. })) => Response::not_found(),
            Err(_) => {
                warn!(conn = %self.label, method = %req.method, path = %req.path, "Handler panicked");
                Response::internal_error()
            }
        };

        debug!(
            conn = %self.label,
            method = %req.method,
            path = %req.path,
            status = res.status.as_u16(),
            "Request handled"
        );
        res
    }

    fn report(&self, error: &anyhow::Error) {
        let graceful = error.downcast_ref::<io::Error>().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            )
        });

        if graceful {
            debug!(conn = %self.label, peer = %self.peer, error = %error, "Connection reset by peer");
        } else {
            warn!(conn = %self.label, peer = %self.peer, error = %error, "Connection error");
        }
    }
}

/// Accumulates parser events into a [`Request`].
#[derive(Default)]
struct RequestAssembler {
    url: Vec<u8>,
    field: Vec<u8>,
    value: Vec<u8>,
    in_value: bool,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    head: Option<MessageHead>,
    complete: bool,
}

impl RequestAssembler {
    fn commit_header(&mut self) {
        if self.in_value {
            let name = String::from_utf8_lossy(&self.field).into_owned();
            let value = String::from_utf8_lossy(&self.value).into_owned();
            insert_header(&mut self.headers, name, value);
        }
        self.field.clear();
        self.value.clear();
        self.in_value = false;
    }

    fn take_complete(&mut self) -> Option<Request> {
        if !self.complete {
            return None;
        }
        let assembled = std::mem::take(self);
        let head = assembled.head?;

        Some(Request {
            method: head.method,
            path: String::from_utf8_lossy(&assembled.url).into_owned(),
            version: head.version,
            headers: assembled.headers,
            params: HashMap::new(),
            body: assembled.body,
        })
    }
}

impl ParserEvents for RequestAssembler {
    fn on_message_begin(&mut self) {
        *self = Self::default();
    }

    fn on_url(&mut self, fragment: &[u8]) {
        self.url.extend_from_slice(fragment);
    }

    fn on_header_field(&mut self, fragment: &[u8]) {
        if self.in_value {
            self.commit_header();
        }
        self.field.extend_from_slice(fragment);
    }

    fn on_header_value(&mut self, fragment: &[u8]) {
        self.in_value = true;
        self.value.extend_from_slice(fragment);
    }

    fn on_headers_complete(&mut self, head: &MessageHead) {
        self.commit_header();
        self.head = Some(head.clone());
    }

    fn on_body(&mut self, fragment: &[u8]) {
        self.body.extend_from_slice(fragment);
    }

    fn on_message_complete(&mut self) {
        self.complete = true;
    }
}
