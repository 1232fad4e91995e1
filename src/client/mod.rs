//! HTTP/1.1 client multiplexer
//!
//! A [`Client`] owns a [`Connector`] and at most one transport at a time. Requests
//! queue up in the order they were made, are written strictly in that order, and
//! every parsed response is matched to the oldest request still waiting for one.
//!
//! ```text
//!   request() ──▶ ┌─────────────────────────────┐
//!   write()       │ pending: [#1] [#2] [#3] ... │ ── only #1 writes ──▶ transport
//!   end()         └─────────────────────────────┘
//!                    ▲
//!                    │ match head
//!   on_data() ──▶ Tokenizer ──▶ Response{#1} Data{#1} End{#1} ──▶ poll_event()
//! ```
//!
//! The transport lifecycle is hidden from the consumer:
//!
//! * **Connecting** - the connector handed out a transport, waiting for `on_connect`.
//! * **Open** - requests and responses flow.
//! * **Closed** - no transport. The next request silently connects again.
//! * **Dead** - a transport failure. Everything pending got `Error`/`Aborted`.
//!
//! When a response says `connection: close` (or the request asked for it), the
//! transport is torn down once that exchange retires and the rest of the queue
//! moves to a fresh one. When a transport ends before a request sent any body byte,
//! the request is replayed, byte for byte, on a new transport.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use h1_mux::client::{Client, ClientEvent};
//! use h1_mux::http::{Method, StatusCode};
//! use h1_mux::{Body, Config, Error, Transport};
//!
//! // A transport collecting what the engine writes.
//! #[derive(Default, Clone)]
//! struct Socket(Rc<RefCell<Vec<u8>>>);
//!
//! impl Transport for Socket {
//!     fn write(&mut self, data: &[u8]) -> bool {
//!         self.0.borrow_mut().extend_from_slice(data);
//!         true
//!     }
//!     fn pause(&mut self) {}
//!     fn resume(&mut self) {}
//!     fn set_timeout(&mut self, _: Option<Duration>) {}
//!     fn end(&mut self) {}
//!     fn destroy(&mut self) {}
//! }
//!
//! let socket = Socket::default();
//! let wire = socket.0.clone();
//!
//! let connector = move || -> Result<Socket, Error> { Ok(socket.clone()) };
//! let mut client = Client::new(connector, Config::default());
//!
//! // ********************************** Request
//!
//! let id = client.request(Method::GET, "http://example.test/hello", &[]).unwrap();
//! client.end(id, None).unwrap();
//!
//! // Nothing goes out until the driver reports the transport is up.
//! assert!(wire.borrow().is_empty());
//! client.on_connect();
//!
//! assert_eq!(
//!     &wire.borrow()[..],
//!     b"GET /hello HTTP/1.1\r\nhost: example.test\r\nConnection: keep-alive\r\n\r\n"
//! );
//!
//! // ********************************** Response
//!
//! client.on_data(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
//!
//! assert!(matches!(client.poll_event(), Some(ClientEvent::Connect)));
//!
//! let Some(ClientEvent::Response { response, .. }) = client.poll_event() else {
//!     panic!("expected a response");
//! };
//! assert_eq!(response.status(), Some(StatusCode::OK));
//!
//! let Some(ClientEvent::Data { body, .. }) = client.poll_event() else {
//!     panic!("expected body data");
//! };
//! assert_eq!(body, Body::Bytes(b"hi".to_vec()));
//!
//! assert!(matches!(client.poll_event(), Some(ClientEvent::End { .. })));
//! assert_eq!(client.in_flight(), 0);
//! ```

use std::collections::VecDeque;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::uri::Uri;
use http::Method;

use crate::close_reason::CloseReason;
use crate::conn::{ConnState, Pipeline};
use crate::encoding::{Body, Chunk, Encoding};
use crate::headers::Headers;
use crate::incoming::{AssemblerState, Assembly, Dispatch, IncomingMessage};
use crate::outgoing::OutgoingMessage;
use crate::parser::{H1Tokenizer, ParserKind, ParserPool, Tokenizer};
use crate::transport::{Transport, TransportEvent};
use crate::{Config, Error, ErrorKind, MessageId};

#[cfg(test)]
mod test;

/// Opens transports for a [`Client`].
///
/// Called lazily: when a request is made and no transport exists, and again each
/// time the previous transport was retired with requests still queued.
///
/// Any `FnMut() -> Result<T, Error>` is a connector.
pub trait Connector {
    /// Transport handed out by this connector.
    type Transport: Transport;

    /// Start connecting. The driver reports completion with
    /// [`Client::on_connect`].
    fn connect(&mut self) -> Result<Self::Transport, Error>;
}

impl<F, T> Connector for F
where
    F: FnMut() -> Result<T, Error>,
    T: Transport,
{
    type Transport = T;

    fn connect(&mut self) -> Result<T, Error> {
        (self)()
    }
}

/// Events a [`Client`] hands to its consumer.
#[derive(Debug)]
pub enum ClientEvent<T> {
    /// The first transport connected.
    Connect,
    /// The server sent `100 Continue` for a request.
    Continue {
        /// Request it belongs to.
        id: MessageId,
    },
    /// Head of the final response to a request.
    Response {
        /// Request it answers.
        id: MessageId,
        /// Status line and headers.
        response: IncomingMessage,
    },
    /// Response body.
    Data {
        /// Request it answers.
        id: MessageId,
        /// Raw bytes, or text when an encoding was set.
        body: Body,
    },
    /// Response complete.
    End {
        /// Request it answers.
        id: MessageId,
        /// Trailer fields, if any.
        trailers: Headers,
    },
    /// A request whose `write` returned `false` may write again.
    Drain {
        /// The request.
        id: MessageId,
    },
    /// The server switched protocols. The transport is handed over.
    Upgrade {
        /// Request that asked for the upgrade.
        id: MessageId,
        /// The `101 Switching Protocols` head.
        response: IncomingMessage,
        /// Transport, no longer touched by the client.
        transport: T,
        /// Bytes received after the head, belonging to the new protocol.
        head: Vec<u8>,
    },
    /// A request failed.
    Error {
        /// The request, `None` when the failure concerns no particular request.
        id: Option<MessageId>,
        /// What happened.
        error: Error,
    },
    /// A queued request will never be answered, the client was destroyed.
    Aborted {
        /// The request.
        id: MessageId,
    },
    /// The client is destroyed.
    Close {
        /// Destroyed by an error rather than on request.
        had_error: bool,
    },
}

/// Client side of an HTTP/1.1 connection.
///
/// See the [module documentation](self).
pub struct Client<C: Connector, P = H1Tokenizer> {
    connector: C,
    config: Config,
    pool: ParserPool<P>,
    parser: Option<P>,
    asm: AssemblerState,
    conn: Pipeline<C::Transport>,
    next_id: u64,
    events: VecDeque<ClientEvent<C::Transport>>,

    /// Number of pending requests with a complete response, not yet retired.
    completed: usize,
    /// Request whose response is being received.
    receiving: Option<MessageId>,
    /// A response ended the connection; anything after it is ignored.
    halted: bool,
    /// A response arrived with nothing left to match it to.
    unsolicited: bool,
    connected_once: bool,
    close_when_idle: bool,
    destroyed: bool,
}

impl<C: Connector> Client<C, H1Tokenizer> {
    /// Create a client with its own tokenizer pool.
    ///
    /// No transport is opened until the first request.
    pub fn new(connector: C, config: Config) -> Self {
        Self::with_pool(connector, ParserPool::default(), config)
    }
}

impl<C: Connector, P: Tokenizer + Default> Client<C, P> {
    /// Create a client drawing its tokenizer from a shared pool.
    pub fn with_pool(connector: C, pool: ParserPool<P>, config: Config) -> Self {
        Client {
            connector,
            config,
            pool,
            parser: None,
            asm: AssemblerState::default(),
            conn: Pipeline::new(None, ConnState::Closed),
            next_id: 1,
            events: VecDeque::new(),
            completed: 0,
            receiving: None,
            halted: false,
            unsolicited: false,
            connected_once: false,
            close_when_idle: false,
            destroyed: false,
        }
    }

    /// Queue a request.
    ///
    /// `url` is either an origin form target (`/path?q`) or an absolute url, in
    /// which case a `host` header is added unless given, and user info turns into
    /// basic `authorization`.
    ///
    /// The head is written as soon as the request reaches the head of the queue
    /// on a connected transport.
    pub fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<MessageId, Error> {
        self.usable()?;

        let (target, extra) = split_url(url)?;
        let mut all: Vec<(&str, &str)> = Vec::with_capacity(headers.len() + extra.len());
        for (name, value) in &extra {
            if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                all.push((*name, value.as_str()));
            }
        }
        all.extend_from_slice(headers);

        let id = MessageId(self.next_id);
        let msg = OutgoingMessage::request(
            id,
            method,
            &target,
            &all,
            self.config.get_keep_alive(),
            self.config.get_aggregate_threshold(),
        )?;
        self.next_id += 1;

        debug!("{} {} queued {} {}", self.conn.conn_id, id, msg.method, target);
        self.conn.pending.push_back(msg);

        if self.conn.transport.is_none() {
            self.establish();
        } else {
            self.conn.cycle();
        }

        Ok(id)
    }

    /// Write body data.
    ///
    /// Returns `false` when the caller should wait for [`ClientEvent::Drain`]
    /// before writing more. The data is queued either way.
    pub fn write<'a>(&mut self, id: MessageId, chunk: impl Into<Chunk<'a>>) -> Result<bool, Error> {
        self.usable()?;
        self.conn.find(id)?.write(chunk.into())?;
        Ok(self.conn.after_write(id))
    }

    /// Finish a request, optionally with a last piece of body.
    pub fn end(&mut self, id: MessageId, chunk: Option<Chunk<'_>>) -> Result<bool, Error> {
        self.usable()?;
        self.conn.find(id)?.end(chunk)?;
        Ok(self.conn.after_write(id))
    }

    /// Hand coalesced text to the transport right away.
    pub fn flush(&mut self, id: MessageId) -> Result<bool, Error> {
        self.usable()?;
        self.conn.flush(id)
    }

    /// Trailer fields, sent with the terminal chunk of a chunked request.
    pub fn add_trailers(&mut self, id: MessageId, trailers: &[(&str, &str)]) -> Result<(), Error> {
        self.usable()?;
        self.conn.find(id)?.add_trailers(trailers)
    }

    /// Deliver the response body of `id` as text.
    ///
    /// Applies from the next body byte on.
    pub fn set_encoding(&mut self, id: MessageId, encoding: Encoding) -> Result<(), Error> {
        self.usable()?;
        self.conn.find(id)?.recv_encoding = Some(encoding);
        if self.receiving == Some(id) {
            self.asm.set_encoding(encoding);
        }
        Ok(())
    }

    /// Destroy the client once every queued request is answered.
    pub fn close_when_idle(&mut self) {
        if self.destroyed {
            return;
        }
        self.close_when_idle = true;
        if self.conn.pending.is_empty() {
            self.destroy_with(None);
        }
    }

    /// Tear down the transport and fail everything queued.
    pub fn destroy(&mut self) {
        self.destroy_with(None);
    }

    /// Stop reading from the transport.
    pub fn pause(&mut self) {
        if let Some(t) = &mut self.conn.transport {
            t.pause();
        }
    }

    /// Undo [`pause`](Self::pause).
    pub fn resume(&mut self) {
        if let Some(t) = &mut self.conn.transport {
            t.resume();
        }
    }

    /// Next event for the consumer.
    pub fn poll_event(&mut self) -> Option<ClientEvent<C::Transport>> {
        self.events.pop_front()
    }

    /// Connection lifecycle.
    pub fn state(&self) -> ConnState {
        self.conn.state()
    }

    /// The current transport, if any.
    pub fn transport_mut(&mut self) -> Option<&mut C::Transport> {
        self.conn.transport.as_mut()
    }

    /// Requests queued and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.conn.pending.len()
    }

    /// Whether the client was destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Feed one transport event.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connect => self.on_connect(),
            TransportEvent::Data(data) => self.on_data(&data),
            TransportEvent::Drain => self.on_drain(),
            TransportEvent::End => self.on_end(),
            TransportEvent::Close => self.on_close(),
            TransportEvent::Error(e) => self.on_error(e),
            TransportEvent::Timeout => self.on_timeout(),
        }
    }

    /// The current transport connected.
    pub fn on_connect(&mut self) {
        if self.destroyed || self.conn.state() != ConnState::Connecting {
            return;
        }
        self.conn.set_state(ConnState::Open);

        if !self.connected_once {
            self.connected_once = true;
            self.events.push_back(ClientEvent::Connect);
        }

        if let Some(id) = self.conn.promote() {
            self.events.push_back(ClientEvent::Drain { id });
        }
    }

    /// Bytes from the current transport.
    pub fn on_data(&mut self, data: &[u8]) {
        if self.destroyed || self.conn.transport.is_none() || self.halted {
            return;
        }
        if self.conn.pending.is_empty() {
            self.destroy_with(Some(Error::UnsolicitedResponse));
            return;
        }

        let Some(mut parser) = self.parser.take() else {
            return;
        };
        let mut asm = std::mem::take(&mut self.asm);
        let result = parser.execute(
            data,
            &mut Assembly {
                state: &mut asm,
                dispatch: self,
            },
        );
        let upgraded = asm.take_upgraded();
        self.parser = Some(parser);
        self.asm = asm;

        let n = match result {
            Ok(n) => n,
            // Garbage after a closing response is never looked at.
            Err(_) if self.halted => data.len(),
            Err(e) => {
                self.destroy_with(Some(e));
                return;
            }
        };

        if self.unsolicited {
            self.destroy_with(Some(Error::UnsolicitedResponse));
            return;
        }

        if let Some(response) = upgraded {
            self.upgrade(response, &data[n..]);
            return;
        }

        self.retire_completed();
        self.advance();
    }

    /// The current transport wants more data.
    pub fn on_drain(&mut self) {
        if self.destroyed || self.conn.transport.is_none() {
            return;
        }
        if let Some(id) = self.conn.drained() {
            self.events.push_back(ClientEvent::Drain { id });
        }
    }

    /// The server ended its side of the current transport.
    pub fn on_end(&mut self) {
        if self.destroyed || self.conn.transport.is_none() {
            return;
        }
        self.conn.reading = false;

        // A close delimited response completes here.
        if let Some(mut parser) = self.parser.take() {
            let mut asm = std::mem::take(&mut self.asm);
            let result = parser.finish(&mut Assembly {
                state: &mut asm,
                dispatch: self,
            });
            self.parser = Some(parser);
            self.asm = asm;
            if let Err(e) = result {
                self.destroy_with(Some(e));
                return;
            }
        }

        self.retire_completed();

        if self.conn.transport.is_some() {
            self.drop_transport();

            if let Some(head) = self.conn.pending.front_mut() {
                let max = self.config.get_max_retries();
                if !head.got_response && head.retries < max && head.rewind() {
                    head.retries += 1;
                    debug!(
                        "{} {} transport ended before any body byte, retry {}",
                        self.conn.conn_id, head.id, head.retries
                    );
                } else {
                    let id = head.id;
                    warn!("{} {} transport ended mid exchange", self.conn.conn_id, id);
                    self.conn.pending.pop_front();
                    self.events.push_back(ClientEvent::Error {
                        id: Some(id),
                        error: Error::PrematureClose,
                    });
                }
            }
        }

        self.advance();
    }

    /// The current transport is fully closed.
    pub fn on_close(&mut self) {
        if self.conn.reading && self.conn.transport.is_some() {
            self.on_end();
        }
    }

    /// The current transport failed.
    pub fn on_error(&mut self, error: Error) {
        self.destroy_with(Some(error));
    }

    /// The idle watchdog of the current transport fired.
    pub fn on_timeout(&mut self) {
        if self.destroyed || self.conn.transport.is_none() {
            return;
        }
        if self.conn.pending.is_empty() {
            debug!("{} idle, dropping transport", self.conn.conn_id);
            self.drop_transport();
        } else {
            self.destroy_with(None);
        }
    }

    fn usable(&self) -> Result<(), Error> {
        if self.destroyed {
            return Err(Error::ConnectionDestroyed);
        }
        Ok(())
    }

    fn establish(&mut self) {
        let mut transport = match self.connector.connect() {
            Ok(v) => v,
            Err(e) => {
                self.destroy_with(Some(e));
                return;
            }
        };
        transport.set_timeout(self.config.get_idle_timeout());

        self.conn.transport = Some(transport);
        self.conn.reading = true;
        self.conn.writing = true;
        self.conn.backlogged = false;
        self.conn.set_state(ConnState::Connecting);

        let mut parser = match self.parser.take() {
            Some(mut p) => {
                p.reinitialize(ParserKind::Response);
                p
            }
            None => self.pool.checkout(ParserKind::Response),
        };
        parser.set_max_head_size(self.config.get_max_head_size());
        self.parser = Some(parser);

        self.asm.reset();
        self.completed = 0;
        self.receiving = None;
        self.halted = false;
    }

    /// Destroy the current transport without touching the queue.
    fn drop_transport(&mut self) {
        if let Some(mut t) = self.conn.transport.take() {
            t.destroy();
        }
        self.conn.set_state(ConnState::Closed);
        self.conn.backlogged = false;
        self.completed = 0;
        self.receiving = None;
    }

    /// Pop the requests whose response is complete.
    fn retire_completed(&mut self) {
        while self.completed > 0 {
            self.completed -= 1;
            let Some(mut req) = self.conn.pending.pop_front() else {
                break;
            };

            if !req.is_done() {
                req.should_keep_alive = false;
                req.close_reason = Some(CloseReason::RequestIncomplete);
            }

            if req.should_keep_alive && !req.last {
                trace!("{} {} retired, keep-alive", self.conn.conn_id, req.id);
                continue;
            }

            if let Some(reason) = req.close_reason {
                debug!(
                    "{} {} retired, closing: {}",
                    self.conn.conn_id,
                    req.id,
                    reason.explain()
                );
            }
            self.drop_transport();
        }
        self.halted = false;
    }

    /// Move the queue along after something retired.
    fn advance(&mut self) {
        if self.destroyed {
            return;
        }
        if self.conn.pending.is_empty() {
            if self.close_when_idle {
                self.destroy_with(None);
            }
            return;
        }
        if self.conn.transport.is_none() {
            self.establish();
        } else if let Some(id) = self.conn.promote() {
            self.events.push_back(ClientEvent::Drain { id });
        }
    }

    fn upgrade(&mut self, mut response: IncomingMessage, rest: &[u8]) {
        if !self.config.get_accept_upgrade() {
            self.destroy_with(Some(Error::UpgradeWithoutHandler));
            return;
        }

        // Exchanges before the upgrade finished on this transport.
        for _ in 0..self.completed {
            self.conn.pending.pop_front();
        }
        self.completed = 0;

        let (Some(req), Some(transport)) =
            (self.conn.pending.pop_front(), self.conn.transport.take())
        else {
            self.destroy_with(Some(Error::UnsolicitedResponse));
            return;
        };

        debug!("{} {} upgraded, handing over transport", self.conn.conn_id, req.id);
        response.id = req.id;
        self.conn.set_state(ConnState::Closed);
        self.receiving = None;
        self.events.push_back(ClientEvent::Upgrade {
            id: req.id,
            response,
            transport,
            head: rest.to_vec(),
        });

        self.advance();
    }

    fn destroy_with(&mut self, error: Option<Error>) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if let Some(mut t) = self.conn.transport.take() {
            t.destroy();
        }
        if let Some(p) = self.parser.take() {
            self.pool.give_back(p);
        }

        let dead = error
            .as_ref()
            .is_some_and(|e| matches!(e.kind(), ErrorKind::Transport | ErrorKind::Tls));
        self.conn.set_state(if dead {
            ConnState::Dead
        } else {
            ConnState::Closed
        });

        let had_error = error.is_some();
        let mut pending = std::mem::take(&mut self.conn.pending).into_iter();

        if let Some(error) = error {
            warn!("{} destroyed: {}", self.conn.conn_id, error);
            let id = if error == Error::UnsolicitedResponse {
                None
            } else {
                pending.next().map(|m| m.id)
            };
            self.events.push_back(ClientEvent::Error { id, error });
        }
        for msg in pending {
            self.events.push_back(ClientEvent::Aborted { id: msg.id });
        }
        self.events.push_back(ClientEvent::Close { had_error });
    }

    /// The request a response head belongs to.
    fn matched(&mut self) -> Option<&mut OutgoingMessage> {
        self.conn.pending.get_mut(self.completed)
    }
}

impl<C: Connector, P> Drop for Client<C, P> {
    fn drop(&mut self) {
        // a client dropped without destroy() still hands its tokenizer back
        if let Some(p) = self.parser.take() {
            self.pool.give_back(p);
        }
    }
}

impl<C: Connector, P: Tokenizer + Default> Dispatch for Client<C, P> {
    fn incoming(&mut self, msg: &IncomingMessage) -> bool {
        if self.halted {
            return false;
        }
        let Some(req) = self.matched() else {
            self.unsolicited = true;
            return false;
        };
        let id = req.id;
        let is_head = req.method == Method::HEAD;

        if let Some(status) = msg.status() {
            if status.is_informational() {
                if status.as_u16() == 100 {
                    self.events.push_back(ClientEvent::Continue { id });
                }
                return true;
            }
        }

        req.got_response = true;
        if !msg.should_keep_alive() {
            req.should_keep_alive = false;
            req.close_reason = Some(CloseReason::ServerConnectionClose);
        }

        self.receiving = Some(id);
        let mut response = msg.clone();
        response.id = id;
        self.events.push_back(ClientEvent::Response { id, response });

        is_head
    }

    fn body(&mut self, body: Body) {
        if self.halted {
            return;
        }
        if let Some(id) = self.receiving {
            self.events.push_back(ClientEvent::Data { id, body });
        }
    }

    fn complete(&mut self, msg: IncomingMessage) {
        if self.halted || self.unsolicited {
            return;
        }
        if msg.status().is_some_and(|s| s.is_informational()) {
            return;
        }
        let Some(id) = self.receiving.take() else {
            return;
        };

        let keep_alive = self
            .matched()
            .map(|req| req.should_keep_alive && !req.last)
            .unwrap_or(false);

        self.events.push_back(ClientEvent::End {
            id,
            trailers: msg.trailers().clone(),
        });
        self.completed += 1;

        if !keep_alive {
            // Whatever follows on this transport belongs to no request.
            self.halted = true;
        }
    }

    fn encoding(&self) -> Option<Encoding> {
        let id = self.receiving?;
        self.conn
            .pending
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| m.recv_encoding)
    }
}

/// Turn an absolute url into an origin form target plus the headers it implies.
fn split_url(url: &str) -> Result<(String, Vec<(&'static str, String)>), Error> {
    if url.starts_with('/') || url == "*" {
        return Ok((url.to_string(), vec![]));
    }

    let uri: Uri = url.parse().map_err(|_| Error::BadUrl(url.to_string()))?;
    let Some(authority) = uri.authority() else {
        return Err(Error::BadUrl(url.to_string()));
    };

    let mut headers = vec![];

    let host = match authority.port() {
        Some(port) => format!("{}:{}", authority.host(), port),
        None => authority.host().to_string(),
    };
    headers.push(("host", host));

    if let Some((userinfo, _)) = authority.as_str().rsplit_once('@') {
        let encoded = BASE64_STANDARD.encode(userinfo);
        headers.push(("authorization", format!("Basic {}", encoded)));
    }

    let target = uri
        .path_and_query()
        .map(|p| p.as_str())
        .filter(|p| !p.is_empty())
        .unwrap_or("/")
        .to_string();

    Ok((target, headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_origin_form() {
        let (target, headers) = split_url("/a?b=1").unwrap();
        assert_eq!(target, "/a?b=1");
        assert!(headers.is_empty());
    }

    #[test]
    fn split_absolute() {
        let (target, headers) = split_url("http://u:p@example.test:8080").unwrap();
        assert_eq!(target, "/");
        assert_eq!(headers[0], ("host", "example.test:8080".to_string()));
        assert_eq!(headers[1], ("authorization", "Basic dTpw".to_string()));
    }

    #[test]
    fn split_bad() {
        assert!(matches!(split_url("not a url"), Err(Error::BadUrl(_))));
    }
}
