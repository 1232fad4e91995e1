//! HTTP/1.1 server side of one connection
//!
//! A [`Server`] wraps one accepted transport. Requests are parsed as they
//! arrive, pipelined or not, and each gets a response slot in arrival order. The
//! consumer may write responses in any order; bytes reach the transport strictly
//! in request order.
//!
//! ```text
//!        ┌──────────────────┐
//!     ┌──│   RecvRequest    │───────────────┐
//!     │  └──────────────────┘               │
//!     │            │                        │ expect: 100-continue
//!     │            ▼                        ▼
//!     │  ┌──────────────────┐     ┌──────────────────┐
//!     │  │     RecvBody     │◀────│   CheckContinue  │
//!     │  └──────────────────┘     └──────────────────┘
//!     │            │
//!     │            ▼
//!     └─▶┌──────────────────┐
//!        │    write_head    │   queued behind earlier responses
//!        └──────────────────┘
//!                  │
//!                  ▼
//!        ┌──────────────────┐
//!        │   write / end    │──▶ head of line? ──▶ transport
//!        └──────────────────┘
//!                  │
//!                  ▼
//!        ┌──────────────────┐
//!        │ keep-alive/close │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use h1_mux::http::StatusCode;
//! use h1_mux::server::{Server, ServerEvent};
//! use h1_mux::{Config, Transport};
//!
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
//! let mut server = Server::new(socket, Config::server());
//!
//! server.on_data(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
//!
//! let mut ids = vec![];
//! while let Some(ev) = server.poll_event() {
//!     if let ServerEvent::Request { id, request } = ev {
//!         ids.push((id, request.url().to_string()));
//!     }
//! }
//! assert_eq!(ids.len(), 2);
//!
//! // Answer the second request first. It waits for the first.
//! let (a, b) = (ids[0].0, ids[1].0);
//! server.write_head(b, StatusCode::OK, None, &[("content-length", "1")]).unwrap();
//! server.end(b, Some("b".into())).unwrap();
//! assert!(wire.borrow().is_empty());
//!
//! server.write_head(a, StatusCode::OK, None, &[("content-length", "1")]).unwrap();
//! server.end(a, Some("a".into())).unwrap();
//!
//! let out = String::from_utf8(wire.borrow().clone()).unwrap();
//! assert_eq!(
//!     out,
//!     "HTTP/1.1 200 OK\r\ncontent-length: 1\r\nConnection: keep-alive\r\n\r\na\
//!      HTTP/1.1 200 OK\r\ncontent-length: 1\r\nConnection: keep-alive\r\n\r\nb"
//! );
//! ```

use std::collections::VecDeque;

use http::StatusCode;

use crate::conn::{ConnState, Pipeline};
use crate::encoding::{Body, Chunk, Encoding};
use crate::headers::Headers;
use crate::incoming::{AssemblerState, Assembly, Dispatch, IncomingMessage};
use crate::outgoing::OutgoingMessage;
use crate::parser::{H1Tokenizer, ParserKind, ParserPool, Tokenizer};
use crate::transport::{Transport, TransportEvent};
use crate::{Config, Error, ErrorKind, MessageId};


/// Events a [`Server`] hands to its consumer.
#[derive(Debug)]
pub enum ServerEvent<T> {
    /// A request head. Answer with [`Server::write_head`].
    Request {
        /// Exchange id, used for the response.
        id: MessageId,
        /// Request line and headers.
        request: IncomingMessage,
    },
    /// A request with `expect: 100-continue`, only with
    /// [`Config::check_continue`]. Answer with [`Server::write_continue`] or
    /// with a final response.
    CheckContinue {
        /// Exchange id.
        id: MessageId,
        /// Request line and headers.
        request: IncomingMessage,
    },
    /// Request body.
    Data {
        /// Exchange id.
        id: MessageId,
        /// Raw bytes, or text when an encoding was set.
        body: Body,
    },
    /// Request complete.
    End {
        /// Exchange id.
        id: MessageId,
        /// Trailer fields, if any.
        trailers: Headers,
    },
    /// A response whose `write` returned `false` may write again.
    Drain {
        /// Exchange id.
        id: MessageId,
    },
    /// The client switched protocols. The transport is handed over.
    Upgrade {
        /// Exchange id.
        id: MessageId,
        /// The upgrade request.
        request: IncomingMessage,
        /// Transport, no longer touched by the server.
        transport: T,
        /// Bytes received after the request head.
        head: Vec<u8>,
    },
    /// The connection failed.
    Error {
        /// Exchange the failure concerns, if any.
        id: Option<MessageId>,
        /// What happened.
        error: Error,
    },
    /// An exchange that will never get its response out.
    Aborted {
        /// Exchange id.
        id: MessageId,
    },
    /// The connection is gone.
    Close {
        /// Closed by an error.
        had_error: bool,
    },
}

/// Server side of an HTTP/1.1 connection.
///
/// See the [module documentation](self).
pub struct Server<T: Transport, P = H1Tokenizer> {
    config: Config,
    pool: ParserPool<P>,
    parser: Option<P>,
    asm: AssemblerState,
    conn: Pipeline<T>,
    next_id: u64,
    events: VecDeque<ServerEvent<T>>,
    /// Request whose body is being received.
    receiving: Option<MessageId>,
    finished: bool,
}

impl<T: Transport> Server<T, H1Tokenizer> {
    /// Take over an accepted transport, with a private tokenizer pool.
    pub fn new(transport: T, config: Config) -> Self {
        Self::with_pool(transport, ParserPool::default(), config)
    }
}

impl<T: Transport, P: Tokenizer + Default> Server<T, P> {
    /// Take over an accepted transport. The tokenizer comes from `pool` and goes
    /// back there when the connection is done.
    pub fn with_pool(mut transport: T, pool: ParserPool<P>, config: Config) -> Self {
        transport.set_timeout(config.get_idle_timeout());

        let mut parser = pool.checkout(ParserKind::Request);
        parser.set_max_head_size(config.get_max_head_size());

        Server {
            config,
            pool,
            parser: Some(parser),
            asm: AssemblerState::default(),
            conn: Pipeline::new(Some(transport), ConnState::Open),
            next_id: 1,
            events: VecDeque::new(),
            receiving: None,
            finished: false,
        }
    }

    /// Status line and headers of the response to `id`.
    ///
    /// Nothing is written until the first `write`, `end` or `flush`.
    pub fn write_head(
        &mut self,
        id: MessageId,
        status: StatusCode,
        reason: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<(), Error> {
        self.usable()?;
        self.conn.find(id)?.write_head(status, reason, headers)
    }

    /// Send `100 Continue` for `id`.
    pub fn write_continue(&mut self, id: MessageId) -> Result<(), Error> {
        self.usable()?;
        self.conn.find(id)?.write_continue()?;
        if self.conn.is_head(id) {
            self.conn.cycle();
        }
        Ok(())
    }

    /// Write response body.
    ///
    /// Returns `false` when the caller should wait for [`ServerEvent::Drain`].
    pub fn write<'a>(&mut self, id: MessageId, chunk: impl Into<Chunk<'a>>) -> Result<bool, Error> {
        self.usable()?;
        self.conn.find(id)?.write(chunk.into())?;
        Ok(self.conn.after_write(id))
    }

    /// Finish the response to `id`.
    pub fn end(&mut self, id: MessageId, chunk: Option<Chunk<'_>>) -> Result<bool, Error> {
        self.usable()?;
        self.conn.find(id)?.end(chunk)?;
        let ok = self.conn.after_write(id);
        self.retire_finished();
        Ok(ok)
    }

    /// Trailer fields for a chunked response.
    pub fn add_trailers(&mut self, id: MessageId, trailers: &[(&str, &str)]) -> Result<(), Error> {
        self.usable()?;
        self.conn.find(id)?.add_trailers(trailers)
    }

    /// Hand the head and coalesced text to the transport right away.
    pub fn flush(&mut self, id: MessageId) -> Result<bool, Error> {
        self.usable()?;
        self.conn.flush(id)
    }

    /// Deliver the request body of `id` as text, from the next byte on.
    pub fn set_encoding(&mut self, id: MessageId, encoding: Encoding) -> Result<(), Error> {
        self.usable()?;
        self.conn.find(id)?.recv_encoding = Some(encoding);
        if self.receiving == Some(id) {
            self.asm.set_encoding(encoding);
        }
        Ok(())
    }

    /// Close once the responses already asked for are out.
    pub fn close_when_idle(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.pending.back_mut() {
            Some(last) => last.last = true,
            None => self.end_write_side(),
        }
    }

    /// Tear down right away. Responses not yet out are aborted.
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
    pub fn poll_event(&mut self) -> Option<ServerEvent<T>> {
        self.events.pop_front()
    }

    /// Connection lifecycle.
    pub fn state(&self) -> ConnState {
        self.conn.state()
    }

    /// The transport, until the connection is done or upgraded.
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.conn.transport.as_mut()
    }

    /// Exchanges whose response is not out yet.
    pub fn in_flight(&self) -> usize {
        self.conn.pending.len()
    }

    /// Feed one transport event.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connect => {}
            TransportEvent::Data(data) => self.on_data(&data),
            TransportEvent::Drain => self.on_drain(),
            TransportEvent::End => self.on_end(),
            TransportEvent::Close => self.on_close(),
            TransportEvent::Error(e) => self.on_error(e),
            TransportEvent::Timeout => self.on_timeout(),
        }
    }

    /// Bytes from the client.
    pub fn on_data(&mut self, data: &[u8]) {
        if self.finished || !self.conn.reading {
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
            Err(e) => {
                self.destroy_with(Some(e));
                return;
            }
        };

        if let Some(request) = upgraded {
            self.upgrade(request, &data[n..]);
        }
    }

    /// The transport wants more.
    pub fn on_drain(&mut self) {
        if self.finished {
            return;
        }
        if let Some(id) = self.conn.drained() {
            self.events.push_back(ServerEvent::Drain { id });
        }
        // responses ended while the transport was backed up
        self.retire_finished();
    }

    /// The client ended its side. Pending responses still go out.
    pub fn on_end(&mut self) {
        if self.finished || !self.conn.reading {
            return;
        }
        self.conn.reading = false;

        if let Some(id) = self.receiving {
            warn!("{} {} client ended mid request", self.conn.conn_id, id);
            self.destroy_with(Some(Error::PrematureClose));
            return;
        }

        match self.conn.pending.back_mut() {
            Some(last) => last.last = true,
            None => self.end_write_side(),
        }
        self.maybe_done();
    }

    /// The transport is fully closed.
    pub fn on_close(&mut self) {
        if self.finished {
            return;
        }
        if self.conn.pending.is_empty() && self.receiving.is_none() {
            self.conn.reading = false;
            self.conn.writing = false;
            self.conn.transport = None;
            self.maybe_done();
        } else {
            self.destroy_with(None);
        }
    }

    /// The transport failed.
    pub fn on_error(&mut self, error: Error) {
        self.destroy_with(Some(error));
    }

    /// The idle watchdog fired.
    pub fn on_timeout(&mut self) {
        if self.finished {
            return;
        }
        debug!("{} idle timeout", self.conn.conn_id);
        self.destroy_with(None);
    }

    fn usable(&self) -> Result<(), Error> {
        if self.finished {
            return Err(Error::ConnectionDestroyed);
        }
        Ok(())
    }

    /// Pop finished responses off the head, promote the next one.
    fn retire_finished(&mut self) {
        loop {
            let Some(head) = self.conn.pending.front() else {
                break;
            };
            if !head.is_done() {
                break;
            }
            let closing = head.last || !head.should_keep_alive;
            let reason = head.close_reason;
            let id = head.id;
            self.conn.pending.pop_front();

            if closing {
                if let Some(reason) = reason {
                    debug!("{} {} done, closing: {}", self.conn.conn_id, id, reason.explain());
                }
                for msg in std::mem::take(&mut self.conn.pending) {
                    self.events.push_back(ServerEvent::Aborted { id: msg.id });
                }
                // Whatever the client still sends is not answered.
                self.conn.reading = false;
                self.end_write_side();
                break;
            }

            trace!("{} {} done, keep-alive", self.conn.conn_id, id);
            if let Some(id) = self.conn.promote() {
                self.events.push_back(ServerEvent::Drain { id });
            }
        }
        self.maybe_done();
    }

    fn end_write_side(&mut self) {
        if !self.conn.writing {
            return;
        }
        self.conn.writing = false;
        self.conn.set_state(ConnState::Closing);
        if let Some(t) = &mut self.conn.transport {
            t.end();
        }
    }

    /// Closed once neither side is open.
    fn maybe_done(&mut self) {
        if self.finished || self.conn.reading || self.conn.writing {
            return;
        }
        self.finished = true;
        self.conn.set_state(ConnState::Closed);
        self.conn.transport = None;
        if let Some(p) = self.parser.take() {
            self.pool.give_back(p);
        }
        self.events.push_back(ServerEvent::Close { had_error: false });
    }

    fn upgrade(&mut self, mut request: IncomingMessage, rest: &[u8]) {
        if !self.config.get_accept_upgrade() {
            self.destroy_with(Some(Error::UpgradeWithoutHandler));
            return;
        }
        let Some(transport) = self.conn.transport.take() else {
            return;
        };

        let id = MessageId(self.next_id);
        self.next_id += 1;
        request.id = id;
        debug!("{} {} upgraded, handing over transport", self.conn.conn_id, id);

        self.events.push_back(ServerEvent::Upgrade {
            id,
            request,
            transport,
            head: rest.to_vec(),
        });
        for msg in std::mem::take(&mut self.conn.pending) {
            self.events.push_back(ServerEvent::Aborted { id: msg.id });
        }

        self.conn.reading = false;
        self.conn.writing = false;
        self.maybe_done();
    }

    fn destroy_with(&mut self, error: Option<Error>) {
        if self.finished {
            return;
        }
        self.finished = true;

        if let Some(mut t) = self.conn.transport.take() {
            t.destroy();
        }
        if let Some(p) = self.parser.take() {
            self.pool.give_back(p);
        }
        self.conn.reading = false;
        self.conn.writing = false;

        let dead = error
            .as_ref()
            .is_some_and(|e| matches!(e.kind(), ErrorKind::Transport | ErrorKind::Tls));
        self.conn.set_state(if dead {
            ConnState::Dead
        } else {
            ConnState::Closed
        });

        let had_error = error.is_some();
        let mut errored = None;
        if let Some(error) = error {
            warn!("{} destroyed: {}", self.conn.conn_id, error);
            errored = self
                .receiving
                .or_else(|| self.conn.pending.front().map(|m| m.id));
            self.events.push_back(ServerEvent::Error { id: errored, error });
        }
        // one terminal notification per exchange, the errored one already has it
        for msg in std::mem::take(&mut self.conn.pending) {
            if Some(msg.id) != errored {
                self.events.push_back(ServerEvent::Aborted { id: msg.id });
            }
        }
        self.events.push_back(ServerEvent::Close { had_error });
    }
}

impl<T: Transport, P> Drop for Server<T, P> {
    fn drop(&mut self) {
        if let Some(p) = self.parser.take() {
            self.pool.give_back(p);
        }
    }
}

impl<T: Transport, P: Tokenizer + Default> Dispatch for Server<T, P> {
    fn incoming(&mut self, msg: &IncomingMessage) -> bool {
        let id = MessageId(self.next_id);
        self.next_id += 1;

        let mut response =
            OutgoingMessage::response(id, msg, self.config.get_aggregate_threshold());
        let mut request = msg.clone();
        request.id = id;

        let event = if msg.expects_continue() {
            if self.config.get_check_continue() {
                ServerEvent::CheckContinue { id, request }
            } else {
                // write_continue only fails after write_head.
                let _ = response.write_continue();
                ServerEvent::Request { id, request }
            }
        } else {
            ServerEvent::Request { id, request }
        };

        trace!("{} {} request {}", self.conn.conn_id, id, msg.url());
        self.conn.pending.push_back(response);
        self.receiving = Some(id);
        self.events.push_back(event);

        if self.conn.is_head(id) {
            self.conn.cycle();
        }

        false
    }

    fn body(&mut self, body: Body) {
        if let Some(id) = self.receiving {
            self.events.push_back(ServerEvent::Data { id, body });
        }
    }

    fn complete(&mut self, msg: IncomingMessage) {
        let Some(id) = self.receiving.take() else {
            return;
        };
        self.events.push_back(ServerEvent::End {
            id,
            trailers: msg.trailers().clone(),
        });
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
