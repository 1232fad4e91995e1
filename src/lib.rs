//! Sans-IO HTTP/1.1 connection engine.
//!
//! Many logical request/response messages squeezed onto one strictly ordered
//! duplex byte connection, client and server side, optionally layered over a
//! TLS record pump.
//!
//! Sans-IO means the crate never touches a socket. The driver owns the I/O
//! readiness loop and feeds transport events in (`on_data`, `on_drain`,
//! `on_end` …), the engine writes through the [`Transport`] trait, and
//! consumer-facing events are pulled with `poll_event()`.
//!
//! ```text
//!  transport ─▶ (tls::SecureTransport) ─▶ Tokenizer ─▶ assembler ─▶ poll_event()
//!  write()/end() ─▶ OutgoingMessage ─▶ head-of-line gate ─▶ (tls) ─▶ transport
//! ```
//!
//! * [`client::Client`] - owns a [`Connector`](client::Connector), queues
//!   requests, matches responses to the queue head, reconnects silently.
//! * [`server::Server`] - one per accepted transport, answers pipelined
//!   requests strictly in order.
//! * [`tls`] - the record pump between a TLS engine and two byte pipelines.
//!
//! # The http crate
//!
//! Methods, status codes and versions are those of the
//! [http crate](https://crates.io/crates/http).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// Re-export the basis for this library.
pub use http;

mod error;
pub use error::{Error, ErrorKind};

mod close_reason;
pub use close_reason::CloseReason;

mod config;
pub use config::Config;

mod util;

mod ext;

pub mod headers;
pub use headers::{FieldValue, Headers};

mod encoding;
pub use encoding::{Body, Chunk, Encoding, TextDecoder};

mod chunk;

mod transport;
pub use transport::{Sink, Transport, TransportEvent};

pub mod parser;

mod incoming;
pub use incoming::IncomingMessage;

mod outgoing;

mod conn;
pub use conn::ConnState;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

pub mod tls;

#[cfg(test)]
mod testing;

/// Identifies one logical message exchange on a connection.
///
/// On the client it names a request and the response matched to it, on the
/// server a request and the response written for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a connection in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    pub(crate) fn next() -> ConnId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
