//! Tokenizer seam.
//!
//! A [`Tokenizer`] turns raw bytes into structural callbacks on a
//! [`ParserHandler`]. The engine ships [`H1Tokenizer`], built on `httparse`,
//! but any tokenizer honoring the callback order below can be plugged in:
//!
//! ```text
//! on_message_begin
//! on_url*                        (requests)
//! (on_header_field+ on_header_value*)*
//! on_headers_complete
//! on_body*
//! (on_header_field+ on_header_value*)*   (trailers)
//! on_message_complete
//! ```
//!
//! Fields and values may be split over any number of calls.

use http::{Method, StatusCode, Version};

use crate::Error;

mod h1;
pub use h1::H1Tokenizer;

mod pool;
pub use pool::ParserPool;

/// Which side of the exchange a tokenizer parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// Server side: request lines.
    Request,
    /// Client side: status lines.
    Response,
}

/// What the tokenizer learned from a message head.
#[derive(Debug, Clone)]
pub struct HeadInfo {
    /// HTTP version of the message.
    pub version: Version,
    /// Request method (requests only).
    pub method: Option<Method>,
    /// Response status (responses only).
    pub status: Option<StatusCode>,
    /// Reason phrase (responses only).
    pub reason: Option<String>,
    /// The message switches protocol. The tokenizer stops right after the head.
    pub upgrade: bool,
    /// Version and `connection` header allow another message on this connection.
    pub should_keep_alive: bool,
}

/// Receiver of tokenizer callbacks.
pub trait ParserHandler {
    /// A new message starts.
    fn on_message_begin(&mut self);

    /// Part of the request target.
    fn on_url(&mut self, url: &[u8]);

    /// Part of a header field name.
    fn on_header_field(&mut self, field: &[u8]);

    /// Part of a header value.
    fn on_header_value(&mut self, value: &[u8]);

    /// The head is complete.
    ///
    /// Returns `true` when no body follows regardless of framing headers, which
    /// is the case for a response to `HEAD` and for informational responses.
    fn on_headers_complete(&mut self, info: HeadInfo) -> bool;

    /// Body bytes, framing removed.
    fn on_body(&mut self, data: &[u8]);

    /// The message, trailers included, is complete.
    fn on_message_complete(&mut self);
}

/// Byte level HTTP/1 tokenizer.
pub trait Tokenizer {
    /// Forget all state and start over parsing `kind` messages.
    fn reinitialize(&mut self, kind: ParserKind);

    /// Feed bytes. Returns the number of bytes consumed.
    ///
    /// Less than `input.len()` is only returned after an upgrade head; the
    /// rest belongs to the new protocol.
    fn execute(&mut self, input: &[u8], handler: &mut dyn ParserHandler)
        -> Result<usize, Error>;

    /// The peer ended the stream. Completes a close delimited body.
    fn finish(&mut self, handler: &mut dyn ParserHandler) -> Result<(), Error>;

    /// Limit the size of a message head. Tokenizers without a limit ignore this.
    fn set_max_head_size(&mut self, max: usize) {
        let _ = max;
    }
}
