use std::collections::VecDeque;
use std::fmt;

use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode, Version};

use crate::chunk::{write_chunk_header, write_terminal, CRLF};
use crate::close_reason::CloseReason;
use crate::encoding::{Chunk, Encoding};
use crate::ext::{MethodExt, StatusExt, VersionExt};
use crate::incoming::IncomingMessage;
use crate::util::contains_ignore_case;
use crate::{Error, MessageId};

/// Bytes ready for the transport.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub bytes: Vec<u8>,
    /// Holds at least one body byte.
    pub body: bool,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.bytes.len())
            .field("body", &self.body)
            .finish()
    }
}

/// Text waiting to be coalesced with the next write of the same encoding.
#[derive(Debug, Default)]
struct Aggregate {
    bytes: Vec<u8>,
    /// `None` while it only holds framing (head, terminal chunk).
    encoding: Option<Encoding>,
    body: bool,
}

/// A request (client) or response (server) being written.
///
/// Writes are framed and queued here. The connection moves queued frames to the
/// transport when this message is head of line.
#[derive(Debug)]
pub(crate) struct OutgoingMessage {
    pub id: MessageId,
    /// Request method. For responses the method of the request answered.
    pub method: Method,
    is_request: bool,
    threshold: usize,

    header: Option<Vec<u8>>,
    header_sent: bool,
    pub chunked: bool,
    pub should_keep_alive: bool,
    pub last: bool,
    pub has_body: bool,
    pub use_chunked_by_default: bool,
    pub expect_continue: bool,
    pub sent_100: bool,
    pub close_reason: Option<CloseReason>,
    trailer: Vec<(String, String)>,

    agg: Aggregate,
    output: VecDeque<Frame>,
    finished: bool,

    /// The transport accepted the last write.
    pub write_state: bool,
    /// A write returned `false` to the caller, who now waits for a drain.
    pub needs_drain: bool,
    /// Any body byte went out.
    pub body_sent: bool,
    /// Frames sent before any body byte, replayed on a fresh transport.
    replay: Vec<Vec<u8>>,
    /// Times the client replayed this request on a new transport.
    pub retries: usize,
    /// The client saw the head of the final response.
    pub got_response: bool,
    /// Decode the body received for this exchange as text.
    pub recv_encoding: Option<Encoding>,
}

impl OutgoingMessage {
    fn new(id: MessageId, method: Method, is_request: bool, threshold: usize) -> Self {
        OutgoingMessage {
            id,
            method,
            is_request,
            threshold,
            header: None,
            header_sent: false,
            chunked: false,
            should_keep_alive: true,
            last: false,
            has_body: true,
            use_chunked_by_default: true,
            expect_continue: false,
            sent_100: false,
            close_reason: None,
            trailer: vec![],
            agg: Aggregate::default(),
            output: VecDeque::new(),
            finished: false,
            write_state: true,
            needs_drain: false,
            body_sent: false,
            replay: vec![],
            retries: 0,
            got_response: false,
            recv_encoding: None,
        }
    }

    /// A client request with its head stored right away.
    pub fn request(
        id: MessageId,
        method: Method,
        target: &str,
        headers: &[(&str, &str)],
        keep_alive: bool,
        threshold: usize,
    ) -> Result<Self, Error> {
        if target.is_empty() || target.bytes().any(|c| c <= b' ' || c == 0x7f) {
            return Err(Error::BadUrl(target.to_string()));
        }

        let mut msg = OutgoingMessage::new(id, method, true, threshold);
        msg.should_keep_alive = keep_alive;
        msg.use_chunked_by_default = msg.method.chunked_by_default();
        if msg.method == Method::HEAD {
            msg.has_body = false;
        }

        let line = format!("{} {} HTTP/1.1\r\n", msg.method, target);
        msg.store_headers(line, headers)?;

        Ok(msg)
    }

    /// The response to `req`, waiting for `write_head`.
    pub fn response(id: MessageId, req: &IncomingMessage, threshold: usize) -> Self {
        let method = req.method().cloned().unwrap_or(Method::GET);
        let mut msg = OutgoingMessage::new(id, method, false, threshold);

        msg.should_keep_alive = req.should_keep_alive();
        if !msg.should_keep_alive {
            msg.close_reason = Some(CloseReason::ClientConnectionClose);
        }
        if msg.method == Method::HEAD {
            msg.has_body = false;
        }
        if !req.version().is_http11() {
            msg.use_chunked_by_default = false;
            msg.should_keep_alive = false;
            msg.close_reason = Some(CloseReason::Http10);
        }
        msg.expect_continue = req.expects_continue();

        msg
    }

    /// Status line and headers of a response.
    pub fn write_head(
        &mut self,
        status: StatusCode,
        reason: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<(), Error> {
        if self.header.is_some() {
            return Err(Error::HeadersAlreadySent);
        }

        if status.is_bodyless() {
            self.has_body = false;
        }

        // The client may be putting a body on the wire that nobody reads.
        if self.expect_continue && !self.sent_100 {
            self.should_keep_alive = false;
            self.close_reason = Some(CloseReason::Not100Continue);
        }

        let reason = reason
            .or_else(|| status.canonical_reason())
            .unwrap_or("unknown");
        let line = format!(
            "{} {} {}\r\n",
            Version::HTTP_11.as_str(),
            status.as_u16(),
            reason
        );

        self.store_headers(line, headers)
    }

    /// Interim `100 Continue`, ahead of the final head.
    pub fn write_continue(&mut self) -> Result<(), Error> {
        if self.header.is_some() {
            return Err(Error::HeadersAlreadySent);
        }
        self.flush();
        self.output.push_back(Frame {
            bytes: b"HTTP/1.1 100 Continue\r\n\r\n".to_vec(),
            body: false,
        });
        self.sent_100 = true;
        Ok(())
    }

    fn store_headers(&mut self, line: String, headers: &[(&str, &str)]) -> Result<(), Error> {
        let mut head = line.into_bytes();

        let mut sent_connection = false;
        let mut sent_content_length = false;
        let mut sent_transfer_encoding = false;

        for (field, value) in headers {
            validate(field, value)?;

            head.extend_from_slice(field.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(CRLF);

            if field.eq_ignore_ascii_case("connection") {
                sent_connection = true;
                if contains_ignore_case(value, "close") {
                    self.last = true;
                    self.should_keep_alive = false;
                    self.close_reason = Some(if self.is_request {
                        CloseReason::ClientConnectionClose
                    } else {
                        CloseReason::ServerConnectionClose
                    });
                } else {
                    self.should_keep_alive = true;
                }
            } else if field.eq_ignore_ascii_case("transfer-encoding") {
                sent_transfer_encoding = true;
                if contains_ignore_case(value, "chunk") {
                    self.chunked = true;
                }
            } else if field.eq_ignore_ascii_case("content-length") {
                sent_content_length = true;
            } else if field.eq_ignore_ascii_case("expect") {
                if self.is_request && contains_ignore_case(value, "100-continue") {
                    self.expect_continue = true;
                }
            }
        }

        let mut use_chunked = false;
        if !sent_content_length && !sent_transfer_encoding {
            if !self.has_body {
                // no terminal 0\r\n\r\n for a message without body
                self.chunked = false;
            } else if self.use_chunked_by_default {
                use_chunked = true;
                self.chunked = true;
            } else if self.is_request {
                // GET and friends without framing have an empty body.
                self.has_body = false;
            } else {
                self.last = true;
                self.close_reason = Some(CloseReason::CloseDelimitedBody);
            }
        }

        if !sent_connection {
            let delimited = sent_content_length || self.use_chunked_by_default || !self.has_body;
            if self.should_keep_alive && delimited && !self.last {
                head.extend_from_slice(b"Connection: keep-alive\r\n");
            } else {
                self.last = true;
                self.should_keep_alive = false;
                head.extend_from_slice(b"Connection: close\r\n");
            }
        }

        if use_chunked {
            head.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
        }

        head.extend_from_slice(CRLF);

        self.header = Some(head);
        self.header_sent = false;

        Ok(())
    }

    /// Trailer fields sent with the terminal chunk.
    pub fn add_trailers(&mut self, headers: &[(&str, &str)]) -> Result<(), Error> {
        if self.finished {
            return Err(Error::AlreadyEnded);
        }
        let mut trailer = Vec::with_capacity(headers.len());
        for (field, value) in headers {
            validate(field, value)?;
            trailer.push((field.to_string(), value.to_string()));
        }
        self.trailer = trailer;
        Ok(())
    }

    /// Queue a piece of body.
    pub fn write(&mut self, chunk: Chunk<'_>) -> Result<(), Error> {
        if self.header.is_none() {
            return Err(Error::HeadersNotSent);
        }
        if self.finished {
            return Err(Error::AlreadyEnded);
        }
        if !self.has_body {
            return Err(Error::BodyNotAllowed);
        }
        if chunk.is_empty() {
            return Ok(());
        }

        match chunk {
            Chunk::Text(text, encoding) => {
                let mut framed = Vec::with_capacity(text.len() + 10);
                if self.chunked {
                    encoding.materialize_framed(text, &mut framed, write_chunk_header)?;
                    framed.extend_from_slice(CRLF);
                } else {
                    encoding.materialize(text, &mut framed)?;
                }
                self.write_headers();
                self.push_text(framed, encoding);
            }

            Chunk::Bytes(data) => {
                self.write_headers();
                self.flush();
                let mut bytes = Vec::with_capacity(data.len() + 12);
                if self.chunked {
                    write_chunk_header(data.len(), &mut bytes);
                    bytes.extend_from_slice(data);
                    bytes.extend_from_slice(CRLF);
                } else {
                    bytes.extend_from_slice(data);
                }
                self.output.push_back(Frame { bytes, body: true });
            }
        }

        Ok(())
    }

    /// Finish the message, optionally with a last piece of body.
    pub fn end(&mut self, chunk: Option<Chunk<'_>>) -> Result<(), Error> {
        if self.finished {
            return Err(Error::AlreadyEnded);
        }
        if self.header.is_none() {
            return Err(Error::HeadersNotSent);
        }

        match chunk {
            Some(c) if !c.is_empty() => self.write(c)?,
            _ => self.write_headers(),
        }

        if self.chunked {
            let mut terminal = Vec::with_capacity(5);
            write_terminal(&self.trailer, &mut terminal);
            self.agg.bytes.extend_from_slice(&terminal);
        }

        self.flush();
        self.finished = true;

        Ok(())
    }

    /// Move the head into the aggregate, once.
    pub fn write_headers(&mut self) {
        if self.header_sent {
            return;
        }
        if let Some(h) = &self.header {
            self.agg.bytes.extend_from_slice(h);
            self.header_sent = true;
        }
    }

    fn push_text(&mut self, bytes: Vec<u8>, encoding: Encoding) {
        if self.agg.encoding.is_some_and(|e| e != encoding) {
            self.flush();
        }
        if self.agg.body && self.agg.bytes.len() + bytes.len() > self.threshold {
            self.flush();
        }

        self.agg.bytes.extend_from_slice(&bytes);
        self.agg.encoding = Some(encoding);
        self.agg.body = true;

        if self.agg.bytes.len() >= self.threshold {
            self.flush();
        }
    }

    /// Materialize the aggregate as a frame.
    pub fn flush(&mut self) {
        if self.agg.bytes.is_empty() {
            return;
        }
        let agg = std::mem::take(&mut self.agg);
        self.output.push_back(Frame {
            bytes: agg.bytes,
            body: agg.body,
        });
    }

    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.output.pop_front()
    }

    /// Record a frame that reached the transport.
    pub fn sent(&mut self, frame: &Frame) {
        if frame.body {
            self.body_sent = true;
            self.replay.clear();
        } else if !self.body_sent {
            self.replay.push(frame.bytes.clone());
        }
    }

    /// Put everything handed to a lost transport back in front of the queue.
    ///
    /// Only valid as long as no body byte went out.
    pub fn rewind(&mut self) -> bool {
        if self.body_sent {
            return false;
        }
        for bytes in self.replay.drain(..).rev() {
            self.output.push_front(Frame { bytes, body: false });
        }
        self.write_state = true;
        true
    }

    /// All bytes of a finished message are out of this buffer.
    pub fn is_done(&self) -> bool {
        self.finished && self.output.is_empty() && self.agg.bytes.is_empty()
    }
}

fn validate(field: &str, value: &str) -> Result<(), Error> {
    HeaderName::from_bytes(field.as_bytes())
        .map_err(|_| Error::BadHeader(format!("invalid name: {}", field)))?;
    HeaderValue::from_str(value)
        .map_err(|_| Error::BadHeader(format!("invalid value for {}", field)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    fn post(threshold: usize) -> OutgoingMessage {
        OutgoingMessage::request(MessageId(1), Method::POST, "/", &[], true, threshold).unwrap()
    }

    fn drain(msg: &mut OutgoingMessage) -> Vec<Vec<u8>> {
        let mut v = vec![];
        while let Some(f) = msg.pop_frame() {
            msg.sent(&f);
            v.push(f.bytes);
        }
        v
    }

    fn body_of(wire: &[u8]) -> &[u8] {
        let pos = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        &wire[pos + 4..]
    }

    #[test]
    fn chunked_post_wire_bytes() {
        let mut msg = post(1024);
        msg.write("abc".into()).unwrap();
        msg.write("".into()).unwrap();
        msg.write("de".into()).unwrap();
        msg.end(None).unwrap();

        let wire = drain(&mut msg).concat();
        assert_eq!(body_of(&wire), b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
        assert!(msg.is_done());
    }

    #[test]
    fn post_head_defaults() {
        let mut msg = post(1024);
        msg.end(None).unwrap();
        let wire = String::from_utf8(drain(&mut msg).concat()).unwrap();
        assert_eq!(
            wire,
            "POST / HTTP/1.1\r\n\
            Connection: keep-alive\r\n\
            Transfer-Encoding: chunked\r\n\
            \r\n\
            0\r\n\r\n"
        );
        assert!(msg.chunked);
        assert!(!msg.last);
    }

    #[test]
    fn get_without_framing_has_no_body() {
        let mut msg =
            OutgoingMessage::request(MessageId(1), Method::GET, "/x", &[("Host", "a")], true, 1024)
                .unwrap();
        assert_eq!(msg.write("x".into()), Err(Error::BodyNotAllowed));
        msg.end(None).unwrap();
        let wire = String::from_utf8(drain(&mut msg).concat()).unwrap();
        assert_eq!(
            wire,
            "GET /x HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\n\r\n"
        );
    }

    #[test]
    fn no_keep_alive_synthesizes_close() {
        let mut msg =
            OutgoingMessage::request(MessageId(1), Method::GET, "/", &[], false, 1024).unwrap();
        msg.end(None).unwrap();
        let wire = String::from_utf8(drain(&mut msg).concat()).unwrap();
        assert!(wire.contains("Connection: close\r\n"));
        assert!(msg.last);
    }

    #[test]
    fn explicit_connection_close() {
        let msg = OutgoingMessage::request(
            MessageId(1),
            Method::GET,
            "/",
            &[("connection", "Close")],
            true,
            1024,
        )
        .unwrap();
        assert!(msg.last);
        assert!(!msg.should_keep_alive);
        assert_eq!(msg.close_reason, Some(CloseReason::ClientConnectionClose));
    }

    #[test]
    fn content_length_is_not_chunked() {
        let mut msg = OutgoingMessage::request(
            MessageId(1),
            Method::PUT,
            "/",
            &[("content-length", "5")],
            true,
            1024,
        )
        .unwrap();
        msg.end(Some("hello".into())).unwrap();
        let wire = drain(&mut msg).concat();
        assert_eq!(body_of(&wire), b"hello");
        assert!(!msg.chunked);
    }

    #[test]
    fn usage_errors() {
        let req = request_in("GET / HTTP/1.1\r\n\r\n");
        let mut res = OutgoingMessage::response(MessageId(1), &req, 1024);
        assert_eq!(res.write("x".into()), Err(Error::HeadersNotSent));
        assert_eq!(res.end(None), Err(Error::HeadersNotSent));

        res.write_head(StatusCode::NO_CONTENT, None, &[]).unwrap();
        assert_eq!(
            res.write_head(StatusCode::OK, None, &[]),
            Err(Error::HeadersAlreadySent)
        );
        assert_eq!(res.write("x".into()), Err(Error::BodyNotAllowed));
        res.end(None).unwrap();
        assert_eq!(res.end(None), Err(Error::AlreadyEnded));
    }

    #[test]
    fn bad_header_rejected() {
        let err = OutgoingMessage::request(
            MessageId(1),
            Method::GET,
            "/",
            &[("bad name", "x")],
            true,
            1024,
        )
        .unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));

        let err = OutgoingMessage::request(MessageId(1), Method::GET, "/a b", &[], true, 1024)
            .unwrap_err();
        assert!(matches!(err, Error::BadUrl(_)));
    }

    #[test]
    fn aggregation_coalesces_small_text() {
        let mut msg = post(1024);
        msg.write("a".into()).unwrap();
        msg.write("b".into()).unwrap();
        msg.write("c".into()).unwrap();
        assert!(!msg.has_output());
        msg.flush();
        let frames = drain(&mut msg);
        // head and three chunks in one transport write
        assert_eq!(frames.len(), 1);
        assert!(frames[0].ends_with(b"1\r\na\r\n1\r\nb\r\n1\r\nc\r\n"));
    }

    #[test]
    fn aggregation_flush_points() {
        let mut msg = post(16);
        msg.write("0123456789".into()).unwrap();
        // would cross the threshold, flushes first
        msg.write("0123456789".into()).unwrap();
        // encoding change flushes
        msg.write(Chunk::Text("00", Encoding::Hex)).unwrap();
        // bytes always flush and stand alone
        msg.write(b"raw".into()).unwrap();
        msg.end(None).unwrap();

        let frames = drain(&mut msg);
        let bodies: Vec<_> = frames.iter().map(|f| body_or_all(f)).collect();
        assert_eq!(
            bodies,
            vec![
                b"a\r\n0123456789\r\n".to_vec(),
                b"a\r\n0123456789\r\n".to_vec(),
                b"1\r\n\x00\r\n".to_vec(),
                b"3\r\nraw\r\n".to_vec(),
                b"0\r\n\r\n".to_vec(),
            ]
        );
    }

    fn body_or_all(frame: &[u8]) -> Vec<u8> {
        match frame.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(p) if frame.starts_with(b"POST") => frame[p + 4..].to_vec(),
            _ => frame.to_vec(),
        }
    }

    #[test]
    fn zero_threshold_writes_through() {
        let mut msg = post(0);
        msg.write("a".into()).unwrap();
        msg.write("b".into()).unwrap();
        assert_eq!(drain(&mut msg).len(), 2);
    }

    #[test]
    fn trailers_in_terminal_chunk() {
        let mut msg = post(1024);
        msg.add_trailers(&[("X-Sum", "1")]).unwrap();
        msg.end(Some("z".into())).unwrap();
        let wire = drain(&mut msg).concat();
        assert_eq!(body_of(&wire), b"1\r\nz\r\n0\r\nX-Sum: 1\r\n\r\n");
    }

    #[test]
    fn replay_only_before_body() {
        let mut msg = post(0);
        msg.write_headers();
        msg.flush();
        let head = drain(&mut msg);
        assert!(msg.rewind());
        assert_eq!(drain(&mut msg), head);

        msg.write("x".into()).unwrap();
        drain(&mut msg);
        assert!(msg.body_sent);
        assert!(!msg.rewind());
    }

    fn request_in(raw: &str) -> IncomingMessage {
        use crate::incoming::{AssemblerState, Assembly, Dispatch};
        use crate::parser::{H1Tokenizer, ParserKind, Tokenizer};

        struct Grab(Option<IncomingMessage>);
        impl Dispatch for Grab {
            fn incoming(&mut self, msg: &IncomingMessage) -> bool {
                self.0 = Some(msg.clone());
                false
            }
            fn body(&mut self, _: crate::Body) {}
            fn complete(&mut self, _: IncomingMessage) {}
        }

        let mut p = H1Tokenizer::default();
        p.reinitialize(ParserKind::Request);
        let mut state = AssemblerState::default();
        let mut g = Grab(None);
        p.execute(
            raw.as_bytes(),
            &mut Assembly {
                state: &mut state,
                dispatch: &mut g,
            },
        )
        .unwrap();
        g.0.unwrap()
    }

    #[test]
    fn response_to_http10() {
        let req = request_in("GET / HTTP/1.0\r\n\r\n");
        let mut res = OutgoingMessage::response(MessageId(1), &req, 1024);
        res.write_head(StatusCode::OK, None, &[]).unwrap();
        res.end(Some("hi".into())).unwrap();
        let wire = String::from_utf8(drain(&mut res).concat()).unwrap();
        assert_eq!(wire, "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nhi");
        assert!(res.last);
        assert_eq!(res.close_reason, Some(CloseReason::CloseDelimitedBody));
    }

    #[test]
    fn response_to_head_request() {
        let req = request_in("HEAD / HTTP/1.1\r\n\r\n");
        let mut res = OutgoingMessage::response(MessageId(1), &req, 1024);
        res.write_head(StatusCode::OK, None, &[("content-length", "10")])
            .unwrap();
        assert_eq!(res.write("x".into()), Err(Error::BodyNotAllowed));
        res.end(None).unwrap();
        let wire = String::from_utf8(drain(&mut res).concat()).unwrap();
        assert_eq!(
            wire,
            "HTTP/1.1 200 OK\r\ncontent-length: 10\r\nConnection: keep-alive\r\n\r\n"
        );
    }

    #[test]
    fn final_status_without_continue_closes() {
        let req = request_in("PUT / HTTP/1.1\r\nExpect: 100-continue\r\ncontent-length: 3\r\n\r\n");
        let mut res = OutgoingMessage::response(MessageId(1), &req, 1024);
        res.write_head(StatusCode::PAYLOAD_TOO_LARGE, None, &[]).unwrap();
        assert!(res.last);
        assert_eq!(res.close_reason, Some(CloseReason::Not100Continue));

        let mut res = OutgoingMessage::response(MessageId(2), &req, 1024);
        res.write_continue().unwrap();
        res.write_head(StatusCode::OK, Some("Fine"), &[]).unwrap();
        res.end(None).unwrap();
        let wire = String::from_utf8(drain(&mut res).concat()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 Fine\r\n"));
        assert!(!res.last);
    }
}
