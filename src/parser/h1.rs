use http::{Method, StatusCode, Version};

use super::{HeadInfo, ParserHandler, ParserKind, Tokenizer};
use crate::chunk::{Dechunker, Step};
use crate::config::DEFAULT_MAX_HEAD_SIZE;
use crate::ext::StatusExt;
use crate::util::{contains_ignore_case, log_data};
use crate::Error;

/// Max number of headers to parse from an HTTP message head.
const MAX_HEADERS: usize = 128;

#[derive(Debug)]
enum ReadState {
    Head,
    Length(u64),
    Chunked(Dechunker),
    CloseDelimited,
    Upgraded,
}

/// HTTP/1.x tokenizer backed by `httparse`.
///
/// The head is buffered until complete and then reported in one go. Bodies
/// are passed through as they arrive: content-length, chunked (with trailers)
/// or, for responses, delimited by the end of the stream.
#[derive(Debug)]
pub struct H1Tokenizer {
    kind: ParserKind,
    max_head_size: usize,
    head: Vec<u8>,
    state: ReadState,
}

impl Default for H1Tokenizer {
    fn default() -> Self {
        H1Tokenizer {
            kind: ParserKind::Request,
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
            head: Vec::new(),
            state: ReadState::Head,
        }
    }
}

/// Framing derived from the head fields.
#[derive(Default)]
struct Framing {
    content_length: Option<u64>,
    chunked: bool,
    conn_close: bool,
    conn_keep_alive: bool,
    conn_upgrade: bool,
    upgrade_header: bool,
}

impl Framing {
    fn scan(headers: &[httparse::Header<'_>]) -> Result<Framing, Error> {
        let mut f = Framing::default();

        for h in headers {
            let value = std::str::from_utf8(h.value).unwrap_or("");

            if h.name.eq_ignore_ascii_case("content-length") {
                let len: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::BadContentLengthHeader)?;
                if f.content_length.is_some_and(|prev| prev != len) {
                    return Err(Error::TooManyContentLengthHeaders);
                }
                f.content_length = Some(len);
            } else if h.name.eq_ignore_ascii_case("transfer-encoding") {
                f.chunked = contains_ignore_case(value, "chunked");
            } else if h.name.eq_ignore_ascii_case("connection") {
                f.conn_close |= contains_ignore_case(value, "close");
                f.conn_keep_alive |= contains_ignore_case(value, "keep-alive");
                f.conn_upgrade |= contains_ignore_case(value, "upgrade");
            } else if h.name.eq_ignore_ascii_case("upgrade") {
                f.upgrade_header = true;
            }
        }

        Ok(f)
    }

    fn keep_alive(&self, version: Version) -> bool {
        if version == Version::HTTP_10 {
            self.conn_keep_alive
        } else {
            !self.conn_close
        }
    }
}

fn trim(mut b: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = b {
        if !first.is_ascii_whitespace() {
            break;
        }
        b = rest;
    }
    while let [rest @ .., last] = b {
        if !last.is_ascii_whitespace() {
            break;
        }
        b = rest;
    }
    b
}

fn version_of(v: Option<u8>) -> Version {
    match v {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    }
}

impl H1Tokenizer {
    /// Try to parse a complete head out of `head`.
    ///
    /// Returns the head length on success, `None` when more bytes are needed.
    fn parse_head(
        &mut self,
        head: &[u8],
        handler: &mut dyn ParserHandler,
    ) -> Result<Option<usize>, Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];

        let (len, info, framing) = match self.kind {
            ParserKind::Request => {
                let mut req = httparse::Request::new(&mut headers);
                let len = match req.parse(head)? {
                    httparse::Status::Complete(n) => n,
                    httparse::Status::Partial => return Ok(None),
                };

                let method = req
                    .method
                    .ok_or_else(|| Error::HttpParseFail("missing method".into()))?;
                let method = Method::from_bytes(method.as_bytes())
                    .map_err(|e| Error::HttpParseFail(e.to_string()))?;
                let path = req.path.unwrap_or("/");
                let version = version_of(req.version);
                let framing = Framing::scan(req.headers)?;

                handler.on_message_begin();
                handler.on_url(path.as_bytes());
                for h in req.headers.iter() {
                    handler.on_header_field(h.name.as_bytes());
                    handler.on_header_value(h.value);
                }

                let upgrade =
                    method == Method::CONNECT || (framing.conn_upgrade && framing.upgrade_header);

                let info = HeadInfo {
                    version,
                    should_keep_alive: framing.keep_alive(version),
                    method: Some(method),
                    status: None,
                    reason: None,
                    upgrade,
                };

                (len, info, framing)
            }

            ParserKind::Response => {
                let mut res = httparse::Response::new(&mut headers);
                let len = match res.parse(head)? {
                    httparse::Status::Complete(n) => n,
                    httparse::Status::Partial => return Ok(None),
                };

                let code = res
                    .code
                    .ok_or_else(|| Error::HttpParseFail("missing status".into()))?;
                let status = StatusCode::from_u16(code)
                    .map_err(|e| Error::HttpParseFail(e.to_string()))?;
                let version = version_of(res.version);
                let framing = Framing::scan(res.headers)?;

                handler.on_message_begin();
                for h in res.headers.iter() {
                    handler.on_header_field(h.name.as_bytes());
                    handler.on_header_value(h.value);
                }

                let close_delimited = !status.is_bodyless()
                    && !framing.chunked
                    && framing.content_length.is_none();

                let info = HeadInfo {
                    version,
                    should_keep_alive: framing.keep_alive(version) && !close_delimited,
                    method: None,
                    status: Some(status),
                    reason: res.reason.map(|r| r.to_string()),
                    upgrade: status == StatusCode::SWITCHING_PROTOCOLS,
                };

                (len, info, framing)
            }
        };

        let upgrade = info.upgrade;
        let bodyless = info.status.is_some_and(|s| s.is_bodyless());
        let is_response = self.kind == ParserKind::Response;

        let skip_body = handler.on_headers_complete(info);

        self.state = if upgrade {
            ReadState::Upgraded
        } else if skip_body || bodyless {
            ReadState::Length(0)
        } else if framing.chunked {
            ReadState::Chunked(Dechunker::default())
        } else if let Some(n) = framing.content_length {
            ReadState::Length(n)
        } else if is_response {
            ReadState::CloseDelimited
        } else {
            ReadState::Length(0)
        };

        if upgrade {
            handler.on_message_complete();
        }

        Ok(Some(len))
    }

    fn trailer(line: &[u8], handler: &mut dyn ParserHandler) -> Result<(), Error> {
        let colon = line
            .iter()
            .position(|c| *c == b':')
            .ok_or_else(|| Error::HttpParseFail("trailer without colon".into()))?;
        let name = trim(&line[..colon]);
        let value = trim(&line[colon + 1..]);
        if name.is_empty() {
            return Err(Error::HttpParseFail("empty trailer name".into()));
        }
        handler.on_header_field(name);
        handler.on_header_value(value);
        Ok(())
    }
}

impl Tokenizer for H1Tokenizer {
    fn reinitialize(&mut self, kind: ParserKind) {
        self.kind = kind;
        self.head.clear();
        self.state = ReadState::Head;
    }

    fn execute(
        &mut self,
        input: &[u8],
        handler: &mut dyn ParserHandler,
    ) -> Result<usize, Error> {
        let mut pos = 0;

        loop {
            match &mut self.state {
                ReadState::Head => {
                    if pos == input.len() {
                        return Ok(pos);
                    }

                    let before = self.head.len();
                    let room = (self.max_head_size + 1).saturating_sub(before);
                    let take = (input.len() - pos).min(room.max(1));

                    let mut head = std::mem::take(&mut self.head);
                    head.extend_from_slice(&input[pos..pos + take]);

                    match self.parse_head(&head, handler)? {
                        Some(len) => {
                            log_data(&head[..len]);
                            pos += len - before;
                            head.clear();
                            self.head = head;
                        }
                        None => {
                            if head.len() > self.max_head_size {
                                return Err(Error::HeadTooLarge(self.max_head_size));
                            }
                            self.head = head;
                            pos += take;
                        }
                    }
                }

                ReadState::Length(rem) => {
                    if *rem == 0 {
                        self.state = ReadState::Head;
                        handler.on_message_complete();
                        continue;
                    }
                    if pos == input.len() {
                        return Ok(pos);
                    }
                    let n = (*rem).min((input.len() - pos) as u64) as usize;
                    *rem -= n as u64;
                    handler.on_body(&input[pos..pos + n]);
                    pos += n;
                }

                ReadState::Chunked(dechunker) => {
                    let (n, step) = dechunker.step(&input[pos..])?;
                    pos += n;
                    match step {
                        Step::Data(data) => {
                            if !data.is_empty() {
                                handler.on_body(data);
                            }
                        }
                        Step::Trailer(line) => Self::trailer(&line, handler)?,
                        Step::Done => {
                            self.state = ReadState::Head;
                            handler.on_message_complete();
                        }
                        Step::More => return Ok(pos),
                    }
                }

                ReadState::CloseDelimited => {
                    if pos < input.len() {
                        handler.on_body(&input[pos..]);
                    }
                    return Ok(input.len());
                }

                ReadState::Upgraded => return Ok(pos),
            }
        }
    }

    fn finish(&mut self, handler: &mut dyn ParserHandler) -> Result<(), Error> {
        if let ReadState::CloseDelimited = self.state {
            self.state = ReadState::Head;
            handler.on_message_complete();
        }
        Ok(())
    }

    fn set_max_head_size(&mut self, max: usize) {
        self.max_head_size = max;
    }
}
