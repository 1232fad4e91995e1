use http::{Method, StatusCode, Version};

use crate::encoding::{Body, Encoding, TextDecoder};
use crate::headers::Headers;
use crate::parser::{HeadInfo, ParserHandler};
use crate::util::contains_ignore_case;
use crate::MessageId;

/// A received request (server) or response (client).
///
/// Handed out once the head is parsed. The body streams separately as `Data`
/// events; completion is signalled with `End`, which carries the trailers.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub(crate) id: MessageId,
    version: Version,
    method: Option<Method>,
    url: String,
    status: Option<StatusCode>,
    reason: Option<String>,
    headers: Headers,
    trailers: Headers,
    complete: bool,
    upgrade: bool,
    should_keep_alive: bool,
}

impl IncomingMessage {
    fn new() -> Self {
        IncomingMessage {
            id: MessageId(0),
            version: Version::HTTP_11,
            method: None,
            url: String::new(),
            status: None,
            reason: None,
            headers: Headers::new(),
            trailers: Headers::new(),
            complete: false,
            upgrade: false,
            should_keep_alive: false,
        }
    }

    /// The exchange this message belongs to.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Request method. `None` for responses.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Request target, as sent. Empty for responses.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Response status. `None` for requests.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Response reason phrase.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Header fields, merged.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Trailer fields. Only filled in once the message is complete.
    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    /// Whether the whole message, trailers included, was received.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the message switches protocol.
    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    /// Whether the peer allows another message on the connection.
    pub fn should_keep_alive(&self) -> bool {
        self.should_keep_alive
    }

    /// HTTP/1.1 request with `expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.version == Version::HTTP_11
            && self
                .headers
                .get_str("expect")
                .map(|v| contains_ignore_case(v, "100-continue"))
                .unwrap_or(false)
    }
}

/// Receiver of assembled messages.
pub(crate) trait Dispatch {
    /// Head of a non-upgrade message is complete.
    ///
    /// Returns `true` when no body follows (response to `HEAD`, or a message
    /// the receiver wants to skip).
    fn incoming(&mut self, msg: &IncomingMessage) -> bool;

    /// Body data of the current message.
    fn body(&mut self, body: Body);

    /// The current non-upgrade message is complete.
    fn complete(&mut self, msg: IncomingMessage);

    /// Text encoding for the body of the message just dispatched.
    fn encoding(&self) -> Option<Encoding> {
        None
    }
}

/// Field/value accumulation across tokenizer callbacks.
///
/// Lives as long as the connection, like the tokenizer it listens to.
#[derive(Debug, Default)]
pub(crate) struct AssemblerState {
    current: Option<IncomingMessage>,
    field: Vec<u8>,
    value: Vec<u8>,
    in_value: bool,
    headers_done: bool,
    decoder: Option<TextDecoder>,
    upgraded: Option<IncomingMessage>,
}

impl AssemblerState {
    /// Decode the body of the message in progress as text.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.decoder = Some(TextDecoder::new(encoding));
    }

    /// Message that asked for an upgrade during the last `execute`.
    pub fn take_upgraded(&mut self) -> Option<IncomingMessage> {
        self.upgraded.take()
    }

    pub fn reset(&mut self) {
        *self = AssemblerState::default();
    }

    /// Merge the pending field/value pair into headers, or trailers once the
    /// head is done.
    fn commit(&mut self) {
        if !self.in_value {
            return;
        }
        let field = String::from_utf8_lossy(&self.field).to_ascii_lowercase();
        let value = String::from_utf8_lossy(&self.value).into_owned();
        self.field.clear();
        self.value.clear();
        self.in_value = false;

        if let Some(msg) = &mut self.current {
            if self.headers_done {
                msg.trailers.add(&field, &value);
            } else {
                msg.headers.add(&field, &value);
            }
        }
    }
}

/// Binds an [`AssemblerState`] to a [`Dispatch`] for one `execute` call.
pub(crate) struct Assembly<'a, D: ?Sized> {
    pub state: &'a mut AssemblerState,
    pub dispatch: &'a mut D,
}

impl<D: Dispatch + ?Sized> ParserHandler for Assembly<'_, D> {
    fn on_message_begin(&mut self) {
        self.state.current = Some(IncomingMessage::new());
        self.state.field.clear();
        self.state.value.clear();
        self.state.in_value = false;
        self.state.headers_done = false;
        self.state.decoder = None;
    }

    fn on_url(&mut self, url: &[u8]) {
        if let Some(msg) = &mut self.state.current {
            msg.url.push_str(&String::from_utf8_lossy(url));
        }
    }

    fn on_header_field(&mut self, field: &[u8]) {
        if self.state.in_value {
            self.state.commit();
        }
        self.state.field.extend_from_slice(field);
    }

    fn on_header_value(&mut self, value: &[u8]) {
        self.state.in_value = true;
        self.state.value.extend_from_slice(value);
    }

    fn on_headers_complete(&mut self, info: HeadInfo) -> bool {
        self.state.commit();
        self.state.headers_done = true;

        let Some(msg) = &mut self.state.current else {
            return false;
        };
        msg.version = info.version;
        msg.method = info.method;
        msg.status = info.status;
        msg.reason = info.reason;
        msg.upgrade = info.upgrade;
        msg.should_keep_alive = info.should_keep_alive;

        if msg.upgrade {
            // Handed over after execute, together with the bytes following the head.
            return false;
        }

        let skip_body = self.dispatch.incoming(msg);
        if let Some(encoding) = self.dispatch.encoding() {
            self.state.set_encoding(encoding);
        }
        skip_body
    }

    fn on_body(&mut self, data: &[u8]) {
        let body = match &mut self.state.decoder {
            Some(d) => {
                let s = d.write(data);
                if s.is_empty() {
                    return;
                }
                Body::Text(s)
            }
            None => Body::Bytes(data.to_vec()),
        };
        self.dispatch.body(body);
    }

    fn on_message_complete(&mut self) {
        self.state.commit();

        if let Some(mut d) = self.state.decoder.take() {
            let rest = d.end();
            if !rest.is_empty() {
                self.dispatch.body(Body::Text(rest));
            }
        }

        let Some(mut msg) = self.state.current.take() else {
            return;
        };
        msg.complete = true;

        if msg.upgrade {
            self.state.upgraded = Some(msg);
        } else {
            self.dispatch.complete(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::FieldValue;
    use crate::parser::{H1Tokenizer, ParserKind, Tokenizer};

    #[derive(Default)]
    struct Collect {
        heads: Vec<IncomingMessage>,
        body: Vec<Body>,
        done: Vec<IncomingMessage>,
        skip: bool,
    }

    impl Dispatch for Collect {
        fn incoming(&mut self, msg: &IncomingMessage) -> bool {
            self.heads.push(msg.clone());
            self.skip
        }
        fn body(&mut self, body: Body) {
            self.body.push(body);
        }
        fn complete(&mut self, msg: IncomingMessage) {
            self.done.push(msg);
        }
    }

    fn feed(
        state: &mut AssemblerState,
        c: &mut Collect,
        p: &mut H1Tokenizer,
        input: &[u8],
    ) -> usize {
        let mut asm = Assembly {
            state,
            dispatch: c,
        };
        p.execute(input, &mut asm).unwrap()
    }

    #[test]
    fn split_fields_are_joined_before_merge() {
        let mut state = AssemblerState::default();
        let mut c = Collect::default();
        let mut asm = Assembly {
            state: &mut state,
            dispatch: &mut c,
        };
        asm.on_message_begin();
        asm.on_url(b"/a");
        asm.on_url(b"?b");
        asm.on_header_field(b"Set-");
        asm.on_header_field(b"Cookie");
        asm.on_header_value(b"a=");
        asm.on_header_value(b"1");
        asm.on_header_field(b"set-cookie");
        asm.on_header_value(b"b=2");
        asm.on_headers_complete(HeadInfo {
            version: Version::HTTP_11,
            method: Some(Method::GET),
            status: None,
            reason: None,
            upgrade: false,
            should_keep_alive: true,
        });
        asm.on_message_complete();

        let msg = &c.done[0];
        assert_eq!(msg.url(), "/a?b");
        assert_eq!(
            msg.headers().get("set-cookie"),
            Some(&FieldValue::List(vec!["a=1".into(), "b=2".into()]))
        );
        assert!(msg.is_complete());
        assert!(msg.trailers().is_empty());
    }

    #[test]
    fn trailers_go_to_trailers() {
        let mut state = AssemblerState::default();
        let mut c = Collect::default();
        let mut p = H1Tokenizer::default();
        p.reinitialize(ParserKind::Response);
        feed(
            &mut state,
            &mut c,
            &mut p,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nX-A: 1\r\n\r\n\
              1\r\nz\r\n0\r\nX-A: 2\r\n\r\n",
        );
        let msg = &c.done[0];
        assert_eq!(msg.headers().get_str("x-a"), Some("1"));
        assert_eq!(msg.trailers().get_str("x-a"), Some("2"));
        assert_eq!(c.body, vec![Body::Bytes(b"z".to_vec())]);
    }

    #[test]
    fn text_decoding() {
        let mut state = AssemblerState::default();
        let mut c = Collect::default();
        let mut p = H1Tokenizer::default();
        p.reinitialize(ParserKind::Response);
        feed(
            &mut state,
            &mut c,
            &mut p,
            b"HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\n",
        );
        state.set_encoding(Encoding::Utf8);
        for b in "a☃".as_bytes() {
            feed(&mut state, &mut c, &mut p, &[*b]);
        }
        assert_eq!(
            c.body,
            vec![Body::Text("a".into()), Body::Text("☃".into())]
        );
        assert_eq!(c.done.len(), 1);
    }

    #[test]
    fn upgrade_is_held_back() {
        let mut state = AssemblerState::default();
        let mut c = Collect::default();
        let mut p = H1Tokenizer::default();
        p.reinitialize(ParserKind::Request);
        let head = b"GET / HTTP/1.1\r\nConnection: upgrade\r\nUpgrade: x\r\n\r\n";
        let mut input = head.to_vec();
        input.extend_from_slice(b"raw");
        let n = feed(&mut state, &mut c, &mut p, &input);
        assert!(c.heads.is_empty());
        assert!(c.done.is_empty());
        let up = state.take_upgraded().unwrap();
        assert!(up.is_upgrade());
        assert_eq!(n, head.len());
    }

    #[test]
    fn expects_continue() {
        let mut state = AssemblerState::default();
        let mut c = Collect::default();
        let mut p = H1Tokenizer::default();
        p.reinitialize(ParserKind::Request);
        feed(
            &mut state,
            &mut c,
            &mut p,
            b"PUT / HTTP/1.1\r\nExpect: 100-Continue\r\ncontent-length: 0\r\n\r\n",
        );
        assert!(c.heads[0].expects_continue());
    }
}
