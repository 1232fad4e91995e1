/// Reasons for not keeping a connection alive after a message.
///
/// Recorded on the message that made the decision. The multiplexer tears down
/// (server) or re-establishes (client) the transport once that message retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// HTTP/1.0 peer without `connection: keep-alive`.
    Http10,

    /// Client sent `connection: close`.
    ClientConnectionClose,

    /// Server sent `connection: close`.
    ServerConnectionClose,

    /// Client expected `100 Continue` but got a final status without it.
    ///
    /// The client may already be putting body bytes on the wire that we never
    /// read, so the connection can not be reused.
    Not100Continue,

    /// Body is close delimited.
    ///
    /// Neither `content-length` nor chunked framing. The end of the body is the
    /// end of the connection.
    CloseDelimitedBody,

    /// The response arrived before the request was fully sent.
    RequestIncomplete,
}

impl CloseReason {
    pub(crate) fn explain(&self) -> &'static str {
        match self {
            CloseReason::Http10 => "version is http1.0",
            CloseReason::ClientConnectionClose => "client sent Connection: close",
            CloseReason::ServerConnectionClose => "server sent Connection: close",
            CloseReason::Not100Continue => "final status sent without 100-continue",
            CloseReason::CloseDelimitedBody => "body is close delimited",
            CloseReason::RequestIncomplete => "response arrived before request was sent",
        }
    }
}
