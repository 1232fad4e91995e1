use std::fmt;
use std::io;

use crate::MessageId;

/// Error type for h1-mux
#[derive(Debug, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    // caller misuse
    HeadersNotSent,
    HeadersAlreadySent,
    BodyNotAllowed,
    AlreadyEnded,
    UnknownMessage(MessageId),
    NotHeadOfLine(MessageId),
    BadHeader(String),
    BadEncoding(&'static str),
    BadUrl(String),
    ConnectionDestroyed,

    // malformed input
    HttpParseFail(String),
    HttpParseTooManyHeaders,
    HeadTooLarge(usize),
    BadContentLengthHeader,
    TooManyContentLengthHeaders,
    ChunkLenNotAscii,
    ChunkLenNotANumber,
    ChunkExpectedCrLf,
    UnsolicitedResponse,

    // connection level
    Transport(io::ErrorKind, String),
    UpgradeWithoutHandler,
    PrematureClose,
    Tls(String),
}

/// Classification of [`Error`].
///
/// Decides how far an error travels: usage errors stay with the caller, all
/// other kinds terminate the connection they happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket level failure. Always fatal to the connection.
    Transport,
    /// Malformed input from the peer. Fatal, destroys the connection.
    ProtocolParse,
    /// Caller misuse, such as writing before the head is committed.
    ProtocolUsage,
    /// Peer asked for a protocol upgrade nobody is prepared to take.
    UpgradeWithoutHandler,
    /// The transport ended in the middle of an exchange.
    PrematureClose,
    /// The TLS engine failed. Never resumable.
    Tls,
}

impl Error {
    /// The class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::HeadersNotSent
            | Error::HeadersAlreadySent
            | Error::BodyNotAllowed
            | Error::AlreadyEnded
            | Error::UnknownMessage(_)
            | Error::NotHeadOfLine(_)
            | Error::BadHeader(_)
            | Error::BadEncoding(_)
            | Error::BadUrl(_)
            | Error::ConnectionDestroyed => ErrorKind::ProtocolUsage,

            Error::HttpParseFail(_)
            | Error::HttpParseTooManyHeaders
            | Error::HeadTooLarge(_)
            | Error::BadContentLengthHeader
            | Error::TooManyContentLengthHeaders
            | Error::ChunkLenNotAscii
            | Error::ChunkLenNotANumber
            | Error::ChunkExpectedCrLf
            | Error::UnsolicitedResponse => ErrorKind::ProtocolParse,

            Error::Transport(_, _) => ErrorKind::Transport,
            Error::UpgradeWithoutHandler => ErrorKind::UpgradeWithoutHandler,
            Error::PrematureClose => ErrorKind::PrematureClose,
            Error::Tls(_) => ErrorKind::Tls,
        }
    }

    /// Tell if the error only concerns the caller and leaves the connection intact.
    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::ProtocolUsage
    }

    /// Tell if the error terminates the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        !self.is_usage()
    }
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        match value {
            httparse::Error::TooManyHeaders => Error::HttpParseTooManyHeaders,
            v => Error::HttpParseFail(v.to_string()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Transport(value.kind(), value.to_string())
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::HeadersNotSent => write!(f, "headers not sent"),
            Error::HeadersAlreadySent => write!(f, "headers already sent"),
            Error::BodyNotAllowed => write!(f, "message must not have a body"),
            Error::AlreadyEnded => write!(f, "already ended"),
            Error::UnknownMessage(id) => write!(f, "no message {} on this connection", id),
            Error::NotHeadOfLine(id) => write!(f, "message {} is not at the head of line", id),
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::BadEncoding(v) => write!(f, "input is not valid {}", v),
            Error::BadUrl(v) => write!(f, "bad url: {}", v),
            Error::ConnectionDestroyed => write!(f, "connection is destroyed"),
            Error::HttpParseFail(v) => write!(f, "http parse fail: {}", v),
            Error::HttpParseTooManyHeaders => write!(f, "http parse resulted in too many headers"),
            Error::HeadTooLarge(v) => write!(f, "message head larger than {} bytes", v),
            Error::BadContentLengthHeader => write!(f, "content-length header not a number"),
            Error::TooManyContentLengthHeaders => write!(f, "more than one content-length header"),
            Error::ChunkLenNotAscii => write!(f, "chunk length is not ascii"),
            Error::ChunkLenNotANumber => write!(f, "chunk length cannot be read as a number"),
            Error::ChunkExpectedCrLf => write!(f, "chunk expected crlf as next character"),
            Error::UnsolicitedResponse => write!(f, "received a response with no request in flight"),
            Error::Transport(_, v) => write!(f, "transport error: {}", v),
            Error::UpgradeWithoutHandler => write!(f, "upgrade requested but no handler accepts it"),
            Error::PrematureClose => write!(f, "transport ended while message was in flight"),
            Error::Tls(v) => write!(f, "tls: {}", v),
        }
    }
}
