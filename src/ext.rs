use http::{Method, StatusCode, Version};

pub(crate) trait MethodExt {
    /// Requests with this method get `transfer-encoding: chunked` when the
    /// caller gave no body framing header.
    fn chunked_by_default(&self) -> bool;
}

impl MethodExt for Method {
    fn chunked_by_default(&self) -> bool {
        !(self == Method::GET || self == Method::HEAD)
    }
}

pub(crate) trait StatusExt {
    /// Whether a response with this status must be sent without a body.
    ///
    /// RFC 2616, 10.2.5 (204), 10.3.5 (304) and 10.1 (1xx): terminated by the
    /// first empty line after the header fields.
    fn is_bodyless(&self) -> bool;
}

impl StatusExt for StatusCode {
    fn is_bodyless(&self) -> bool {
        *self == StatusCode::NO_CONTENT
            || *self == StatusCode::NOT_MODIFIED
            || self.is_informational()
    }
}

pub(crate) trait VersionExt {
    /// HTTP/1.1 or later. Older peers get neither chunking nor keep-alive by default.
    fn is_http11(&self) -> bool;
    fn as_str(&self) -> &'static str;
}

impl VersionExt for Version {
    fn is_http11(&self) -> bool {
        *self >= Version::HTTP_11
    }

    fn as_str(&self) -> &'static str {
        if *self == Version::HTTP_10 {
            "HTTP/1.0"
        } else if *self == Version::HTTP_09 {
            "HTTP/0.9"
        } else {
            "HTTP/1.1"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodyless_statuses() {
        assert!(StatusCode::NO_CONTENT.is_bodyless());
        assert!(StatusCode::NOT_MODIFIED.is_bodyless());
        assert!(StatusCode::CONTINUE.is_bodyless());
        assert!(StatusCode::SWITCHING_PROTOCOLS.is_bodyless());
        assert!(!StatusCode::OK.is_bodyless());
        assert!(!StatusCode::NOT_FOUND.is_bodyless());
    }

    #[test]
    fn default_chunking() {
        assert!(!Method::GET.chunked_by_default());
        assert!(!Method::HEAD.chunked_by_default());
        assert!(Method::POST.chunked_by_default());
        assert!(Method::PUT.chunked_by_default());
    }
}
