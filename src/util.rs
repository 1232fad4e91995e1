use std::fmt;

/// Dump raw bytes at trace level.
pub(crate) fn log_data(data: &[u8]) {
    if !log_enabled!(log::Level::Trace) {
        return;
    }
    for line in data.chunks(32) {
        trace!("{:?}", Row(line));
    }
}

struct Row<'a>(&'a [u8]);

impl fmt::Debug for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x} ", b)?;
        }
        for _ in self.0.len()..32 {
            write!(f, "   ")?;
        }
        for b in self.0 {
            let c = *b as char;
            if c.is_ascii_graphic() || c == ' ' {
                write!(f, "{}", c)?;
            } else {
                write!(f, ".")?;
            }
        }
        Ok(())
    }
}

/// Case insensitive substring search, used for header value sniffing
/// (`close`, `chunked`, `100-continue`).
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() {
        return true;
    }
    h.windows(n.len()).any(|w| w.eq_ignore_ascii_case(n))
}
