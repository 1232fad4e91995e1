use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::Error;

/// Character encoding of text written to, or read from, a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8 text, written as is.
    #[default]
    Utf8,
    /// 7-bit ascii. The high bit of every char is dropped.
    Ascii,
    /// One byte per char, chars above U+00FF are truncated.
    Latin1,
    /// Hex digit pairs.
    Hex,
    /// Standard base64 with padding.
    Base64,
}

impl Encoding {
    /// Byte length of `text` once encoded, when known without encoding it.
    fn known_len(&self, text: &str) -> Option<usize> {
        match self {
            Encoding::Utf8 => Some(text.len()),
            Encoding::Ascii | Encoding::Latin1 => Some(text.chars().count()),
            Encoding::Hex | Encoding::Base64 => None,
        }
    }

    /// Append the bytes `text` stands for to `out`.
    pub(crate) fn materialize(&self, text: &str, out: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            Encoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            Encoding::Ascii => out.extend(text.chars().map(|c| (c as u32 & 0x7f) as u8)),
            Encoding::Latin1 => out.extend(text.chars().map(|c| c as u32 as u8)),
            Encoding::Hex => {
                let b = text.as_bytes();
                if b.len() % 2 != 0 {
                    return Err(Error::BadEncoding("hex"));
                }
                for pair in b.chunks(2) {
                    let hi = hex_val(pair[0]).ok_or(Error::BadEncoding("hex"))?;
                    let lo = hex_val(pair[1]).ok_or(Error::BadEncoding("hex"))?;
                    out.push(hi << 4 | lo);
                }
            }
            Encoding::Base64 => {
                BASE64
                    .decode_vec(text, out)
                    .map_err(|_| Error::BadEncoding("base64"))?;
            }
        }
        Ok(())
    }

    /// Encode `text` prefixed by a frame header derived from the encoded length.
    ///
    /// Avoids a temporary buffer for encodings where the length is known upfront.
    pub(crate) fn materialize_framed(
        &self,
        text: &str,
        out: &mut Vec<u8>,
        frame: impl FnOnce(usize, &mut Vec<u8>),
    ) -> Result<usize, Error> {
        if let Some(len) = self.known_len(text) {
            frame(len, out);
            self.materialize(text, out)?;
            Ok(len)
        } else {
            let mut tmp = Vec::new();
            self.materialize(text, &mut tmp)?;
            frame(tmp.len(), out);
            out.extend_from_slice(&tmp);
            Ok(tmp.len())
        }
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// A piece of body handed to `write()` or `end()`.
///
/// ```
/// use h1_mux::{Chunk, Encoding};
///
/// let a: Chunk = "hello".into();
/// let b: Chunk = b"hello".into();
/// let c = Chunk::Text("aGVsbG8=", Encoding::Base64);
/// # let _ = (a, b, c);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk<'a> {
    /// Text in some encoding. Consecutive small texts are coalesced.
    Text(&'a str, Encoding),
    /// Raw bytes. Always a frame of its own.
    Bytes(&'a [u8]),
}

impl Chunk<'_> {
    /// Whether the chunk holds no characters or bytes.
    pub fn is_empty(&self) -> bool {
        match self {
            Chunk::Text(s, _) => s.is_empty(),
            Chunk::Bytes(b) => b.is_empty(),
        }
    }
}

impl<'a> From<&'a str> for Chunk<'a> {
    fn from(value: &'a str) -> Self {
        Chunk::Text(value, Encoding::Utf8)
    }
}

impl<'a> From<&'a String> for Chunk<'a> {
    fn from(value: &'a String) -> Self {
        Chunk::Text(value, Encoding::Utf8)
    }
}

impl<'a> From<&'a [u8]> for Chunk<'a> {
    fn from(value: &'a [u8]) -> Self {
        Chunk::Bytes(value)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Chunk<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        Chunk::Bytes(value)
    }
}

impl<'a> From<&'a Vec<u8>> for Chunk<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Chunk::Bytes(value)
    }
}

/// Body data delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw bytes, no encoding set.
    Bytes(Vec<u8>),
    /// Decoded text, after `set_encoding()`.
    Text(String),
}

impl Body {
    /// The data as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Bytes(v) => v,
            Body::Text(v) => v.as_bytes(),
        }
    }
}

/// Streaming decoder turning body bytes into text.
///
/// Multi-byte sequences split across reads are carried over to the next read,
/// so no char is ever cut in half.
///
/// ```
/// use h1_mux::{Encoding, TextDecoder};
///
/// let mut d = TextDecoder::new(Encoding::Utf8);
/// let snow = "☃".as_bytes();
/// assert_eq!(d.write(&snow[..1]), "");
/// assert_eq!(d.write(&snow[1..]), "☃");
/// ```
#[derive(Debug)]
pub struct TextDecoder {
    encoding: Encoding,
    carry: Vec<u8>,
}

impl TextDecoder {
    /// Decoder for `encoding`.
    pub fn new(encoding: Encoding) -> Self {
        TextDecoder {
            encoding,
            carry: Vec::new(),
        }
    }

    /// Decode `input`, returning as much text as is complete.
    pub fn write(&mut self, input: &[u8]) -> String {
        match self.encoding {
            Encoding::Utf8 => self.write_utf8(input),
            Encoding::Ascii => input.iter().map(|b| (b & 0x7f) as char).collect(),
            Encoding::Latin1 => input.iter().map(|b| *b as char).collect(),
            Encoding::Hex => {
                let mut s = String::with_capacity(input.len() * 2);
                for b in input {
                    s.push_str(&format!("{:02x}", b));
                }
                s
            }
            Encoding::Base64 => {
                self.carry.extend_from_slice(input);
                let whole = self.carry.len() / 3 * 3;
                let s = BASE64.encode(&self.carry[..whole]);
                self.carry.drain(..whole);
                s
            }
        }
    }

    /// Flush whatever is carried over. Incomplete utf-8 becomes U+FFFD.
    pub fn end(&mut self) -> String {
        let rest = std::mem::take(&mut self.carry);
        match self.encoding {
            Encoding::Base64 => BASE64.encode(rest),
            _ => String::from_utf8_lossy(&rest).into_owned(),
        }
    }

    fn write_utf8(&mut self, input: &[u8]) -> String {
        self.carry.extend_from_slice(input);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(s) => {
                    out.push_str(s);
                    self.carry.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to() guarantees this prefix is utf-8
                    out.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end, wait for more input.
                        None => {
                            self.carry.drain(..valid);
                            return out;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }
}
