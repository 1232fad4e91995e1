//! Chunked transfer encoding.
//!
//! Framing for outgoing bodies, and a byte-at-a-time state machine that takes
//! framing apart again on the incoming side.

use crate::Error;

pub(crate) const CRLF: &[u8] = b"\r\n";

/// `<hex-length>\r\n`
pub(crate) fn write_chunk_header(len: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{:x}", len).as_bytes());
    out.extend_from_slice(CRLF);
}

/// `0\r\n<trailers>\r\n`
pub(crate) fn write_terminal(trailers: &[(String, String)], out: &mut Vec<u8>) {
    out.extend_from_slice(b"0\r\n");
    for (k, v) in trailers {
        out.extend_from_slice(k.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(v.as_bytes());
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Size { value: usize, digits: usize, ext: bool },
    SizeLf { value: usize, digits: usize },
    Data(usize),
    DataCr,
    DataLf,
    Trailer(Vec<u8>),
    Done,
}

/// One outcome of [`Dechunker::step`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step<'a> {
    /// Body bytes, framing removed.
    Data(&'a [u8]),
    /// A complete trailer line without the line ending.
    Trailer(Vec<u8>),
    /// Terminal chunk and trailer section consumed.
    Done,
    /// Input exhausted mid-frame.
    More,
}

#[derive(Debug)]
pub(crate) struct Dechunker {
    state: State,
}

impl Default for Dechunker {
    fn default() -> Self {
        Dechunker {
            state: State::Size {
                value: 0,
                digits: 0,
                ext: false,
            },
        }
    }
}

impl Dechunker {
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Advance over `input`. Returns the number of bytes used and what they held.
    ///
    /// Call repeatedly with the unused remainder until `Step::More` or `Step::Done`.
    pub fn step<'a>(&mut self, input: &'a [u8]) -> Result<(usize, Step<'a>), Error> {
        let mut pos = 0;

        while pos < input.len() {
            let c = input[pos];

            match &mut self.state {
                State::Size { value, digits, ext } => {
                    pos += 1;
                    if !c.is_ascii() {
                        return Err(Error::ChunkLenNotAscii);
                    }
                    if c == b'\r' {
                        self.state = State::SizeLf {
                            value: *value,
                            digits: *digits,
                        };
                    } else if *ext {
                        // chunk extensions are ignored
                    } else if c == b';' || c == b' ' || c == b'\t' {
                        *ext = true;
                    } else {
                        let d = (c as char).to_digit(16).ok_or(Error::ChunkLenNotANumber)?;
                        *value = value
                            .checked_mul(16)
                            .and_then(|v| v.checked_add(d as usize))
                            .ok_or(Error::ChunkLenNotANumber)?;
                        *digits += 1;
                    }
                }

                State::SizeLf { value, digits } => {
                    pos += 1;
                    if c != b'\n' {
                        return Err(Error::ChunkExpectedCrLf);
                    }
                    if *digits == 0 {
                        return Err(Error::ChunkLenNotANumber);
                    }
                    self.state = if *value == 0 {
                        State::Trailer(Vec::new())
                    } else {
                        State::Data(*value)
                    };
                }

                State::Data(rem) => {
                    let n = (*rem).min(input.len() - pos);
                    *rem -= n;
                    if *rem == 0 {
                        self.state = State::DataCr;
                    }
                    return Ok((pos + n, Step::Data(&input[pos..pos + n])));
                }

                State::DataCr => {
                    pos += 1;
                    if c != b'\r' {
                        return Err(Error::ChunkExpectedCrLf);
                    }
                    self.state = State::DataLf;
                }

                State::DataLf => {
                    pos += 1;
                    if c != b'\n' {
                        return Err(Error::ChunkExpectedCrLf);
                    }
                    self.state = State::Size {
                        value: 0,
                        digits: 0,
                        ext: false,
                    };
                }

                State::Trailer(line) => {
                    pos += 1;
                    if c != b'\n' {
                        line.push(c);
                        continue;
                    }
                    let mut line = std::mem::take(line);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if line.is_empty() {
                        self.state = State::Done;
                        return Ok((pos, Step::Done));
                    }
                    return Ok((pos, Step::Trailer(line)));
                }

                State::Done => return Ok((pos, Step::Done)),
            }
        }

        if self.state == State::Done {
            return Ok((pos, Step::Done));
        }

        Ok((pos, Step::More))
    }
}
