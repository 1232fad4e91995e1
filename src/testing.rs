//! In-memory stand-ins for the collaborators, for tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::tls::TlsEngine;
use crate::{Error, Sink, Transport};

#[derive(Debug, Default)]
pub(crate) struct WireLog {
    pub writes: Vec<Vec<u8>>,
    pub reject: bool,
    pub paused: bool,
    pub timeout: Option<Duration>,
    pub ended: bool,
    pub destroyed: bool,
}

/// Shared view of what a [`TestTransport`] was asked to do.
#[derive(Debug, Default, Clone)]
pub(crate) struct Wire(pub Rc<RefCell<WireLog>>);

impl Wire {
    pub fn new() -> Self {
        Wire::default()
    }

    pub fn transport(&self) -> TestTransport {
        TestTransport(self.clone())
    }

    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().writes.concat()
    }

    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.borrow_mut().writes).concat()
    }

    pub fn write_count(&self) -> usize {
        self.0.borrow().writes.len()
    }

    pub fn set_reject(&self, v: bool) {
        self.0.borrow_mut().reject = v;
    }

    pub fn ended(&self) -> bool {
        self.0.borrow().ended
    }

    pub fn destroyed(&self) -> bool {
        self.0.borrow().destroyed
    }

    pub fn paused(&self) -> bool {
        self.0.borrow().paused
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.0.borrow().timeout
    }
}

/// Transport recording every call into a [`Wire`].
#[derive(Debug)]
pub(crate) struct TestTransport(pub Wire);

impl Transport for TestTransport {
    fn write(&mut self, data: &[u8]) -> bool {
        let mut log = self.0 .0.borrow_mut();
        log.writes.push(data.to_vec());
        !log.reject
    }

    fn pause(&mut self) {
        self.0 .0.borrow_mut().paused = true;
    }

    fn resume(&mut self) {
        self.0 .0.borrow_mut().paused = false;
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.0 .0.borrow_mut().timeout = timeout;
    }

    fn end(&mut self) {
        self.0 .0.borrow_mut().ended = true;
    }

    fn destroy(&mut self) {
        self.0 .0.borrow_mut().destroyed = true;
    }
}

/// Sink collecting into a byte vector.
#[derive(Debug, Default)]
pub(crate) struct TestSink {
    pub data: Vec<u8>,
    pub writes: usize,
    pub reject: bool,
    pub paused: bool,
}

impl Sink for TestSink {
    fn write(&mut self, data: &[u8]) -> bool {
        self.data.extend_from_slice(data);
        self.writes += 1;
        !self.reject
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }
}

pub(crate) const HELLO: u8 = b'H';
pub(crate) const BYE: &[u8] = b"BYE";

/// Toy record layer: a one byte hello each way, then every byte XOR a key.
///
/// `max_accept` limits how much `enc_in`/`clear_in` take per call, to
/// exercise partial consumption.
#[derive(Debug)]
pub(crate) struct XorEngine {
    key: u8,
    pub max_accept: usize,
    started: bool,
    hello_sent: bool,
    hello_received: bool,
    plain_in: Vec<u8>,
    plain_out: Vec<u8>,
    bye: bool,
    pub closed: bool,
    pub fail: bool,
}

impl XorEngine {
    pub fn new(key: u8) -> Self {
        XorEngine {
            key,
            max_accept: usize::MAX,
            started: false,
            hello_sent: false,
            hello_received: false,
            plain_in: vec![],
            plain_out: vec![],
            bye: false,
            closed: false,
            fail: false,
        }
    }

    pub fn seal(key: u8, data: &[u8]) -> Vec<u8> {
        data.iter().map(|b| b ^ key).collect()
    }
}

impl TlsEngine for XorEngine {
    fn enc_in(&mut self, data: &[u8]) -> Result<usize, Error> {
        if self.fail {
            return Err(Error::Tls("bad record mac".into()));
        }
        let n = data.len().min(self.max_accept);
        for b in &data[..n] {
            if !self.hello_received {
                if *b != HELLO {
                    return Err(Error::Tls("unexpected handshake byte".into()));
                }
                self.hello_received = true;
            } else {
                self.plain_out.push(b ^ self.key);
            }
        }
        Ok(n)
    }

    fn clear_in(&mut self, data: &[u8]) -> Result<usize, Error> {
        let n = data.len().min(self.max_accept);
        self.plain_in.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn clear_out(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = buf.len().min(self.plain_out.len());
        buf[..n].copy_from_slice(&self.plain_out[..n]);
        self.plain_out.drain(..n);
        Ok(n)
    }

    fn enc_out(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut n = 0;
        if self.started && !self.hello_sent && n < buf.len() {
            buf[n] = HELLO;
            n += 1;
            self.hello_sent = true;
        }
        if self.is_init_finished() {
            let take = (buf.len() - n).min(self.plain_in.len());
            for (i, b) in self.plain_in.drain(..take).enumerate() {
                buf[n + i] = b ^ self.key;
            }
            n += take;
            if self.bye && self.plain_in.is_empty() && buf.len() - n >= BYE.len() {
                buf[n..n + BYE.len()].copy_from_slice(BYE);
                n += BYE.len();
                self.bye = false;
            }
        }
        Ok(n)
    }

    fn is_init_finished(&self) -> bool {
        self.hello_sent && self.hello_received
    }

    fn start(&mut self) -> Result<(), Error> {
        self.started = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        self.bye = true;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
