//! TLS record pump
//!
//! A TLS connection is four independent byte pipelines. Using client terms
//! (a server is the same, mirrored):
//!
//! ```text
//!                    ┌────────────────────┐
//!  peer ──enc_in────▶│                    │──clear_out──▶ consumer
//!                    │     TlsEngine      │
//!  peer ◀──enc_out───│                    │◀──clear_in─── consumer
//!                    └────────────────────┘
//! ```
//!
//! Feeding one pipeline says nothing about when another produces: a handshake
//! message in means a handshake message out, a renegotiation can stall cleartext
//! in both directions. The [`RecordPump`] therefore never assumes one call per
//! event. It is re-run on every external event (bytes arrived, bytes to send, a
//! sink drained) and moves whatever can move:
//!
//! 1. encrypted input queue ─▶ `enc_in`, requeueing partial accepts
//! 2. cleartext input queue ─▶ `clear_in`, same
//! 3. `clear_out` ─▶ cleartext sink, in scratch sized rounds while it accepts
//! 4. `enc_out` ─▶ encrypted sink, same
//! 5. a sink that pushes back pauses the opposite source
//! 6. once the handshake finished, the one-time secure transition, then one more
//!    run
//!
//! Two forms drive the same pump: [`SecureTransport`] wraps a [`Transport`] and
//! is itself a cleartext `Transport` a client or server can run on;
//! [`SecureFilter`] sits between two already duplex byte streams.
//!
//! The crypto lives behind [`TlsEngine`]. With the `rustls` feature,
//! `RustlsEngine` adapts a rustls connection.
//!
//! [`Transport`]: crate::Transport

use std::collections::VecDeque;

use crate::transport::Sink;
use crate::util::log_data;
use crate::{Config, Error, TransportEvent};

mod stream;
pub use stream::SecureTransport;

mod filter;
pub use filter::SecureFilter;

#[cfg(feature = "rustls")]
mod rustls;
#[cfg(feature = "rustls")]
pub use self::rustls::RustlsEngine;

/// The cryptographic record layer, as four byte transfers.
///
/// Push operations return how many bytes were taken, `0` meaning "not now".
/// Pull operations return how many bytes were written to `buf`, `0` meaning
/// nothing is available.
pub trait TlsEngine {
    /// Encrypted bytes from the peer.
    fn enc_in(&mut self, data: &[u8]) -> Result<usize, Error>;

    /// Cleartext bytes to send to the peer.
    fn clear_in(&mut self, data: &[u8]) -> Result<usize, Error>;

    /// Decrypted bytes from the peer.
    fn clear_out(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Encrypted bytes for the peer.
    fn enc_out(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Handshake complete.
    fn is_init_finished(&self) -> bool;

    /// Begin the handshake.
    fn start(&mut self) -> Result<(), Error>;

    /// Queue the close notification.
    fn shutdown(&mut self) -> Result<(), Error>;

    /// Release resources. Nothing is called after this.
    fn close(&mut self);
}

impl<E: TlsEngine + ?Sized> TlsEngine for Box<E> {
    fn enc_in(&mut self, data: &[u8]) -> Result<usize, Error> {
        (**self).enc_in(data)
    }

    fn clear_in(&mut self, data: &[u8]) -> Result<usize, Error> {
        (**self).clear_in(data)
    }

    fn clear_out(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).clear_out(buf)
    }

    fn enc_out(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).enc_out(buf)
    }

    fn is_init_finished(&self) -> bool {
        (**self).is_init_finished()
    }

    fn start(&mut self) -> Result<(), Error> {
        (**self).start()
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        (**self).shutdown()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Events of the secure layer, for whoever sits on top of it.
#[derive(Debug)]
pub enum SecureEvent {
    /// The handshake completed. Emitted once.
    Secure,
    /// Decrypted bytes.
    Data(Vec<u8>),
    /// The encrypted side drained, cleartext writes are welcome again.
    Drain,
    /// The peer ended its side.
    End,
    /// Fully closed.
    Close,
    /// Fatal failure of the engine or the underlying stream.
    Error(Error),
    /// The idle watchdog of the underlying stream fired.
    Timeout,
}

impl From<SecureEvent> for TransportEvent {
    /// The secure transition is what a client treats as "connected".
    fn from(value: SecureEvent) -> Self {
        match value {
            SecureEvent::Secure => TransportEvent::Connect,
            SecureEvent::Data(v) => TransportEvent::Data(v),
            SecureEvent::Drain => TransportEvent::Drain,
            SecureEvent::End => TransportEvent::End,
            SecureEvent::Close => TransportEvent::Close,
            SecureEvent::Error(e) => TransportEvent::Error(e),
            SecureEvent::Timeout => TransportEvent::Timeout,
        }
    }
}

/// The pump state of one wrapped connection.
#[derive(Debug)]
pub struct RecordPump {
    enc_in_pending: VecDeque<Vec<u8>>,
    clear_in_pending: VecDeque<Vec<u8>>,
    scratch: Vec<u8>,
    /// The cleartext sink took the last delivery.
    clear_accepts: bool,
    /// The encrypted sink took the last delivery.
    enc_accepts: bool,
    clear_paused: bool,
    enc_paused: bool,
    secure: bool,
    done: bool,
}

impl RecordPump {
    /// A pump pulling in rounds of [`Config::tls_scratch_size`] bytes.
    pub fn new(config: &Config) -> Self {
        RecordPump {
            enc_in_pending: VecDeque::new(),
            clear_in_pending: VecDeque::new(),
            scratch: vec![0; config.get_tls_scratch_size().max(1)],
            clear_accepts: true,
            enc_accepts: true,
            clear_paused: false,
            enc_paused: false,
            secure: false,
            done: false,
        }
    }

    /// Queue encrypted bytes from the peer.
    pub fn push_encrypted(&mut self, data: &[u8]) {
        if !self.done && !data.is_empty() {
            self.enc_in_pending.push_back(data.to_vec());
        }
    }

    /// Queue cleartext bytes for the peer.
    pub fn push_clear(&mut self, data: &[u8]) {
        if !self.done && !data.is_empty() {
            self.clear_in_pending.push_back(data.to_vec());
        }
    }

    /// The cleartext sink drained.
    pub fn clear_drained(&mut self) {
        self.clear_accepts = true;
    }

    /// The encrypted sink drained.
    pub fn enc_drained(&mut self) {
        self.enc_accepts = true;
    }

    /// Whether the encrypted sink accepted the last delivery.
    pub fn enc_accepts(&self) -> bool {
        self.enc_accepts
    }

    /// Whether the cleartext sink accepted the last delivery.
    pub fn clear_accepts(&self) -> bool {
        self.clear_accepts
    }

    /// Everything queued and produced so far went to the encrypted sink.
    ///
    /// Only meaningful right after a cycle: an accepting encrypted sink means
    /// `enc_out` ran dry.
    pub fn is_flushed(&self) -> bool {
        self.enc_accepts && self.clear_in_pending.is_empty()
    }

    /// The handshake completed at some point.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Closed for good.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes queued and not yet taken by the engine, `(encrypted, cleartext)`.
    pub fn pending(&self) -> (usize, usize) {
        let sum = |q: &VecDeque<Vec<u8>>| q.iter().map(|c| c.len()).sum();
        (sum(&self.enc_in_pending), sum(&self.clear_in_pending))
    }

    /// Terminal. The engine is told to release its resources, later cycles do
    /// nothing.
    pub fn close(&mut self, engine: &mut dyn TlsEngine) {
        if self.done {
            return;
        }
        self.done = true;
        self.enc_in_pending.clear();
        self.clear_in_pending.clear();
        engine.close();
    }

    /// Move whatever can move. Calls `secured` on the one-time secure
    /// transition, before the extra run.
    ///
    /// Running it again with nothing new queued has no effect.
    pub fn cycle<C: Sink + ?Sized>(
        &mut self,
        engine: &mut dyn TlsEngine,
        clear: &mut C,
        enc: &mut dyn Sink,
        secured: impl FnOnce(&mut C),
    ) -> Result<(), Error> {
        if self.done {
            return Ok(());
        }

        self.pump(engine, clear, enc)?;

        if !self.secure && engine.is_init_finished() {
            self.secure = true;
            debug!("secure established");
            secured(&mut *clear);
            self.pump(engine, clear, enc)?;
        }

        Ok(())
    }

    fn pump<C: Sink + ?Sized>(
        &mut self,
        engine: &mut dyn TlsEngine,
        clear: &mut C,
        enc: &mut dyn Sink,
    ) -> Result<(), Error> {
        feed(&mut self.enc_in_pending, |d| engine.enc_in(d))?;
        feed(&mut self.clear_in_pending, |d| engine.clear_in(d))?;

        // a sink that pushed back gets nothing until it drains
        if self.clear_accepts {
            if let Some(ok) = rounds(&mut self.scratch, |b| engine.clear_out(b), clear)? {
                self.clear_accepts = ok;
            }
        }
        if self.enc_accepts {
            if let Some(ok) = rounds(&mut self.scratch, |b| engine.enc_out(b), enc)? {
                self.enc_accepts = ok;
            }
        }

        // cleartext push-back holds the encrypted source and vice versa
        if !self.clear_accepts && !self.enc_paused {
            trace!("cleartext sink full, pausing encrypted side");
            enc.pause();
            self.enc_paused = true;
        } else if self.clear_accepts && self.enc_paused {
            enc.resume();
            self.enc_paused = false;
        }
        if !self.enc_accepts && !self.clear_paused {
            trace!("encrypted sink full, pausing cleartext side");
            clear.pause();
            self.clear_paused = true;
        } else if self.enc_accepts && self.clear_paused {
            clear.resume();
            self.clear_paused = false;
        }

        Ok(())
    }
}

/// Hand queued chunks to an engine stage until it stops taking them.
fn feed(
    queue: &mut VecDeque<Vec<u8>>,
    mut push: impl FnMut(&[u8]) -> Result<usize, Error>,
) -> Result<(), Error> {
    while let Some(mut chunk) = queue.pop_front() {
        let n = push(&chunk)?.min(chunk.len());
        if n < chunk.len() {
            chunk.drain(..n);
            queue.push_front(chunk);
            break;
        }
    }
    Ok(())
}

/// Pull an engine stage into `scratch` and deliver, round after round, while the
/// sink accepts. Returns the sink's last answer, `None` if nothing was delivered.
fn rounds<S: Sink + ?Sized>(
    scratch: &mut [u8],
    mut pull: impl FnMut(&mut [u8]) -> Result<usize, Error>,
    sink: &mut S,
) -> Result<Option<bool>, Error> {
    let mut last = None;
    loop {
        let mut filled = 0;
        while filled < scratch.len() {
            let n = pull(&mut scratch[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(last);
        }

        log_data(&scratch[..filled]);
        let ok = sink.write(&scratch[..filled]);
        last = Some(ok);
        if !ok {
            return Ok(last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestSink, XorEngine, BYE, HELLO};

    const KEY: u8 = 0x5a;

    fn pump() -> RecordPump {
        RecordPump::new(&Config::default().tls_scratch_size(8))
    }

    fn run(p: &mut RecordPump, e: &mut XorEngine, clear: &mut TestSink, enc: &mut TestSink) -> bool {
        let mut secured = false;
        p.cycle(e, clear, enc, |_| secured = true).unwrap();
        secured
    }

    /// Start and finish the handshake.
    fn handshake(p: &mut RecordPump, e: &mut XorEngine, clear: &mut TestSink, enc: &mut TestSink) {
        e.start().unwrap();
        run(p, e, clear, enc);
        assert_eq!(enc.data, vec![HELLO]);
        p.push_encrypted(&[HELLO]);
        assert!(run(p, e, clear, enc));
        enc.data.clear();
    }

    #[test]
    fn secure_transition_once() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());

        handshake(&mut p, &mut e, &mut clear, &mut enc);
        assert!(p.is_secure());
        assert!(!run(&mut p, &mut e, &mut clear, &mut enc));
    }

    #[test]
    fn cleartext_queued_before_handshake_flows_after() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());

        e.start().unwrap();
        p.push_clear(b"early");
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert_eq!(enc.data, vec![HELLO]);

        // held by the engine until the handshake is done
        p.push_encrypted(&[HELLO]);
        assert!(run(&mut p, &mut e, &mut clear, &mut enc));
        assert_eq!(&enc.data[1..], &XorEngine::seal(KEY, b"early")[..]);
    }

    #[test]
    fn both_directions() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        p.push_encrypted(&XorEngine::seal(KEY, b"hello from the peer"));
        p.push_clear(b"hi");
        run(&mut p, &mut e, &mut clear, &mut enc);

        assert_eq!(clear.data, b"hello from the peer");
        // scratch of 8 means rounds of 8
        assert_eq!(clear.writes, 3);
        assert_eq!(enc.data, XorEngine::seal(KEY, b"hi"));
    }

    #[test]
    fn idempotent_without_new_input() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        p.push_encrypted(&XorEngine::seal(KEY, b"abc"));
        run(&mut p, &mut e, &mut clear, &mut enc);
        let (cw, ew) = (clear.writes, enc.writes);
        let pending = p.pending();

        run(&mut p, &mut e, &mut clear, &mut enc);
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert_eq!((clear.writes, enc.writes), (cw, ew));
        assert_eq!(p.pending(), pending);
        assert!(!clear.paused && !enc.paused);
    }

    #[test]
    fn partial_accept_is_requeued() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        e.max_accept = 0;
        p.push_encrypted(&XorEngine::seal(KEY, b"abcdef"));
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert_eq!(p.pending(), (6, 0));
        assert!(clear.data.is_empty());

        e.max_accept = 4;
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert_eq!(p.pending(), (2, 0));
        assert_eq!(clear.data, b"abcd");

        run(&mut p, &mut e, &mut clear, &mut enc);
        assert_eq!(p.pending(), (0, 0));
        assert_eq!(clear.data, b"abcdef");
    }

    #[test]
    fn push_back_pauses_the_other_side() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        clear.reject = true;
        p.push_encrypted(&XorEngine::seal(KEY, b"0123456789abcdef"));
        run(&mut p, &mut e, &mut clear, &mut enc);
        // one round delivered, then the sink said stop
        assert_eq!(clear.data, b"01234567");
        assert!(enc.paused);
        assert!(!p.clear_accepts());

        clear.reject = false;
        p.clear_drained();
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert_eq!(clear.data, b"0123456789abcdef");
        assert!(!enc.paused);

        enc.reject = true;
        p.push_clear(b"x");
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert!(clear.paused);
        assert!(!p.enc_accepts());

        enc.reject = false;
        p.enc_drained();
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert!(!clear.paused);
    }

    #[test]
    fn shutdown_is_pumped_out() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        p.push_clear(b"bye");
        e.shutdown().unwrap();
        run(&mut p, &mut e, &mut clear, &mut enc);
        let mut expect = XorEngine::seal(KEY, b"bye");
        expect.extend_from_slice(BYE);
        assert_eq!(enc.data, expect);
    }

    #[test]
    fn close_is_terminal() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        p.close(&mut e);
        assert!(e.closed);
        assert!(p.is_done());

        p.push_encrypted(&XorEngine::seal(KEY, b"late"));
        run(&mut p, &mut e, &mut clear, &mut enc);
        assert!(clear.data.is_empty());
        assert_eq!(p.pending(), (0, 0));
    }

    #[test]
    fn engine_error_surfaces() {
        let mut p = pump();
        let mut e = XorEngine::new(KEY);
        let (mut clear, mut enc) = (TestSink::default(), TestSink::default());
        handshake(&mut p, &mut e, &mut clear, &mut enc);

        e.fail = true;
        p.push_encrypted(b"zz");
        let r = p.cycle(&mut e, &mut clear, &mut enc, |_| {});
        assert!(matches!(r, Err(Error::Tls(_))));
    }
}
