use std::collections::VecDeque;
use std::time::Duration;

use super::{RecordPump, SecureEvent, TlsEngine};
use crate::{Config, Error, Sink, Transport, TransportEvent};

/// A [`Transport`] carrying TLS records, seen as a cleartext `Transport`.
///
/// ```text
///   Client/Server ──write()──▶ SecureTransport ──records──▶ inner
///   Client/Server ◀─events──── SecureTransport ◀─on_data()── driver
/// ```
///
/// Writes from the layer above are encrypted straight into the inner transport.
/// Bytes the driver reads from the inner transport go to [`on_data`], and the
/// decrypted result comes back out of [`poll_event`]. A [`SecureEvent`] converts
/// into a [`TransportEvent`], so a client or server running on top of this can
/// be fed with `handle(event.into())`. The handshake completing shows up as
/// `Connect`.
///
/// ```
/// use std::time::Duration;
/// use h1_mux::tls::{SecureEvent, SecureTransport, TlsEngine};
/// use h1_mux::{Config, Error, Transport};
///
/// // Passes bytes through unchanged, no handshake to speak of.
/// #[derive(Default)]
/// struct Plain {
///     up: Vec<u8>,
///     down: Vec<u8>,
/// }
///
/// fn take(from: &mut Vec<u8>, to: &mut [u8]) -> usize {
///     let n = from.len().min(to.len());
///     to[..n].copy_from_slice(&from[..n]);
///     from.drain(..n);
///     n
/// }
///
/// impl TlsEngine for Plain {
///     fn enc_in(&mut self, d: &[u8]) -> Result<usize, Error> {
///         self.up.extend_from_slice(d);
///         Ok(d.len())
///     }
///     fn clear_in(&mut self, d: &[u8]) -> Result<usize, Error> {
///         self.down.extend_from_slice(d);
///         Ok(d.len())
///     }
///     fn clear_out(&mut self, b: &mut [u8]) -> Result<usize, Error> {
///         Ok(take(&mut self.up, b))
///     }
///     fn enc_out(&mut self, b: &mut [u8]) -> Result<usize, Error> {
///         Ok(take(&mut self.down, b))
///     }
///     fn is_init_finished(&self) -> bool {
///         true
///     }
///     fn start(&mut self) -> Result<(), Error> {
///         Ok(())
///     }
///     fn shutdown(&mut self) -> Result<(), Error> {
///         Ok(())
///     }
///     fn close(&mut self) {}
/// }
///
/// #[derive(Default)]
/// struct Socket(Vec<u8>);
///
/// impl Transport for Socket {
///     fn write(&mut self, data: &[u8]) -> bool {
///         self.0.extend_from_slice(data);
///         true
///     }
///     fn pause(&mut self) {}
///     fn resume(&mut self) {}
///     fn set_timeout(&mut self, _: Option<Duration>) {}
///     fn end(&mut self) {}
///     fn destroy(&mut self) {}
/// }
///
/// let mut tls = SecureTransport::new(Socket::default(), Plain::default(), &Config::default());
///
/// tls.start();
/// assert!(matches!(tls.poll_event(), Some(SecureEvent::Secure)));
///
/// tls.write(b"ping");
/// assert_eq!(tls.get_ref().0, b"ping");
///
/// tls.on_data(b"pong");
/// assert!(matches!(tls.poll_event(), Some(SecureEvent::Data(d)) if d == b"pong"));
/// ```
///
/// [`on_data`]: SecureTransport::on_data
/// [`poll_event`]: SecureTransport::poll_event
#[derive(Debug)]
pub struct SecureTransport<T, E> {
    inner: T,
    engine: E,
    pump: RecordPump,
    events: VecDeque<SecureEvent>,
    ended: bool,
    /// `end()` reached the inner transport.
    inner_ended: bool,
    destroyed: bool,
}

impl<T: Transport, E: TlsEngine> SecureTransport<T, E> {
    /// Wrap `inner`. Nothing happens until [`start`](Self::start).
    pub fn new(inner: T, engine: E, config: &Config) -> Self {
        SecureTransport {
            inner,
            engine,
            pump: RecordPump::new(config),
            events: VecDeque::new(),
            ended: false,
            inner_ended: false,
            destroyed: false,
        }
    }

    /// Begin the handshake. Call once the inner transport is connected.
    pub fn start(&mut self) {
        debug!("tls start");
        if let Err(e) = self.engine.start() {
            self.fail(e);
            return;
        }
        self.cycle();
    }

    /// Encrypted bytes read from the inner transport.
    pub fn on_data(&mut self, data: &[u8]) {
        self.pump.push_encrypted(data);
        self.cycle();
    }

    /// The inner transport drained.
    pub fn on_drain(&mut self) {
        self.pump.enc_drained();
        self.cycle();
        self.finish_end();
        if self.pump.enc_accepts() && !self.pump.is_done() && !self.ended {
            self.events.push_back(SecureEvent::Drain);
        }
    }

    /// The peer ended the inner transport.
    pub fn on_end(&mut self) {
        self.events.push_back(SecureEvent::End);
    }

    /// The inner transport closed.
    pub fn on_close(&mut self) {
        self.pump.close(&mut self.engine);
        self.events.push_back(SecureEvent::Close);
    }

    /// The inner transport failed.
    pub fn on_error(&mut self, error: Error) {
        self.fail(error);
    }

    /// Dispatch a readiness event of the inner transport.
    ///
    /// `Connect` starts the handshake.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connect => self.start(),
            TransportEvent::Data(v) => self.on_data(&v),
            TransportEvent::Drain => self.on_drain(),
            TransportEvent::End => self.on_end(),
            TransportEvent::Close => self.on_close(),
            TransportEvent::Error(e) => self.on_error(e),
            TransportEvent::Timeout => self.events.push_back(SecureEvent::Timeout),
        }
    }

    /// Next event for the layer above.
    pub fn poll_event(&mut self) -> Option<SecureEvent> {
        self.events.pop_front()
    }

    /// Whether the handshake completed.
    pub fn is_secure(&self) -> bool {
        self.pump.is_secure()
    }

    /// The inner transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// The inner transport, mutably.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// The TLS engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn cycle(&mut self) {
        let SecureTransport {
            inner,
            engine,
            pump,
            events,
            ..
        } = self;

        let result = pump.cycle(
            engine,
            &mut Upward(events),
            &mut Downward(inner),
            |up: &mut Upward<'_>| up.0.push_back(SecureEvent::Secure),
        );

        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// End the inner transport once the close notification is out.
    fn finish_end(&mut self) {
        if !self.ended || self.inner_ended || self.pump.is_done() {
            return;
        }
        if !self.pump.is_flushed() {
            trace!("tls end waits for the inner transport to drain");
            return;
        }
        self.inner_ended = true;
        self.inner.end();
    }

    fn fail(&mut self, error: Error) {
        warn!("tls failure: {}", error);
        self.pump.close(&mut self.engine);
        if !self.destroyed {
            self.destroyed = true;
            self.inner.destroy();
        }
        self.events.push_back(SecureEvent::Error(error));
    }
}

impl<T: Transport, E: TlsEngine> Transport for SecureTransport<T, E> {
    fn write(&mut self, data: &[u8]) -> bool {
        if self.pump.is_done() {
            return false;
        }
        self.pump.push_clear(data);
        self.cycle();
        self.pump.enc_accepts() && !self.pump.is_done()
    }

    fn pause(&mut self) {
        self.inner.pause();
    }

    fn resume(&mut self) {
        self.inner.resume();
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.inner.set_timeout(timeout);
    }

    /// Send the close notification, then end the inner transport.
    ///
    /// With the inner transport pushing back, the end waits for its drain.
    fn end(&mut self) {
        if self.ended || self.pump.is_done() {
            return;
        }
        self.ended = true;
        if let Err(e) = self.engine.shutdown() {
            self.fail(e);
            return;
        }
        self.cycle();
        self.finish_end();
    }

    fn destroy(&mut self) {
        self.pump.close(&mut self.engine);
        if !self.destroyed {
            self.destroyed = true;
            self.inner.destroy();
        }
    }
}

/// Decrypted bytes into the event queue, one `Data` per burst.
struct Upward<'a>(&'a mut VecDeque<SecureEvent>);

impl Sink for Upward<'_> {
    fn write(&mut self, data: &[u8]) -> bool {
        if let Some(SecureEvent::Data(v)) = self.0.back_mut() {
            v.extend_from_slice(data);
        } else {
            self.0.push_back(SecureEvent::Data(data.to_vec()));
        }
        true
    }

    // the layer above stops writing on its own when write() says so
    fn pause(&mut self) {}

    fn resume(&mut self) {}
}

/// Records into the inner transport.
struct Downward<'a, T>(&'a mut T);

impl<T: Transport> Sink for Downward<'_, T> {
    fn write(&mut self, data: &[u8]) -> bool {
        self.0.write(data)
    }

    fn pause(&mut self) {
        self.0.pause();
    }

    fn resume(&mut self) {
        self.0.resume();
    }
}
