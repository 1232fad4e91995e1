use std::collections::VecDeque;

use super::{RecordPump, SecureEvent, TlsEngine};
use crate::{Config, Error, Sink};

/// TLS between two duplex byte streams that already exist.
///
/// ```text
///   source ◀──decrypted──┐       ┌──records──▶ target
///                        [engine]
///   source ──cleartext───┘       └◀─records─── target
/// ```
///
/// The source is the cleartext side, the target carries records. Both are plain
/// [`Sink`]s; what they read is fed in through the `on_source_*` and
/// `on_target_*` calls. Push-back is cross-coupled: a full source pauses the
/// target and vice versa, and a drain resumes the other side again.
///
/// Ending the source shuts the session down: the close notification is pumped
/// to the target, `End` is emitted and the filter is done. A target pushing
/// back delays all of that until it drains. The target ending before that is
/// an error.
#[derive(Debug)]
pub struct SecureFilter<S, T, E> {
    source: S,
    target: T,
    engine: E,
    pump: RecordPump,
    events: VecDeque<SecureEvent>,
    /// The source ended, shutdown is in progress.
    closing: bool,
}

impl<S: Sink, T: Sink, E: TlsEngine> SecureFilter<S, T, E> {
    /// Join `source` and `target` through `engine`.
    pub fn new(source: S, target: T, engine: E, config: &Config) -> Self {
        SecureFilter {
            source,
            target,
            engine,
            pump: RecordPump::new(config),
            events: VecDeque::new(),
            closing: false,
        }
    }

    /// Begin the handshake.
    pub fn start(&mut self) {
        if let Err(e) = self.engine.start() {
            self.fail(e);
            return;
        }
        self.cycle();
    }

    /// Cleartext from the source.
    pub fn on_source_data(&mut self, data: &[u8]) {
        self.pump.push_clear(data);
        self.cycle();
    }

    /// Records from the target.
    pub fn on_target_data(&mut self, data: &[u8]) {
        self.pump.push_encrypted(data);
        self.cycle();
    }

    /// The source drained.
    pub fn on_source_drain(&mut self) {
        self.pump.clear_drained();
        self.cycle();
    }

    /// The target drained.
    pub fn on_target_drain(&mut self) {
        self.pump.enc_drained();
        self.cycle();
        self.finish_close();
    }

    /// The source has no more cleartext.
    pub fn on_source_end(&mut self) {
        if self.closing || self.pump.is_done() {
            return;
        }
        self.closing = true;
        if let Err(e) = self.engine.shutdown() {
            self.fail(e);
            return;
        }
        self.cycle();
        self.finish_close();
    }

    /// The source closed.
    pub fn on_source_close(&mut self) {
        if self.pump.is_done() {
            return;
        }
        self.events.push_back(SecureEvent::Close);
        self.destroy();
    }

    /// The target ended its side.
    pub fn on_target_end(&mut self) {
        self.target_gone("ended");
    }

    /// The target closed.
    pub fn on_target_close(&mut self) {
        self.target_gone("closed");
    }

    /// Either stream failed.
    pub fn on_error(&mut self, error: Error) {
        if !self.pump.is_done() {
            self.fail(error);
        }
    }

    /// Next event.
    pub fn poll_event(&mut self) -> Option<SecureEvent> {
        self.events.pop_front()
    }

    /// Whether the handshake completed.
    pub fn is_secure(&self) -> bool {
        self.pump.is_secure()
    }

    /// Whether the filter is finished.
    pub fn is_done(&self) -> bool {
        self.pump.is_done()
    }

    /// The cleartext side.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The cleartext side, mutably.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The record side.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The record side, mutably.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// The TLS engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Stop for good, releasing the engine.
    pub fn destroy(&mut self) {
        self.pump.close(&mut self.engine);
    }

    /// Done once the close notification reached the target.
    fn finish_close(&mut self) {
        if !self.closing || self.pump.is_done() {
            return;
        }
        if !self.pump.is_flushed() {
            trace!("tls filter shutdown waits for the target to drain");
            return;
        }
        self.events.push_back(SecureEvent::End);
        self.destroy();
    }

    fn target_gone(&mut self, how: &str) {
        if self.pump.is_done() {
            return;
        }
        self.fail(Error::Tls(format!("target {} before the session was shut down", how)));
    }

    fn cycle(&mut self) {
        let SecureFilter {
            source,
            target,
            engine,
            pump,
            events,
            ..
        } = self;

        let mut secured = false;
        let result = pump.cycle(engine, source, target, |_| secured = true);
        if secured {
            events.push_back(SecureEvent::Secure);
        }

        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn fail(&mut self, error: Error) {
        warn!("tls filter failure: {}", error);
        self.pump.close(&mut self.engine);
        self.events.push_back(SecureEvent::Error(error));
    }
}
