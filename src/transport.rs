use std::time::Duration;

use crate::Error;

/// Writable/readable half of a byte pipeline, as seen by a pump.
///
/// `write` always takes the bytes. The returned flag says whether the sink
/// wants more right now; `false` means "buffered, wait for drain".
pub trait Sink {
    /// Hand over bytes. Returns whether further writes are welcome.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Stop producing data events until `resume`.
    fn pause(&mut self);

    /// Undo `pause`.
    fn resume(&mut self);
}

/// Duplex byte stream a connection runs on.
///
/// The engine never reads from a transport. Incoming bytes, readiness and
/// closure are fed in by the driver through the `on_*` calls of the client,
/// server or TLS layer (or [`TransportEvent`]).
pub trait Transport {
    /// Hand over bytes. Returns `false` when the transport buffers beyond its
    /// high water mark; a `Drain` follows once it catches up.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Stop delivering data events.
    fn pause(&mut self);

    /// Resume delivering data events.
    fn resume(&mut self);

    /// Arm (or with `None` disarm) the idle watchdog.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Half-close: flush buffered bytes and end the write side.
    fn end(&mut self);

    /// Tear down immediately, dropping buffered bytes.
    fn destroy(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> bool {
        (**self).write(data)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        (**self).set_timeout(timeout)
    }

    fn end(&mut self) {
        (**self).end()
    }

    fn destroy(&mut self) {
        (**self).destroy()
    }
}

/// Transport readiness, as observed by the driver.
#[derive(Debug)]
pub enum TransportEvent {
    /// Outgoing connection established.
    Connect,
    /// Bytes read.
    Data(Vec<u8>),
    /// Buffered writes went out, more are welcome.
    Drain,
    /// Peer ended its write side.
    End,
    /// Fully closed.
    Close,
    /// Socket level failure.
    Error(Error),
    /// Idle watchdog fired.
    Timeout,
}
