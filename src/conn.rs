use std::collections::VecDeque;

use crate::outgoing::{Frame, OutgoingMessage};
use crate::util::log_data;
use crate::{ConnId, Error, MessageId, Transport};

/// Lifecycle of a connection.
///
/// ```text
/// Connecting ─▶ Open ─▶ Closing ─▶ Closed
///                  └──────────────▶ Dead
/// ```
///
/// `Dead` is only entered on a transport level failure and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for the transport to connect.
    Connecting,
    /// Messages flow.
    Open,
    /// No new messages, the last ones are flushing.
    Closing,
    /// Gracefully closed.
    Closed,
    /// Failed.
    Dead,
}

/// Ordered in-flight messages over one transport.
///
/// Only `pending[0]` writes to the transport; everybody else buffers in their
/// own [`OutgoingMessage`] until they become head.
#[derive(Debug)]
pub(crate) struct Pipeline<T> {
    pub conn_id: ConnId,
    pub transport: Option<T>,
    pub pending: VecDeque<OutgoingMessage>,
    state: ConnState,
    /// Read side still open.
    pub reading: bool,
    /// Write side still open.
    pub writing: bool,
    /// The transport refused the last write and has not drained yet.
    pub backlogged: bool,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: Option<T>, state: ConnState) -> Self {
        let conn_id = ConnId::next();
        debug!("{} created in {:?}", conn_id, state);
        Pipeline {
            conn_id,
            transport,
            pending: VecDeque::new(),
            state,
            reading: true,
            writing: true,
            backlogged: false,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnState) {
        if self.state != state {
            debug!("{} {:?} -> {:?}", self.conn_id, self.state, state);
            self.state = state;
        }
    }

    pub fn is_head(&self, id: MessageId) -> bool {
        self.pending.front().map(|m| m.id) == Some(id)
    }

    pub fn find(&mut self, id: MessageId) -> Result<&mut OutgoingMessage, Error> {
        self.pending
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(Error::UnknownMessage(id))
    }

    /// The single path from a message to the transport.
    ///
    /// Refuses anything that is not from the head of line.
    pub fn write_from(&mut self, id: MessageId, frame: &Frame) -> Result<bool, Error> {
        if !self.is_head(id) {
            warn!("{} write from {} which is not head of line", self.conn_id, id);
            return Err(Error::NotHeadOfLine(id));
        }
        let Some(transport) = &mut self.transport else {
            return Ok(false);
        };
        log_data(&frame.bytes);
        let ok = transport.write(&frame.bytes);
        if !ok {
            self.backlogged = true;
        }
        Ok(ok)
    }

    /// Move the head's queued frames to the transport until it pushes back.
    ///
    /// Returns the head's write state.
    pub fn cycle(&mut self) -> bool {
        if self.state != ConnState::Open && self.state != ConnState::Closing {
            return false;
        }
        if self.backlogged || self.transport.is_none() {
            return false;
        }

        loop {
            let Some(head) = self.pending.front_mut() else {
                return true;
            };
            let id = head.id;
            let Some(frame) = head.pop_frame() else {
                return head.write_state;
            };

            // head is checked just above, this does not fail
            let ok = self.write_from(id, &frame).unwrap_or(false);

            if let Some(head) = self.pending.front_mut() {
                head.sent(&frame);
                head.write_state = ok;
            }

            if !ok {
                return false;
            }
        }
    }

    /// Merge the head and aggregate of `id` into its queue and push the head.
    pub fn flush(&mut self, id: MessageId) -> Result<bool, Error> {
        let msg = self.find(id)?;
        msg.write_headers();
        msg.flush();
        if self.is_head(id) {
            Ok(self.cycle())
        } else {
            Ok(false)
        }
    }

    /// Push after a write by `id`. On `false` the caller waits for a drain.
    pub fn after_write(&mut self, id: MessageId) -> bool {
        let ok = self.is_head(id) && self.cycle();
        if !ok {
            if let Ok(msg) = self.find(id) {
                msg.needs_drain = true;
            }
        }
        ok
    }

    /// The transport drained. Returns the id of the head if it waited for this.
    pub fn drained(&mut self) -> Option<MessageId> {
        self.backlogged = false;
        self.promote()
    }

    /// Push the (possibly new) head. Returns its id if the caller waits for a drain
    /// and everything went out.
    pub fn promote(&mut self) -> Option<MessageId> {
        self.cycle();
        let head = self.pending.front_mut()?;
        if head.needs_drain && !head.has_output() && head.write_state {
            head.needs_drain = false;
            return Some(head.id);
        }
        None
    }
}
