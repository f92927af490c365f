use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use subipc_serial::Value;
use tokio::sync::oneshot;

use crate::state::DisconnectReason;

/// Predicate selecting which messages a waiter accepts.
pub(crate) type Filter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Outcome delivered to a suspended receiver.
///
/// Messages carry their arrival number so an abandoned receiver can put the
/// message back where it arrived.
#[derive(Debug)]
pub(crate) enum Wake {
    Message(u64, Value),
    Closed(DisconnectReason),
}

struct Waiter {
    filter: Option<Filter>,
    tx: oneshot::Sender<Wake>,
}

impl Waiter {
    fn accepts(&self, value: &Value) -> bool {
        self.filter.as_ref().is_none_or(|filter| (**filter)(value))
    }
}

/// Inbound messages not yet consumed, plus receivers waiting for one.
///
/// A message is handed to the oldest waiter that accepts it, otherwise
/// buffered. Every live waiter rejects every buffered message, so an
/// unfiltered waiter only exists while the buffer is empty.
///
/// Buffered messages stay sorted by arrival number.
#[derive(Default)]
pub(crate) struct MessageQueue {
    messages: VecDeque<(u64, Value)>,
    waiters: VecDeque<Waiter>,
    next_seq: u64,
    closed: bool,
}

impl MessageQueue {
    /// Deliver an inbound message. Dropped once the queue is closed.
    pub(crate) fn push(&mut self, value: Value) {
        if self.closed {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(value) = self.hand_off(seq, value) {
            self.messages.push_back((seq, value));
        }
    }

    /// Put back a message whose receiver went away before consuming it.
    ///
    /// It goes back to its arrival position, behind older messages the
    /// receiver's filter skipped.
    pub(crate) fn restore(&mut self, seq: u64, value: Value) {
        if let Some(value) = self.hand_off(seq, value) {
            let index = self.messages.partition_point(|(queued, _)| *queued < seq);
            self.messages.insert(index, (seq, value));
        }
    }

    /// Try to give the value to a live waiter, returning it if none took it.
    fn hand_off(&mut self, seq: u64, mut value: Value) -> Option<Value> {
        self.waiters.retain(|waiter| !waiter.tx.is_closed());
        let mut index = 0;
        while index < self.waiters.len() {
            if !self.waiters[index].accepts(&value) {
                index += 1;
                continue;
            }
            let Some(waiter) = self.waiters.remove(index) else {
                break;
            };
            match waiter.tx.send(Wake::Message(seq, value)) {
                Ok(()) => return None,
                Err(Wake::Message(_, returned)) => value = returned,
                Err(Wake::Closed(_)) => return None,
            }
        }
        Some(value)
    }

    /// Take the oldest message accepted by `filter`.
    pub(crate) fn pop(&mut self, filter: Option<&Filter>) -> Option<Value> {
        let index = match filter {
            None => 0,
            Some(filter) => self
                .messages
                .iter()
                .position(|(_, value)| (**filter)(value))?,
        };
        self.messages.remove(index).map(|(_, value)| value)
    }

    /// Whether some receiver is still waiting for a message.
    ///
    /// Such a receiver rejected everything buffered, so only further reads
    /// can satisfy it.
    pub(crate) fn has_waiters(&self) -> bool {
        self.waiters.iter().any(|waiter| !waiter.tx.is_closed())
    }

    /// Queue a receiver for the next accepted message.
    pub(crate) fn register(&mut self, filter: Option<Filter>) -> oneshot::Receiver<Wake> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(Waiter { filter, tx });
        rx
    }

    /// Stop accepting deliveries and fail every waiter.
    ///
    /// Buffered messages are kept so iteration can drain them.
    pub(crate) fn close(&mut self, reason: &DisconnectReason) {
        self.closed = true;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.tx.send(Wake::Closed(reason.clone()));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    fn waiting(&self) -> usize {
        self.waiters.len()
    }
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("messages", &self.messages.len())
            .field("waiters", &self.waiters.len())
            .field("closed", &self.closed)
            .finish()
    }
}
