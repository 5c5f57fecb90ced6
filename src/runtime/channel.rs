//! In-process channel: an unbounded FIFO queue of value tuples with
//! blocking receive and non-blocking send, per spec §4.5/§5.
//!
//! Grounded in the original's `runtime/Channel.py` (see `DESIGN.md`), which
//! wraps a plain queue with a lock and condition variable; realized here as
//! `Mutex<VecDeque<_>> + Condvar` rather than `std::sync::mpsc` because the
//! spec allows multiple concurrent producers *and* consumers on one
//! channel, which an `mpsc::Receiver` can't be cloned to support.

use crate::runtime::value::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// A thread-safe FIFO queue of value tuples.
#[derive(Debug, Default)]
pub struct Channel {
    queue: Mutex<VecDeque<Vec<Value>>>,
    not_empty: Condvar,
}

impl Channel {
    /// A fresh, empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically enqueues one tuple (spec: "send(v1, v2, …) atomically
    /// enqueues one tuple"). Never blocks.
    pub fn send(&self, values: Vec<Value>) {
        let mut queue = self.queue.lock().expect("channel queue lock poisoned");
        queue.push_back(values);
        self.not_empty.notify_one();
    }

    /// Blocks until a tuple is available, then dequeues and returns it.
    #[must_use]
    pub fn receive(&self) -> Vec<Value> {
        let mut queue = self.queue.lock().expect("channel queue lock poisoned");
        while queue.is_empty() {
            queue = self
                .not_empty
                .wait(queue)
                .expect("channel condvar wait poisoned");
        }
        queue.pop_front().expect("just checked non-empty")
    }
}

/// A handle to either an in-process [`Channel`] or a TCP-backed
/// [`crate::runtime::network::NetworkChannel`] (spec §4.5's optional
/// networked variant). Cloning a handle shares the underlying queue, per
/// spec §3's "a Channel value is shared by reference".
#[derive(Debug, Clone)]
pub enum ChannelHandle {
    /// Ordinary in-process channel.
    Local(Arc<Channel>),
    /// TCP-backed channel (spec §6's optional extension).
    Network(Arc<crate::runtime::network::NetworkChannel>),
}

impl ChannelHandle {
    /// A fresh in-process channel handle.
    #[must_use]
    pub fn local() -> Self {
        ChannelHandle::Local(Arc::new(Channel::new()))
    }

    /// Enqueues a tuple (local) or frames and writes it over the wire
    /// (network).
    pub fn send(&self, values: Vec<Value>) {
        match self {
            ChannelHandle::Local(chan) => chan.send(values),
            ChannelHandle::Network(chan) => chan.send(values),
        }
    }

    /// Blocks until a tuple is available.
    #[must_use]
    pub fn receive(&self) -> Vec<Value> {
        match self {
            ChannelHandle::Local(chan) => chan.receive(),
            ChannelHandle::Network(chan) => chan.receive(),
        }
    }

    /// Referential equality, used by `Value`'s `PartialEq`.
    #[must_use]
    pub fn same_as(&self, other: &ChannelHandle) -> bool {
        match (self, other) {
            (ChannelHandle::Local(a), ChannelHandle::Local(b)) => Arc::ptr_eq(a, b),
            (ChannelHandle::Network(a), ChannelHandle::Network(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved_single_producer_consumer() {
        let chan = Channel::new();
        chan.send(vec![Value::Integer(7)]);
        chan.send(vec![Value::Integer(8)]);
        assert_eq!(chan.receive(), vec![Value::Integer(7)]);
        assert_eq!(chan.receive(), vec![Value::Integer(8)]);
    }

    #[test]
    fn receive_blocks_until_send() {
        let chan = Arc::new(Channel::new());
        let chan2 = Arc::clone(&chan);
        let handle = std::thread::spawn(move || chan2.receive());
        std::thread::sleep(std::time::Duration::from_millis(20));
        chan.send(vec![Value::Integer(42)]);
        assert_eq!(handle.join().unwrap(), vec![Value::Integer(42)]);
    }
}
