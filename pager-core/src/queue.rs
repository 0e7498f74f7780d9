//! Outgoing queue: unbounded FIFO shared between the input and transmit duties.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::protocol::Message;

/// Messages waiting to be transmitted. Share it behind an `Arc`.
#[derive(Debug)]
pub struct OutgoingQueue {
    tx: Sender<Message>,
    // One consumer, the transmit duty; the lock only makes the receiver `Sync`.
    rx: Mutex<Receiver<Message>>,
}

impl Default for OutgoingQueue {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl OutgoingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Never blocks and never fails: the receiving end lives as long
    /// as the queue.
    pub fn push(&self, msg: Message) {
        let _ = self.tx.send(msg);
    }

    /// Take the oldest message, waiting up to `timeout`. `None` means the wait timed out,
    /// so the caller gets a chance to check for shutdown.
    pub fn pop(&self, timeout: Duration) -> Option<Message> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn msg(text: &str) -> Message {
        Message::new("ts", 1, 2, text).unwrap()
    }

    #[test]
    fn drains_in_push_order() {
        let q = OutgoingQueue::new();
        q.push(msg("A"));
        q.push(msg("B"));
        assert_eq!(q.pop(Duration::ZERO).unwrap().text(), "A");
        assert_eq!(q.pop(Duration::ZERO).unwrap().text(), "B");
        assert!(q.pop(Duration::ZERO).is_none());
    }

    #[test]
    fn pop_times_out_when_empty() {
        let q = OutgoingQueue::new();
        let start = Instant::now();
        assert!(q.pop(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn pop_wakes_on_push_from_another_thread() {
        let q = Arc::new(OutgoingQueue::new());
        let producer = {
            let q = q.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                q.push(msg("late"));
            })
        };
        let got = q.pop(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(got.unwrap().text(), "late");
    }
}
