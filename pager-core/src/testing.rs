//! Test doubles for driving a pager without a terminal: a console that records what it
//! would have shown, and an input stream fed line by line from another thread.

use std::io::{self, BufRead, Read};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::console::Console;
use crate::protocol::{Message, NodeId};
use crate::shutdown::ShutdownReason;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    Prompt,
    Sent(Message),
    Received(Message),
    Started { frequency_mhz: f64, node_id: NodeId },
    Stopped(Option<ShutdownReason>),
}

#[derive(Default)]
pub struct RecordingConsole {
    events: Mutex<Vec<ConsoleEvent>>,
    changed: Condvar,
}

impl RecordingConsole {
    pub fn events(&self) -> Vec<ConsoleEvent> {
        self.lock().clone()
    }

    pub fn prompts(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, ConsoleEvent::Prompt))
            .count()
    }

    pub fn sent_messages(&self) -> Vec<Message> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ConsoleEvent::Sent(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn received_messages(&self) -> Vec<Message> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ConsoleEvent::Received(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn started_with(&self) -> Option<(f64, NodeId)> {
        self.lock().iter().find_map(|e| match e {
            ConsoleEvent::Started {
                frequency_mhz,
                node_id,
            } => Some((*frequency_mhz, *node_id)),
            _ => None,
        })
    }

    pub fn stopped_with(&self) -> Option<ShutdownReason> {
        self.lock().iter().find_map(|e| match e {
            ConsoleEvent::Stopped(reason) => *reason,
            _ => None,
        })
    }

    /// Wait until at least `n` messages were shown as received.
    pub fn wait_for_received(&self, n: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |events| {
            events
                .iter()
                .filter(|e| matches!(e, ConsoleEvent::Received(_)))
                .count()
                >= n
        })
    }

    /// Wait until at least `n` messages were echoed as sent.
    pub fn wait_for_sent(&self, n: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |events| {
            events
                .iter()
                .filter(|e| matches!(e, ConsoleEvent::Sent(_)))
                .count()
                >= n
        })
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&[ConsoleEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.lock();
        loop {
            if done(events.as_slice()) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            events = self
                .changed
                .wait_timeout(events, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn push(&self, event: ConsoleEvent) {
        self.lock().push(event);
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConsoleEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Console for RecordingConsole {
    fn prompt(&self) {
        self.push(ConsoleEvent::Prompt);
    }

    fn sent(&self, msg: &Message) {
        self.push(ConsoleEvent::Sent(msg.clone()));
    }

    fn received(&self, msg: &Message) {
        self.push(ConsoleEvent::Received(msg.clone()));
    }

    fn started(&self, frequency_mhz: f64, node_id: NodeId) {
        self.push(ConsoleEvent::Started {
            frequency_mhz,
            node_id,
        });
    }

    fn stopped(&self, reason: Option<ShutdownReason>) {
        self.push(ConsoleEvent::Stopped(reason));
    }
}

/// Operator input that blocks until a line is fed, like a terminal. Dropping the
/// [`Feeder`] is end-of-input.
pub struct ScriptedInput {
    lines: Receiver<String>,
    buf: Vec<u8>,
    pos: usize,
}

pub struct Feeder {
    lines: Sender<String>,
}

impl ScriptedInput {
    pub fn new() -> (Self, Feeder) {
        let (tx, rx) = channel();
        (
            Self {
                lines: rx,
                buf: Vec::new(),
                pos: 0,
            },
            Feeder { lines: tx },
        )
    }
}

impl Feeder {
    /// Type one line. Ignored if the reader is gone.
    pub fn line(&self, text: &str) {
        let _ = self.lines.send(format!("{text}\n"));
    }
}

impl Read for ScriptedInput {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for ScriptedInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            match self.lines.recv() {
                Ok(line) => {
                    self.buf = line.into_bytes();
                    self.pos = 0;
                }
                Err(_) => return Ok(&[]),
            }
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}
