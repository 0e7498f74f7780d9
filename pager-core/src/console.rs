//! Operator console: what the person at the keyboard sees.

use std::io::Write;

use crate::protocol::{Message, NodeId};
use crate::shutdown::ShutdownReason;

/// Sink for operator-visible events. Shared by all duties, so it must be `Sync`.
pub trait Console: Send + Sync {
    /// Ask for the next line of input.
    fn prompt(&self) {}

    /// Local echo after a message went out on the radio.
    fn sent(&self, msg: &Message);

    /// A message addressed to this node arrived.
    fn received(&self, msg: &Message);

    fn started(&self, frequency_mhz: f64, node_id: NodeId);

    fn stopped(&self, reason: Option<ShutdownReason>);
}

pub const PROMPT: &str = "Enter message > ";

/// Console on the process's stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl StdoutConsole {
    // The stdout lock keeps one duty's line from being split by another's.
    fn write(&self, line: &str, newline: bool) {
        let mut stdout = std::io::stdout().lock();
        let _ = if newline {
            writeln!(stdout, "{line}")
        } else {
            write!(stdout, "{line}")
        };
        let _ = stdout.flush();
    }
}

impl Console for StdoutConsole {
    fn prompt(&self) {
        self.write(PROMPT, false);
    }

    fn sent(&self, msg: &Message) {
        self.write(&format_sent(msg), true);
    }

    fn received(&self, msg: &Message) {
        self.write(&format_received(msg), true);
    }

    fn started(&self, frequency_mhz: f64, node_id: NodeId) {
        self.write(
            &format!("✅ RF initialized at {frequency_mhz:?} MHz, node ID {node_id}"),
            true,
        );
    }

    fn stopped(&self, reason: Option<ShutdownReason>) {
        match reason {
            Some(ShutdownReason::PortFailure) => {
                self.write("🛑 Radio failure, shutting down...", true)
            }
            _ => self.write("🛑 Shutting down...", true),
        }
    }
}

pub fn format_sent(msg: &Message) -> String {
    format!(
        "🟢 Sent to {} @ {}: \"{}\"",
        msg.receiver_id(),
        msg.timestamp(),
        msg.text()
    )
}

pub fn format_received(msg: &Message) -> String {
    format!(
        "📥 Received from {} @ {}: \"{}\"",
        msg.sender_id(),
        msg.timestamp(),
        msg.text()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_line_names_sender_time_and_text() {
        let msg = Message::new("2024-05-01T12:00:00", 1, 2, "hello").unwrap();
        assert_eq!(
            format_received(&msg),
            "📥 Received from 1 @ 2024-05-01T12:00:00: \"hello\""
        );
    }

    #[test]
    fn sent_line_names_destination() {
        let msg = Message::new("t0", 1, 2, "hi").unwrap();
        assert_eq!(format_sent(&msg), "🟢 Sent to 2 @ t0: \"hi\"");
    }
}
