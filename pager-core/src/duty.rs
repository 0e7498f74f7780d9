//! The three duties: operator input, transmit and receive. Each runs on its own thread
//! and returns once it observes the shutdown signal.

use std::io::BufRead;

use crate::port::{PortError, Transceiver};
use crate::protocol::{Message, NodeId};
use crate::shutdown::ShutdownReason;
use crate::supervisor::Station;
use crate::wire::{decode_frame, encode_frame, MalformedFrame};

/// What one line of operator input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Quit,
}

/// `exit`/`quit` in any case, surrounded by any whitespace, ends the session. Anything
/// else is sent as typed, minus the line terminator.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return Command::Quit;
    }
    let text = line.strip_suffix('\n').unwrap_or(line);
    let text = text.strip_suffix('\r').unwrap_or(text);
    Command::Send(text.to_owned())
}

/// How the input duty ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// Operator asked to quit.
    Quit,
    /// End of input or a read error.
    Aborted,
    /// Another duty or the environment shut the session down first.
    Shutdown,
}

/// Read operator lines until quit, end of input or shutdown; queue each as a message
/// to the station's destination.
pub fn run_input<T: Transceiver, R: BufRead>(station: &Station<T>, mut input: R) -> InputEnd {
    let mut line = String::new();
    loop {
        if station.shutdown.is_set() {
            return InputEnd::Shutdown;
        }
        station.console.prompt();
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                tracing::info!("operator input closed");
                station.shutdown.signal(ShutdownReason::EndOfInput);
                return InputEnd::Aborted;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "operator input failed");
                station.shutdown.signal(ShutdownReason::EndOfInput);
                return InputEnd::Aborted;
            }
        }
        match parse_command(&line) {
            Command::Quit => {
                station.shutdown.signal(ShutdownReason::OperatorQuit);
                return InputEnd::Quit;
            }
            Command::Send(text) => {
                let msg = Message::now(station.node_id, station.dest, text);
                tracing::debug!(to = msg.receiver_id(), "queued message");
                station.queue.push(msg);
            }
        }
    }
}

/// Drain the outgoing queue onto the radio. A port error ends the session.
pub fn run_transmit<T: Transceiver>(station: &Station<T>) -> Result<(), PortError> {
    while !station.shutdown.is_set() {
        let Some(msg) = station.queue.pop(station.timing.transmit_poll) else {
            continue;
        };
        let frame = encode_frame(&msg);
        if let Err(e) = station.port.send(msg.receiver_id(), &frame) {
            tracing::error!(error = %e, to = msg.receiver_id(), "transmit failed");
            station.shutdown.signal(ShutdownReason::PortFailure);
            return Err(e);
        }
        tracing::debug!(to = msg.receiver_id(), bytes = frame.len(), "transmitted");
        station.console.sent(&msg);
    }
    Ok(())
}

/// Fate of one inbound packet at a given node.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Addressed to this node; show it.
    Deliver(Message),
    /// Addressed to someone else; nodes do not forward.
    NotForUs(Message),
    Malformed(MalformedFrame),
}

pub fn classify_packet(node_id: NodeId, packet: &[u8]) -> Inbound {
    match decode_frame(packet) {
        Ok(msg) if msg.receiver_id() == node_id => Inbound::Deliver(msg),
        Ok(msg) => Inbound::NotForUs(msg),
        Err(e) => Inbound::Malformed(e),
    }
}

/// Poll the radio and show messages addressed to this node. Bad packets are logged
/// and skipped; a port error ends the session.
pub fn run_receive<T: Transceiver>(station: &Station<T>) -> Result<(), PortError> {
    while !station.shutdown.is_set() {
        let packet = match station.port.receive(station.timing.receive_poll) {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "receive failed");
                station.shutdown.signal(ShutdownReason::PortFailure);
                return Err(e);
            }
        };
        match classify_packet(station.node_id, &packet) {
            Inbound::Deliver(msg) => station.console.received(&msg),
            Inbound::NotForUs(msg) => {
                tracing::trace!(to = msg.receiver_id(), "ignored packet for another node")
            }
            Inbound::Malformed(e) => {
                tracing::warn!(error = %e, bytes = packet.len(), "dropped malformed packet")
            }
        }
    }
    Ok(())
}
