//! Transceiver boundary: the radio driver trait and the lock that serializes access to it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::protocol::NodeId;

/// Half-duplex radio driver. Implementations need not be safe for concurrent use;
/// the duties only ever reach one through a [`SharedPort`].
pub trait Transceiver: Send {
    /// Tune the radio and bring it up. Called once before any traffic.
    fn initialize(&mut self, frequency_mhz: f64) -> Result<(), PortError>;

    /// Program this node's address register.
    fn set_node_address(&mut self, id: NodeId) -> Result<(), PortError>;

    fn send(&mut self, destination: NodeId, payload: &[u8]) -> Result<(), PortError>;

    /// Wait up to `timeout` for one packet. `Ok(None)` on timeout; must not block past it.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PortError>;
}

/// Channel number for a frequency: whole kHz, so 915.0 and 915.0001 share a channel.
pub fn channel_khz(frequency_mhz: f64) -> u64 {
    (frequency_mhz * 1000.0).round().max(0.0) as u64
}

/// Failure reported by the transceiver. Fatal for the duty that sees it.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("radio i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("radio used before initialize")]
    NotInitialized,
    #[error("radio link closed")]
    Closed,
    #[error("radio lock poisoned by a panicking duty")]
    Poisoned,
    #[error("radio error: {0}")]
    Other(String),
}

/// Longest single driver receive while the port lock is held.
pub const RECEIVE_SLICE: Duration = Duration::from_millis(25);

/// Exclusive-access handle to one transceiver. Every call holds the lock for its duration,
/// so a send and a receive from two duties never interleave inside the driver.
///
/// A receive is polled in [`RECEIVE_SLICE`] steps and the lock is released fairly between
/// steps, so a waiting send gets the radio within one slice.
pub struct SharedPort<T: Transceiver> {
    inner: Arc<Mutex<T>>,
}

impl<T: Transceiver> Clone for SharedPort<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transceiver> SharedPort<T> {
    pub fn new(transceiver: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transceiver)),
        }
    }

    pub fn initialize(&self, frequency_mhz: f64) -> Result<(), PortError> {
        self.inner.lock().initialize(frequency_mhz)
    }

    pub fn set_node_address(&self, id: NodeId) -> Result<(), PortError> {
        self.inner.lock().set_node_address(id)
    }

    pub fn send(&self, destination: NodeId, payload: &[u8]) -> Result<(), PortError> {
        self.inner.lock().send(destination, payload)
    }

    /// Wait up to `timeout` for one packet, giving the radio up between slices.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Vec<u8>>, PortError> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut port = self.inner.lock();
            let slice = deadline
                .saturating_duration_since(Instant::now())
                .min(RECEIVE_SLICE);
            let packet = port.receive(slice)?;
            MutexGuard::unlock_fair(port);
            if packet.is_some() || Instant::now() >= deadline {
                return Ok(packet);
            }
        }
    }
}
