//! In-process radio medium. Every [`AirPort`] tuned to the same channel hears what the
//! others transmit, like nodes sharing one band. Used by tests and local demos.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::port::{channel_khz, PortError, Transceiver};
use crate::protocol::NodeId;

/// One packet put on the air, as seen by an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    pub channel_khz: u64,
    pub destination: NodeId,
    pub payload: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct Air {
    state: Arc<Mutex<AirState>>,
}

#[derive(Default)]
struct AirState {
    stations: Vec<Station>,
    log: Vec<Transmission>,
}

struct Station {
    channel_khz: Option<u64>,
    inbox: Sender<Vec<u8>>,
}

impl Air {
    pub fn new() -> Self {
        Self::default()
    }

    /// New transceiver attached to this medium. It hears nothing until initialized.
    pub fn port(&self) -> AirPort {
        let (tx, rx) = channel();
        let station = match self.state.lock() {
            Ok(mut s) => {
                s.stations.push(Station {
                    channel_khz: None,
                    inbox: tx,
                });
                s.stations.len() - 1
            }
            Err(_) => usize::MAX,
        };
        AirPort {
            air: self.clone(),
            station,
            inbox: rx,
            channel_khz: None,
            address: None,
        }
    }

    /// Put raw bytes on a channel as if some other transmitter sent them.
    pub fn inject(&self, frequency_mhz: f64, payload: &[u8]) -> Result<(), PortError> {
        self.broadcast(None, channel_khz(frequency_mhz), NodeId::MAX, payload)
    }

    /// Everything transmitted so far, oldest first.
    pub fn transmissions(&self) -> Vec<Transmission> {
        self.lock().map(|s| s.log.clone()).unwrap_or_default()
    }

    fn broadcast(
        &self,
        from: Option<usize>,
        channel: u64,
        destination: NodeId,
        payload: &[u8],
    ) -> Result<(), PortError> {
        let mut state = self.lock()?;
        state.log.push(Transmission {
            channel_khz: channel,
            destination,
            payload: payload.to_vec(),
        });
        for (i, station) in state.stations.iter().enumerate() {
            if Some(i) == from || station.channel_khz != Some(channel) {
                continue;
            }
            // A detached receiver just misses the packet.
            let _ = station.inbox.send(payload.to_vec());
        }
        Ok(())
    }

    fn tune(&self, station: usize, channel: u64) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let s = state.stations.get_mut(station).ok_or(PortError::Closed)?;
        s.channel_khz = Some(channel);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, AirState>, PortError> {
        self.state.lock().map_err(|_| PortError::Poisoned)
    }
}

/// Transceiver on an [`Air`]. A node never hears its own transmissions.
pub struct AirPort {
    air: Air,
    station: usize,
    inbox: Receiver<Vec<u8>>,
    channel_khz: Option<u64>,
    address: Option<NodeId>,
}

impl AirPort {
    pub fn address(&self) -> Option<NodeId> {
        self.address
    }
}

impl Transceiver for AirPort {
    fn initialize(&mut self, frequency_mhz: f64) -> Result<(), PortError> {
        let channel = channel_khz(frequency_mhz);
        self.air.tune(self.station, channel)?;
        self.channel_khz = Some(channel);
        Ok(())
    }

    fn set_node_address(&mut self, id: NodeId) -> Result<(), PortError> {
        self.address = Some(id);
        Ok(())
    }

    fn send(&mut self, destination: NodeId, payload: &[u8]) -> Result<(), PortError> {
        let channel = self.channel_khz.ok_or(PortError::NotInitialized)?;
        self.air
            .broadcast(Some(self.station), channel, destination, payload)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PortError> {
        if self.channel_khz.is_none() {
            return Err(PortError::NotInitialized);
        }
        match self.inbox.recv_timeout(timeout) {
            Ok(packet) => Ok(Some(packet)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PortError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn broadcast_reaches_other_stations_on_the_channel() {
        let air = Air::new();
        let mut a = air.port();
        let mut b = air.port();
        let mut c = air.port();
        a.initialize(915.0).unwrap();
        b.initialize(915.0).unwrap();
        c.initialize(868.0).unwrap();

        a.send(2, b"ping").unwrap();
        assert_eq!(b.receive(SHORT).unwrap(), Some(b"ping".to_vec()));
        assert_eq!(c.receive(SHORT).unwrap(), None);
        assert_eq!(a.receive(SHORT).unwrap(), None);

        let log = air.transmissions();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].destination, 2);
        assert_eq!(log[0].channel_khz, 915_000);
    }

    #[test]
    fn uninitialized_port_refuses_traffic() {
        let air = Air::new();
        let mut a = air.port();
        assert!(matches!(a.send(1, b"x"), Err(PortError::NotInitialized)));
        assert!(matches!(a.receive(SHORT), Err(PortError::NotInitialized)));
    }

    #[test]
    fn injected_packets_are_heard() {
        let air = Air::new();
        let mut a = air.port();
        a.initialize(433.92).unwrap();
        a.set_node_address(4).unwrap();
        air.inject(433.92, b"junk").unwrap();
        assert_eq!(a.receive(SHORT).unwrap(), Some(b"junk".to_vec()));
        assert_eq!(a.address(), Some(4));
    }
}
