//! Radio link over UDP multicast: one multicast group is the band, the UDP port is the channel.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use pager_core::port::channel_khz;
use pager_core::{NodeId, PortError, Transceiver};
use socket2::{Domain, Protocol, Socket, Type};

/// Channels span this many kHz above the base port.
const CHANNEL_SPAN_KHZ: u64 = 10_000;
const MAX_DATAGRAM: usize = 2048;
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Transceiver that puts each frame on a multicast group as one datagram.
/// Every node on the same group and frequency hears it, including other nodes on this host.
pub struct UdpRadio {
    group: Ipv4Addr,
    base_port: u16,
    link: Option<Link>,
    node_id: Option<NodeId>,
    buf: Vec<u8>,
}

struct Link {
    socket: UdpSocket,
    dest: SocketAddrV4,
}

impl UdpRadio {
    pub fn new(group: Ipv4Addr, base_port: u16) -> Self {
        Self {
            group,
            base_port,
            link: None,
            node_id: None,
            buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    fn link(&self) -> Result<&Link, PortError> {
        self.link.as_ref().ok_or(PortError::NotInitialized)
    }
}

/// UDP port carrying a frequency's channel.
pub fn channel_port(base_port: u16, frequency_mhz: f64) -> Result<u16, PortError> {
    let offset = channel_khz(frequency_mhz) % CHANNEL_SPAN_KHZ;
    u16::try_from(u64::from(base_port) + offset).map_err(|_| {
        PortError::Other(format!(
            "frequency {frequency_mhz} MHz maps past the last UDP port from base {base_port}"
        ))
    })
}

fn make_multicast_socket(group: Ipv4Addr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    // Several nodes on one host share the channel port.
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())?;
    let socket: UdpSocket = socket.into();
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_ttl_v4(1)?;
    socket.set_multicast_loop_v4(true)?;
    Ok(socket)
}

impl Transceiver for UdpRadio {
    fn initialize(&mut self, frequency_mhz: f64) -> Result<(), PortError> {
        let port = channel_port(self.base_port, frequency_mhz)?;
        let socket = make_multicast_socket(self.group, port)?;
        tracing::debug!(group = %self.group, port, frequency_mhz, "joined radio channel");
        self.link = Some(Link {
            socket,
            dest: SocketAddrV4::new(self.group, port),
        });
        Ok(())
    }

    fn set_node_address(&mut self, id: NodeId) -> Result<(), PortError> {
        self.node_id = Some(id);
        Ok(())
    }

    // The group carries every frame; receivers filter by the address inside it.
    fn send(&mut self, destination: NodeId, payload: &[u8]) -> Result<(), PortError> {
        let link = self.link()?;
        let n = link.socket.send_to(payload, link.dest)?;
        if n != payload.len() {
            return Err(PortError::Other(format!(
                "short send to node {destination}: {n} of {} bytes",
                payload.len()
            )));
        }
        tracing::trace!(from = ?self.node_id, to = destination, bytes = n, "datagram sent");
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PortError> {
        let link = self.link.as_ref().ok_or(PortError::NotInitialized)?;
        link.socket
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
        match link.socket.recv_from(&mut self.buf) {
            Ok((n, _from)) => Ok(Some(self.buf[..n].to_vec())),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequencies_map_to_distinct_ports() {
        assert_eq!(channel_port(40000, 915.0).unwrap(), 45000);
        assert_eq!(channel_port(40000, 868.0).unwrap(), 48000);
        assert_eq!(channel_port(40000, 433.92).unwrap(), 43920);
        assert_eq!(channel_port(40000, 915.0004).unwrap(), 45000);
    }

    #[test]
    fn port_overflow_is_an_error() {
        assert!(channel_port(60000, 869.525).is_err());
    }

    #[test]
    fn unused_radio_refuses_traffic() {
        let mut radio = UdpRadio::new(Ipv4Addr::new(239, 255, 42, 99), 40000);
        assert!(matches!(radio.send(2, b"x"), Err(PortError::NotInitialized)));
        assert!(matches!(
            radio.receive(Duration::from_millis(1)),
            Err(PortError::NotInitialized)
        ));
    }
}
