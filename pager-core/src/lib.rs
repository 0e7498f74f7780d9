//! Radio pager message exchange engine.
//! Threads share one transceiver: input queues text, transmit sends it, receive shows
//! what is addressed to this node. Radio drivers plug in through [`Transceiver`].

pub mod air;
pub mod console;
pub mod duty;
pub mod port;
pub mod protocol;
pub mod queue;
pub mod shutdown;
pub mod supervisor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wire;

pub use air::{Air, AirPort};
pub use console::{Console, StdoutConsole};
pub use port::{PortError, SharedPort, Transceiver};
pub use protocol::{InvalidMessage, Message, NodeId, DELIMITER};
pub use queue::OutgoingQueue;
pub use shutdown::{ShutdownReason, ShutdownSignal};
pub use supervisor::{run, Pager, PagerConfig, PagerError, RunningPager, Station, Timing};
pub use wire::{decode_frame, encode_frame, MalformedFrame};
