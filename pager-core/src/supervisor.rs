//! Supervisor: brings the radio up, runs the duties on their own threads and tears the
//! session down once the shutdown signal is set.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::console::Console;
use crate::duty::{self, InputEnd};
use crate::port::{PortError, SharedPort, Transceiver};
use crate::protocol::NodeId;
use crate::queue::OutgoingQueue;
use crate::shutdown::{ShutdownReason, ShutdownSignal};

/// Blocking-call timeouts. Shutdown latency of each duty is bounded by its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Longest wait for an outgoing message before re-checking shutdown.
    pub transmit_poll: Duration,
    /// Longest wait for an inbound packet.
    pub receive_poll: Duration,
    /// Supervisor's idle wait between shutdown checks.
    pub idle_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            transmit_poll: Duration::from_secs(1),
            receive_poll: Duration::from_millis(500),
            idle_poll: Duration::from_millis(100),
        }
    }
}

/// Everything the duties share: addresses, queue, signal, radio and console.
/// Cloning hands out another reference to the same session.
pub struct Station<T: Transceiver> {
    pub node_id: NodeId,
    pub dest: NodeId,
    pub queue: Arc<OutgoingQueue>,
    pub shutdown: ShutdownSignal,
    pub port: SharedPort<T>,
    pub console: Arc<dyn Console>,
    pub timing: Timing,
}

impl<T: Transceiver> Clone for Station<T> {
    fn clone(&self) -> Self {
        Self {
            node_id: self.node_id,
            dest: self.dest,
            queue: self.queue.clone(),
            shutdown: self.shutdown.clone(),
            port: self.port.clone(),
            console: self.console.clone(),
            timing: self.timing,
        }
    }
}

impl<T: Transceiver> Station<T> {
    pub fn new(
        node_id: NodeId,
        dest: NodeId,
        transceiver: T,
        console: Arc<dyn Console>,
        timing: Timing,
    ) -> Self {
        Self {
            node_id,
            dest,
            queue: Arc::new(OutgoingQueue::new()),
            shutdown: ShutdownSignal::new(),
            port: SharedPort::new(transceiver),
            console,
            timing,
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagerConfig {
    pub node_id: NodeId,
    /// Destination of every outgoing message.
    pub dest: NodeId,
    pub frequency_mhz: f64,
    pub timing: Timing,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            dest: 2,
            frequency_mhz: 915.0,
            timing: Timing::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PagerError {
    #[error("radio setup failed: {0}")]
    Setup(#[source] PortError),
    #[error("radio failed: {0}")]
    Port(#[from] PortError),
    #[error("could not start {name} duty: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} duty panicked")]
    Panicked(&'static str),
}

/// A pager session that has not started yet.
pub struct Pager<T: Transceiver> {
    frequency_mhz: f64,
    station: Station<T>,
}

impl<T: Transceiver + 'static> Pager<T> {
    pub fn new(config: PagerConfig, transceiver: T, console: Arc<dyn Console>) -> Self {
        Self {
            frequency_mhz: config.frequency_mhz,
            station: Station::new(
                config.node_id,
                config.dest,
                transceiver,
                console,
                config.timing,
            ),
        }
    }

    /// Handle for triggering shutdown from outside, e.g. a signal handler.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.station.shutdown.clone()
    }

    /// Initialize the radio once, then start the three duties. `input` supplies operator lines.
    pub fn start<R>(self, input: R) -> Result<RunningPager, PagerError>
    where
        R: BufRead + Send + 'static,
    {
        let station = self.station;
        station
            .port
            .initialize(self.frequency_mhz)
            .map_err(PagerError::Setup)?;
        station
            .port
            .set_node_address(station.node_id)
            .map_err(PagerError::Setup)?;
        tracing::info!(
            frequency_mhz = self.frequency_mhz,
            node_id = station.node_id,
            dest = station.dest,
            "radio initialized"
        );
        station.console.started(self.frequency_mhz, station.node_id);

        let transmit = spawn(&station, "transmit", |s| duty::run_transmit(&s))?;
        let receive = spawn(&station, "receive", |s| duty::run_receive(&s))?;
        let input = spawn(&station, "input", move |s| duty::run_input(&s, input))?;

        Ok(RunningPager {
            shutdown: station.shutdown.clone(),
            console: station.console.clone(),
            idle_poll: station.timing.idle_poll,
            transmit,
            receive,
            input,
        })
    }
}

fn spawn<T, F, O>(
    station: &Station<T>,
    name: &'static str,
    work: F,
) -> Result<JoinHandle<O>, PagerError>
where
    T: Transceiver + 'static,
    F: FnOnce(Station<T>) -> O + Send + 'static,
    O: Send + 'static,
{
    let s = station.clone();
    std::thread::Builder::new()
        .name(format!("pager-{name}"))
        .spawn(move || work(s))
        .map_err(|source| {
            // Duties already running see this and wind down.
            station.shutdown.signal(ShutdownReason::DutyFailed);
            PagerError::Spawn { name, source }
        })
}

/// A started session.
pub struct RunningPager {
    shutdown: ShutdownSignal,
    console: Arc<dyn Console>,
    idle_poll: Duration,
    transmit: JoinHandle<Result<(), PortError>>,
    receive: JoinHandle<Result<(), PortError>>,
    input: JoinHandle<InputEnd>,
}

impl RunningPager {
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Block until shutdown, then join the radio duties. They are never interrupted mid-call;
    /// each returns after its current poll times out.
    ///
    /// The input duty is joined only if it already finished: it may be blocked reading the
    /// terminal, and there is no way to wake it.
    pub fn wait(self) -> Result<ShutdownReason, PagerError> {
        while !self.shutdown.wait_timeout(self.idle_poll) {
            // A duty that ends without setting the signal has panicked.
            if self.transmit.is_finished()
                || self.receive.is_finished()
                || self.input.is_finished()
            {
                self.shutdown.signal(ShutdownReason::DutyFailed);
            }
        }
        let reason = self.shutdown.reason().unwrap_or(ShutdownReason::Interrupted);
        tracing::info!(?reason, "shutting down");

        let transmit = self.transmit.join();
        let receive = self.receive.join();
        let input_ok = if self.input.is_finished() {
            match self.input.join() {
                Ok(end) => {
                    tracing::debug!(?end, "input duty finished");
                    true
                }
                Err(_) => {
                    tracing::error!("input duty panicked");
                    false
                }
            }
        } else {
            tracing::debug!("input duty still waiting on operator input; leaving it");
            true
        };
        self.console.stopped(Some(reason));

        transmit.map_err(|_| PagerError::Panicked("transmit"))??;
        receive.map_err(|_| PagerError::Panicked("receive"))??;
        if !input_ok {
            return Err(PagerError::Panicked("input"));
        }
        Ok(reason)
    }
}

/// Start a session and wait for it to end.
pub fn run<T, R>(
    config: PagerConfig,
    transceiver: T,
    console: Arc<dyn Console>,
    input: R,
) -> Result<ShutdownReason, PagerError>
where
    T: Transceiver + 'static,
    R: BufRead + Send + 'static,
{
    Pager::new(config, transceiver, console).start(input)?.wait()
}
