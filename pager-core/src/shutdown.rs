//! Shutdown signal: one-way flag every duty polls between blocking calls.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Why the session is ending. Only the first reason is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Operator typed `exit` or `quit`.
    OperatorQuit,
    /// Operator input reached end-of-file or could not be read.
    EndOfInput,
    /// Interrupt or terminate signal from the environment.
    Interrupted,
    /// The transceiver failed; nothing more can be sent or received.
    PortFailure,
    /// A duty could not be started or died unexpectedly.
    DutyFailed,
}

/// Cloneable handle; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    reason: Arc<OnceLock<ShutdownReason>>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that actually set it.
    pub fn signal(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            tracing::debug!(?reason, "shutdown signalled");
        }
        first
    }

    pub fn is_set(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Sleep until the flag is set or `timeout` elapses. Returns whether it is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_set() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
