use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

const NOT_READY: u8 = 0;
const READY: u8 = 1;
const CLOSED: u8 = 2;

/// Whether the model has finished initialization and may serve predictions.
///
/// Readiness only moves forward: not ready, then ready once init completes,
/// then closed at shutdown. Once closed the flag can never become ready again,
/// so a model init that finishes late cannot reopen a service that is going down.
#[derive(Debug, Default)]
pub struct ReadinessState {
    state: AtomicU8,
}

impl ReadinessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True between a successful model init and the start of shutdown
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Flip to ready. Returns false if shutdown already closed the flag.
    pub fn mark_ready(&self) -> bool {
        match self
            .state
            .compare_exchange(NOT_READY, READY, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!("Readiness set to ready_to_predict=true");
                true
            }
            Err(current) => current == READY,
        }
    }

    /// Flip to not ready for good
    pub fn close(&self) {
        let previous = self.state.swap(CLOSED, Ordering::AcqRel);
        if previous == READY {
            debug!("Readiness set to ready_to_predict=false");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }
}
