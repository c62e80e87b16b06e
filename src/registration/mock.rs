use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

use super::{ConnectionState, ConnectionTracker, CoordinatorApi, ServiceIdentity};
use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Register,
    Probe,
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub kind: CallKind,
    pub succeeded: bool,
    pub at: Instant,
    /// Connection state observed when the call was issued
    pub state: Option<ConnectionState>,
}

/// Coordinator whose answers are scripted up front.
///
/// Once a script runs dry, registrations use the fallback answer and probes succeed.
pub(crate) struct ScriptedCoordinator {
    register_script: Mutex<VecDeque<bool>>,
    probe_script: Mutex<VecDeque<bool>>,
    register_fallback: bool,
    calls: Mutex<Vec<Call>>,
    tracker: Option<Arc<ConnectionTracker>>,
}

impl ScriptedCoordinator {
    pub fn new() -> Self {
        Self {
            register_script: Mutex::new(VecDeque::new()),
            probe_script: Mutex::new(VecDeque::new()),
            register_fallback: true,
            calls: Mutex::new(Vec::new()),
            tracker: None,
        }
    }

    /// Record the tracker's state alongside every call
    pub fn observing(mut self, tracker: Arc<ConnectionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn register_results(self, results: &[bool]) -> Self {
        self.register_script.lock().extend(results.iter().copied());
        self
    }

    pub fn probe_results(self, results: &[bool]) -> Self {
        self.probe_script.lock().extend(results.iter().copied());
        self
    }

    pub fn register_fallback(mut self, succeed: bool) -> Self {
        self.register_fallback = succeed;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.lock().iter().filter(|c| c.kind == kind).count()
    }

    pub fn successes(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind == kind && c.succeeded)
            .count()
    }

    fn answer(&self, kind: CallKind) -> Result<()> {
        let succeeded = match kind {
            CallKind::Register => self
                .register_script
                .lock()
                .pop_front()
                .unwrap_or(self.register_fallback),
            CallKind::Probe => self
                .probe_script
                .lock()
                .pop_front()
                .unwrap_or(true),
        };

        self.calls.lock().push(Call {
            kind,
            succeeded,
            at: Instant::now(),
            state: self.tracker.as_ref().map(|t| t.current()),
        });

        if succeeded {
            Ok(())
        } else {
            Err(ServiceError::Coordinator {
                operation: "scripted",
                status: 503,
            })
        }
    }
}

#[async_trait]
impl CoordinatorApi for ScriptedCoordinator {
    async fn register(&self, _identity: &ServiceIdentity) -> Result<()> {
        self.answer(CallKind::Register)
    }

    async fn probe(&self, _identity: &ServiceIdentity) -> Result<()> {
        self.answer(CallKind::Probe)
    }
}

pub(crate) fn test_identity() -> ServiceIdentity {
    ServiceIdentity {
        name: "test-model".to_string(),
        listen_port: 8000,
        coordinator_address: "127.0.0.1".to_string(),
        coordinator_port: 5000,
    }
}
