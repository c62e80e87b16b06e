use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Where the service stands with its coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Unregistered,
    Registering,
    Connected,
    Disconnected,
    /// Terminal, entered once shutdown is signalled
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unregistered => "unregistered",
            Self::Registering => "registering",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared view of the connection state.
///
/// Only the active registration phase writes; any number of readers can
/// borrow the current value or subscribe to changes.
#[derive(Debug)]
pub struct ConnectionTracker {
    state: watch::Sender<ConnectionState>,
    registration_attempts: AtomicU64,
    probes_sent: AtomicU64,
    last_contact: Mutex<Option<DateTime<Utc>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Unregistered);
        Self {
            state,
            registration_attempts: AtomicU64::new(0),
            probes_sent: AtomicU64::new(0),
            last_contact: Mutex::new(None),
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current() == ConnectionState::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Move to `next`. Nothing leaves `Stopped`. Returns whether the state changed.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Stopped || *current == next {
                return false;
            }
            debug!("Connection state changed: {} -> {}", current, next);
            *current = next;
            true
        })
    }

    pub(crate) fn record_registration_attempt(&self) {
        self.registration_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_probe(&self) {
        self.probes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_contact(&self) {
        *self.last_contact.lock() = Some(Utc::now());
    }

    pub fn registration_attempts(&self) -> u64 {
        self.registration_attempts.load(Ordering::Relaxed)
    }

    pub fn probes_sent(&self) -> u64 {
        self.probes_sent.load(Ordering::Relaxed)
    }

    /// Time of the last successful registration or probe
    pub fn last_contact(&self) -> Option<DateTime<Utc>> {
        *self.last_contact.lock()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
