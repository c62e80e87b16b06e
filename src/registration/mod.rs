//! Coordinator registration and liveness tracking.
//!
//! A [`RegistrationSession`] alternates between two mutually exclusive phases:
//! the [`RegistrationClient`] retries registration until the coordinator accepts
//! it, then the [`LivenessMonitor`] probes the coordinator until a probe fails and
//! hands control back. Both phases stop at the next check once the shutdown token
//! is cancelled.

mod client;
mod coordinator;
mod identity;
mod monitor;
mod session;
mod state;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use client::RegistrationClient;
pub use coordinator::{CoordinatorApi, HttpCoordinator, RegisterRequest};
pub use identity::ServiceIdentity;
pub use monitor::LivenessMonitor;
pub use session::{RegistrationSession, SessionTiming};
pub use state::{ConnectionState, ConnectionTracker};
