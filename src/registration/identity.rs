use serde::Serialize;
use std::fmt;

/// Who this service is and where its coordinator lives. Fixed after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub listen_port: u16,
    pub coordinator_address: String,
    pub coordinator_port: u16,
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.name, self.listen_port, self.coordinator_address, self.coordinator_port
        )
    }
}
