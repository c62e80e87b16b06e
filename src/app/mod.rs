mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::ServiceOrchestrator;
pub use runtime::ShutdownTrigger;
pub use state::ComponentStates;
pub use types::{
    ComponentState, ShutdownReason, ShutdownReport, StartupAck, HTTP_COMPONENT, MODEL_COMPONENT,
    REGISTRATION_COMPONENT,
};
