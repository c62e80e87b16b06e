use super::ComponentState;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifecycle state per component, shared with the HTTP health endpoint
#[derive(Debug, Clone, Default)]
pub struct ComponentStates {
    states: Arc<Mutex<HashMap<&'static str, ComponentState>>>,
}

impl ComponentStates {
    pub async fn set(&self, component: &'static str, state: ComponentState) {
        let mut states = self.states.lock().await;
        states.insert(component, state);
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Set `state` unless the component already failed
    pub async fn settle(&self, component: &'static str, state: ComponentState) {
        let mut states = self.states.lock().await;
        if states.get(component) != Some(&ComponentState::Failed) {
            states.insert(component, state);
            debug!("Component '{}' state changed to: {:?}", component, state);
        }
    }

    pub async fn get(&self, component: &str) -> Option<ComponentState> {
        let states = self.states.lock().await;
        states.get(component).copied()
    }

    /// Ordered copy for reporting
    pub async fn snapshot(&self) -> BTreeMap<&'static str, ComponentState> {
        let states = self.states.lock().await;
        states.iter().map(|(k, v)| (*k, *v)).collect()
    }
}
