use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

use super::{Model, Prediction};
use crate::config::ModelConfig;
use crate::error::{Result, ServiceError};

/// Stand-in model: init simulates loading, predict returns a fixed result.
///
/// Replace with a real model by implementing [`Model`].
#[derive(Debug)]
pub struct PlaceholderModel {
    init_delay: Duration,
    init_once: Once,
    initialized: AtomicBool,
}

impl PlaceholderModel {
    pub fn new(init_delay: Duration) -> Self {
        Self {
            init_delay,
            init_once: Once::new(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(Duration::from_millis(config.init_delay_ms))
    }
}

impl Model for PlaceholderModel {
    fn init(&self) -> Result<()> {
        // Concurrent callers wait for the first one to finish
        self.init_once.call_once(|| {
            info!("Initializing placeholder model");
            std::thread::sleep(self.init_delay);
            self.initialized.store(true, Ordering::SeqCst);
        });
        debug!("Placeholder model initialized");
        Ok(())
    }

    fn predict(&self, image: &mut File) -> Result<Prediction> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ServiceError::model("predict called before init"));
        }

        let metadata = image.metadata()?;
        debug!("Placeholder prediction on {} byte image", metadata.len());

        let mut prediction = Prediction::new();
        prediction.insert(
            "someResultCategory".to_string(),
            serde_json::Value::String("actualResultValue".to_string()),
        );
        Ok(prediction)
    }
}
