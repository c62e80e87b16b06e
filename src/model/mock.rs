use parking_lot::Mutex;
use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use super::{Model, Prediction};
use crate::error::{Result, ServiceError};

/// Model that counts calls and can hold init until released
pub(crate) struct MockModel {
    pub init_calls: AtomicUsize,
    pub predict_calls: AtomicUsize,
    fail_init: bool,
    fail_predict: bool,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            init_calls: AtomicUsize::new(0),
            predict_calls: AtomicUsize::new(0),
            fail_init: false,
            fail_predict: false,
            gate: Mutex::new(None),
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    pub fn failing_predict() -> Self {
        Self {
            fail_predict: true,
            ..Self::new()
        }
    }

    /// Init blocks until the returned sender fires or is dropped
    pub fn gated() -> (Self, mpsc::Sender<()>) {
        let (release, gate) = mpsc::channel();
        let model = Self {
            gate: Mutex::new(Some(gate)),
            ..Self::new()
        };
        (model, release)
    }

    pub fn predictions(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }
}

impl Model for MockModel {
    fn init(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        if self.fail_init {
            return Err(ServiceError::model("weights missing"));
        }
        Ok(())
    }

    fn predict(&self, image: &mut File) -> Result<Prediction> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_predict {
            return Err(ServiceError::model("inference crashed"));
        }

        let mut contents = String::new();
        image.read_to_string(&mut contents)?;

        let mut prediction = Prediction::new();
        prediction.insert("label".to_string(), serde_json::json!(contents.trim()));
        Ok(prediction)
    }
}
