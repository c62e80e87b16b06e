//! The model the service wraps.
//!
//! Both calls may block, so callers run them on the blocking thread pool.

mod placeholder;

#[cfg(test)]
pub(crate) mod mock;

pub use placeholder::PlaceholderModel;

use crate::error::Result;
use std::fs::File;

/// Result of a prediction, returned to the caller verbatim
pub type Prediction = serde_json::Map<String, serde_json::Value>;

pub trait Model: Send + Sync + 'static {
    /// Prepare whatever the model needs. Runs once at startup and may be slow.
    fn init(&self) -> Result<()>;

    /// Predict from an opened image file
    fn predict(&self, image: &mut File) -> Result<Prediction>;
}
