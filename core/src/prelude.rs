use serde::{Deserialize, Serialize};

/// Fixed-width amplitude vector parsed from one CSI record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Returns a copy zero-filled or truncated to exactly `len` values.
    pub fn pad_to(&self, len: usize) -> Self {
        let mut values = self.values.clone();
        values.resize(len, 0.0);
        Self { values }
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Smoothed or raw (x, y) estimate in training-label units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionSample {
    pub x: f32,
    pub y: f32,
}

impl PredictionSample {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Common error type for the telemetry core.
#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("feature length mismatch: expected {expected}, got {actual}")]
    FeatureLength { expected: usize, actual: usize },
    #[error("model artifact {path}: {reason}")]
    Model { path: String, reason: String },
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
