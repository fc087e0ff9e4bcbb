//! Telemetry ingest, smoothing and position-estimation core for the CSI station.
//!
//! Lines arrive from an embedded radio node over a serial link, are parsed into
//! feature vectors or distance readings, averaged over a sliding window, and
//! optionally mapped to a 2D position by a pretrained k-NN regressor.

pub mod dataset;
pub mod display;
pub mod estimator;
pub mod ingest;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod smoothing;
pub mod telemetry;
pub mod transport;

pub use prelude::{FeatureVector, PredictionSample, TelemetryError, TelemetryResult};
