use crate::prelude::FeatureVector;

/// One accepted telemetry line.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    /// Subcarrier amplitudes from a sentinel-prefixed CSI frame.
    Csi(FeatureVector),
    /// Scalar range reading from a labeled `Distance:` token.
    Distance(f32),
}

impl TelemetryRecord {
    pub fn as_features(&self) -> Option<&FeatureVector> {
        match self {
            TelemetryRecord::Csi(features) => Some(features),
            TelemetryRecord::Distance(_) => None,
        }
    }

    pub fn as_distance(&self) -> Option<f32> {
        match self {
            TelemetryRecord::Distance(value) => Some(*value),
            TelemetryRecord::Csi(_) => None,
        }
    }
}
