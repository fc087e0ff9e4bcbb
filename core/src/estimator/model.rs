use crate::estimator::knn::{KnnRegressor, TrainingRow};
use crate::prelude::{FeatureVector, PredictionSample, TelemetryError, TelemetryResult};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Frozen mapping from a fixed-width feature vector to a planar position.
pub trait Regressor: Send + Sync {
    fn expected_feature_count(&self) -> usize;
    fn predict(&self, features: &[f32]) -> TelemetryResult<PredictionSample>;
}

/// On-disk layout of a trained k-NN model.
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    k: usize,
    feature_count: usize,
    rows: Vec<TrainingRow>,
}

/// Read-only position estimator loaded once at startup.
pub struct PositionEstimator {
    regressor: Box<dyn Regressor>,
}

impl PositionEstimator {
    pub fn new<R: Regressor + 'static>(regressor: R) -> Self {
        Self {
            regressor: Box::new(regressor),
        }
    }

    /// Loads a k-NN artifact. Any failure here is fatal for the caller.
    pub fn load<P: AsRef<Path>>(path: P) -> TelemetryResult<Self> {
        let path_ref = path.as_ref();
        let model_error = |reason: String| TelemetryError::Model {
            path: path_ref.display().to_string(),
            reason,
        };

        let contents = fs::read_to_string(path_ref).map_err(|err| model_error(err.to_string()))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&contents).map_err(|err| model_error(err.to_string()))?;
        if let Some(row) = artifact
            .rows
            .iter()
            .find(|row| row.features.len() != artifact.feature_count)
        {
            return Err(model_error(format!(
                "row with {} features in a {}-feature model",
                row.features.len(),
                artifact.feature_count
            )));
        }
        let regressor =
            KnnRegressor::fit(artifact.k, &artifact.rows).map_err(|err| model_error(err.to_string()))?;

        LogManager::new("estimator").record(&format!(
            "loaded k-NN model from {} (k={}, {} samples, {} features)",
            path_ref.display(),
            regressor.k(),
            regressor.sample_count(),
            artifact.feature_count
        ));
        Ok(Self::new(regressor))
    }

    pub fn expected_feature_count(&self) -> usize {
        self.regressor.expected_feature_count()
    }

    /// Maps one feature vector to a position. The vector must already have
    /// the model's width; no reshaping happens here.
    pub fn predict(&self, features: &FeatureVector) -> TelemetryResult<PredictionSample> {
        let expected = self.expected_feature_count();
        if features.len() != expected {
            return Err(TelemetryError::FeatureLength {
                expected,
                actual: features.len(),
            });
        }
        self.regressor.predict(features.as_slice())
    }
}

/// Writes a trained k-NN model so that [`PositionEstimator::load`] can read it.
pub fn save_knn<P: AsRef<Path>>(model: &KnnRegressor, path: P) -> TelemetryResult<()> {
    let path_ref = path.as_ref();
    let artifact = ModelArtifact {
        k: model.k(),
        feature_count: model.expected_feature_count(),
        rows: model.rows(),
    };
    let encoded = serde_json::to_string(&artifact).map_err(|err| TelemetryError::Model {
        path: path_ref.display().to_string(),
        reason: err.to_string(),
    })?;
    if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path_ref, encoded)?;
    Ok(())
}
