use crate::estimator::model::Regressor;
use crate::prelude::{PredictionSample, TelemetryError, TelemetryResult};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One labeled fingerprint: amplitudes recorded at a known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub features: Vec<f32>,
    pub position: [f32; 2],
}

impl TrainingRow {
    pub fn new(features: Vec<f32>, position: PredictionSample) -> Self {
        Self {
            features,
            position: [position.x, position.y],
        }
    }
}

/// k-nearest-neighbors regressor with uniform weights and Euclidean distance.
#[derive(Debug, Clone)]
pub struct KnnRegressor {
    k: usize,
    features: Array2<f32>,
    positions: Vec<PredictionSample>,
}

impl KnnRegressor {
    pub fn fit(k: usize, rows: &[TrainingRow]) -> TelemetryResult<Self> {
        if k == 0 {
            return Err(TelemetryError::InvalidInput(
                "k-NN needs at least one neighbor".into(),
            ));
        }
        let width = rows
            .first()
            .map(|row| row.features.len())
            .ok_or_else(|| TelemetryError::InvalidInput("no training rows".into()))?;
        if width == 0 {
            return Err(TelemetryError::InvalidInput(
                "training rows carry no features".into(),
            ));
        }

        let mut flat = Vec::with_capacity(rows.len() * width);
        let mut positions = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if row.features.len() != width {
                return Err(TelemetryError::InvalidInput(format!(
                    "training row {} has {} features, expected {}",
                    idx,
                    row.features.len(),
                    width
                )));
            }
            flat.extend_from_slice(&row.features);
            positions.push(PredictionSample::new(row.position[0], row.position[1]));
        }

        let features = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|err| TelemetryError::Internal(err.to_string()))?;

        Ok(Self {
            k,
            features,
            positions,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn sample_count(&self) -> usize {
        self.positions.len()
    }

    pub fn rows(&self) -> Vec<TrainingRow> {
        self.features
            .rows()
            .into_iter()
            .zip(&self.positions)
            .map(|(row, &position)| TrainingRow::new(row.to_vec(), position))
            .collect()
    }

    fn nearest(&self, query: ArrayView1<f32>) -> Vec<usize> {
        let mut ranked: Vec<(f32, usize)> = self
            .features
            .rows()
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let diff = &row - &query;
                (diff.dot(&diff), idx)
            })
            .collect();
        // Stable sort keeps training order among equidistant rows.
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        ranked
            .into_iter()
            .take(self.k.min(self.positions.len()))
            .map(|(_, idx)| idx)
            .collect()
    }
}

impl Regressor for KnnRegressor {
    fn expected_feature_count(&self) -> usize {
        self.features.ncols()
    }

    fn predict(&self, features: &[f32]) -> TelemetryResult<PredictionSample> {
        if features.len() != self.expected_feature_count() {
            return Err(TelemetryError::FeatureLength {
                expected: self.expected_feature_count(),
                actual: features.len(),
            });
        }
        let neighbors = self.nearest(ArrayView1::from(features));
        let count = neighbors.len() as f32;
        let (sum_x, sum_y) = neighbors.iter().fold((0.0f32, 0.0f32), |acc, &idx| {
            (acc.0 + self.positions[idx].x, acc.1 + self.positions[idx].y)
        });
        Ok(PredictionSample::new(sum_x / count, sum_y / count))
    }
}
