use crate::estimator::PositionEstimator;
use crate::prelude::{FeatureVector, PredictionSample, TelemetryError, TelemetryResult};
use crate::smoothing::SharedWindow;

/// Raw and window-averaged position for one CSI frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub raw: PredictionSample,
    pub smoothed: PredictionSample,
}

/// Estimator followed by a smoothing window over its predictions.
pub struct Locator {
    estimator: PositionEstimator,
    window: SharedWindow<PredictionSample>,
}

impl Locator {
    pub fn new(estimator: PositionEstimator, window_size: usize) -> TelemetryResult<Self> {
        Ok(Self {
            estimator,
            window: SharedWindow::with_capacity(window_size)?,
        })
    }

    /// Handle for readers that only need the smoothed position.
    pub fn window(&self) -> SharedWindow<PredictionSample> {
        self.window.clone()
    }

    pub fn feature_count(&self) -> usize {
        self.estimator.expected_feature_count()
    }

    /// Fits the frame to the model width, predicts, and folds the result into
    /// the window.
    pub fn observe(&self, features: &FeatureVector) -> TelemetryResult<Estimate> {
        let input = features.pad_to(self.feature_count());
        let raw = self.estimator.predict(&input)?;
        self.window.push(raw)?;
        let smoothed = self
            .window
            .mean()
            .ok_or_else(|| TelemetryError::Internal("window empty after push".into()))?;
        Ok(Estimate { raw, smoothed })
    }

    pub fn smoothed(&self) -> Option<PredictionSample> {
        self.window.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::Regressor;

    /// Echoes the first two features back as a position.
    struct Echo;

    impl Regressor for Echo {
        fn expected_feature_count(&self) -> usize {
            4
        }

        fn predict(&self, features: &[f32]) -> TelemetryResult<PredictionSample> {
            assert_eq!(features.len(), 4);
            Ok(PredictionSample::new(features[0], features[1]))
        }
    }

    #[test]
    fn locator_smooths_predictions_over_the_window() {
        let locator = Locator::new(PositionEstimator::new(Echo), 3).unwrap();
        assert!(locator.smoothed().is_none());

        let frames = [[1.0, 1.0], [3.0, 3.0], [5.0, 5.0], [7.0, 7.0]];
        let smoothed: Vec<f32> = frames
            .iter()
            .map(|frame| locator.observe(&FeatureVector::new(frame.to_vec())).unwrap())
            .map(|estimate| estimate.smoothed.x)
            .collect();

        assert_eq!(smoothed, vec![1.0, 2.0, 3.0, 5.0]);
        assert_eq!(locator.smoothed(), Some(PredictionSample::new(5.0, 5.0)));
    }

    #[test]
    fn oversized_frames_are_truncated_before_prediction() {
        let locator = Locator::new(PositionEstimator::new(Echo), 1).unwrap();
        let estimate = locator
            .observe(&FeatureVector::new(vec![2.0, 9.0, 1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(estimate.raw, PredictionSample::new(2.0, 9.0));
    }
}
