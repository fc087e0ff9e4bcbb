use crate::prelude::PredictionSample;

pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    pub fn planar_distance(a: PredictionSample, b: PredictionSample) -> f32 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    /// Mean Euclidean error between paired estimates and ground truth.
    pub fn mean_error_distance(pairs: &[(PredictionSample, PredictionSample)]) -> Option<f32> {
        if pairs.is_empty() {
            return None;
        }
        let total: f32 = pairs
            .iter()
            .map(|&(predicted, actual)| Self::planar_distance(predicted, actual))
            .sum();
        Some(total / pairs.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn mean_error_distance_averages_planar_errors() {
        let pairs = [
            (PredictionSample::new(3.0, 4.0), PredictionSample::new(0.0, 0.0)),
            (PredictionSample::new(1.0, 1.0), PredictionSample::new(1.0, 2.0)),
        ];
        assert_eq!(StatsHelper::mean_error_distance(&pairs), Some(3.0));
        assert_eq!(StatsHelper::mean_error_distance(&[]), None);
    }
}
