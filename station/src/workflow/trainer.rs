use crate::workflow::config::StationConfig;
use anyhow::Context;
use csicore::dataset::{find_dataset_files, load_training_set};
use csicore::estimator::{save_knn, KnnRegressor, Regressor, TrainingRow};
use csicore::math::StatsHelper;
use csicore::prelude::{PredictionSample, TelemetryResult};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::{Path, PathBuf};

pub struct TrainingReport {
    pub files: usize,
    pub samples: usize,
    pub dropped: usize,
    pub train: usize,
    pub test: usize,
    pub feature_count: usize,
    /// Mean planar error on the held-out rows, absent when nothing was held out.
    pub mean_error: Option<f32>,
    pub model_path: PathBuf,
}

/// Seeded shuffle, then the first `ceil(n * test_fraction)` rows become the
/// test split. Too few rows to hold any out means everything trains.
pub fn split_rows(
    rows: &[TrainingRow],
    test_fraction: f32,
    seed: u64,
) -> (Vec<TrainingRow>, Vec<TrainingRow>) {
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut test_count = (rows.len() as f32 * test_fraction).ceil() as usize;
    if test_count >= rows.len() {
        test_count = 0;
    }
    let (test_idx, train_idx) = indices.split_at(test_count);
    let pick = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<_>>();
    (pick(train_idx), pick(test_idx))
}

pub fn train(
    config: &StationConfig,
    data_dir: &Path,
    model_path: &Path,
) -> anyhow::Result<TrainingReport> {
    let files = find_dataset_files(data_dir)
        .with_context(|| format!("listing datasets in {}", data_dir.display()))?;
    anyhow::ensure!(
        !files.is_empty(),
        "no csi_data_x*.csv files found in {}",
        data_dir.display()
    );
    let set = load_training_set(&files).context("loading training data")?;

    let (train_rows, test_rows) = split_rows(
        &set.rows,
        config.training.test_fraction,
        config.training.seed,
    );
    let model = KnnRegressor::fit(config.training.neighbors, &train_rows)
        .context("fitting k-NN model")?;

    let pairs = test_rows
        .iter()
        .map(|row| {
            let actual = PredictionSample::new(row.position[0], row.position[1]);
            Ok((model.predict(&row.features)?, actual))
        })
        .collect::<TelemetryResult<Vec<_>>>()
        .context("evaluating held-out rows")?;

    save_knn(&model, model_path)
        .with_context(|| format!("saving model {}", model_path.display()))?;

    Ok(TrainingReport {
        files: set.files,
        samples: set.rows.len(),
        dropped: set.dropped,
        train: train_rows.len(),
        test: test_rows.len(),
        feature_count: set.feature_count(),
        mean_error: StatsHelper::mean_error_distance(&pairs),
        model_path: model_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::synthetic::amplitude_profile;
    use csicore::dataset::{dataset_file_name, DatasetWriter};
    use csicore::estimator::PositionEstimator;
    use csicore::prelude::FeatureVector;

    fn rows(count: usize) -> Vec<TrainingRow> {
        (0..count)
            .map(|i| TrainingRow::new(vec![i as f32], PredictionSample::new(i as f32, 0.0)))
            .collect()
    }

    #[test]
    fn split_holds_out_the_rounded_up_fraction() {
        let (train, test) = split_rows(&rows(11), 0.2, 42);
        assert_eq!((train.len(), test.len()), (8, 3));

        let mut seen: Vec<f32> = train.iter().chain(&test).map(|r| r.features[0]).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..11).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        assert_eq!(split_rows(&rows(20), 0.2, 7), split_rows(&rows(20), 0.2, 7));
    }

    #[test]
    fn single_row_trains_without_holdout() {
        let (train, test) = split_rows(&rows(1), 0.2, 42);
        assert_eq!((train.len(), test.len()), (1, 0));
    }

    #[test]
    fn training_on_collected_files_produces_a_loadable_model() {
        let dir = tempfile::tempdir().unwrap();
        let width = 8;
        for (x, y) in [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)] {
            let label = PredictionSample::new(x, y);
            let mut writer =
                DatasetWriter::create(dir.path().join(dataset_file_name(label)), width, label)
                    .unwrap();
            for _ in 0..10 {
                writer
                    .append(&FeatureVector::new(amplitude_profile(width, label)))
                    .unwrap();
            }
            writer.flush().unwrap();
        }

        let mut config = StationConfig::default();
        config.training.neighbors = 3;
        let model_path = dir.path().join("model.json");
        let report = train(&config, dir.path(), &model_path).unwrap();

        assert_eq!(report.files, 3);
        assert_eq!((report.train, report.test), (24, 6));
        assert_eq!(report.feature_count, width);
        assert!(report.mean_error.unwrap() < 1e-3);

        let estimator = PositionEstimator::load(&model_path).unwrap();
        let estimate = estimator
            .predict(&FeatureVector::new(amplitude_profile(
                width,
                PredictionSample::new(4.0, 0.0),
            )))
            .unwrap();
        assert!((estimate.x - 4.0).abs() < 1e-3 && estimate.y.abs() < 1e-3);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StationConfig::default();
        assert!(train(&config, dir.path(), &dir.path().join("m.json")).is_err());
    }
}
