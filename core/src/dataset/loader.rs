use crate::dataset::dataset_error;
use crate::estimator::TrainingRow;
use crate::prelude::{PredictionSample, TelemetryError, TelemetryResult};
use crate::telemetry::log::LogManager;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "csi_data_x";

/// Labeled rows gathered from one or more collection files.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<TrainingRow>,
    pub files: usize,
    /// Rows skipped because they were unreadable or lacked a coordinate.
    pub dropped: usize,
}

impl TrainingSet {
    pub fn feature_count(&self) -> usize {
        self.rows.first().map(|row| row.features.len()).unwrap_or(0)
    }
}

/// Collection files (`csi_data_x*.csv`) in `dir`, sorted by name.
pub fn find_dataset_files<P: AsRef<Path>>(dir: P) -> TelemetryResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(FILE_PREFIX) && name.ends_with(".csv"))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads and cleans every readable file.
///
/// Feature cells that are missing or non-numeric become 0, rows without both
/// coordinates are dropped, and rows from narrower files are zero-padded to
/// the widest feature count seen.
pub fn load_training_set(paths: &[PathBuf]) -> TelemetryResult<TrainingSet> {
    let logger = LogManager::new("dataset");
    let mut set = TrainingSet::default();

    for path in paths {
        match read_file(path) {
            Ok((rows, dropped)) => {
                logger.detail(&format!(
                    "{}: {} rows, {} dropped",
                    path.display(),
                    rows.len(),
                    dropped
                ));
                set.rows.extend(rows);
                set.dropped += dropped;
                set.files += 1;
            }
            Err(err) => logger.warn(&format!("skipping {}: {}", path.display(), err)),
        }
    }

    if set.rows.is_empty() {
        return Err(TelemetryError::Dataset(
            "no labeled samples could be loaded".into(),
        ));
    }

    let width = set
        .rows
        .iter()
        .map(|row| row.features.len())
        .max()
        .unwrap_or(0);
    for row in &mut set.rows {
        row.features.resize(width, 0.0);
    }
    Ok(set)
}

fn read_file(path: &Path) -> TelemetryResult<(Vec<TrainingRow>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(dataset_error)?;
    let headers = reader.headers().map_err(dataset_error)?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| TelemetryError::Dataset(format!("missing '{}' column", name)))
    };
    let pos_x = column("pos_x")?;
    let pos_y = column("pos_y")?;
    let feature_columns: Vec<usize> = (0..headers.len())
        .filter(|&idx| idx != pos_x && idx != pos_y)
        .collect();

    let mut rows = Vec::new();
    let mut dropped = 0;
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(_) => {
                dropped += 1;
                continue;
            }
        };
        let cell = |idx: usize| -> Option<f32> {
            record
                .get(idx)
                .and_then(|value| value.trim().parse::<f32>().ok())
                .filter(|value| value.is_finite())
        };
        let (x, y) = match (cell(pos_x), cell(pos_y)) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                dropped += 1;
                continue;
            }
        };
        let features = feature_columns
            .iter()
            .map(|&idx| cell(idx).unwrap_or(0.0))
            .collect();
        rows.push(TrainingRow::new(features, PredictionSample::new(x, y)));
    }
    Ok((rows, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loader_cleans_features_and_drops_unlabeled_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("csi_data_x1.0_y2.0.csv"),
            "sc_0,sc_1,sc_2,pos_x,pos_y\n4,,x,1,2\n5,6,7,,2\n8,9\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("csi_data_x3.0_y0.0.csv"),
            "sc_0,sc_1,pos_x,pos_y\n1,1,3,0\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.csv"), "pos_x,pos_y\n1,1\n").unwrap();

        let files = find_dataset_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let set = load_training_set(&files).unwrap();
        assert_eq!(set.files, 2);
        assert_eq!(set.dropped, 2);
        assert_eq!(set.feature_count(), 3);
        assert_eq!(
            set.rows,
            vec![
                TrainingRow::new(vec![4.0, 0.0, 0.0], PredictionSample::new(1.0, 2.0)),
                TrainingRow::new(vec![1.0, 1.0, 0.0], PredictionSample::new(3.0, 0.0)),
            ]
        );
    }

    #[test]
    fn files_without_labels_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csi_data_x0.0_y0.0.csv");
        fs::write(&path, "sc_0,sc_1\n1,2\n").unwrap();
        assert!(matches!(
            load_training_set(&[path]),
            Err(TelemetryError::Dataset(_))
        ));
    }
}
