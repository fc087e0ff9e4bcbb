use crate::dataset::dataset_error;
use crate::prelude::{FeatureVector, PredictionSample, TelemetryResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column names for a dataset of `width` subcarriers plus the position label.
pub fn header(width: usize) -> Vec<String> {
    (0..width)
        .map(|idx| format!("sc_{}", idx))
        .chain(["pos_x".to_string(), "pos_y".to_string()])
        .collect()
}

/// Conventional file name for samples recorded at `label`.
pub fn dataset_file_name(label: PredictionSample) -> String {
    format!("csi_data_x{:?}_y{:?}.csv", label.x, label.y)
}

/// Appends position-labeled CSI frames to a CSV file.
pub struct DatasetWriter<W: Write> {
    writer: csv::Writer<W>,
    width: usize,
    label: [String; 2],
    rows: usize,
}

impl DatasetWriter<File> {
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: usize,
        label: PredictionSample,
    ) -> TelemetryResult<Self> {
        let file = File::create(path)?;
        Self::from_writer(file, width, label)
    }
}

impl<W: Write> DatasetWriter<W> {
    pub fn from_writer(inner: W, width: usize, label: PredictionSample) -> TelemetryResult<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(header(width)).map_err(dataset_error)?;
        Ok(Self {
            writer,
            width,
            label: [label.x.to_string(), label.y.to_string()],
            rows: 0,
        })
    }

    /// Writes one row; the frame is zero-padded or truncated to the header width.
    pub fn append(&mut self, features: &FeatureVector) -> TelemetryResult<()> {
        let fitted = features.pad_to(self.width);
        let record = fitted
            .as_slice()
            .iter()
            .map(|value| value.to_string())
            .chain(self.label.iter().cloned());
        self.writer.write_record(record).map_err(dataset_error)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> TelemetryResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> TelemetryResult<W> {
        self.writer
            .into_inner()
            .map_err(|err| crate::prelude::TelemetryError::Transport(err.into_error()))
    }
}
