pub mod loader;
pub mod writer;

pub use loader::{find_dataset_files, load_training_set, TrainingSet};
pub use writer::{dataset_file_name, header, DatasetWriter};

use crate::prelude::TelemetryError;

pub(crate) fn dataset_error(err: csv::Error) -> TelemetryError {
    TelemetryError::Dataset(err.to_string())
}
