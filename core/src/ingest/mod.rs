pub mod parser;
pub mod record;

pub use parser::{FeatureIngestor, IngestConfig};
pub use record::TelemetryRecord;
