use crate::ingest::record::TelemetryRecord;
use crate::prelude::FeatureVector;
use log::trace;
use serde::{Deserialize, Serialize};

/// Recognition markers for the two record types emitted by the radio nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub sentinel: String,
    pub distance_label: String,
    pub delimiter: char,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sentinel: "CSI_DATA".into(),
            distance_label: "Distance".into(),
            delimiter: ',',
        }
    }
}

/// Turns raw transport lines into records, discarding anything malformed.
#[derive(Debug, Clone, Default)]
pub struct FeatureIngestor {
    config: IngestConfig,
}

impl FeatureIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Parses one line. `None` means the line was not a valid record.
    pub fn ingest(&self, line: &str) -> Option<TelemetryRecord> {
        let line = line.trim();
        if let Some(payload) = self.csi_payload(line) {
            return self.parse_csi(payload).map(TelemetryRecord::Csi);
        }
        if let Some(value) = self.labeled_scalar(line) {
            return self.parse_scalar(value).map(TelemetryRecord::Distance);
        }
        trace!("discarding unrecognised line {:?}", line);
        None
    }

    fn csi_payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.strip_prefix(self.config.sentinel.as_str())?
            .strip_prefix(self.config.delimiter)
    }

    fn labeled_scalar<'a>(&self, line: &'a str) -> Option<&'a str> {
        // The ranging gateway sometimes prefixes the token with node fields.
        let field = line
            .rsplit(self.config.delimiter)
            .next()
            .unwrap_or(line)
            .trim();
        field
            .strip_prefix(self.config.distance_label.as_str())?
            .strip_prefix(':')
    }

    fn parse_csi(&self, payload: &str) -> Option<FeatureVector> {
        let mut values = Vec::new();
        for field in payload
            .split(self.config.delimiter)
            .map(str::trim)
            .filter(|field| !field.is_empty())
        {
            match field.parse::<f32>() {
                Ok(value) if value.is_finite() => values.push(value),
                _ => {
                    trace!("discarding CSI frame with field {:?}", field);
                    return None;
                }
            }
        }
        if values.is_empty() {
            return None;
        }
        Some(FeatureVector::new(values))
    }

    fn parse_scalar(&self, value: &str) -> Option<f32> {
        match value.trim().parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => Some(parsed),
            _ => {
                trace!("discarding distance token {:?}", value);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> FeatureIngestor {
        FeatureIngestor::default()
    }

    #[test]
    fn csi_line_drops_empty_fields() {
        let record = ingestor().ingest("CSI_DATA,1.0,2.0,,3.0").unwrap();
        assert_eq!(
            record,
            TelemetryRecord::Csi(FeatureVector::new(vec![1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn line_without_sentinel_is_rejected() {
        assert!(ingestor().ingest("I (1234) wifi: connected").is_none());
        assert!(ingestor().ingest("CSI_DATAX,1.0").is_none());
        assert!(ingestor().ingest("").is_none());
    }

    #[test]
    fn csi_line_with_bad_field_is_rejected_whole() {
        assert!(ingestor().ingest("CSI_DATA,1.0,oops,3.0").is_none());
        assert!(ingestor().ingest("CSI_DATA,,,").is_none());
    }

    #[test]
    fn csi_line_tolerates_carriage_return() {
        let record = ingestor().ingest("CSI_DATA,4,5\r\n").unwrap();
        assert_eq!(record.as_features().unwrap().as_slice(), &[4.0, 5.0]);
    }

    #[test]
    fn distance_token_yields_scalar() {
        assert_eq!(
            ingestor().ingest("Distance:4.25"),
            Some(TelemetryRecord::Distance(4.25))
        );
    }

    #[test]
    fn distance_token_with_garbage_is_rejected() {
        assert!(ingestor().ingest("Distance:abc").is_none());
        assert!(ingestor().ingest("Distance:").is_none());
    }

    #[test]
    fn trailing_distance_field_is_recognised() {
        assert_eq!(
            ingestor().ingest("RSSI:-61,Distance:1.5").and_then(|r| r.as_distance()),
            Some(1.5)
        );
    }

    #[test]
    fn short_frame_pads_to_model_width() {
        let record = ingestor().ingest("CSI_DATA,7,8").unwrap();
        let features = record.as_features().unwrap().pad_to(4);
        assert_eq!(features.as_slice(), &[7.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn custom_sentinel_is_honoured() {
        let ingestor = FeatureIngestor::new(IngestConfig {
            sentinel: "AMP".into(),
            ..Default::default()
        });
        assert!(ingestor.ingest("CSI_DATA,1").is_none());
        assert_eq!(
            ingestor.ingest("AMP,1,2").unwrap().as_features().unwrap().len(),
            2
        );
    }
}
