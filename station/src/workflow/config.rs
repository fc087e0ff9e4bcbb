use crate::generator::synthetic::GeneratorConfig;
use anyhow::Context;
use csicore::ingest::IngestConfig;
use csicore::transport::SerialSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub neighbors: usize,
    pub test_fraction: f32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            neighbors: 5,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub serial: SerialSettings,
    pub ingest: IngestConfig,
    pub subcarriers: usize,
    pub smoothing_window: usize,
    pub model_path: PathBuf,
    pub output_dir: PathBuf,
    pub collection_secs: u64,
    pub points_to_show: usize,
    pub refresh_ms: u64,
    pub bridge_addr: SocketAddr,
    pub training: TrainingConfig,
    pub simulator: GeneratorConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            ingest: IngestConfig::default(),
            subcarriers: 64,
            smoothing_window: 5,
            model_path: PathBuf::from("csi_knn_model.json"),
            output_dir: PathBuf::from("."),
            collection_secs: 60,
            points_to_show: 100_000,
            refresh_ms: 100,
            bridge_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            training: TrainingConfig::default(),
            simulator: GeneratorConfig::default(),
        }
    }
}

impl StationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading station config {}", path_ref.display()))?;
        let config: StationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing station config {}", path_ref.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_args(port: Option<String>, baud: Option<u32>, window: Option<usize>) -> Self {
        Self::default().with_overrides(port, baud, window)
    }

    pub fn with_overrides(
        mut self,
        port: Option<String>,
        baud: Option<u32>,
        window: Option<usize>,
    ) -> Self {
        if let Some(port) = port {
            self.serial.port = port;
        }
        if let Some(baud) = baud {
            self.serial.baud_rate = baud;
        }
        if let Some(window) = window {
            self.smoothing_window = window;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.subcarriers > 0, "subcarriers must be at least 1");
        anyhow::ensure!(
            self.smoothing_window > 0,
            "smoothing_window must be at least 1"
        );
        anyhow::ensure!(self.points_to_show > 0, "points_to_show must be at least 1");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.training.test_fraction),
            "training.test_fraction must be in [0, 1)"
        );
        Ok(())
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(10))
    }

    pub fn collection_duration(&self) -> Duration {
        Duration::from_secs(self.collection_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_serial_settings() {
        let cfg = StationConfig::from_args(Some("/dev/ttyACM0".into()), Some(921_600), None);
        assert_eq!(cfg.serial.port, "/dev/ttyACM0");
        assert_eq!(cfg.serial.baud_rate, 921_600);
        assert_eq!(cfg.smoothing_window, 5);
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"serial:\n  port: COM10\nsmoothing_window: 8\ntraining:\n  neighbors: 3\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = StationConfig::load(&path).unwrap();
        assert_eq!(cfg.serial.port, "COM10");
        assert_eq!(cfg.serial.baud_rate, 115_200);
        assert_eq!(cfg.smoothing_window, 8);
        assert_eq!(cfg.training.neighbors, 3);
        assert_eq!(cfg.ingest.sentinel, "CSI_DATA");
    }

    #[test]
    fn config_load_rejects_empty_window() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"smoothing_window: 0\n").unwrap();
        let path = temp.into_temp_path();
        assert!(StationConfig::load(&path).is_err());
    }
}
