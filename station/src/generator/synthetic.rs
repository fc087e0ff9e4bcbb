use csicore::prelude::{PredictionSample, TelemetryResult};
use csicore::transport::{LineEvent, LineSource};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::thread;
use std::time::Duration;

/// Configuration for generating synthetic node output without hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub subcarriers: usize,
    pub noise: f32,
    pub seed: u64,
    pub position: [f32; 2],
    pub interval_ms: u64,
    /// Emit a non-telemetry log line every this many lines (0 disables).
    pub chatter_every: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            subcarriers: 64,
            noise: 1.5,
            seed: 0,
            position: [1.0, 2.0],
            interval_ms: 20,
            chatter_every: 25,
        }
    }
}

impl GeneratorConfig {
    pub fn position(&self) -> PredictionSample {
        PredictionSample::new(self.position[0], self.position[1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticKind {
    Csi,
    Distance,
}

/// Noise-free amplitude fingerprint for a node placed at `position`.
pub fn amplitude_profile(subcarriers: usize, position: PredictionSample) -> Vec<f32> {
    let count = subcarriers.max(1) as f32;
    (0..subcarriers)
        .map(|idx| {
            let phase = idx as f32 / count * 2.0 * PI;
            let value = 14.0
                + 6.0 * (phase + 0.35 * position.x).sin()
                + 4.0 * (2.0 * phase - 0.5 * position.y).cos()
                + 0.5 * (position.x + position.y);
            value.max(0.0)
        })
        .collect()
}

/// Line source that imitates the radio node's serial output.
pub struct SyntheticSource {
    config: GeneratorConfig,
    kind: SyntheticKind,
    rng: StdRng,
    emitted: usize,
}

impl SyntheticSource {
    pub fn new(config: GeneratorConfig, kind: SyntheticKind) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            kind,
            rng,
            emitted: 0,
        }
    }

    fn jitter(&mut self) -> f32 {
        if self.config.noise > 0.0 {
            self.rng.gen_range(-self.config.noise..self.config.noise)
        } else {
            0.0
        }
    }

    fn csi_line(&mut self) -> String {
        let profile = amplitude_profile(self.config.subcarriers, self.config.position());
        let mut line = String::from("CSI_DATA");
        for value in profile {
            let noisy = (value + self.jitter()).max(0.0);
            line.push_str(&format!(",{:.2}", noisy));
        }
        // The firmware leaves a trailing delimiter after the last subcarrier.
        line.push(',');
        line
    }

    fn distance_line(&mut self) -> String {
        let position = self.config.position();
        let range = (position.x.powi(2) + position.y.powi(2)).sqrt();
        let noisy = (range + self.jitter() * 0.1).max(0.0);
        format!("Distance:{:.2}", noisy)
    }
}

impl LineSource for SyntheticSource {
    fn next_line(&mut self) -> TelemetryResult<LineEvent> {
        if self.config.interval_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.interval_ms));
        }
        self.emitted += 1;
        if self.config.chatter_every > 0 && self.emitted % self.config.chatter_every == 0 {
            return Ok(LineEvent::Line(format!(
                "I ({}) csi_node: heartbeat",
                self.emitted
            )));
        }
        let line = match self.kind {
            SyntheticKind::Csi => self.csi_line(),
            SyntheticKind::Distance => self.distance_line(),
        };
        Ok(LineEvent::Line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csicore::ingest::{FeatureIngestor, TelemetryRecord};

    fn quiet(kind: SyntheticKind) -> SyntheticSource {
        let config = GeneratorConfig {
            subcarriers: 8,
            noise: 0.0,
            interval_ms: 0,
            chatter_every: 3,
            ..Default::default()
        };
        SyntheticSource::new(config, kind)
    }

    fn next_text(source: &mut SyntheticSource) -> String {
        match source.next_line().unwrap() {
            LineEvent::Line(line) => line,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn synthetic_csi_lines_parse_to_the_profile() {
        let mut source = quiet(SyntheticKind::Csi);
        let ingestor = FeatureIngestor::default();
        let record = ingestor.ingest(&next_text(&mut source)).unwrap();
        let features = record.as_features().unwrap();
        assert_eq!(features.len(), 8);

        let expected = amplitude_profile(8, PredictionSample::new(1.0, 2.0));
        for (got, want) in features.as_slice().iter().zip(expected) {
            assert!((got - want).abs() < 0.01);
        }
    }

    #[test]
    fn chatter_lines_are_not_telemetry() {
        let mut source = quiet(SyntheticKind::Distance);
        let ingestor = FeatureIngestor::default();
        let lines: Vec<String> = (0..3).map(|_| next_text(&mut source)).collect();
        assert!(matches!(
            ingestor.ingest(&lines[0]),
            Some(TelemetryRecord::Distance(_))
        ));
        assert!(ingestor.ingest(&lines[2]).is_none());
    }

    #[test]
    fn profiles_differ_between_positions() {
        let a = amplitude_profile(16, PredictionSample::new(0.0, 0.0));
        let b = amplitude_profile(16, PredictionSample::new(3.0, 1.0));
        assert_ne!(a, b);
        assert!(a.iter().all(|v| *v >= 0.0));
    }
}
