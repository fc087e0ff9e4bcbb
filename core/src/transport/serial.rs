use crate::prelude::{TelemetryError, TelemetryResult};
use crate::telemetry::log::LogManager;
use crate::transport::source::LineReader;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort};
use std::io::BufReader;
use std::time::Duration;

/// Connection parameters for the radio node's USB serial link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            read_timeout_ms: 1_000,
        }
    }
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

pub type SerialLineSource = LineReader<BufReader<Box<dyn SerialPort>>>;

/// Opens the port and drops whatever the node sent before we attached.
pub fn open_serial(settings: &SerialSettings) -> TelemetryResult<SerialLineSource> {
    let logger = LogManager::new("transport");
    let port = serialport::new(settings.port.as_str(), settings.baud_rate)
        .timeout(settings.read_timeout())
        .open()
        .map_err(|err| {
            if let Ok(ports) = serialport::available_ports() {
                let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
                logger.warn(&format!("available serial ports: {:?}", names));
            }
            TelemetryError::TransportUnavailable(format!("{}: {}", settings.port, err))
        })?;

    if let Err(err) = port.clear(ClearBuffer::Input) {
        logger.warn(&format!("could not flush input on {}: {}", settings.port, err));
    }

    logger.record(&format!(
        "connected to {} at {} bps",
        settings.port, settings.baud_rate
    ));
    Ok(LineReader::new(BufReader::new(port)))
}
