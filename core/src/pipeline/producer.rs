use crate::ingest::{FeatureIngestor, TelemetryRecord};
use crate::prelude::TelemetryResult;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use crate::transport::source::{LineEvent, LineSource};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Why a producer loop returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// The stop flag was raised.
    Stopped,
    /// The transport reached end of stream.
    Closed,
}

/// Reads lines from a transport and hands accepted records to a sink.
///
/// Malformed lines are dropped silently; transport failures end the loop
/// with an error.
pub struct Producer<S: LineSource> {
    source: S,
    ingestor: FeatureIngestor,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S: LineSource> Producer<S> {
    pub fn new(source: S, ingestor: FeatureIngestor, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            source,
            ingestor,
            metrics,
            logger: LogManager::new("producer"),
        }
    }

    pub fn run<F>(&mut self, stop: &AtomicBool, mut sink: F) -> TelemetryResult<ProducerExit>
    where
        F: FnMut(TelemetryRecord) -> TelemetryResult<()>,
    {
        while !stop.load(Ordering::Relaxed) {
            match self.source.next_line() {
                Ok(LineEvent::Line(line)) => {
                    if let Some(record) = self.ingestor.ingest(&line) {
                        self.metrics.record_accepted();
                        sink(record)?;
                    }
                }
                Ok(LineEvent::Idle) => self.metrics.record_idle(),
                Ok(LineEvent::Discarded) => {}
                Ok(LineEvent::Closed) => {
                    self.logger.record("transport closed");
                    return Ok(ProducerExit::Closed);
                }
                Err(err) => {
                    self.metrics.record_transport_error();
                    self.logger.warn(&format!("transport read failed: {}", err));
                    return Err(err);
                }
            }
        }
        self.logger.detail("stop requested");
        Ok(ProducerExit::Stopped)
    }
}

/// Runs a [`Producer`] on its own named thread until `stop` is raised or the
/// transport ends.
pub fn spawn_producer<S, F>(
    source: S,
    ingestor: FeatureIngestor,
    metrics: Arc<MetricsRecorder>,
    stop: Arc<AtomicBool>,
    sink: F,
) -> io::Result<JoinHandle<TelemetryResult<ProducerExit>>>
where
    S: LineSource + 'static,
    F: FnMut(TelemetryRecord) -> TelemetryResult<()> + Send + 'static,
{
    thread::Builder::new()
        .name("telemetry-reader".into())
        .spawn(move || {
            let mut producer = Producer::new(source, ingestor, metrics);
            producer.run(&stop, sink)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{FeatureVector, TelemetryError};
    use crate::smoothing::SharedWindow;
    use crate::transport::source::LineReader;
    use std::io::Cursor;

    struct Scripted {
        events: Vec<TelemetryResult<LineEvent>>,
    }

    impl LineSource for Scripted {
        fn next_line(&mut self) -> TelemetryResult<LineEvent> {
            if self.events.is_empty() {
                Ok(LineEvent::Idle)
            } else {
                self.events.remove(0)
            }
        }
    }

    #[test]
    fn producer_feeds_accepted_records_until_close() {
        let feed = "boot banner\nCSI_DATA,1,2\nCSI_DATA,x,2\nCSI_DATA,3,4,5\n";
        let window = SharedWindow::with_capacity(5).unwrap();
        let writer = window.clone();
        let metrics = Arc::new(MetricsRecorder::new());
        let stop = Arc::new(AtomicBool::new(false));

        let handle = spawn_producer(
            LineReader::new(Cursor::new(feed.as_bytes().to_vec())),
            FeatureIngestor::default(),
            metrics.clone(),
            stop,
            move |record| match record {
                TelemetryRecord::Csi(features) => writer.push(features.pad_to(3)),
                TelemetryRecord::Distance(_) => Ok(()),
            },
        )
        .unwrap();

        assert_eq!(handle.join().unwrap().unwrap(), ProducerExit::Closed);
        assert_eq!(metrics.snapshot().accepted, 2);
        assert_eq!(
            window.mean(),
            Some(FeatureVector::new(vec![2.0, 3.0, 2.5]))
        );
    }

    #[test]
    fn raised_stop_flag_ends_the_loop() {
        let stop = AtomicBool::new(true);
        let mut producer = Producer::new(
            Scripted { events: Vec::new() },
            FeatureIngestor::default(),
            Arc::new(MetricsRecorder::new()),
        );
        assert_eq!(producer.run(&stop, |_| Ok(())).unwrap(), ProducerExit::Stopped);
    }

    #[test]
    fn transport_failure_propagates_and_keeps_window() {
        let window = SharedWindow::with_capacity(3).unwrap();
        let metrics = Arc::new(MetricsRecorder::new());
        let mut producer = Producer::new(
            Scripted {
                events: vec![
                    Ok(LineEvent::Line("Distance:2.0".into())),
                    Ok(LineEvent::Idle),
                    Err(TelemetryError::TransportUnavailable("unplugged".into())),
                ],
            },
            FeatureIngestor::default(),
            metrics.clone(),
        );

        let writer = window.clone();
        let result = producer.run(&AtomicBool::new(false), move |record| {
            writer.push(record.as_distance().unwrap_or_default())
        });

        assert!(result.is_err());
        assert_eq!(window.mean(), Some(2.0));
        let snapshot = metrics.snapshot();
        assert_eq!((snapshot.accepted, snapshot.idle_cycles, snapshot.transport_errors), (1, 1, 1));
    }
}
