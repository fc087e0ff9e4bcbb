use crate::generator::synthetic::{SyntheticKind, SyntheticSource};
use crate::gui_bridge::bridge::GuiBridge;
use crate::workflow::config::StationConfig;
use anyhow::{anyhow, Context};
use csicore::dataset::{dataset_file_name, DatasetWriter};
use csicore::display::TimeSeries;
use csicore::estimator::PositionEstimator;
use csicore::ingest::{FeatureIngestor, TelemetryRecord};
use csicore::math::StatsHelper;
use csicore::pipeline::{spawn_producer, Locator, ProducerExit};
use csicore::prelude::{FeatureVector, PredictionSample, TelemetryResult};
use csicore::smoothing::SharedWindow;
use csicore::telemetry::{LogManager, MetricsRecorder};
use csicore::transport::{open_serial, LineSource};
use log::{debug, error};
use std::fs;
use std::future::{self, Future};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

/// What the consumer does when the reader thread ends on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnReaderLoss {
    /// Finish the command and surface the reader's error, if any.
    Abort,
    /// Keep serving the last smoothed value until Ctrl+C.
    HoldLast,
}

/// Why the consumer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Interrupted,
    Deadline,
    StreamEnded,
}

pub struct CollectionSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub stopped_by: StopCause,
}

/// Resolves once the interrupt flag is raised. Never resolves if every
/// sender is gone without raising it.
pub async fn wait_for_interrupt(mut interrupt: watch::Receiver<bool>) {
    if interrupt.wait_for(|raised| *raised).await.is_err() {
        future::pending::<()>().await;
    }
}

pub struct Runner {
    config: StationConfig,
    simulate: bool,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
    interrupt: watch::Receiver<bool>,
}

impl Runner {
    /// `interrupt` is raised by the Ctrl+C listener; every command stops on it.
    pub fn new(config: StationConfig, simulate: bool, interrupt: watch::Receiver<bool>) -> Self {
        Self {
            config,
            simulate,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("runner"),
            interrupt,
        }
    }

    fn ingestor(&self) -> FeatureIngestor {
        FeatureIngestor::new(self.config.ingest.clone())
    }

    fn open_source(
        &self,
        kind: SyntheticKind,
        at: Option<PredictionSample>,
    ) -> anyhow::Result<Box<dyn LineSource>> {
        if self.simulate {
            let mut generator = self.config.simulator.clone();
            if let Some(position) = at {
                generator.position = [position.x, position.y];
            }
            self.logger.record("reading synthetic telemetry");
            return Ok(Box::new(SyntheticSource::new(generator, kind)));
        }
        let port = open_serial(&self.config.serial).context("opening serial transport")?;
        Ok(Box::new(port))
    }

    /// Records labeled CSI frames for the configured duration.
    pub async fn collect(
        &self,
        label: PredictionSample,
        output: Option<PathBuf>,
    ) -> anyhow::Result<CollectionSummary> {
        let path =
            output.unwrap_or_else(|| self.config.output_dir.join(dataset_file_name(label)));
        let source = self.open_source(SyntheticKind::Csi, Some(label))?;
        self.collect_from(source, label, path, self.config.collection_duration())
            .await
    }

    /// Collects at every position `next_position` yields until it yields
    /// `None` or Ctrl+C arrives. A failed collection is reported and the
    /// operator is asked again.
    pub async fn collect_session<P, Fut>(
        &self,
        mut next_position: P,
    ) -> anyhow::Result<Vec<CollectionSummary>>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<PredictionSample>>>,
    {
        let mut summaries = Vec::new();
        loop {
            let answer = tokio::select! {
                answer = next_position() => answer?,
                _ = wait_for_interrupt(self.interrupt.clone()) => {
                    println!();
                    None
                }
            };
            let Some(label) = answer else {
                break;
            };
            match self.collect(label, None).await {
                Ok(summary) => {
                    println!("Saved {} samples to {}", summary.rows, summary.path.display());
                    let interrupted = summary.stopped_by == StopCause::Interrupted;
                    summaries.push(summary);
                    if interrupted {
                        break;
                    }
                }
                Err(err) => error!("collection at ({}, {}) failed: {:#}", label.x, label.y, err),
            }
        }
        Ok(summaries)
    }

    pub async fn collect_from(
        &self,
        source: Box<dyn LineSource>,
        label: PredictionSample,
        path: PathBuf,
        duration: Duration,
    ) -> anyhow::Result<CollectionSummary> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        let writer = DatasetWriter::create(&path, self.config.subcarriers, label)
            .with_context(|| format!("creating dataset {}", path.display()))?;
        let writer = Arc::new(Mutex::new(writer));

        println!(
            "--- Collecting for {} seconds into {} ---",
            duration.as_secs(),
            path.display()
        );
        let sink_writer = writer.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_producer(
            source,
            self.ingestor(),
            self.metrics.clone(),
            stop.clone(),
            move |record| {
                if let Some(features) = record.as_features() {
                    sink_writer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .append(features)?;
                }
                Ok(())
            },
        )
        .context("starting telemetry reader")?;

        let progress = writer.clone();
        let stopped_by = self.supervise(handle, stop, Some(duration), OnReaderLoss::Abort, || {
            let rows = progress
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .rows();
            print_inline(&format!("Collected {} samples", rows));
        })
        .await?;

        let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .flush()
            .with_context(|| format!("flushing dataset {}", path.display()))?;
        let rows = guard.rows();
        match stopped_by {
            StopCause::Interrupted => println!("\n--- Collection interrupted ---"),
            _ => println!("\n--- Collection complete! ---"),
        }
        Ok(CollectionSummary {
            path,
            rows,
            stopped_by,
        })
    }

    /// Live smoothed amplitude view of every subcarrier.
    pub async fn monitor(&self, bridge: Option<&GuiBridge>) -> anyhow::Result<()> {
        let source = self.open_source(SyntheticKind::Csi, None)?;
        let width = self.config.subcarriers;
        let window = SharedWindow::<FeatureVector>::with_capacity(self.config.smoothing_window)?;
        let writer = window.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_producer(
            source,
            self.ingestor(),
            self.metrics.clone(),
            stop.clone(),
            move |record| match record {
                TelemetryRecord::Csi(features) => writer.push(features.pad_to(width)),
                TelemetryRecord::Distance(_) => Ok(()),
            },
        )
        .context("starting telemetry reader")?;

        println!(
            "Real-time CSI amplitude, smoothed over {} frames (Ctrl+C to stop)",
            window.capacity()
        );
        let metrics = self.metrics.clone();
        self.supervise(handle, stop, None, OnReaderLoss::HoldLast, || {
            let smoothed = window.mean();
            if let Some(bridge) = bridge {
                bridge.update(|model| {
                    if let Some(mean) = &smoothed {
                        model.amplitudes = mean.as_slice().to_vec();
                    }
                    model.smoothing_window = window.capacity();
                    model.frames_in_window = window.len();
                    model.accepted = metrics.snapshot().accepted;
                });
            }
            match smoothed.as_ref().and_then(|mean| peak(mean.as_slice()).map(|p| (mean, p))) {
                Some((mean, (idx, value))) => print_inline(&format!(
                    "frames {}/{} | RMS {:.2} | peak sc_{} = {:.2}",
                    window.len(),
                    window.capacity(),
                    StatsHelper::rms(mean.as_slice()),
                    idx,
                    value
                )),
                None => print_inline("Waiting for CSI data..."),
            }
        })
        .await?;
        Ok(())
    }

    /// Scrolling range readings from the ranging gateway.
    pub async fn distance(&self, bridge: Option<&GuiBridge>) -> anyhow::Result<()> {
        let source = self.open_source(SyntheticKind::Distance, None)?;
        let series = Arc::new(Mutex::new(TimeSeries::with_capacity(
            self.config.points_to_show,
        )?));
        let sink_series = series.clone();
        let started = Instant::now();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_producer(
            source,
            self.ingestor(),
            self.metrics.clone(),
            stop.clone(),
            move |record| {
                if let Some(value) = record.as_distance() {
                    let t = started.elapsed().as_secs_f32();
                    debug!("Time: {:.2}s, Distance: {:.2}m", t, value);
                    sink_series
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(t, value);
                }
                Ok(())
            },
        )
        .context("starting telemetry reader")?;

        println!("Real-time distance measurement (Ctrl+C to stop)");
        let metrics = self.metrics.clone();
        self.supervise(handle, stop, None, OnReaderLoss::HoldLast, || {
            let guard = series.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(bridge) = bridge {
                bridge.update(|model| {
                    model.distance = guard.to_vec();
                    model.distance_bounds = guard.bounds();
                    model.accepted = metrics.snapshot().accepted;
                });
            }
            match guard.latest() {
                Some(point) => print_inline(&format!(
                    "Time: {:.2}s, Distance: {:.2}m ({} points)",
                    point.t,
                    point.value,
                    guard.len()
                )),
                None => print_inline("Waiting for distance data..."),
            }
        })
        .await?;
        Ok(())
    }

    /// Real-time position estimate from a trained k-NN model.
    pub async fn predict(
        &self,
        model_path: Option<PathBuf>,
        bridge: Option<&GuiBridge>,
    ) -> anyhow::Result<()> {
        let path = model_path.unwrap_or_else(|| self.config.model_path.clone());
        println!("Loading model from '{}'...", path.display());
        let estimator = PositionEstimator::load(&path)
            .with_context(|| format!("loading model {}", path.display()))?;
        println!(
            "Model loaded ({} features expected)",
            estimator.expected_feature_count()
        );

        let locator = Locator::new(estimator, self.config.smoothing_window)?;
        let window = locator.window();
        let source = self.open_source(SyntheticKind::Csi, None)?;
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_producer(
            source,
            self.ingestor(),
            self.metrics.clone(),
            stop.clone(),
            move |record| {
                if let TelemetryRecord::Csi(features) = record {
                    let estimate = locator.observe(&features)?;
                    debug!(
                        "raw estimate ({:.2}, {:.2})",
                        estimate.raw.x, estimate.raw.y
                    );
                }
                Ok(())
            },
        )
        .context("starting telemetry reader")?;

        println!("Waiting for CSI data (Ctrl+C to stop)...");
        let metrics = self.metrics.clone();
        self.supervise(handle, stop, None, OnReaderLoss::Abort, || {
            if window.is_empty() {
                print_inline("Waiting for CSI data...");
                return;
            }
            let Some(position) = window.mean() else {
                return;
            };
            if let Some(bridge) = bridge {
                bridge.update(|model| {
                    model.position = Some(position);
                    model.accepted = metrics.snapshot().accepted;
                });
            }
            print_inline(&format!(
                "Predicted Location -> X: {:.2}, Y: {:.2}",
                position.x, position.y
            ));
        })
        .await?;
        Ok(())
    }

    /// Drives the consumer side: ticks `on_tick` at the refresh rate until
    /// Ctrl+C, the deadline, or (with [`OnReaderLoss::Abort`]) the reader ends.
    /// Returns what ended the loop.
    async fn supervise<F>(
        &self,
        handle: JoinHandle<TelemetryResult<ProducerExit>>,
        stop: Arc<AtomicBool>,
        deadline: Option<Duration>,
        on_loss: OnReaderLoss,
        mut on_tick: F,
    ) -> anyhow::Result<StopCause>
    where
        F: FnMut(),
    {
        let mut reader = Some(handle);
        let mut ticker = time::interval(self.config.refresh());
        let shutdown = wait_for_interrupt(self.interrupt.clone());
        tokio::pin!(shutdown);
        let expiry = async move {
            match deadline {
                Some(limit) => time::sleep(limit).await,
                None => future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let cause = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    on_tick();
                    let finished = reader.as_ref().map_or(false, |h| h.is_finished());
                    if !finished {
                        continue;
                    }
                    let Some(finished) = reader.take() else {
                        continue;
                    };
                    match (join_reader(finished), on_loss) {
                        (Ok(exit), OnReaderLoss::Abort) => {
                            debug!("reader finished: {:?}", exit);
                            break StopCause::StreamEnded;
                        }
                        (Err(err), OnReaderLoss::Abort) => return Err(err),
                        (Ok(_), OnReaderLoss::HoldLast) => {
                            self.logger.record("telemetry stream ended; holding last reading");
                        }
                        (Err(err), OnReaderLoss::HoldLast) => {
                            self.logger.warn(&format!("{:#}; holding last reading", err));
                        }
                    }
                }
                _ = &mut shutdown => {
                    println!();
                    self.logger.record("stop requested");
                    break StopCause::Interrupted;
                }
                _ = &mut expiry => break StopCause::Deadline,
            }
        };

        stop.store(true, Ordering::Relaxed);
        on_tick();
        if let Some(handle) = reader {
            let exit = join_reader(handle)?;
            debug!("reader finished: {:?}", exit);
        }
        let snapshot = self.metrics.snapshot();
        self.logger.detail(&format!(
            "accepted {} records, {} idle reads, {} transport errors",
            snapshot.accepted, snapshot.idle_cycles, snapshot.transport_errors
        ));
        Ok(cause)
    }
}

fn join_reader(handle: JoinHandle<TelemetryResult<ProducerExit>>) -> anyhow::Result<ProducerExit> {
    handle
        .join()
        .map_err(|_| anyhow!("telemetry reader panicked"))?
        .context("reading telemetry")
}

fn peak(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, value)| match best {
            Some((_, top)) if top >= value => best,
            _ => Some((idx, value)),
        })
}

fn print_inline(message: &str) {
    print!("\r{}   ", message);
    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use csicore::transport::{LineEvent, LineReader};
    use std::collections::VecDeque;
    use std::io::Cursor;

    fn runner_with(interrupt: watch::Receiver<bool>) -> Runner {
        let mut config = StationConfig::default();
        config.subcarriers = 4;
        config.refresh_ms = 10;
        Runner::new(config, false, interrupt)
    }

    fn runner() -> Runner {
        let (_, interrupt) = watch::channel(false);
        runner_with(interrupt)
    }

    /// A port that is open but never sends anything.
    struct Silent;

    impl LineSource for Silent {
        fn next_line(&mut self) -> TelemetryResult<LineEvent> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(LineEvent::Idle)
        }
    }

    #[tokio::test]
    async fn collection_writes_one_row_per_accepted_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture").join("run.csv");
        let feed = "boot\nCSI_DATA,1,2,,3\nDistance:1.0\nCSI_DATA,bad\nCSI_DATA,4,5,6,7,8\n";
        let source: Box<dyn LineSource> =
            Box::new(LineReader::new(Cursor::new(feed.as_bytes().to_vec())));

        let summary = runner()
            .collect_from(
                source,
                PredictionSample::new(2.0, 0.5),
                path.clone(),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.stopped_by, StopCause::StreamEnded);
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "sc_0,sc_1,sc_2,sc_3,pos_x,pos_y\n1,2,3,0,2,0.5\n4,5,6,7,2,0.5\n"
        );
    }

    #[tokio::test]
    async fn ctrl_c_ends_collection_before_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let (raise, interrupt) = watch::channel(false);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(50)).await;
            raise.send_replace(true);
        });

        let summary = time::timeout(
            Duration::from_secs(5),
            runner_with(interrupt).collect_from(
                Box::new(Silent),
                PredictionSample::new(0.0, 0.0),
                dir.path().join("idle.csv"),
                Duration::from_secs(60),
            ),
        )
        .await
        .expect("collection should stop on interrupt")
        .unwrap();

        assert_eq!(summary.stopped_by, StopCause::Interrupted);
        assert_eq!(summary.rows, 0);
    }

    #[tokio::test]
    async fn deadline_ends_collection_of_a_silent_port() {
        let dir = tempfile::tempdir().unwrap();
        let summary = runner()
            .collect_from(
                Box::new(Silent),
                PredictionSample::new(0.0, 0.0),
                dir.path().join("idle.csv"),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert_eq!(summary.stopped_by, StopCause::Deadline);
    }

    #[tokio::test]
    async fn interrupt_wait_resolves_once_raised() {
        let (raise, interrupt) = watch::channel(false);
        raise.send_replace(true);
        assert!(
            time::timeout(Duration::from_secs(1), wait_for_interrupt(interrupt))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn interrupt_wait_stays_pending_without_a_listener() {
        let (raise, interrupt) = watch::channel(false);
        drop(raise);
        assert!(
            time::timeout(Duration::from_millis(50), wait_for_interrupt(interrupt))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn session_keeps_prompting_after_a_failed_collection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StationConfig::default();
        config.serial.port = dir.path().join("no-such-port").display().to_string();
        config.output_dir = dir.path().to_path_buf();
        let (_raise, interrupt) = watch::channel(false);
        let runner = Runner::new(config, false, interrupt);

        let mut answers = VecDeque::from(vec![
            Some(PredictionSample::new(1.0, 1.0)),
            Some(PredictionSample::new(2.0, 2.0)),
            None,
        ]);
        let summaries = runner
            .collect_session(|| future::ready(Ok(answers.pop_front().flatten())))
            .await
            .unwrap();

        assert!(summaries.is_empty());
        assert!(answers.is_empty());
    }

    #[tokio::test]
    async fn ctrl_c_at_the_prompt_ends_the_session() {
        let (raise, interrupt) = watch::channel(false);
        raise.send_replace(true);
        let summaries = time::timeout(
            Duration::from_secs(1),
            runner_with(interrupt).collect_session(future::pending),
        )
        .await
        .expect("session should end on interrupt")
        .unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn prediction_fails_without_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let result = runner()
            .predict(Some(dir.path().join("missing.json")), None)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn peak_reports_first_maximum() {
        assert_eq!(peak(&[1.0, 3.0, 3.0, 2.0]), Some((1, 3.0)));
        assert_eq!(peak(&[]), None);
    }
}
