use anyhow::Context;
use clap::{Parser, Subcommand};
use csicore::prelude::PredictionSample;
use gui_bridge::bridge::GuiBridge;
use log::warn;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::{signal, sync::watch, task};
use workflow::config::StationConfig;
use workflow::runner::Runner;
use workflow::trainer;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Serial CSI collection, monitoring and position estimation")]
struct Args {
    /// Load a station config from YAML
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Serial port of the radio node (e.g. /dev/ttyUSB0, COM10)
    #[arg(long, global = true)]
    port: Option<String>,
    #[arg(long, global = true)]
    baud: Option<u32>,
    /// Number of frames averaged by the smoothing window
    #[arg(long, global = true)]
    window: Option<usize>,
    /// Read synthetic telemetry instead of opening the serial port
    #[arg(long, global = true, default_value_t = false)]
    simulate: bool,
    /// Serve the live state to the visualizer over HTTP
    #[arg(long, global = true, default_value_t = false)]
    serve: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record position-labeled CSI frames; prompts for positions when none given
    Collect {
        #[arg(long, allow_negative_numbers = true, requires = "y")]
        x: Option<f32>,
        #[arg(long, allow_negative_numbers = true, requires = "x")]
        y: Option<f32>,
        /// Collection time per position in seconds
        #[arg(long)]
        seconds: Option<u64>,
        /// Output CSV path (defaults to csi_data_x{X}_y{Y}.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show smoothed subcarrier amplitudes
    Monitor,
    /// Show the scrolling distance readings
    Distance,
    /// Estimate the node position with a trained model
    Predict {
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Fit a k-NN model from collected CSV files
    Train {
        /// Directory holding csi_data_x*.csv files
        #[arg(long, default_value = ".")]
        data: PathBuf,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        neighbors: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut station_config = match &args.config {
        Some(path) => {
            StationConfig::load(path)?.with_overrides(args.port.clone(), args.baud, args.window)
        }
        None => StationConfig::from_args(args.port.clone(), args.baud, args.window),
    };

    if let Command::Collect {
        seconds: Some(seconds),
        ..
    } = &args.command
    {
        station_config.collection_secs = *seconds;
    }
    if let Command::Train {
        neighbors: Some(neighbors),
        ..
    } = &args.command
    {
        station_config.training.neighbors = *neighbors;
    }
    station_config.validate()?;

    if let Command::Train { data, model, .. } = &args.command {
        let model_path = model
            .clone()
            .unwrap_or_else(|| station_config.model_path.clone());
        let report = trainer::train(&station_config, data, &model_path)?;
        println!(
            "Loaded {} samples from {} files ({} rows dropped), {} features",
            report.samples, report.files, report.dropped, report.feature_count
        );
        println!(
            "Trained k-NN (k={}) on {} samples, held out {}",
            station_config.training.neighbors, report.train, report.test
        );
        match report.mean_error {
            Some(error) => println!("Average error distance on test set: {:.2}", error),
            None => println!("Too few samples to evaluate; no test split"),
        }
        println!("Model saved to '{}'", report.model_path.display());
        return Ok(());
    }

    let bridge = if args.serve {
        let bridge = GuiBridge::new(station_config.bridge_addr);
        bridge.publish_status("Station bridge running (Ctrl+C to stop)...");
        Some(bridge)
    } else {
        None
    };

    let (raise_interrupt, interrupt) = watch::channel(false);
    let runner = Runner::new(station_config, args.simulate, interrupt);
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;

    let outcome = runtime.block_on(async {
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    raise_interrupt.send_replace(true);
                }
                Err(err) => warn!("could not listen for Ctrl+C: {}", err),
            }
        });

        match args.command {
            Command::Collect {
                x: Some(x),
                y: Some(y),
                output,
                ..
            } => {
                let summary = runner.collect(PredictionSample::new(x, y), output).await?;
                println!("Saved {} samples to {}", summary.rows, summary.path.display());
            }
            Command::Collect { .. } => {
                let summaries = runner
                    .collect_session(|| async {
                        task::spawn_blocking(prompt_position)
                            .await
                            .context("reading collection position")?
                    })
                    .await?;
                println!("Collected {} positions", summaries.len());
            }
            Command::Monitor => runner.monitor(bridge.as_ref()).await?,
            Command::Distance => runner.distance(bridge.as_ref()).await?,
            Command::Predict { model } => runner.predict(model, bridge.as_ref()).await?,
            Command::Train { .. } => {}
        }
        Ok::<(), anyhow::Error>(())
    });

    // A prompt abandoned on Ctrl+C is still blocked on stdin.
    runtime.shutdown_background();
    outcome
}

/// Asks for the next collection point; `None` once the operator quits.
fn prompt_position() -> anyhow::Result<Option<PredictionSample>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut ask = |prompt: &str| -> anyhow::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;
        Ok(lines.next().transpose()?.map(|line| line.trim().to_string()))
    };

    loop {
        println!("\n--- New Data Collection Cycle ---");
        let Some(x) = ask("Enter X coordinate (or 'q' to quit): ")? else {
            return Ok(None);
        };
        if x.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        let Some(y) = ask("Enter Y coordinate: ")? else {
            return Ok(None);
        };
        match (x.parse::<f32>(), y.parse::<f32>()) {
            (Ok(x), Ok(y)) => {
                if ask("Place the device at the position and press Enter to start...")?.is_none() {
                    return Ok(None);
                }
                return Ok(Some(PredictionSample::new(x, y)));
            }
            _ => println!("Invalid input. Please enter numbers for coordinates."),
        }
    }
}
