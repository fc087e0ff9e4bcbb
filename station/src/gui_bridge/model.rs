use csicore::display::{AxisBounds, SeriesPoint};
use csicore::prelude::PredictionSample;
use serde::{Deserialize, Serialize};

/// Snapshot served to the visualizer on every poll.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    /// Window-averaged subcarrier amplitudes, empty until the first frame.
    pub amplitudes: Vec<f32>,
    pub smoothing_window: usize,
    pub frames_in_window: usize,
    pub distance: Vec<SeriesPoint>,
    pub distance_bounds: AxisBounds,
    pub position: Option<PredictionSample>,
    pub accepted: usize,
    pub status: String,
}
