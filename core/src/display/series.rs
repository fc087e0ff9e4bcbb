use crate::prelude::{TelemetryError, TelemetryResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Seconds of history the scrolling chart keeps in view.
pub const DEFAULT_SPAN_SECS: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub t: f32,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Default for AxisBounds {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: DEFAULT_SPAN_SECS,
            y_min: 0.0,
            y_max: 10.0,
        }
    }
}

impl AxisBounds {
    /// Sliding x window ending just past the newest point, y padded by one
    /// unit around the observed range. Falls back to the default frame when
    /// there is nothing to show.
    pub fn fit(points: &[SeriesPoint], span: f32) -> Self {
        let Some(last) = points.last() else {
            return Self::default();
        };
        let window_end = last.t.max(span);
        let (low, high) = points
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.value), hi.max(p.value))
            });
        Self {
            x_min: (window_end - span).max(0.0),
            x_max: window_end + 2.0,
            y_min: low - 1.0,
            y_max: high + 1.0,
        }
    }
}

/// Bounded history of timestamped readings for the scrolling line chart.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    points: VecDeque<SeriesPoint>,
    capacity: usize,
}

impl TimeSeries {
    pub fn with_capacity(capacity: usize) -> TelemetryResult<Self> {
        if capacity == 0 {
            return Err(TelemetryError::InvalidInput(
                "time series must hold at least one point".into(),
            ));
        }
        Ok(Self {
            points: VecDeque::new(),
            capacity,
        })
    }

    pub fn push(&mut self, t: f32, value: f32) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(SeriesPoint { t, value });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<SeriesPoint> {
        self.points.back().copied()
    }

    pub fn to_vec(&self) -> Vec<SeriesPoint> {
        self.points.iter().copied().collect()
    }

    pub fn bounds(&self) -> AxisBounds {
        AxisBounds::fit(&self.to_vec(), DEFAULT_SPAN_SECS)
    }
}
