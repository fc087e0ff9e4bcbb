pub mod series;

pub use series::{AxisBounds, SeriesPoint, TimeSeries};
