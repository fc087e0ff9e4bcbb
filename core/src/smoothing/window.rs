use crate::prelude::{FeatureVector, PredictionSample, TelemetryError, TelemetryResult};
use std::collections::VecDeque;

/// A value that can be averaged element-wise with others of the same width.
pub trait Sample: Clone {
    fn width(&self) -> usize;
    fn component(&self, index: usize) -> f32;
    fn from_components(components: Vec<f32>) -> Self;
}

impl Sample for FeatureVector {
    fn width(&self) -> usize {
        self.len()
    }

    fn component(&self, index: usize) -> f32 {
        self.as_slice()[index]
    }

    fn from_components(components: Vec<f32>) -> Self {
        FeatureVector::new(components)
    }
}

impl Sample for PredictionSample {
    fn width(&self) -> usize {
        2
    }

    fn component(&self, index: usize) -> f32 {
        if index == 0 {
            self.x
        } else {
            self.y
        }
    }

    fn from_components(components: Vec<f32>) -> Self {
        PredictionSample::new(components[0], components[1])
    }
}

impl Sample for f32 {
    fn width(&self) -> usize {
        1
    }

    fn component(&self, _index: usize) -> f32 {
        *self
    }

    fn from_components(components: Vec<f32>) -> Self {
        components[0]
    }
}

/// Bounded FIFO of the most recent samples with an element-wise mean.
#[derive(Debug, Clone)]
pub struct SmoothingBuffer<T: Sample> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Sample> SmoothingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> TelemetryResult<Self> {
        if capacity == 0 {
            return Err(TelemetryError::InvalidInput(
                "smoothing window must hold at least one sample".into(),
            ));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends `sample`, evicting the oldest entry once the window is full.
    ///
    /// Every sample in one buffer must have the same width; a mismatched
    /// sample is rejected and the buffer is left untouched.
    pub fn push(&mut self, sample: T) -> TelemetryResult<()> {
        if let Some(front) = self.entries.front() {
            if front.width() != sample.width() {
                return Err(TelemetryError::InvalidInput(format!(
                    "sample width {} does not match window width {}",
                    sample.width(),
                    front.width()
                )));
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(sample);
        Ok(())
    }

    /// Element-wise mean of the held samples, or `None` before the first push.
    pub fn mean(&self) -> Option<T> {
        let first = self.entries.front()?;
        let width = first.width();
        let mut sums = vec![0.0f32; width];
        for entry in &self.entries {
            for (idx, sum) in sums.iter_mut().enumerate() {
                *sum += entry.component(idx);
            }
        }
        let count = self.entries.len() as f32;
        Some(T::from_components(
            sums.into_iter().map(|sum| sum / count).collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Held samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
