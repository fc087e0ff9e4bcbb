use crate::prelude::TelemetryResult;
use crate::smoothing::window::{Sample, SmoothingBuffer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mutex-guarded smoothing window shared by one producer and one reader.
pub struct SharedWindow<T: Sample> {
    inner: Arc<Mutex<SmoothingBuffer<T>>>,
}

impl<T: Sample> Clone for SharedWindow<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Sample> SharedWindow<T> {
    pub fn with_capacity(capacity: usize) -> TelemetryResult<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(SmoothingBuffer::with_capacity(capacity)?)),
        })
    }

    pub fn push(&self, sample: T) -> TelemetryResult<()> {
        self.lock().push(sample)
    }

    pub fn mean(&self) -> Option<T> {
        self.lock().mean()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    // A push either completes or leaves the deque untouched, so a poisoned
    // lock still guards a consistent window.
    fn lock(&self) -> MutexGuard<'_, SmoothingBuffer<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
