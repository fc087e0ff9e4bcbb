pub mod shared;
pub mod window;

pub use shared::SharedWindow;
pub use window::{Sample, SmoothingBuffer};
