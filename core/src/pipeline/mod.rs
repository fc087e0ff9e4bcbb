pub mod locator;
pub mod producer;

pub use locator::{Estimate, Locator};
pub use producer::{spawn_producer, Producer, ProducerExit};
