pub mod serial;
pub mod source;

pub use serial::{open_serial, SerialSettings};
pub use source::{LineEvent, LineReader, LineSource};
