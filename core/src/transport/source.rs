use crate::prelude::TelemetryResult;
use std::io::{BufRead, ErrorKind};

/// Outcome of one bounded read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line with its terminator stripped.
    Line(String),
    /// The read timed out before a full line arrived.
    Idle,
    /// A full line arrived but was not valid UTF-8.
    Discarded,
    /// The transport reached end of stream.
    Closed,
}

/// Anything that yields newline-framed telemetry lines.
pub trait LineSource: Send {
    fn next_line(&mut self) -> TelemetryResult<LineEvent>;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> TelemetryResult<LineEvent> {
        (**self).next_line()
    }
}

/// Newline framing over any buffered reader, serial port or file alike.
///
/// Bytes of a line interrupted by a read timeout are kept and completed on
/// the next call.
pub struct LineReader<R> {
    reader: R,
    pending: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }

    fn take_line(&mut self) -> LineEvent {
        let bytes = std::mem::take(&mut self.pending);
        match String::from_utf8(bytes) {
            Ok(text) => LineEvent::Line(text.trim_end_matches(['\r', '\n']).to_string()),
            Err(_) => LineEvent::Discarded,
        }
    }
}

impl<R: BufRead + Send> LineSource for LineReader<R> {
    fn next_line(&mut self) -> TelemetryResult<LineEvent> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Ok(LineEvent::Closed),
            Ok(_) => Ok(self.take_line()),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(LineEvent::Idle)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    #[test]
    fn reader_splits_lines_and_reports_close() {
        let mut source = LineReader::new(Cursor::new(b"CSI_DATA,1\r\nDistance:2\nlast".to_vec()));
        assert_eq!(source.next_line().unwrap(), LineEvent::Line("CSI_DATA,1".into()));
        assert_eq!(source.next_line().unwrap(), LineEvent::Line("Distance:2".into()));
        assert_eq!(source.next_line().unwrap(), LineEvent::Line("last".into()));
        assert_eq!(source.next_line().unwrap(), LineEvent::Closed);
    }

    #[test]
    fn invalid_utf8_line_is_discarded() {
        let mut source = LineReader::new(Cursor::new(b"\xff\xfe\nok\n".to_vec()));
        assert_eq!(source.next_line().unwrap(), LineEvent::Discarded);
        assert_eq!(source.next_line().unwrap(), LineEvent::Line("ok".into()));
    }

    /// Delivers scripted chunks, timing out between them.
    struct Stuttering {
        chunks: Vec<Option<&'static [u8]>>,
    }

    impl Read for Stuttering {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(ErrorKind::TimedOut, "no data")),
            }
        }
    }

    #[test]
    fn timeout_mid_line_keeps_partial_bytes() {
        let port = Stuttering {
            chunks: vec![Some(b"Dist"), None, Some(b"ance:3.5\n")],
        };
        let mut source = LineReader::new(io::BufReader::new(port));
        assert_eq!(source.next_line().unwrap(), LineEvent::Idle);
        assert_eq!(source.next_line().unwrap(), LineEvent::Line("Distance:3.5".into()));
        assert_eq!(source.next_line().unwrap(), LineEvent::Closed);
    }
}
