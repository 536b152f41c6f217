#[cfg(test)]
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::time::Duration;

use serialport::SerialPort;

use crate::config::SerialConfig;
use crate::drivers::ReaderError;

/// Longest record accepted before the rest of the line is thrown away.
pub const MAX_LINE_LENGTH: usize = 256;

/// Something that can yield newline-terminated records on demand.
pub trait LineSource {
    /// Blocks until one full line is available. The terminator is stripped.
    fn next_line(&mut self) -> Result<String, ReaderError>;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> Result<String, ReaderError> {
        (**self).next_line()
    }
}

/// Assembles lines from any byte stream with a read timeout.
///
/// Bytes read before a timeout are kept, so a record split by a quiet
/// period is still delivered whole on the next call. Text left without a
/// terminator when the stream ends is delivered as a final line.
pub struct LineReader<R: Read> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    discarding: bool,
    timeout: Duration,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::with_capacity(MAX_LINE_LENGTH),
            discarding: false,
            timeout,
        }
    }

    fn take_line(&mut self) -> String {
        let raw = std::mem::take(&mut self.pending);
        let line = raw.strip_suffix(b"\r").unwrap_or(&raw);
        String::from_utf8_lossy(line).into_owned()
    }
}

impl<R: Read> LineSource for LineReader<R> {
    fn next_line(&mut self) -> Result<String, ReaderError> {
        loop {
            let (consumed, complete) = {
                let available = match self.reader.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                        return Err(ReaderError::Timeout(self.timeout))
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(ReaderError::Stream(e)),
                };
                if available.is_empty() {
                    if std::mem::take(&mut self.discarding) {
                        return Err(ReaderError::LineTooLong(MAX_LINE_LENGTH));
                    }
                    if self.pending.is_empty() {
                        return Err(ReaderError::EndOfStream);
                    }
                    log::debug!(
                        "end of stream after {} unterminated byte(s)",
                        self.pending.len()
                    );
                    return Ok(self.take_line());
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        if !self.discarding {
                            self.pending.extend_from_slice(&available[..end]);
                        }
                        (end + 1, true)
                    }
                    None => {
                        if !self.discarding {
                            self.pending.extend_from_slice(available);
                        }
                        (available.len(), false)
                    }
                }
            };
            self.reader.consume(consumed);

            if self.pending.len() > MAX_LINE_LENGTH {
                self.pending.clear();
                self.discarding = true;
            }
            if !complete {
                continue;
            }
            if self.discarding {
                self.discarding = false;
                return Err(ReaderError::LineTooLong(MAX_LINE_LENGTH));
            }
            return Ok(self.take_line());
        }
    }
}

/// Opens the configured port: 8N1 at 19200 baud with a 3 s timeout unless
/// the configuration says otherwise.
pub fn open_serial(config: &SerialConfig) -> Result<LineReader<Box<dyn SerialPort>>, ReaderError> {
    let open_err = |source| ReaderError::Open {
        port: config.port.clone(),
        source,
    };
    let port = serialport::new(&config.port, config.baud_rate)
        .parity(config.parity.into())
        .data_bits(config.serial_data_bits().map_err(open_err)?)
        .stop_bits(config.serial_stop_bits().map_err(open_err)?)
        .timeout(config.timeout())
        .open()
        .map_err(open_err)?;
    log::info!(
        "opened {} at {} baud ({:?}, timeout {:?})",
        config.port,
        config.baud_rate,
        config.parity,
        config.timeout()
    );
    Ok(LineReader::new(port, config.timeout()))
}

/// In-memory source for tests.
#[cfg(test)]
pub struct ManualSource {
    queue: VecDeque<String>,
}

#[cfg(test)]
impl ManualSource {
    pub fn new<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            queue: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
impl LineSource for ManualSource {
    fn next_line(&mut self) -> Result<String, ReaderError> {
        self.queue.pop_front().ok_or(ReaderError::EndOfStream)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Replays a fixed script of reads, one chunk per call.
    pub(crate) struct ScriptedReader(pub VecDeque<io::Result<Vec<u8>>>);

    impl ScriptedReader {
        pub(crate) fn new(script: Vec<io::Result<Vec<u8>>>) -> Self {
            Self(script.into())
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.0.push_front(Ok(chunk[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }

    pub(crate) fn timed_out() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "Operation timed out")
    }

    fn reader(script: Vec<io::Result<Vec<u8>>>) -> LineReader<ScriptedReader> {
        LineReader::new(ScriptedReader::new(script), Duration::from_secs(3))
    }

    #[test]
    fn splits_lines_and_strips_terminators() {
        let mut src = reader(vec![Ok(b"0,1,2,3\n4,5,6,7\r\n".to_vec())]);
        assert_eq!(src.next_line().unwrap(), "0,1,2,3");
        assert_eq!(src.next_line().unwrap(), "4,5,6,7");
        assert!(matches!(src.next_line(), Err(ReaderError::EndOfStream)));
    }

    #[test]
    fn partial_line_survives_timeout() {
        let mut src = reader(vec![
            Ok(b"0,13".to_vec()),
            Err(timed_out()),
            Ok(b"85,1030,705\n".to_vec()),
        ]);
        match src.next_line() {
            Err(ReaderError::Timeout(t)) => assert_eq!(t, Duration::from_secs(3)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(src.next_line().unwrap(), "0,1385,1030,705");
    }

    #[test]
    fn overlong_line_is_dropped_up_to_newline() {
        let long = vec![b'9'; MAX_LINE_LENGTH + 10];
        let mut src = reader(vec![Ok(long), Ok(b"99\n1,2,3,4\n".to_vec())]);
        assert!(matches!(
            src.next_line(),
            Err(ReaderError::LineTooLong(MAX_LINE_LENGTH))
        ));
        assert_eq!(src.next_line().unwrap(), "1,2,3,4");
    }

    #[test]
    fn unterminated_tail_is_the_last_line() {
        let mut src = reader(vec![Ok(b"0,1,2,3\n4,5,6,7\r".to_vec())]);
        assert_eq!(src.next_line().unwrap(), "0,1,2,3");
        assert_eq!(src.next_line().unwrap(), "4,5,6,7");
        assert!(matches!(src.next_line(), Err(ReaderError::EndOfStream)));
    }

    #[test]
    fn overlong_tail_at_end_of_stream() {
        let mut src = reader(vec![Ok(vec![b'7'; MAX_LINE_LENGTH + 1])]);
        assert!(matches!(
            src.next_line(),
            Err(ReaderError::LineTooLong(MAX_LINE_LENGTH))
        ));
        assert!(matches!(src.next_line(), Err(ReaderError::EndOfStream)));
    }

    #[test]
    fn io_failure_is_a_stream_error() {
        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged");
        let mut src = reader(vec![Err(broken)]);
        let err = src.next_line().unwrap_err();
        assert!(matches!(err, ReaderError::Stream(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn manual_source_drains_then_ends() {
        let mut src = ManualSource::new(["a", "b"]);
        assert_eq!(src.next_line().unwrap(), "a");
        assert_eq!(src.next_line().unwrap(), "b");
        assert!(matches!(src.next_line(), Err(ReaderError::EndOfStream)));
    }
}
