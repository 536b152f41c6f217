use std::time::Duration;
use thiserror::Error;

/// Why a line could not be turned into a [`crate::types::RawRecord`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected at least 4 comma-separated fields, found {found}")]
    TooFewFields { found: usize },
    #[error("field {index} is not an integer: {token:?}")]
    InvalidInteger { index: usize, token: String },
    #[error("record contains non-ascii bytes")]
    NonAscii,
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("malformed record {line:?}: {source}")]
    Parse {
        line: String,
        #[source]
        source: ParseError,
    },
    #[error("no record received within {0:?}")]
    Timeout(Duration),
    #[error("record exceeded {0} bytes without a line terminator")]
    LineTooLong(usize),
    #[error("serial stream reached end of input")]
    EndOfStream,
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial stream error: {0}")]
    Stream(#[from] std::io::Error),
}

impl ReaderError {
    /// Line noise and silence are expected on a physical link; everything
    /// else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReaderError::Parse { .. } | ReaderError::Timeout(_) | ReaderError::LineTooLong(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn recoverable_classification() {
        let parse = ReaderError::Parse {
            line: "1,2,3".into(),
            source: ParseError::TooFewFields { found: 3 },
        };
        assert!(parse.is_recoverable());
        assert!(ReaderError::Timeout(Duration::from_secs(3)).is_recoverable());
        assert!(ReaderError::LineTooLong(256).is_recoverable());
        assert!(!ReaderError::EndOfStream.is_recoverable());
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "unplugged");
        assert!(!ReaderError::from(io_err).is_recoverable());
    }

    #[test]
    fn parse_message_names_the_line() {
        let err = ReaderError::Parse {
            line: "1,a,2,3".into(),
            source: ParseError::InvalidInteger {
                index: 1,
                token: "a".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "malformed record \"1,a,2,3\": field 1 is not an integer: \"a\""
        );
    }
}
